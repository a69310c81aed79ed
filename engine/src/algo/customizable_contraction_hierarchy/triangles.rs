//! Triangle enumeration on the chordal supergraph.
//!
//! Let `{x, y, z}` be a triangle with ranks `x < y < z`.
//! Its bottom arc is `x -> y`, its mid arc `x -> z` and its top arc `y -> z`.
//! For the top arc this is a lower triangle, for the mid arc an intermediate one and for the bottom arc an upper one.
//! All three enumerations are a two pointer intersection of sorted neighborhoods.
//!
//! Callbacks return `false` to abort the enumeration.
//! The enumeration functions return `false` exactly if they were aborted.

use super::CustomizableContractionHierarchy;
use crate::datastr::graph::*;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub bottom_arc: EdgeId,
    pub mid_arc: EdgeId,
    pub top_arc: EdgeId,
    pub bottom_node: NodeId,
    pub mid_node: NodeId,
    pub top_node: NodeId,
}

// Calls `f` with the positions of every node contained in both sorted slices.
#[inline]
fn for_each_common_node(first: &[NodeId], second: &[NodeId], mut f: impl FnMut(usize, usize) -> bool) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < first.len() && j < second.len() {
        match first[i].cmp(&second[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if !f(i, j) {
                    return false;
                }
                i += 1;
                j += 1;
            }
        }
    }
    true
}

/// Upper triangles of the arc `xy` on a bare upward graph.
/// Needs no downward graph, so it also works while the hierarchy is still being built.
pub(super) fn for_each_upper_triangle(
    up_first_out: &[EdgeId],
    up_head: &[NodeId],
    x: NodeId,
    xy: EdgeId,
    mut f: impl FnMut(Triangle) -> bool,
) -> bool {
    let y = up_head[xy as usize];
    let x_up = xy as usize + 1..up_first_out[x as usize + 1] as usize;
    let y_up = up_first_out[y as usize] as usize..up_first_out[y as usize + 1] as usize;

    for_each_common_node(&up_head[x_up.clone()], &up_head[y_up.clone()], |i, j| {
        let (mid_arc, top_arc) = (x_up.start + i, y_up.start + j);
        f(Triangle {
            bottom_arc: xy,
            mid_arc: mid_arc as EdgeId,
            top_arc: top_arc as EdgeId,
            bottom_node: x,
            mid_node: y,
            top_node: up_head[mid_arc],
        })
    })
}

impl CustomizableContractionHierarchy {
    /// Triangles in which `xy` is the bottom arc, ordered by increasing top node.
    pub fn for_each_upper_triangle_of_arc(&self, xy: EdgeId, f: impl FnMut(Triangle) -> bool) -> bool {
        for_each_upper_triangle(&self.up_first_out, &self.up_head, self.up_tail[xy as usize], xy, f)
    }

    /// Triangles in which `xy` is the mid arc, ordered by increasing mid node.
    pub fn for_each_intermediate_triangle_of_arc(&self, xy: EdgeId, mut f: impl FnMut(Triangle) -> bool) -> bool {
        let (x, y) = (self.up_tail[xy as usize], self.up_head[xy as usize]);
        let x_up = self.up_first_out[x as usize] as usize..xy as usize;
        let y_down = self.down_range(y);

        for_each_common_node(&self.up_head[x_up.clone()], &self.down_head[y_down.clone()], |i, j| {
            let bottom_arc = x_up.start + i;
            f(Triangle {
                bottom_arc: bottom_arc as EdgeId,
                mid_arc: xy,
                top_arc: self.down_to_up[y_down.start + j],
                bottom_node: x,
                mid_node: self.up_head[bottom_arc],
                top_node: y,
            })
        })
    }

    /// Triangles in which `xy` is the top arc, ordered by increasing bottom node.
    pub fn for_each_lower_triangle_of_arc(&self, xy: EdgeId, mut f: impl FnMut(Triangle) -> bool) -> bool {
        let (x, y) = (self.up_tail[xy as usize], self.up_head[xy as usize]);
        let x_down = self.down_range(x);
        let y_down = self.down_range(y);

        for_each_common_node(&self.down_head[x_down.clone()], &self.down_head[y_down.clone()], |i, j| {
            f(Triangle {
                bottom_arc: self.down_to_up[x_down.start + i],
                mid_arc: self.down_to_up[y_down.start + j],
                top_arc: xy,
                bottom_node: self.down_head[x_down.start + i],
                mid_node: x,
                top_node: y,
            })
        })
    }
}
