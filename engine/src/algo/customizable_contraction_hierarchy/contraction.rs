//! Metric independent first phase of CCH preprocessing.
//!
//! Plays the elimination game for a fixed order: when a node is eliminated,
//! all its higher ranked neighbors become pairwise adjacent.
//! Merging the neighborhood into the lowest higher neighbor suffices,
//! that neighbor gets eliminated next among them and passes the neighbors on.

use crate::{datastr::graph::*, Error, Result};
use std::cmp::Ordering;

// Sorted upward neighborhood of a node during the elimination game.
#[derive(Debug, Default)]
struct Node {
    neighbors: Vec<NodeId>,
}

impl Node {
    // Merge another sorted neighborhood into this one, dropping duplicates.
    fn merge_neighbors(&mut self, others: &[NodeId]) {
        let mut merged = Vec::with_capacity(self.neighbors.len() + others.len());
        let (mut i, mut j) = (0, 0);

        while i < self.neighbors.len() && j < others.len() {
            match self.neighbors[i].cmp(&others[j]) {
                Ordering::Less => {
                    merged.push(self.neighbors[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    merged.push(others[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    merged.push(self.neighbors[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.neighbors[i..]);
        merged.extend_from_slice(&others[j..]);

        self.neighbors = merged;
    }
}

/// Upward graph of the chordal supergraph, nodes are ranks.
#[derive(Debug)]
pub(super) struct ChordalSupergraph {
    pub first_out: Vec<EdgeId>,
    pub head: Vec<NodeId>,
    pub max_upward_degree: usize,
}

/// Compute the chordal supergraph for arcs already renamed to ranks.
/// Directions, loops and multi arcs of the input are ignored.
pub(super) fn compute_chordal_supergraph(node_count: usize, tail: &[NodeId], head: &[NodeId]) -> Result<ChordalSupergraph> {
    let mut nodes: Vec<Node> = (0..node_count).map(|_| Node::default()).collect();
    for (&x, &y) in tail.iter().zip(head) {
        match x.cmp(&y) {
            Ordering::Less => nodes[x as usize].neighbors.push(y),
            Ordering::Greater => nodes[y as usize].neighbors.push(x),
            Ordering::Equal => (),
        }
    }
    for node in &mut nodes {
        node.neighbors.sort_unstable();
        node.neighbors.dedup();
    }

    let mut first_out = Vec::with_capacity(node_count + 1);
    first_out.push(0);
    let mut arc_count: usize = 0;
    let mut max_upward_degree = 0;

    for node in 0..node_count {
        // split borrows: the eliminated node stays readable while a higher node gets modified
        let (lower, higher) = nodes.split_at_mut(node + 1);
        let eliminated = &lower[node];

        if let Some((&lowest_neighbor, other_neighbors)) = eliminated.neighbors.split_first() {
            higher[lowest_neighbor as usize - node - 1].merge_neighbors(other_neighbors);
        }

        arc_count += eliminated.neighbors.len();
        if arc_count >= INVALID_ID as usize {
            return Err(Error::TooManyArcs);
        }
        max_upward_degree = std::cmp::max(max_upward_degree, eliminated.neighbors.len());
        first_out.push(arc_count as EdgeId);
    }

    // nodes are eliminated in increasing order and neighborhoods are sorted, so this is sorted by tail and head
    let head = nodes.into_iter().flat_map(|node| node.neighbors).collect();

    Ok(ChordalSupergraph {
        first_out,
        head,
        max_upward_degree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_keeps_neighbors_sorted_and_unique() {
        let mut node = Node { neighbors: vec![2, 5, 9] };
        node.merge_neighbors(&[1, 5, 7, 12]);
        assert_eq!(node.neighbors, vec![1, 2, 5, 7, 9, 12]);
    }

    #[test]
    fn star_center_eliminated_first_yields_clique() {
        // center 0 connected to 1, 2 and 3
        let graph = compute_chordal_supergraph(4, &[0, 2, 0, 3], &[1, 0, 3, 0]).unwrap();
        assert_eq!(graph.first_out, vec![0, 3, 5, 6, 6]);
        assert_eq!(graph.head, vec![1, 2, 3, 2, 3, 3]);
        assert_eq!(graph.max_upward_degree, 3);
    }

    #[test]
    fn path_needs_no_fill_in() {
        let graph = compute_chordal_supergraph(4, &[0, 1, 2, 2, 1], &[1, 2, 3, 2, 0]).unwrap();
        assert_eq!(graph.first_out, vec![0, 1, 2, 3, 3]);
        assert_eq!(graph.head, vec![1, 2, 3]);
        assert_eq!(graph.max_upward_degree, 1);
    }
}
