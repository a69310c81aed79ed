//! Secondary weights evaluated along CH shortest paths.
//!
//! The search itself only ever looks at the primary weight.
//! Afterwards any other per input arc quantity (travel time, length, a list of street names, ...)
//! can be combined along the found paths with a user supplied associative `link` operation.

use super::ContractionHierarchy;
use crate::datastr::graph::*;

/// Combined extra weight of the input path represented by a CH arc.
pub trait ExtraWeight<T> {
    fn forward_arc_weight<L: Fn(T, T) -> T>(&self, ch: &ContractionHierarchy, arc: EdgeId, link: &L) -> T;
    fn backward_arc_weight<L: Fn(T, T) -> T>(&self, ch: &ContractionHierarchy, arc: EdgeId, link: &L) -> T;
}

/// Extra weights per input arc, shortcuts are unpacked on every lookup.
impl<T: Clone> ExtraWeight<T> for [T] {
    fn forward_arc_weight<L: Fn(T, T) -> T>(&self, ch: &ContractionHierarchy, arc: EdgeId, link: &L) -> T {
        let (first, second) = (ch.forward.shortcut_first_arc[arc as usize], ch.forward.shortcut_second_arc[arc as usize]);
        if ch.forward.is_shortcut_an_original_arc.get(arc as usize) {
            self[first as usize].clone()
        } else {
            link(self.backward_arc_weight(ch, first, link), self.forward_arc_weight(ch, second, link))
        }
    }

    fn backward_arc_weight<L: Fn(T, T) -> T>(&self, ch: &ContractionHierarchy, arc: EdgeId, link: &L) -> T {
        let (first, second) = (ch.backward.shortcut_first_arc[arc as usize], ch.backward.shortcut_second_arc[arc as usize]);
        if ch.backward.is_shortcut_an_original_arc.get(arc as usize) {
            self[first as usize].clone()
        } else {
            link(self.backward_arc_weight(ch, first, link), self.forward_arc_weight(ch, second, link))
        }
    }
}

impl<T: Clone> ExtraWeight<T> for Vec<T> {
    fn forward_arc_weight<L: Fn(T, T) -> T>(&self, ch: &ContractionHierarchy, arc: EdgeId, link: &L) -> T {
        self[..].forward_arc_weight(ch, arc, link)
    }

    fn backward_arc_weight<L: Fn(T, T) -> T>(&self, ch: &ContractionHierarchy, arc: EdgeId, link: &L) -> T {
        self[..].backward_arc_weight(ch, arc, link)
    }
}

/// Extra weights precomputed for every CH arc.
/// Worth it when many paths are evaluated against the same input weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractionHierarchyExtraWeight<T> {
    forward: Vec<T>,
    backward: Vec<T>,
}

impl<T: Clone> ContractionHierarchyExtraWeight<T> {
    pub fn new<L: Fn(T, T) -> T>(ch: &ContractionHierarchy, input_weight: &[T], link: L) -> Self {
        let mut extra_weight = ContractionHierarchyExtraWeight {
            forward: Vec::with_capacity(ch.forward.num_arcs()),
            backward: Vec::with_capacity(ch.backward.num_arcs()),
        };
        extra_weight.reset(ch, input_weight, link);
        extra_weight
    }

    /// Recompute all arcs for new input weights.
    pub fn reset<L: Fn(T, T) -> T>(&mut self, ch: &ContractionHierarchy, input_weight: &[T], link: L) {
        self.forward.clear();
        self.backward.clear();

        // shortcuts of x consist of arcs of lower nodes, so increasing node order always finds both parts ready
        for node in 0..ch.node_count() as NodeId {
            for arc in ch.forward.arc_range(node) {
                debug_assert_eq!(self.forward.len(), arc);
                let (first, second) = (ch.forward.shortcut_first_arc[arc] as usize, ch.forward.shortcut_second_arc[arc] as usize);
                let weight = if ch.forward.is_shortcut_an_original_arc.get(arc) {
                    input_weight[first].clone()
                } else {
                    link(self.backward[first].clone(), self.forward[second].clone())
                };
                self.forward.push(weight);
            }
            for arc in ch.backward.arc_range(node) {
                debug_assert_eq!(self.backward.len(), arc);
                let (first, second) = (ch.backward.shortcut_first_arc[arc] as usize, ch.backward.shortcut_second_arc[arc] as usize);
                let weight = if ch.backward.is_shortcut_an_original_arc.get(arc) {
                    input_weight[first].clone()
                } else {
                    link(self.backward[first].clone(), self.forward[second].clone())
                };
                self.backward.push(weight);
            }
        }
    }
}

impl<T: Clone> ExtraWeight<T> for ContractionHierarchyExtraWeight<T> {
    fn forward_arc_weight<L: Fn(T, T) -> T>(&self, _ch: &ContractionHierarchy, arc: EdgeId, _link: &L) -> T {
        self.forward[arc as usize].clone()
    }

    fn backward_arc_weight<L: Fn(T, T) -> T>(&self, _ch: &ContractionHierarchy, arc: EdgeId, _link: &L) -> T {
        self.backward[arc as usize].clone()
    }
}

/// Addition that sticks to the maximum representable value, the standard `link` for integer extra weights.
pub trait SaturatedWeightAddition: Copy {
    fn saturated_weight_addition(self, other: Self) -> Self;
}

impl SaturatedWeightAddition for u32 {
    fn saturated_weight_addition(self, other: u32) -> u32 {
        if self >= INFINITY || other >= INFINITY {
            INFINITY
        } else {
            std::cmp::min(self + other, INFINITY)
        }
    }
}

impl SaturatedWeightAddition for i32 {
    fn saturated_weight_addition(self, other: i32) -> i32 {
        if self == i32::MAX || other == i32::MAX {
            i32::MAX
        } else {
            self.saturating_add(other)
        }
    }
}

pub fn saturated_weight_addition<T: SaturatedWeightAddition>(a: T, b: T) -> T {
    a.saturated_weight_addition(b)
}

#[cfg(test)]
mod tests {
    use super::super::{query::ContractionHierarchyQuery, DEFAULT_MAX_POP_COUNT};
    use super::*;

    fn square() -> ContractionHierarchy {
        ContractionHierarchy::build(4, &[0, 0, 1, 2], &[1, 2, 3, 3], &[1, 10, 1, 10], None, DEFAULT_MAX_POP_COUNT).unwrap()
    }

    #[test]
    fn saturation() {
        assert_eq!(saturated_weight_addition(3u32, 4), 7);
        assert_eq!(saturated_weight_addition(INFINITY, 4), INFINITY);
        assert_eq!(saturated_weight_addition(INFINITY - 1, 5), INFINITY);
        assert_eq!(saturated_weight_addition(-3i32, 4), 1);
        assert_eq!(saturated_weight_addition(i32::MAX, -4), i32::MAX);
        assert_eq!(saturated_weight_addition(i32::MIN, -4), i32::MIN);
    }

    #[test]
    fn one_to_one_extra_weights() {
        let ch = square();
        let mut query = ContractionHierarchyQuery::new(&ch);
        query.add_source(0, 0).add_target(3, 0).run();

        let unsigned = vec![10u32, 1, 10, 1];
        assert_eq!(query.get_extra_weight_distance(&unsigned, saturated_weight_addition::<u32>), 20);
        let signed = vec![-10i32, -1, -10, -1];
        assert_eq!(query.get_extra_weight_distance(&signed, saturated_weight_addition::<i32>), -20);
        let names: Vec<String> = ["foo", "bla", "bar", "hoo"].iter().map(|s| s.to_string()).collect();
        assert_eq!(query.get_extra_weight_distance(&names, |a: String, b: String| a + &b), "foobar");

        let precomputed = ContractionHierarchyExtraWeight::new(&ch, &names, |a: String, b: String| a + &b);
        assert_eq!(query.get_extra_weight_distance(&precomputed, |a: String, b: String| a + &b), "foobar");
    }

    #[test]
    fn pinned_extra_weights() {
        let ch = square();
        let names: Vec<String> = ["foo", "bla", "bar", "hoo"].iter().map(|s| s.to_string()).collect();
        let mut query = ContractionHierarchyQuery::new(&ch);

        query.pin_targets(&[3, 1]).add_source(0, 0).run_to_pinned_targets();
        assert_eq!(query.get_extra_weight_distances_to_targets(&names, |a: String, b: String| a + &b), vec!["foobar", "foo"]);

        query.reset().pin_sources(&[0, 1, 2]).add_target(3, 0).run_to_pinned_sources();
        assert_eq!(query.get_extra_weight_distances_to_sources(&names, |a: String, b: String| a + &b), vec!["foobar", "bar", "hoo"]);
    }

    #[test]
    fn unreachable_gives_default() {
        let ch = square();
        let mut query = ContractionHierarchyQuery::new(&ch);
        query.add_source(3, 0).add_target(0, 0).run();
        assert_eq!(query.get_extra_weight_distance(&vec![1u32, 1, 1, 1], saturated_weight_addition::<u32>), 0);
    }
}
