//! Metric dependent second phase: computing weights for the CCH arcs.
//!
//! Every CCH arc `x -> y` (with `x < y`) carries two weights, `forward` for the direction `x -> y`
//! and `backward` for `y -> x`. Customization starts with the minimum input weight mapped to each arc
//! and then relaxes all lower triangles by increasing rank.
//! Afterwards the weights satisfy the triangle inequality along every lower triangle,
//! which is all elimination tree queries need.

use super::*;
use crate::report::benchmark::report_time_with_key;
use std::cmp::min;

pub mod parallelization;
pub mod partial;
mod perfect_witness;

/// Weights for the arcs of a `CustomizableContractionHierarchy`.
///
/// The metric keeps its own copy of the input weights.
/// Call `customize` after construction and after every weight change before running queries.
#[derive(Debug, Clone)]
pub struct CustomizableContractionHierarchyMetric<'a> {
    cch: &'a CustomizableContractionHierarchy,
    input_weight: Vec<Weight>,
    forward: Vec<Weight>,
    backward: Vec<Weight>,
}

impl<'a> CustomizableContractionHierarchyMetric<'a> {
    /// Attach input weights to a CCH. Weights are infinite until `customize` is called.
    pub fn new(cch: &'a CustomizableContractionHierarchy, input_weight: &[Weight]) -> Self {
        assert_eq!(input_weight.len(), cch.input_arc_count(), "input weight vector has the wrong size");
        CustomizableContractionHierarchyMetric {
            cch,
            input_weight: input_weight.to_vec(),
            forward: vec![INFINITY; cch.cch_arc_count()],
            backward: vec![INFINITY; cch.cch_arc_count()],
        }
    }

    pub fn cch(&self) -> &'a CustomizableContractionHierarchy {
        self.cch
    }

    pub fn input_weight(&self) -> &[Weight] {
        &self.input_weight
    }

    /// Customized weights for the upward direction of every CCH arc.
    pub fn forward(&self) -> &[Weight] {
        &self.forward
    }

    /// Customized weights for the downward direction of every CCH arc.
    pub fn backward(&self) -> &[Weight] {
        &self.backward
    }

    /// Change the weight of a single input arc.
    /// The customized weights stay untouched, follow up with a full or partial customization.
    pub fn set_input_weight(&mut self, input_arc: EdgeId, weight: Weight) -> &mut Self {
        self.input_weight[input_arc as usize] = weight;
        self
    }

    /// Replace all input weights. The customized weights stay untouched.
    pub fn reset(&mut self, input_weight: &[Weight]) -> &mut Self {
        assert_eq!(input_weight.len(), self.cch.input_arc_count(), "input weight vector has the wrong size");
        self.input_weight.clear();
        self.input_weight.extend_from_slice(input_weight);
        self
    }

    /// Attach to a possibly different CCH. Buffers are reused when the arc counts fit.
    pub fn reset_with(&mut self, cch: &'a CustomizableContractionHierarchy, input_weight: &[Weight]) -> &mut Self {
        if cch.cch_arc_count() != self.forward.len() {
            *self = Self::new(cch, input_weight);
        } else {
            self.cch = cch;
            self.reset(input_weight);
        }
        self
    }

    /// Sequential customization by increasing rank.
    pub fn customize(&mut self) -> &mut Self {
        report_time_with_key("CCH customization", "customization_running_time_ms", || {
            self.extract_initial_weights();
            self.relax_all_lower_triangles();
        });
        debug_assert!(self.is_triangle_inequality_satisfied());
        self
    }

    // Minimum of the input weights mapped to a CCH arc per direction.
    pub(super) fn initial_weights(&self, cch_arc: EdgeId) -> (Weight, Weight) {
        let initial_weight = |forward| {
            self.cch
                .input_arcs_of_cch_arc(cch_arc, forward)
                .map(|input_arc| min(self.input_weight[input_arc as usize], INFINITY))
                .min()
                .unwrap_or(INFINITY)
        };
        (initial_weight(true), initial_weight(false))
    }

    /// The input arc whose weight the CCH arc carries in the given direction, if any.
    pub(super) fn original_arc(&self, cch_arc: EdgeId, forward: bool) -> Option<EdgeId> {
        let weight = if forward { self.forward[cch_arc as usize] } else { self.backward[cch_arc as usize] };
        self.cch
            .input_arcs_of_cch_arc(cch_arc, forward)
            .find(|&input_arc| self.input_weight[input_arc as usize] == weight)
    }

    fn extract_initial_weights(&mut self) {
        for arc in 0..self.cch.cch_arc_count() {
            let (forward, backward) = self.initial_weights(arc as EdgeId);
            self.forward[arc] = forward;
            self.backward[arc] = backward;
        }
    }

    // For each node x all its up arcs are indexed by head in `arc_id_cache`.
    // Each down arc x -> y then closes the lower triangles y -> x -> z for all up arcs y -> z with z > x.
    fn relax_all_lower_triangles(&mut self) {
        let cch = self.cch;
        let mut arc_id_cache = vec![INVALID_ID; cch.node_count()];

        for x in 0..cch.node_count() as NodeId {
            for xz in cch.up_range(x) {
                arc_id_cache[cch.up_head[xz] as usize] = xz as EdgeId;
            }

            for xy_down in cch.down_range(x) {
                let y = cch.down_head[xy_down];
                let yx = cch.down_to_up[xy_down] as usize;

                // heads are sorted, so going from high to low we can stop at the first head not above x
                for yz in cch.up_range(y).rev() {
                    let z = cch.up_head[yz];
                    if z <= x {
                        break;
                    }
                    let xz = arc_id_cache[z as usize] as usize;
                    self.forward[xz] = min(self.forward[xz], self.backward[yx] + self.forward[yz]);
                    self.backward[xz] = min(self.backward[xz], self.forward[yx] + self.backward[yz]);
                }
            }
        }
    }

    fn is_triangle_inequality_satisfied(&self) -> bool {
        (0..self.cch.cch_arc_count() as EdgeId).all(|arc| {
            self.cch.for_each_lower_triangle_of_arc(arc, |t| {
                let (bottom, mid, top) = (t.bottom_arc as usize, t.mid_arc as usize, t.top_arc as usize);
                self.forward[top] <= self.backward[bottom] + self.forward[mid] && self.backward[top] <= self.forward[bottom] + self.backward[mid]
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 -> 1 -> 2 -> 3 -> 0 with identity order, eliminating 0 creates the arc 1 - 3
    fn cycle() -> CustomizableContractionHierarchy {
        CustomizableContractionHierarchy::new(&[0, 1, 2, 3], &[0, 1, 2, 3], &[1, 2, 3, 0], None, false).unwrap()
    }

    #[test]
    fn weights_are_infinite_before_customization() {
        let cch = cycle();
        let metric = CustomizableContractionHierarchyMetric::new(&cch, &[1, 2, 3, 4]);
        assert!(metric.forward().iter().chain(metric.backward()).all(|&weight| weight == INFINITY));
    }

    #[test]
    fn customization_fills_in_shortcuts() {
        let cch = cycle();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[1, 2, 3, 4]);
        metric.customize();

        // arcs: 0:(0,1) 1:(0,3) 2:(1,2) 3:(1,3) 4:(2,3)
        assert_eq!(metric.forward(), &[1, INFINITY, 2, INFINITY, 3]);
        // 3 -> 1 via 3 -> 0 -> 1 and 3 -> 2 via 3 -> 0 -> 1 -> 2
        assert_eq!(metric.backward(), &[INFINITY, 4, INFINITY, 5, 7]);
        assert_eq!(metric.original_arc(3, false), None);
        assert_eq!(metric.original_arc(1, false), Some(3));
        assert_eq!(metric.original_arc(0, true), Some(0));
    }

    #[test]
    fn parallel_arcs_use_the_minimum() {
        let cch = CustomizableContractionHierarchy::new(&[0, 1], &[0, 0, 1], &[1, 1, 0], None, false).unwrap();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[7, 3, 5]);
        metric.customize();
        assert_eq!(metric.forward(), &[3]);
        assert_eq!(metric.backward(), &[5]);
        assert_eq!(metric.original_arc(0, true), Some(1));

        metric.set_input_weight(1, 9).customize();
        assert_eq!(metric.forward(), &[7]);
        assert_eq!(metric.original_arc(0, true), Some(0));
    }

    #[test]
    fn reset_replaces_input_weights() {
        let cch = cycle();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[1, 2, 3, 4]);
        metric.reset(&[1, 1, 1, 1]).customize();
        assert_eq!(metric.backward()[3], 2);

        let other = CustomizableContractionHierarchy::new(&[0, 1], &[0], &[1], None, false).unwrap();
        metric.reset_with(&other, &[6]).customize();
        assert_eq!(metric.forward(), &[6]);
        assert_eq!(metric.backward(), &[INFINITY]);
    }
}
