//! Partial customization after a few input weights changed.
//!
//! Changed arcs are collected in a queue ordered by arc id.
//! Popping the smallest arc, its weights are recomputed from its input arcs and lower triangles.
//! Lower triangles only contain arcs with smaller ids, so these are already final.
//! If the weights changed, every arc whose lower triangle relaxation used the old weights or may profit from the new ones is queued.

use super::*;
use crate::datastr::index_heap::{IndexdMinHeap, State};

#[derive(Debug)]
pub struct CustomizableContractionHierarchyPartialCustomization<'a> {
    cch: &'a CustomizableContractionHierarchy,
    queue: IndexdMinHeap<State<EdgeId>>,
}

impl<'a> CustomizableContractionHierarchyPartialCustomization<'a> {
    pub fn new(cch: &'a CustomizableContractionHierarchy) -> Self {
        CustomizableContractionHierarchyPartialCustomization {
            cch,
            queue: IndexdMinHeap::new(cch.cch_arc_count()),
        }
    }

    /// Forget all updated arcs.
    pub fn reset(&mut self) -> &mut Self {
        self.queue.clear();
        self
    }

    /// Forget all updated arcs and attach to a possibly different CCH.
    pub fn reset_with(&mut self, cch: &'a CustomizableContractionHierarchy) -> &mut Self {
        if cch.cch_arc_count() != self.queue.id_count() {
            *self = Self::new(cch);
        } else {
            self.cch = cch;
            self.queue.clear();
        }
        self
    }

    /// Mark an input arc as changed. Loops have no CCH arc and are ignored.
    pub fn update_arc(&mut self, input_arc: EdgeId) -> &mut Self {
        let cch_arc = self.cch.input_arc_to_cch_arc(input_arc);
        if cch_arc != INVALID_ID {
            self.queue.push_unless_contained(State { key: cch_arc, id: cch_arc });
        }
        self
    }

    /// Bring a customized metric up to date with its changed input weights.
    pub fn customize(&mut self, metric: &mut CustomizableContractionHierarchyMetric<'_>) -> &mut Self {
        assert!(std::ptr::eq(self.cch, metric.cch), "metric belongs to a different CCH");
        let cch = self.cch;
        let queue = &mut self.queue;
        let mut updated_arcs = 0;

        report_time_with_key("CCH partial customization", "partial_customization_running_time_ms", || {
            while let Some(State { id: xy, .. }) = queue.pop() {
                updated_arcs += 1;
                let arc = xy as usize;
                let (old_forward, old_backward) = (metric.forward[arc], metric.backward[arc]);

                let (mut new_forward, mut new_backward) = metric.initial_weights(xy);
                let (forward, backward) = (&metric.forward, &metric.backward);
                cch.for_each_lower_triangle_of_arc(xy, |t| {
                    let (bottom, mid) = (t.bottom_arc as usize, t.mid_arc as usize);
                    new_forward = min(new_forward, backward[bottom] + forward[mid]);
                    new_backward = min(new_backward, forward[bottom] + backward[mid]);
                    true
                });
                metric.forward[arc] = new_forward;
                metric.backward[arc] = new_backward;

                if old_forward == new_forward && old_backward == new_backward {
                    continue;
                }

                let (forward, backward) = (&metric.forward, &metric.backward);
                cch.for_each_intermediate_triangle_of_arc(xy, |t| {
                    let (bottom, top) = (t.bottom_arc as usize, t.top_arc as usize);
                    if backward[bottom] + old_forward == forward[top]
                        || forward[bottom] + old_backward == backward[top]
                        || backward[bottom] + new_forward < forward[top]
                        || forward[bottom] + new_backward < backward[top]
                    {
                        queue.push_unless_contained(State { key: t.top_arc, id: t.top_arc });
                    }
                    true
                });
                cch.for_each_upper_triangle_of_arc(xy, |t| {
                    let (mid, top) = (t.mid_arc as usize, t.top_arc as usize);
                    if forward[mid] + old_backward == forward[top]
                        || backward[mid] + old_forward == backward[top]
                        || forward[mid] + new_backward < forward[top]
                        || backward[mid] + new_forward < backward[top]
                    {
                        queue.push_unless_contained(State { key: t.top_arc, id: t.top_arc });
                    }
                    true
                });
            }
        });

        report!("num_partially_customized_arcs", updated_arcs);
        debug_assert!(metric.is_triangle_inequality_satisfied());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle() -> CustomizableContractionHierarchy {
        CustomizableContractionHierarchy::new(&[0, 1, 2, 3], &[0, 1, 2, 3], &[1, 2, 3, 0], None, false).unwrap()
    }

    #[test]
    fn increase_and_decrease_propagate() {
        let cch = cycle();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[1, 2, 3, 4]);
        metric.customize();
        let mut partial = CustomizableContractionHierarchyPartialCustomization::new(&cch);

        // 3 -> 0 gets cheaper, the fill in arc 1 - 3 and 2 - 3 follow
        metric.set_input_weight(3, 1);
        partial.update_arc(3).customize(&mut metric);
        assert_eq!(metric.backward(), &[INFINITY, 1, INFINITY, 2, 4]);

        // 0 -> 1 gets more expensive
        metric.set_input_weight(0, 10);
        partial.update_arc(0).customize(&mut metric);
        assert_eq!(metric.forward(), &[10, INFINITY, 2, INFINITY, 3]);
        assert_eq!(metric.backward(), &[INFINITY, 1, INFINITY, 11, 13]);

        let mut full = CustomizableContractionHierarchyMetric::new(&cch, metric.input_weight());
        full.customize();
        assert_eq!(full.forward(), metric.forward());
        assert_eq!(full.backward(), metric.backward());
    }

    #[test]
    fn loops_are_ignored() {
        let cch = CustomizableContractionHierarchy::new(&[0, 1], &[0, 1], &[1, 1], None, false).unwrap();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[2, 3]);
        metric.customize();
        let mut partial = CustomizableContractionHierarchyPartialCustomization::new(&cch);
        metric.set_input_weight(1, 0);
        partial.update_arc(1).customize(&mut metric);
        assert_eq!(metric.forward(), &[2]);
    }

    #[test]
    fn reset_forgets_updates() {
        let cch = cycle();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[1, 2, 3, 4]);
        metric.customize();
        let mut partial = CustomizableContractionHierarchyPartialCustomization::new(&cch);

        metric.set_input_weight(0, 5);
        partial.update_arc(0).reset().customize(&mut metric);
        assert_eq!(metric.forward()[0], 1);

        let other = CustomizableContractionHierarchy::new(&[0, 1], &[0], &[1], None, false).unwrap();
        partial.reset_with(&other);
        let mut other_metric = CustomizableContractionHierarchyMetric::new(&other, &[6]);
        other_metric.customize();
        other_metric.set_input_weight(0, 8);
        partial.update_arc(0).customize(&mut other_metric);
        assert_eq!(other_metric.forward(), &[8]);
    }
}
