//! Extraction of a minimal `ContractionHierarchy` from a customized metric.
//!
//! Sweeping upper triangles by decreasing arc id turns the customized weights into exact distances.
//! Arcs whose weight drops in this sweep, or which are infinite, are not part of any shortest path
//! that needs them and get removed. The remaining arcs form a CH in which every kept shortcut
//! is explained by a lower triangle of kept arcs.

use super::*;
use crate::{
    algo::contraction_hierarchy::{check_contraction_hierarchy_for_errors, ContractionHierarchy, Side},
    report::push_context,
};

impl<'a> CustomizableContractionHierarchyMetric<'a> {
    /// Customize and extract a `ContractionHierarchy` with the same distances.
    ///
    /// The metric itself keeps its customized (not exact) weights, so it stays usable for queries afterwards.
    /// Input arc ids in the resulting hierarchy refer to the input arcs of the CCH.
    pub fn build_contraction_hierarchy_using_perfect_witness_search(&mut self) -> ContractionHierarchy {
        self.customize();

        let _ctxt = push_context("perfect_witness_search".to_string());
        let cch = self.cch;
        let arc_count = cch.cch_arc_count();

        let mut forward = self.forward.clone();
        let mut backward = self.backward.clone();
        let mut keep_forward = BitVec::new(arc_count);
        let mut keep_backward = BitVec::new(arc_count);
        for arc in 0..arc_count {
            if forward[arc] < INFINITY {
                keep_forward.set(arc);
            }
            if backward[arc] < INFINITY {
                keep_backward.set(arc);
            }
        }

        report_time_with_key("perfect customization", "perfect_customization_running_time_ms", || {
            for arc in (0..arc_count as EdgeId).rev() {
                cch.for_each_upper_triangle_of_arc(arc, |t| {
                    let (bottom, mid, top) = (t.bottom_arc as usize, t.mid_arc as usize, t.top_arc as usize);

                    if forward[bottom] > forward[mid] + backward[top] {
                        forward[bottom] = forward[mid] + backward[top];
                        keep_forward.unset(bottom);
                    }
                    if backward[bottom] > backward[mid] + forward[top] {
                        backward[bottom] = backward[mid] + forward[top];
                        keep_backward.unset(bottom);
                    }
                    if forward[mid] > forward[bottom] + forward[top] {
                        forward[mid] = forward[bottom] + forward[top];
                        keep_forward.unset(mid);
                    }
                    if backward[mid] > backward[bottom] + backward[top] {
                        backward[mid] = backward[bottom] + backward[top];
                        keep_backward.unset(mid);
                    }
                    true
                });
            }
        });

        let forward_map = LocalIdMapper::new(keep_forward);
        let backward_map = LocalIdMapper::new(keep_backward);
        let mut forward_side = self.kept_side(&forward_map, &forward);
        let mut backward_side = self.kept_side(&backward_map, &backward);

        for cch_arc in 0..arc_count {
            if let Some(ch_arc) = forward_map.get(cch_arc) {
                if let Some(input_arc) = self.original_arc(cch_arc as EdgeId, true) {
                    forward_side.is_shortcut_an_original_arc.set(ch_arc);
                    forward_side.shortcut_first_arc[ch_arc] = input_arc;
                    forward_side.shortcut_second_arc[ch_arc] = cch.order[cch.up_head[cch_arc] as usize];
                } else {
                    let found = !cch.for_each_lower_triangle_of_arc(cch_arc as EdgeId, |t| {
                        match (backward_map.get(t.bottom_arc as usize), forward_map.get(t.mid_arc as usize)) {
                            (Some(first), Some(second)) if backward[t.bottom_arc as usize] + forward[t.mid_arc as usize] == forward[cch_arc] => {
                                forward_side.shortcut_first_arc[ch_arc] = first as EdgeId;
                                forward_side.shortcut_second_arc[ch_arc] = second as EdgeId;
                                false
                            }
                            _ => true,
                        }
                    });
                    debug_assert!(found, "no kept lower triangle explains forward arc {}", cch_arc);
                }
            }

            if let Some(ch_arc) = backward_map.get(cch_arc) {
                if let Some(input_arc) = self.original_arc(cch_arc as EdgeId, false) {
                    backward_side.is_shortcut_an_original_arc.set(ch_arc);
                    backward_side.shortcut_first_arc[ch_arc] = input_arc;
                    backward_side.shortcut_second_arc[ch_arc] = cch.order[cch.up_tail[cch_arc] as usize];
                } else {
                    let found = !cch.for_each_lower_triangle_of_arc(cch_arc as EdgeId, |t| {
                        match (backward_map.get(t.mid_arc as usize), forward_map.get(t.bottom_arc as usize)) {
                            (Some(first), Some(second)) if backward[t.mid_arc as usize] + forward[t.bottom_arc as usize] == backward[cch_arc] => {
                                backward_side.shortcut_first_arc[ch_arc] = first as EdgeId;
                                backward_side.shortcut_second_arc[ch_arc] = second as EdgeId;
                                false
                            }
                            _ => true,
                        }
                    });
                    debug_assert!(found, "no kept lower triangle explains backward arc {}", cch_arc);
                }
            }
        }

        report!("num_forward_arcs", forward_side.num_arcs());
        report!("num_backward_arcs", backward_side.num_arcs());

        let ch = ContractionHierarchy {
            rank: cch.rank.clone(),
            order: cch.order.clone(),
            forward: forward_side,
            backward: backward_side,
        };
        debug_assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());
        ch
    }

    // Topology and weights of the kept arcs, unpacking information still to be filled in.
    fn kept_side(&self, map: &LocalIdMapper, weight: &[Weight]) -> Side {
        let cch = self.cch;
        let is_kept = |arc: usize| map.is_global_id_mapped(arc);
        let arc_count = map.local_id_count();

        Side {
            first_out: inverse_vector(&keep_if(is_kept, &cch.up_tail), cch.node_count()),
            head: keep_if(is_kept, &cch.up_head),
            weight: keep_if(is_kept, weight),
            is_shortcut_an_original_arc: BitVec::new(arc_count),
            shortcut_first_arc: vec![INVALID_ID; arc_count],
            shortcut_second_arc: vec![INVALID_ID; arc_count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::contraction_hierarchy::query::ContractionHierarchyQuery;

    #[test]
    fn dominated_arcs_are_dropped() {
        // triangle 0 - 1 - 2, the direct arc 0 -> 2 is longer than going through 1
        let tail = [0, 0, 1];
        let head = [1, 2, 2];
        let cch = CustomizableContractionHierarchy::new(&[0, 1, 2], &tail, &head, None, false).unwrap();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[1, 5, 1]);
        let ch = metric.build_contraction_hierarchy_using_perfect_witness_search();

        assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());
        assert_eq!(ch.forward.num_arcs(), 2);
        assert_eq!(ch.backward.num_arcs(), 0);
        // the metric keeps the customized weights
        assert_eq!(metric.forward()[1], 5);

        let mut query = ContractionHierarchyQuery::new(&ch);
        query.add_source(0, 0).add_target(2, 0).run();
        assert_eq!(query.get_distance(), 2);
        assert_eq!(query.get_arc_path(), vec![0, 2]);
        assert_eq!(query.get_node_path(), vec![0, 1, 2]);
    }

    #[test]
    fn shortcuts_reference_kept_arcs() {
        // path 1 -> 0 -> 2 with 0 eliminated first needs the shortcut 1 -> 2
        let cch = CustomizableContractionHierarchy::new(&[0, 1, 2], &[1, 0], &[0, 2], None, false).unwrap();
        let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[3, 4]);
        let ch = metric.build_contraction_hierarchy_using_perfect_witness_search();
        assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());

        let mut query = ContractionHierarchyQuery::new(&ch);
        query.add_source(1, 0).add_target(2, 0).run();
        assert_eq!(query.get_distance(), 7);
        assert_eq!(query.get_arc_path(), vec![0, 1]);
        assert_eq!(query.get_node_path(), vec![1, 0, 2]);
    }
}
