//! Parallel customization by levels.
//!
//! A node gets a level one higher than the maximum level of its lower neighbors.
//! The upper triangles of all arcs whose tails share a level only write arcs with tails on higher levels,
//! so one level can be processed concurrently. Concurrent writes to the same top arc
//! are resolved with a compare and swap minimum, which is correct in any interleaving.

use super::*;
use crate::report::benchmark::report_time_with_key;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Lower `value` to `candidate` unless it already is smaller.
fn atomic_min(value: &AtomicU32, candidate: Weight) {
    let mut current = value.load(Relaxed);
    while candidate < current {
        match value.compare_exchange_weak(current, candidate, Relaxed, Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Precomputed arc levels of a CCH, reusable for any number of customizations.
#[derive(Debug)]
pub struct CustomizableContractionHierarchyParallelization<'a> {
    cch: &'a CustomizableContractionHierarchy,
    arcs_ordered_by_level: Vec<EdgeId>,
    first_arc_of_level: Vec<u32>,
}

impl<'a> CustomizableContractionHierarchyParallelization<'a> {
    pub fn new(cch: &'a CustomizableContractionHierarchy) -> Self {
        let node_count = cch.node_count();

        // peel nodes without unleveled lower neighbors, like a topological sort in rounds
        let mut node_level = vec![0u32; node_count];
        let mut lock: Vec<usize> = (0..node_count as NodeId).map(|node| cch.down_range(node).len()).collect();
        let mut current_level: Vec<NodeId> = (0..node_count as NodeId).filter(|&node| lock[node as usize] == 0).collect();
        let mut next_level = Vec::new();
        let mut level_count = 0;

        while !current_level.is_empty() {
            for &x in &current_level {
                node_level[x as usize] = level_count;
                for xy in cch.up_range(x) {
                    let y = cch.up_head[xy] as usize;
                    lock[y] -= 1;
                    if lock[y] == 0 {
                        next_level.push(y as NodeId);
                    }
                }
            }
            level_count += 1;
            std::mem::swap(&mut current_level, &mut next_level);
            next_level.clear();
        }

        let nodes_by_level = compute_sort_permutation(node_count, |node| node_level[node]);
        let mut arcs_ordered_by_level = Vec::with_capacity(cch.cch_arc_count());
        let mut arc_level = Vec::with_capacity(cch.cch_arc_count());
        for &x in &nodes_by_level {
            for xy in cch.up_range(x) {
                arcs_ordered_by_level.push(xy as EdgeId);
                arc_level.push(node_level[x as usize]);
            }
        }

        CustomizableContractionHierarchyParallelization {
            cch,
            arcs_ordered_by_level,
            first_arc_of_level: inverse_vector(&arc_level, level_count as usize),
        }
    }

    pub fn level_count(&self) -> usize {
        self.first_arc_of_level.len() - 1
    }

    /// Customize on the current rayon pool.
    pub fn customize(&self, metric: &mut CustomizableContractionHierarchyMetric<'_>) {
        if rayon::current_num_threads() == 1 {
            metric.customize();
        } else {
            self.customize_by_levels(metric);
        }
    }

    /// Customize on a dedicated pool with `thread_count` threads.
    pub fn customize_with_threads(&self, metric: &mut CustomizableContractionHierarchyMetric<'_>, thread_count: usize) -> Result<()> {
        assert_ne!(thread_count, 0);
        if thread_count == 1 {
            metric.customize();
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new().num_threads(thread_count).build()?;
        pool.install(|| self.customize_by_levels(metric));
        Ok(())
    }

    fn customize_by_levels(&self, metric: &mut CustomizableContractionHierarchyMetric<'_>) {
        assert!(std::ptr::eq(self.cch, metric.cch), "metric belongs to a different CCH");
        let cch = self.cch;

        report_time_with_key("CCH parallel customization", "parallel_customization_running_time_ms", || {
            let (forward, backward): (Vec<AtomicU32>, Vec<AtomicU32>) = (0..cch.cch_arc_count() as EdgeId)
                .into_par_iter()
                .map(|arc| {
                    let (forward, backward) = metric.initial_weights(arc);
                    (AtomicU32::new(forward), AtomicU32::new(backward))
                })
                .unzip();

            // the end of every parallel loop is a barrier, the next level reads final weights
            for level in self.first_arc_of_level.windows(2) {
                self.arcs_ordered_by_level[level[0] as usize..level[1] as usize].par_iter().for_each(|&arc| {
                    cch.for_each_upper_triangle_of_arc(arc, |t| {
                        let (bottom, mid, top) = (t.bottom_arc as usize, t.mid_arc as usize, t.top_arc as usize);
                        atomic_min(&forward[top], backward[bottom].load(Relaxed) + forward[mid].load(Relaxed));
                        atomic_min(&backward[top], forward[bottom].load(Relaxed) + backward[mid].load(Relaxed));
                        true
                    });
                });
            }

            metric.forward = forward.into_iter().map(AtomicU32::into_inner).collect();
            metric.backward = backward.into_iter().map(AtomicU32::into_inner).collect();
        });

        debug_assert!(metric.is_triangle_inequality_satisfied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_min_only_decreases() {
        let value = AtomicU32::new(10);
        atomic_min(&value, 12);
        assert_eq!(value.load(Relaxed), 10);
        atomic_min(&value, 3);
        assert_eq!(value.load(Relaxed), 3);
    }

    #[test]
    fn levels_of_a_path() {
        // eliminating a path from one end gives a chain, every node its own level
        let cch = CustomizableContractionHierarchy::new(&[0, 1, 2, 3], &[0, 1, 2], &[1, 2, 3], None, false).unwrap();
        let parallelization = CustomizableContractionHierarchyParallelization::new(&cch);
        assert_eq!(parallelization.level_count(), 4);
        assert_eq!(parallelization.arcs_ordered_by_level, vec![0, 1, 2]);
        assert_eq!(parallelization.first_arc_of_level, vec![0, 1, 2, 3, 3]);

        // two leaves below a common parent share a level
        let cch = CustomizableContractionHierarchy::new(&[0, 1, 2], &[0, 1], &[2, 2], None, false).unwrap();
        let parallelization = CustomizableContractionHierarchyParallelization::new(&cch);
        assert_eq!(parallelization.level_count(), 2);
        assert_eq!(parallelization.arcs_ordered_by_level, vec![0, 1]);
        assert_eq!(parallelization.first_arc_of_level, vec![0, 2, 2]);
    }

    #[test]
    fn same_result_as_sequential_customization() {
        let tail = [0, 1, 2, 3, 4, 0, 2];
        let head = [1, 2, 3, 4, 0, 3, 4];
        let weight = [4, 1, 7, 2, 3, 9, 1];
        let cch = CustomizableContractionHierarchy::new(&[2, 0, 4, 1, 3], &tail, &head, None, false).unwrap();

        let mut sequential = CustomizableContractionHierarchyMetric::new(&cch, &weight);
        sequential.customize();

        let parallelization = CustomizableContractionHierarchyParallelization::new(&cch);
        for threads in [1, 2, 4] {
            let mut parallel = CustomizableContractionHierarchyMetric::new(&cch, &weight);
            parallelization.customize_with_threads(&mut parallel, threads).unwrap();
            assert_eq!(parallel.forward(), sequential.forward());
            assert_eq!(parallel.backward(), sequential.backward());
        }

        let mut parallel = CustomizableContractionHierarchyMetric::new(&cch, &weight);
        parallelization.customize(&mut parallel);
        assert_eq!(parallel.forward(), sequential.forward());
    }
}
