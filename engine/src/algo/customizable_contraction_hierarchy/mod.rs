//! Customizable Contraction Hierarchies.
//!
//! Preprocessing is split into a metric independent phase, which only needs an elimination order
//! (for example from nested dissection) and the unweighted graph, and a fast customization phase
//! which computes weights for the fixed topology. Changing weights only requires a new customization.
//!
//! Internally node ids coincide with ranks. Arcs of the chordal supergraph (CCH arcs) are stored once,
//! in upward direction sorted by tail and head, and carry a forward and a backward weight in the metric.

use crate::{
    algo::{LogCallback, ProgressLog},
    datastr::{
        graph::*,
        rank_select_map::{BitVec, LocalIdMapper},
    },
    report::{benchmark::report_time_with_key, push_context},
    util::*,
    Result,
};
use std::ops::Range;

mod contraction;
pub mod customization;
pub mod query;
pub mod triangles;

use self::contraction::{compute_chordal_supergraph, ChordalSupergraph};
pub use self::customization::{
    parallelization::CustomizableContractionHierarchyParallelization, partial::CustomizableContractionHierarchyPartialCustomization,
    CustomizableContractionHierarchyMetric,
};
pub use self::query::CustomizableContractionHierarchyQuery;
use self::triangles::for_each_upper_triangle;

/// Which input arcs induce the initial weights of a CCH arc.
///
/// Most CCH arcs have no input arc, so the primary input arc per direction is only stored
/// for arcs that have one, addressed through a `LocalIdMapper`.
/// The rare additional input arcs (parallel arcs in the input, or an arc and its reverse for forward and backward)
/// live in a second, even sparser adjacency array.
#[derive(Debug, Clone)]
struct InputArcsOfCchArc {
    has_input_arc: LocalIdMapper,
    forward_input_arc: Vec<EdgeId>,
    backward_input_arc: Vec<EdgeId>,
    has_extra_input_arc: LocalIdMapper,
    first_extra_forward_input_arc: Vec<u32>,
    extra_forward_input_arc: Vec<EdgeId>,
    first_extra_backward_input_arc: Vec<u32>,
    extra_backward_input_arc: Vec<EdgeId>,
}

impl InputArcsOfCchArc {
    fn new(cch_arc_count: usize, input_arc_to_cch_arc: &[EdgeId], is_input_arc_upward: &BitVec) -> InputArcsOfCchArc {
        let mut has_input_arc = BitVec::new(cch_arc_count);
        for &cch_arc in input_arc_to_cch_arc {
            if cch_arc != INVALID_ID {
                has_input_arc.set(cch_arc as usize);
            }
        }
        let has_input_arc = LocalIdMapper::new(has_input_arc);

        let mut forward_input_arc = vec![INVALID_ID; has_input_arc.local_id_count()];
        let mut backward_input_arc = vec![INVALID_ID; has_input_arc.local_id_count()];
        let mut has_extra_input_arc = BitVec::new(cch_arc_count);
        // (cch arc, input arc) pairs
        let mut extra_forward = Vec::new();
        let mut extra_backward = Vec::new();

        for (input_arc, &cch_arc) in input_arc_to_cch_arc.iter().enumerate() {
            if cch_arc == INVALID_ID {
                continue;
            }
            let local = has_input_arc.to_local(cch_arc as usize);
            let (primary, extra) = if is_input_arc_upward.get(input_arc) {
                (&mut forward_input_arc[local], &mut extra_forward)
            } else {
                (&mut backward_input_arc[local], &mut extra_backward)
            };
            if *primary == INVALID_ID {
                *primary = input_arc as EdgeId;
            } else {
                has_extra_input_arc.set(cch_arc as usize);
                extra.push((cch_arc, input_arc as EdgeId));
            }
        }

        let has_extra_input_arc = LocalIdMapper::new(has_extra_input_arc);
        let extra_count = has_extra_input_arc.local_id_count();
        let into_adjacency_array = |mut pairs: Vec<(EdgeId, EdgeId)>| {
            // stable, so extra input arcs keep their input order
            pairs.sort_by_key(|&(cch_arc, _)| cch_arc);
            let locals: Vec<u32> = pairs.iter().map(|&(cch_arc, _)| has_extra_input_arc.to_local(cch_arc as usize) as u32).collect();
            (inverse_vector(&locals, extra_count), pairs.into_iter().map(|(_, input_arc)| input_arc).collect())
        };
        let (first_extra_forward_input_arc, extra_forward_input_arc) = into_adjacency_array(extra_forward);
        let (first_extra_backward_input_arc, extra_backward_input_arc) = into_adjacency_array(extra_backward);

        InputArcsOfCchArc {
            has_input_arc,
            forward_input_arc,
            backward_input_arc,
            has_extra_input_arc,
            first_extra_forward_input_arc,
            extra_forward_input_arc,
            first_extra_backward_input_arc,
            extra_backward_input_arc,
        }
    }

    fn input_arcs(&self, cch_arc: EdgeId, forward: bool) -> impl Iterator<Item = EdgeId> + '_ {
        let (primary, first_extra, extra) = if forward {
            (&self.forward_input_arc, &self.first_extra_forward_input_arc, &self.extra_forward_input_arc)
        } else {
            (&self.backward_input_arc, &self.first_extra_backward_input_arc, &self.extra_backward_input_arc)
        };

        let primary = self
            .has_input_arc
            .get(cch_arc as usize)
            .map(|local| primary[local])
            .filter(|&input_arc| input_arc != INVALID_ID);
        let extra_arcs: &[EdgeId] = match self.has_extra_input_arc.get(cch_arc as usize) {
            Some(local) => &extra[first_extra[local] as usize..first_extra[local + 1] as usize],
            None => &[],
        };

        primary.into_iter().chain(extra_arcs.iter().copied())
    }
}

/// The metric independent part of a CCH: the chordal supergraph of the input for a fixed order,
/// its elimination tree and the mapping between input arcs and CCH arcs.
/// Immutable once built, any number of metrics may share it.
#[derive(Debug, Clone)]
pub struct CustomizableContractionHierarchy {
    order: Vec<NodeId>,
    rank: Vec<NodeId>,
    elimination_tree_parent: Vec<NodeId>,

    up_first_out: Vec<EdgeId>,
    up_head: Vec<NodeId>,
    up_tail: Vec<NodeId>,

    down_first_out: Vec<EdgeId>,
    down_head: Vec<NodeId>,
    down_to_up: Vec<EdgeId>,

    input_arc_to_cch_arc: Vec<EdgeId>,
    is_input_arc_upward: BitVec,
    input_arcs_of_cch_arc: InputArcsOfCchArc,
}

impl CustomizableContractionHierarchy {
    /// Build the topology for the elimination `order` (`order[0]` is eliminated first).
    ///
    /// Arc directions, loops and multi arcs do not matter for the topology.
    /// With `filter_always_inf_arcs`, CCH arcs which can never get a finite weight in any metric are removed.
    /// This pays off on graphs with many one way streets.
    pub fn new(order: &[NodeId], tail: &[NodeId], head: &[NodeId], log: LogCallback, filter_always_inf_arcs: bool) -> Result<Self> {
        assert!(is_permutation(order), "order must be a permutation");
        assert_eq!(tail.len(), head.len());
        let node_count = order.len();
        assert!(tail.iter().chain(head).all(|&node| (node as usize) < node_count), "node id out of bounds");

        let _cch_ctxt = push_context("customizable_contraction_hierarchy".to_string());
        let mut log = ProgressLog::new(log);
        log.message("Building CCH.");
        log.message(&format!("Input graph has {} nodes and {} arcs.", node_count, tail.len()));
        report!("num_nodes", node_count);
        report!("num_input_arcs", tail.len());

        let order = order.to_vec();
        let rank = invert_permutation(&order);
        let ranked_tail: Vec<NodeId> = tail.iter().map(|&node| rank[node as usize]).collect();
        let ranked_head: Vec<NodeId> = head.iter().map(|&node| rank[node as usize]).collect();

        log.message("Start building chordal supergraph.");
        let ChordalSupergraph {
            first_out: mut up_first_out,
            head: mut up_head,
            max_upward_degree,
        } = report_time_with_key("chordal supergraph", "chordal_supergraph_running_time_ms", || {
            compute_chordal_supergraph(node_count, &ranked_tail, &ranked_head)
        })?;
        log.message("Finished building chordal supergraph.");
        log.message(&format!("Chordal supergraph contains {} arcs.", up_head.len()));
        log.message(&format!("The treewidth of the input graph is bounded by {}.", max_upward_degree));
        report!("num_cch_arcs", up_head.len());
        report!("max_upward_degree", max_upward_degree);

        let mut input_arc_to_cch_arc = Vec::with_capacity(tail.len());
        let mut is_input_arc_upward = BitVec::new(tail.len());
        for (input_arc, (&x, &y)) in ranked_tail.iter().zip(&ranked_head).enumerate() {
            let cch_arc = if x < y {
                is_input_arc_upward.set(input_arc);
                find_arc_given_sorted_head(&up_first_out, &up_head, x, y)
            } else if x > y {
                find_arc_given_sorted_head(&up_first_out, &up_head, y, x)
            } else {
                INVALID_ID
            };
            debug_assert!(x == y || cch_arc != INVALID_ID);
            input_arc_to_cch_arc.push(cch_arc);
        }

        let elimination_tree_parent: Vec<NodeId> = (0..node_count)
            .map(|node| {
                if up_first_out[node] != up_first_out[node + 1] {
                    up_head[up_first_out[node] as usize]
                } else {
                    INVALID_ID
                }
            })
            .collect();
        report_search_space_statistics(&elimination_tree_parent, &up_first_out, &mut log);

        if filter_always_inf_arcs {
            log.message("Start filtering upward arcs.");
            let before = up_head.len();
            report_time_with_key("filter always infinity arcs", "filter_running_time_ms", || {
                filter_always_infinity_arcs(&mut up_first_out, &mut up_head, &mut input_arc_to_cch_arc, &is_input_arc_upward)
            });
            log.message("Finished filtering upward arcs.");
            log.message(&format!("The number of arcs decreased from {} to {}.", before, up_head.len()));
            report!("num_filtered_cch_arcs", up_head.len());
        } else {
            log.message("Not filtering upward arcs.");
        }

        let up_tail = invert_inverse_vector(&up_first_out);
        let cch_arc_count = up_head.len();

        let down_to_up = compute_sort_permutation(cch_arc_count, |arc| (up_head[arc], up_tail[arc]));
        let down_head = apply_permutation(&down_to_up, &up_tail);
        let down_first_out = inverse_vector(&apply_permutation(&down_to_up, &up_head), node_count);

        let input_arcs_of_cch_arc = InputArcsOfCchArc::new(cch_arc_count, &input_arc_to_cch_arc, &is_input_arc_upward);
        log.message(&format!("{} CCH arcs have an input arc.", input_arcs_of_cch_arc.has_input_arc.local_id_count()));
        log.message(&format!(
            "{} CCH arcs have two or more input arcs.",
            input_arcs_of_cch_arc.has_extra_input_arc.local_id_count()
        ));
        log.message("CCH is fully constructed.");

        Ok(CustomizableContractionHierarchy {
            order,
            rank,
            elimination_tree_parent,
            up_first_out,
            up_head,
            up_tail,
            down_first_out,
            down_head,
            down_to_up,
            input_arc_to_cch_arc,
            is_input_arc_upward,
            input_arcs_of_cch_arc,
        })
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn input_arc_count(&self) -> usize {
        self.input_arc_to_cch_arc.len()
    }

    pub fn cch_arc_count(&self) -> usize {
        self.up_head.len()
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn rank(&self) -> &[NodeId] {
        &self.rank
    }

    /// Parent of every node in the elimination tree, `INVALID_ID` for roots.
    pub fn elimination_tree_parent(&self) -> &[NodeId] {
        &self.elimination_tree_parent
    }

    pub fn up_first_out(&self) -> &[EdgeId] {
        &self.up_first_out
    }

    pub fn up_head(&self) -> &[NodeId] {
        &self.up_head
    }

    pub fn up_tail(&self) -> &[NodeId] {
        &self.up_tail
    }

    /// The CCH arc an input arc was mapped to, `INVALID_ID` for loops and filtered arcs.
    pub fn input_arc_to_cch_arc(&self, input_arc: EdgeId) -> EdgeId {
        self.input_arc_to_cch_arc[input_arc as usize]
    }

    /// Does the input arc point from lower to higher rank? Then it contributes to the forward weight.
    pub fn is_input_arc_upward(&self, input_arc: EdgeId) -> bool {
        self.is_input_arc_upward.get(input_arc as usize)
    }

    /// Input arcs contributing to the forward (or backward) weight of a CCH arc.
    pub fn input_arcs_of_cch_arc(&self, cch_arc: EdgeId, forward: bool) -> impl Iterator<Item = EdgeId> + '_ {
        self.input_arcs_of_cch_arc.input_arcs(cch_arc, forward)
    }

    #[inline]
    fn up_range(&self, node: NodeId) -> Range<usize> {
        self.up_first_out[node as usize] as usize..self.up_first_out[node as usize + 1] as usize
    }

    #[inline]
    fn down_range(&self, node: NodeId) -> Range<usize> {
        self.down_first_out[node as usize] as usize..self.down_first_out[node as usize + 1] as usize
    }
}

fn report_search_space_statistics(elimination_tree_parent: &[NodeId], up_first_out: &[EdgeId], log: &mut ProgressLog) {
    let node_count = elimination_tree_parent.len();
    if node_count == 0 {
        return;
    }

    let mut nodes_in_search_space = vec![0u64; node_count];
    let mut arcs_in_search_space = vec![0u64; node_count];
    // parents have higher ids, so a reverse sweep sees them first
    for node in (0..node_count).rev() {
        let parent = elimination_tree_parent[node];
        if parent != INVALID_ID {
            nodes_in_search_space[node] = 1 + nodes_in_search_space[parent as usize];
            arcs_in_search_space[node] = u64::from(up_first_out[node + 1] - up_first_out[node]) + arcs_in_search_space[parent as usize];
        } else {
            nodes_in_search_space[node] = 1;
        }
    }

    let average = |values: &[u64]| values.iter().sum::<u64>() / node_count as u64;
    let maximum = |values: &[u64]| values.iter().copied().max().unwrap_or(0);

    report!("avg_search_space_nodes", average(&nodes_in_search_space));
    report!("max_search_space_nodes", maximum(&nodes_in_search_space));
    report!("avg_search_space_arcs", average(&arcs_in_search_space));
    report!("max_search_space_arcs", maximum(&arcs_in_search_space));

    log.message(&format!("The average number of nodes in a search space is {}.", average(&nodes_in_search_space)));
    log.message(&format!("The maximum number of nodes in a search space is {}.", maximum(&nodes_in_search_space)));
    log.message(&format!("The average number of arcs in a search space is {}.", average(&arcs_in_search_space)));
    log.message(&format!("The maximum number of arcs in a search space is {}.", maximum(&arcs_in_search_space)));
}

// An arc can only get a finite forward weight if an input arc induces it
// or if it is the top arc of a lower triangle whose bottom and mid arcs can be finite in the matching directions.
// Arcs which can be finite in neither direction are removed.
fn filter_always_infinity_arcs(
    up_first_out: &mut Vec<EdgeId>,
    up_head: &mut Vec<NodeId>,
    input_arc_to_cch_arc: &mut [EdgeId],
    is_input_arc_upward: &BitVec,
) {
    let cch_arc_count = up_head.len();
    let mut can_forward_be_finite = BitVec::new(cch_arc_count);
    let mut can_backward_be_finite = BitVec::new(cch_arc_count);

    for (input_arc, &cch_arc) in input_arc_to_cch_arc.iter().enumerate() {
        if cch_arc != INVALID_ID {
            if is_input_arc_upward.get(input_arc) {
                can_forward_be_finite.set(cch_arc as usize);
            } else {
                can_backward_be_finite.set(cch_arc as usize);
            }
        }
    }

    // bottom and mid arcs have smaller tails than the top arc, so one sweep in arc order sees them final
    for x in 0..up_first_out.len() - 1 {
        for xy in up_first_out[x]..up_first_out[x + 1] {
            for_each_upper_triangle(&up_first_out[..], &up_head[..], x as NodeId, xy, |triangle| {
                let (bottom, mid, top) = (triangle.bottom_arc as usize, triangle.mid_arc as usize, triangle.top_arc as usize);
                if can_backward_be_finite.get(bottom) && can_forward_be_finite.get(mid) {
                    can_forward_be_finite.set(top);
                }
                if can_forward_be_finite.get(bottom) && can_backward_be_finite.get(mid) {
                    can_backward_be_finite.set(top);
                }
                true
            });
        }
    }

    let mut keep = BitVec::new(cch_arc_count);
    for arc in 0..cch_arc_count {
        if can_forward_be_finite.get(arc) || can_backward_be_finite.get(arc) {
            keep.set(arc);
        }
    }

    let up_tail = invert_inverse_vector(&up_first_out[..]);
    *up_head = keep_if(|arc| keep.get(arc), &up_head[..]);
    *up_first_out = inverse_vector(&keep_if(|arc| keep.get(arc), &up_tail), up_first_out.len() - 1);

    let map = LocalIdMapper::new(keep);
    for cch_arc in input_arc_to_cch_arc.iter_mut() {
        if *cch_arc != INVALID_ID {
            *cch_arc = map.to_local(*cch_arc as usize) as EdgeId;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_of_a_cycle() {
        // 0 -> 1 -> 2 -> 3 -> 0, eliminating 0 first connects 1 and 3
        let cch = CustomizableContractionHierarchy::new(&[0, 1, 2, 3], &[0, 1, 2, 3], &[1, 2, 3, 0], None, false).unwrap();
        assert_eq!(cch.node_count(), 4);
        assert_eq!(cch.input_arc_count(), 4);
        assert_eq!(cch.up_first_out(), &[0, 2, 4, 5, 5]);
        assert_eq!(cch.up_head(), &[1, 3, 2, 3, 3]);
        assert_eq!(cch.up_tail(), &[0, 0, 1, 1, 2]);
        assert_eq!(cch.elimination_tree_parent(), &[1, 2, 3, INVALID_ID]);

        assert_eq!(cch.input_arc_to_cch_arc(0), 0);
        assert_eq!(cch.input_arc_to_cch_arc(3), 1);
        assert!(cch.is_input_arc_upward(2));
        assert!(!cch.is_input_arc_upward(3));
        assert_eq!(cch.input_arcs_of_cch_arc(1, false).collect::<Vec<_>>(), vec![3]);
        assert_eq!(cch.input_arcs_of_cch_arc(1, true).count(), 0);
        // the fill in arc 1 -> 3 has no input arc
        assert_eq!(cch.input_arcs_of_cch_arc(3, true).count(), 0);
    }

    #[test]
    fn parallel_and_reverse_input_arcs_share_a_cch_arc() {
        let cch = CustomizableContractionHierarchy::new(&[1, 0], &[0, 0, 1, 1], &[1, 1, 0, 1], None, false).unwrap();
        assert_eq!(cch.cch_arc_count(), 1);
        // input node 1 has rank 0, so 1 -> 0 points up
        assert_eq!(cch.input_arcs_of_cch_arc(0, true).collect::<Vec<_>>(), vec![2]);
        assert_eq!(cch.input_arcs_of_cch_arc(0, false).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(cch.input_arc_to_cch_arc(3), INVALID_ID);
    }

    #[test]
    fn filtering_removes_arcs_which_are_always_infinite() {
        // 1 -> 0 <- 2 with 0 eliminated first: no path between 1 and 2 exists, so the fill in arc is useless
        let unfiltered = CustomizableContractionHierarchy::new(&[0, 1, 2], &[1, 2], &[0, 0], None, false).unwrap();
        assert_eq!(unfiltered.cch_arc_count(), 3);

        let filtered = CustomizableContractionHierarchy::new(&[0, 1, 2], &[1, 2], &[0, 0], None, true).unwrap();
        assert_eq!(filtered.cch_arc_count(), 2);
        assert_eq!(filtered.up_head(), &[1, 2]);
        assert_eq!(filtered.input_arc_to_cch_arc(0), 0);
        assert_eq!(filtered.input_arc_to_cch_arc(1), 1);
    }

    #[test]
    fn empty_graph() {
        let cch = CustomizableContractionHierarchy::new(&[2, 0, 1], &[], &[], None, true).unwrap();
        assert_eq!(cch.cch_arc_count(), 0);
        assert_eq!(cch.elimination_tree_parent(), &[INVALID_ID; 3]);
    }

    #[test]
    fn progress_messages_are_emitted() {
        let mut messages = Vec::new();
        let mut collect = |message: &str| messages.push(message.to_string());
        CustomizableContractionHierarchy::new(&[0, 1, 2], &[0, 1], &[1, 2], Some(&mut collect), false).unwrap();
        assert!(messages.iter().any(|message| message == "CCH is fully constructed."));
    }
}
