//! Contraction Hierarchies.
//!
//! Nodes are contracted one after another by increasing importance, shortcuts preserve distances among the remaining nodes.
//! The result are two upward graphs (forward and backward) in which every shortest path can be found
//! by a bidirectional search which only ever goes up.
//! Internally node ids coincide with ranks, `rank` and `order` translate from and to input node ids.

use crate::{
    algo::{LogCallback, ProgressLog},
    datastr::{
        graph::*,
        index_heap::{IndexdMinHeap, State},
        rank_select_map::BitVec,
    },
    report::{benchmark::report_time_with_key, push_context},
    util::*,
    Result,
};
use std::ops::Range;

pub mod contraction;
pub mod extra_weight;
pub mod query;
mod serialization;
mod validation;
pub mod witness_search;

use self::contraction::{contract_by_importance, contract_in_order, ContractedArcs, ContractionGraph};
pub use self::validation::check_contraction_hierarchy_for_errors;

/// Number of settled nodes after which a witness search gives up.
pub const DEFAULT_MAX_POP_COUNT: usize = 500;

/// One of the two upward graphs of a `ContractionHierarchy`.
///
/// For every arc the shortcut information has one of two meanings:
/// - if `is_shortcut_an_original_arc` is set, `shortcut_first_arc` is the id of the input arc and `shortcut_second_arc` its input head node.
/// - otherwise the arc is the concatenation of a backward arc (`shortcut_first_arc`) and a forward arc (`shortcut_second_arc`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub first_out: Vec<EdgeId>,
    pub head: Vec<NodeId>,
    pub weight: Vec<Weight>,
    pub is_shortcut_an_original_arc: BitVec,
    pub shortcut_first_arc: Vec<EdgeId>,
    pub shortcut_second_arc: Vec<u32>,
}

impl Side {
    pub fn num_arcs(&self) -> usize {
        self.head.len()
    }

    /// Range of the ids of the arcs leaving `node`.
    #[inline]
    pub fn arc_range(&self, node: NodeId) -> Range<usize> {
        self.first_out[node as usize] as usize..self.first_out[node as usize + 1] as usize
    }

    fn num_shortcuts(&self) -> usize {
        self.num_arcs() - self.is_shortcut_an_original_arc.count_ones()
    }
}

/// The preprocessed hierarchy. Immutable once built, share it by reference among any number of queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionHierarchy {
    pub rank: Vec<NodeId>,
    pub order: Vec<NodeId>,
    pub forward: Side,
    pub backward: Side,
}

// Input arcs sorted by tail and head with loops, infinite arcs and all but the shortest of parallel arcs removed.
struct InputArcs {
    tail: Vec<NodeId>,
    head: Vec<NodeId>,
    weight: Vec<Weight>,
    input_arc_id: Vec<EdgeId>,
}

impl InputArcs {
    fn new(tail: &[NodeId], head: &[NodeId], weight: &[Weight]) -> InputArcs {
        let permutation = compute_sort_permutation(tail.len(), |arc| (tail[arc], head[arc]));
        let mut arcs = InputArcs {
            tail: Vec::with_capacity(tail.len()),
            head: Vec::with_capacity(tail.len()),
            weight: Vec::with_capacity(tail.len()),
            input_arc_id: Vec::with_capacity(tail.len()),
        };

        for arc in permutation {
            let (x, y, w) = (tail[arc as usize], head[arc as usize], weight[arc as usize]);
            if x == y || w >= INFINITY {
                continue;
            }
            if arcs.tail.last() == Some(&x) && arcs.head.last() == Some(&y) {
                let last = arcs.weight.len() - 1;
                if w < arcs.weight[last] {
                    arcs.weight[last] = w;
                    arcs.input_arc_id[last] = arc;
                }
            } else {
                arcs.tail.push(x);
                arcs.head.push(y);
                arcs.weight.push(w);
                arcs.input_arc_id.push(arc);
            }
        }

        arcs
    }
}

impl ContractionHierarchy {
    pub fn node_count(&self) -> usize {
        self.rank.len()
    }

    /// Build a hierarchy and pick the contraction order on the way.
    ///
    /// The input may contain loops and parallel arcs.
    /// `max_pop_count` bounds each witness search, see `DEFAULT_MAX_POP_COUNT`.
    pub fn build(
        node_count: usize,
        tail: &[NodeId],
        head: &[NodeId],
        weight: &[Weight],
        log: LogCallback,
        max_pop_count: usize,
    ) -> Result<ContractionHierarchy> {
        Self::build_impl(node_count, None, tail, head, weight, log, max_pop_count)
    }

    /// Build a hierarchy contracting the nodes by increasing `rank`.
    /// The rank is kept as is.
    pub fn build_given_rank(
        rank: &[NodeId],
        tail: &[NodeId],
        head: &[NodeId],
        weight: &[Weight],
        log: LogCallback,
        max_pop_count: usize,
    ) -> Result<ContractionHierarchy> {
        assert!(is_permutation(rank), "rank must be a permutation");
        Self::build_impl(rank.len(), Some(invert_permutation(rank)), tail, head, weight, log, max_pop_count)
    }

    /// Build a hierarchy contracting `order[0]` first and `order[n-1]` last.
    pub fn build_given_order(
        order: &[NodeId],
        tail: &[NodeId],
        head: &[NodeId],
        weight: &[Weight],
        log: LogCallback,
        max_pop_count: usize,
    ) -> Result<ContractionHierarchy> {
        assert!(is_permutation(order), "order must be a permutation");
        Self::build_given_rank(&invert_permutation(order), tail, head, weight, log, max_pop_count)
    }

    fn build_impl(
        node_count: usize,
        given_order: Option<Vec<NodeId>>,
        tail: &[NodeId],
        head: &[NodeId],
        weight: &[Weight],
        log: LogCallback,
        max_pop_count: usize,
    ) -> Result<ContractionHierarchy> {
        assert_eq!(tail.len(), head.len());
        assert_eq!(tail.len(), weight.len());
        assert!(tail.iter().chain(head).all(|&node| (node as usize) < node_count), "node id out of bounds");

        let _ch_ctxt = push_context("contraction_hierarchy".to_string());
        let mut log = ProgressLog::new(log);
        log_input_graph_statistics(node_count, tail, head, &mut log);
        report!("num_nodes", node_count);
        report!("num_input_arcs", tail.len());
        report!("max_pop_count", max_pop_count);

        log.message("Start removing loops and multi arcs from input.");
        let input = InputArcs::new(tail, head, weight);
        log.message("Finished removing loops and multi arcs from input.");

        let mut graph = ContractionGraph::new(node_count, &input.tail, &input.head, &input.weight);

        let (order, mut forward, mut backward) = report_time_with_key("contraction", "contraction_running_time_ms", || -> Result<_> {
            match given_order {
                Some(order) => {
                    let (forward, backward) = contract_in_order(&mut graph, &order, max_pop_count, &mut log)?;
                    Ok((order, forward, backward))
                }
                None => {
                    let (order, mut forward, mut backward) = contract_by_importance(&mut graph, max_pop_count, &mut log)?;
                    let order = report_time_with_key("cache reordering", "cache_reordering_running_time_ms", || {
                        optimize_order_for_cache(&order, &mut forward, &mut backward, &mut log)
                    });
                    Ok((order, forward, backward))
                }
            }
        })?;
        drop(graph);

        log.message("Start reordering nodes by rank.");
        let rank = invert_permutation(&order);
        forward.rename_nodes(&rank);
        backward.rename_nodes(&rank);
        debug_assert!(forward.tail.iter().zip(&forward.head).all(|(tail, head)| tail < head));
        debug_assert!(backward.tail.iter().zip(&backward.head).all(|(tail, head)| tail < head));
        let forward_first_out = forward.sort_and_build_first_out(node_count);
        let backward_first_out = backward.sort_and_build_first_out(node_count);
        log.message("Finished reordering nodes by rank.");

        let ch = report_time_with_key("unpacking information", "unpacking_information_running_time_ms", || {
            build_unpacking_information(&input, rank, order, forward, forward_first_out, backward, backward_first_out, &mut log)
        });

        report!("num_forward_arcs", ch.forward.num_arcs());
        report!("num_backward_arcs", ch.backward.num_arcs());
        report!("num_forward_shortcuts", ch.forward.num_shortcuts());
        report!("num_backward_shortcuts", ch.backward.num_shortcuts());
        log.message(&format!("CH has {} forward arcs.", ch.forward.num_arcs()));
        log.message(&format!("CH has {} backward arcs.", ch.backward.num_arcs()));
        debug_assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());

        Ok(ch)
    }
}

fn log_input_graph_statistics(node_count: usize, tail: &[NodeId], head: &[NodeId], log: &mut ProgressLog) {
    if !log.is_enabled() {
        return;
    }
    log.message(&format!("Input graph has {} nodes and {} arcs.", node_count, tail.len()));
    let max_degree = |nodes: &[NodeId]| {
        let mut degree = vec![0u32; node_count];
        for &node in nodes {
            degree[node as usize] += 1;
        }
        degree.into_iter().max().unwrap_or(0)
    };
    log.message(&format!(
        "The input's maximum in-degree is {} and its maximum out-degree is {}.",
        max_degree(head),
        max_degree(tail)
    ));
}

// Renumbers the nodes such that the upward search spaces of bottom level nodes are placed close to each other.
// Works on input node ids and returns the new order.
fn optimize_order_for_cache(order: &[NodeId], forward: &mut ContractedArcs, backward: &mut ContractedArcs, log: &mut ProgressLog) -> Vec<NodeId> {
    log.message("Start optimizing order for cache.");
    let node_count = order.len();
    let rank = invert_permutation(order);
    let forward_first_out = forward.sort_and_build_first_out(node_count);
    let backward_first_out = backward.sort_and_build_first_out(node_count);

    let mut is_in_bottom_level = vec![true; node_count];
    for &head in forward.head.iter().chain(&backward.head) {
        is_in_bottom_level[head as usize] = false;
    }

    let mut new_order = vec![0; node_count];
    let mut new_order_end = node_count;
    let mut is_in_new_order = vec![false; node_count];
    let mut queue = IndexdMinHeap::new(node_count);

    for root in 0..node_count {
        if !is_in_bottom_level[root] {
            continue;
        }
        let search_space_end = new_order_end;
        queue.push(State { key: rank[root], id: root as NodeId });
        is_in_new_order[root] = true;

        while let Some(State { id: node, .. }) = queue.pop() {
            new_order_end -= 1;
            new_order[new_order_end] = node;

            let forward_heads = &forward.head[forward_first_out[node as usize] as usize..forward_first_out[node as usize + 1] as usize];
            let backward_heads = &backward.head[backward_first_out[node as usize] as usize..backward_first_out[node as usize + 1] as usize];
            for &next in forward_heads.iter().chain(backward_heads) {
                if !is_in_new_order[next as usize] {
                    is_in_new_order[next as usize] = true;
                    queue.push(State { key: rank[next as usize], id: next });
                }
            }
        }
        new_order[new_order_end..search_space_end].reverse();
    }

    debug_assert_eq!(new_order_end, 0);
    debug_assert!(is_permutation(&new_order));
    log.message("Finished optimizing order for cache.");
    new_order
}

fn build_unpacking_information(
    input: &InputArcs,
    rank: Vec<NodeId>,
    order: Vec<NodeId>,
    forward: ContractedArcs,
    forward_first_out: Vec<EdgeId>,
    backward: ContractedArcs,
    backward_first_out: Vec<EdgeId>,
    log: &mut ProgressLog,
) -> ContractionHierarchy {
    log.message("Start building path unpacking information.");
    let input_first_out = inverse_vector(&input.tail, rank.len());

    let input_arc = |from: NodeId, to: NodeId| {
        let arc = find_arc_given_sorted_head(&input_first_out, &input.head, order[from as usize], order[to as usize]);
        debug_assert_ne!(arc, INVALID_ID);
        (input.input_arc_id[arc as usize], input.head[arc as usize])
    };

    let mut forward_is_original = BitVec::new(forward.len());
    let mut forward_first_arc = Vec::with_capacity(forward.len());
    let mut forward_second_arc = Vec::with_capacity(forward.len());
    for arc in 0..forward.len() {
        let (x, y, z) = (forward.tail[arc], forward.head[arc], forward.mid_node[arc]);
        let (first, second) = if z == INVALID_ID {
            forward_is_original.set(arc);
            input_arc(x, y)
        } else {
            (
                find_arc_given_sorted_head(&backward_first_out, &backward.head, z, x),
                find_arc_given_sorted_head(&forward_first_out, &forward.head, z, y),
            )
        };
        forward_first_arc.push(first);
        forward_second_arc.push(second);
    }

    let mut backward_is_original = BitVec::new(backward.len());
    let mut backward_first_arc = Vec::with_capacity(backward.len());
    let mut backward_second_arc = Vec::with_capacity(backward.len());
    for arc in 0..backward.len() {
        let (x, y, z) = (backward.tail[arc], backward.head[arc], backward.mid_node[arc]);
        let (first, second) = if z == INVALID_ID {
            backward_is_original.set(arc);
            input_arc(y, x)
        } else {
            (
                find_arc_given_sorted_head(&backward_first_out, &backward.head, z, y),
                find_arc_given_sorted_head(&forward_first_out, &forward.head, z, x),
            )
        };
        backward_first_arc.push(first);
        backward_second_arc.push(second);
    }

    log.message("Finished building path unpacking information.");
    log.message("Contraction Hierarchy is fully constructed.");

    ContractionHierarchy {
        rank,
        order,
        forward: Side {
            first_out: forward_first_out,
            head: forward.head,
            weight: forward.weight,
            is_shortcut_an_original_arc: forward_is_original,
            shortcut_first_arc: forward_first_arc,
            shortcut_second_arc: forward_second_arc,
        },
        backward: Side {
            first_out: backward_first_out,
            head: backward.head,
            weight: backward.weight,
            is_shortcut_an_original_arc: backward_is_original,
            shortcut_first_arc: backward_first_arc,
            shortcut_second_arc: backward_second_arc,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_arcs_drop_loops_and_keep_shortest_parallel_arc() {
        let arcs = InputArcs::new(&[1, 0, 0, 2, 0], &[1, 1, 1, 0, 1], &[5, 7, 3, 1, 3]);
        assert_eq!(arcs.tail, vec![0, 2]);
        assert_eq!(arcs.head, vec![1, 0]);
        assert_eq!(arcs.weight, vec![3, 1]);
        assert_eq!(arcs.input_arc_id, vec![2, 3]);

        let arcs = InputArcs::new(&[0, 0, 1, 1], &[1, 1, 2, 0], &[INFINITY, 4, u32::MAX, 2]);
        assert_eq!(arcs.tail, vec![0, 1]);
        assert_eq!(arcs.head, vec![1, 0]);
        assert_eq!(arcs.weight, vec![4, 2]);
        assert_eq!(arcs.input_arc_id, vec![1, 3]);
    }

    #[test]
    fn infinite_arcs_are_no_paths() {
        // 0 -> 1 -> 2 where 1 -> 2 is infinite, 0 -> 2 stays unreachable
        let ch = ContractionHierarchy::build_given_order(&[1, 0, 2], &[0, 1], &[1, 2], &[INFINITY - 1, INFINITY], None, DEFAULT_MAX_POP_COUNT).unwrap();
        assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());
        assert_eq!(ch.forward.num_arcs() + ch.backward.num_arcs(), 1);
        assert!(ch.forward.weight.iter().chain(&ch.backward.weight).all(|&weight| weight < INFINITY));
    }

    #[test]
    fn path_graph_in_given_order() {
        // 0 -> 1 -> 2, contracting the middle first creates one shortcut
        let ch = ContractionHierarchy::build_given_order(&[1, 0, 2], &[0, 1], &[1, 2], &[3, 4], None, DEFAULT_MAX_POP_COUNT).unwrap();
        assert_eq!(ch.order, vec![1, 0, 2]);
        assert_eq!(ch.rank, vec![1, 0, 2]);
        assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());

        // internal ids: 0 is input node 1, 1 is input node 0, 2 is input node 2
        assert_eq!(ch.forward.first_out, vec![0, 1, 2, 2]);
        assert_eq!(ch.forward.head, vec![2, 2]);
        assert_eq!(ch.forward.weight, vec![4, 7]);
        assert!(ch.forward.is_shortcut_an_original_arc.get(0));
        assert!(!ch.forward.is_shortcut_an_original_arc.get(1));
        assert_eq!((ch.forward.shortcut_first_arc[0], ch.forward.shortcut_second_arc[0]), (1, 2));
        assert_eq!((ch.forward.shortcut_first_arc[1], ch.forward.shortcut_second_arc[1]), (0, 0));

        assert_eq!(ch.backward.first_out, vec![0, 1, 1, 1]);
        assert_eq!(ch.backward.head, vec![1]);
        assert_eq!((ch.backward.shortcut_first_arc[0], ch.backward.shortcut_second_arc[0]), (0, 1));
    }

    #[test]
    fn empty_graph() {
        let ch = ContractionHierarchy::build(3, &[], &[], &[], None, DEFAULT_MAX_POP_COUNT).unwrap();
        assert_eq!(ch.node_count(), 3);
        assert_eq!(ch.forward.num_arcs(), 0);
        assert_eq!(ch.backward.num_arcs(), 0);
        assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());
    }

    #[test]
    fn progress_messages_are_emitted() {
        let mut messages = Vec::new();
        let mut collect = |message: &str| messages.push(message.to_string());
        ContractionHierarchy::build(3, &[0, 1], &[1, 2], &[1, 1], Some(&mut collect), DEFAULT_MAX_POP_COUNT).unwrap();
        assert!(messages.iter().any(|message| message == "Start contracting nodes."));
        assert!(messages.iter().any(|message| message == "Contraction Hierarchy is fully constructed."));
    }
}
