//! Node contraction on a dynamic adjacency list graph.
//!
//! Nodes are removed one after another. Whenever removing a node destroys a shortest path
//! between two of its neighbors, a shortcut is inserted which remembers the removed node as its middle.

use super::witness_search::ShorterPathTest;
use crate::{
    algo::ProgressLog,
    datastr::{
        graph::*,
        index_heap::{IndexdMinHeap, State},
    },
    util::{apply_permutation, compute_sort_permutation, inverse_vector},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractionArc {
    pub node: NodeId,
    pub weight: Weight,
    /// Number of input arcs this arc stands for.
    pub hop_length: u32,
    /// The contracted node this shortcut bypasses, `INVALID_ID` for input arcs.
    pub mid_node: NodeId,
}

/// Graph with outgoing and incoming adjacency lists per node which supports adding shortcuts and removing nodes.
#[derive(Debug)]
pub struct ContractionGraph {
    outgoing: Vec<Vec<ContractionArc>>,
    incoming: Vec<Vec<ContractionArc>>,
    level: Vec<u32>,
}

impl ContractionGraph {
    /// Self loops are dropped, parallel arcs have to be merged before.
    pub fn new(node_count: usize, tail: &[NodeId], head: &[NodeId], weight: &[Weight]) -> ContractionGraph {
        let mut outgoing = vec![Vec::new(); node_count];
        let mut incoming = vec![Vec::new(); node_count];

        for ((&x, &y), &w) in tail.iter().zip(head).zip(weight) {
            if x != y {
                outgoing[x as usize].push(ContractionArc {
                    node: y,
                    weight: w,
                    hop_length: 1,
                    mid_node: INVALID_ID,
                });
                incoming[y as usize].push(ContractionArc {
                    node: x,
                    weight: w,
                    hop_length: 1,
                    mid_node: INVALID_ID,
                });
            }
        }

        ContractionGraph {
            outgoing,
            incoming,
            level: vec![0; node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn outgoing(&self, node: NodeId) -> &[ContractionArc] {
        &self.outgoing[node as usize]
    }

    pub fn incoming(&self, node: NodeId) -> &[ContractionArc] {
        &self.incoming[node as usize]
    }

    pub fn level(&self, node: NodeId) -> u32 {
        self.level[node as usize]
    }

    fn raise_level(&mut self, node: NodeId, level: u32) {
        let current = &mut self.level[node as usize];
        *current = std::cmp::max(*current, level);
    }

    /// Insert the shortcut `from -> to` or lower the weight of an existing arc between them.
    fn insert_or_decrease(&mut self, from: NodeId, mid_node: NodeId, to: NodeId, weight: Weight, hop_length: u32) {
        debug_assert_ne!(from, to);
        let forward = ContractionArc {
            node: to,
            weight,
            hop_length,
            mid_node,
        };
        let backward = ContractionArc { node: from, ..forward };

        if let Some(existing) = self.outgoing[from as usize].iter_mut().find(|arc| arc.node == to) {
            if existing.weight <= weight {
                return;
            }
            *existing = forward;
            let reverse = self.incoming[to as usize].iter_mut().find(|arc| arc.node == from);
            debug_assert!(reverse.is_some(), "arc {} -> {} only exists in one direction", from, to);
            if let Some(reverse) = reverse {
                *reverse = backward;
            }
        } else {
            self.outgoing[from as usize].push(forward);
            self.incoming[to as usize].push(backward);
        }
    }

    fn remove_all_incident_arcs(&mut self, node: NodeId) {
        let outgoing = std::mem::take(&mut self.outgoing[node as usize]);
        let incoming = std::mem::take(&mut self.incoming[node as usize]);

        for arc in &outgoing {
            let back = &mut self.incoming[arc.node as usize];
            if let Some(pos) = back.iter().position(|back_arc| back_arc.node == node) {
                back.remove(pos);
            }
        }
        for arc in &incoming {
            let back = &mut self.outgoing[arc.node as usize];
            if let Some(pos) = back.iter().position(|back_arc| back_arc.node == node) {
                back.remove(pos);
            }
        }
    }
}

/// Arcs of one direction in the order their tails were contracted.
/// Tails, heads and middle nodes are still input node ids.
#[derive(Debug, Default, Clone)]
pub(super) struct ContractedArcs {
    pub tail: Vec<NodeId>,
    pub head: Vec<NodeId>,
    pub weight: Vec<Weight>,
    pub mid_node: Vec<NodeId>,
}

impl ContractedArcs {
    fn collect(&mut self, tail: NodeId, arcs: &[ContractionArc]) -> Result<()> {
        for arc in arcs {
            if self.head.len() >= INVALID_ID as usize {
                return Err(Error::TooManyArcs);
            }
            self.tail.push(tail);
            self.head.push(arc.node);
            self.weight.push(arc.weight);
            self.mid_node.push(arc.mid_node);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.head.len()
    }

    pub fn num_shortcuts(&self) -> usize {
        self.mid_node.iter().filter(|&&mid| mid != INVALID_ID).count()
    }

    /// Sort by tail first and head second and return the matching `first_out` array.
    pub fn sort_and_build_first_out(&mut self, node_count: usize) -> Vec<EdgeId> {
        let permutation = compute_sort_permutation(self.len(), |arc| (self.tail[arc], self.head[arc]));
        self.tail = apply_permutation(&permutation, &self.tail);
        self.head = apply_permutation(&permutation, &self.head);
        self.weight = apply_permutation(&permutation, &self.weight);
        self.mid_node = apply_permutation(&permutation, &self.mid_node);
        inverse_vector(&self.tail, node_count)
    }

    /// Replace every node id `x` by `rank[x]`.
    pub fn rename_nodes(&mut self, rank: &[NodeId]) {
        for node in self.tail.iter_mut().chain(self.head.iter_mut()) {
            *node = rank[*node as usize];
        }
        for node in self.mid_node.iter_mut().filter(|node| **node != INVALID_ID) {
            *node = rank[*node as usize];
        }
    }
}

// Lower is contracted earlier.
// Combines the level in the contraction process with the ratio of inserted to removed arcs and hops.
fn estimate_node_importance(graph: &ContractionGraph, shorter_path_test: &mut ShorterPathTest, node: NodeId) -> u64 {
    let mut added_arc_count: u64 = 0;
    let mut added_hop_count: u64 = 0;

    for in_arc in graph.incoming(node) {
        shorter_path_test.pin_source(in_arc.node, node);
        for out_arc in graph.outgoing(node) {
            if in_arc.node != out_arc.node
                && !shorter_path_test.does_shorter_or_equal_path_to_target_exist(graph, out_arc.node, in_arc.weight.saturating_add(out_arc.weight))
            {
                added_arc_count += 1;
                added_hop_count += u64::from(in_arc.hop_length) + u64::from(out_arc.hop_length);
            }
        }
    }

    let removed_arc_count = 1 + (graph.incoming(node).len() + graph.outgoing(node).len()) as u64;
    let removed_hop_count = 1 + graph
        .incoming(node)
        .iter()
        .chain(graph.outgoing(node))
        .map(|arc| u64::from(arc.hop_length))
        .sum::<u64>();

    1 + 1000 * u64::from(graph.level(node)) + (1000 * added_arc_count) / removed_arc_count + (1000 * added_hop_count) / removed_hop_count
}

fn contract_node(graph: &mut ContractionGraph, shorter_path_test: &mut ShorterPathTest, node: NodeId) {
    // shortcuts never touch `node` itself, so its lists stay stable while we insert
    for in_idx in 0..graph.incoming(node).len() {
        let in_arc = graph.incoming(node)[in_idx];
        shorter_path_test.pin_source(in_arc.node, node);

        for out_idx in 0..graph.outgoing(node).len() {
            let out_arc = graph.outgoing(node)[out_idx];
            if in_arc.node == out_arc.node {
                continue;
            }

            // paths of infinite length need no shortcut
            let weight = in_arc.weight.saturating_add(out_arc.weight);
            if weight >= INFINITY {
                continue;
            }
            if !shorter_path_test.does_shorter_or_equal_path_to_target_exist(graph, out_arc.node, weight) {
                graph.insert_or_decrease(in_arc.node, node, out_arc.node, weight, in_arc.hop_length + out_arc.hop_length);
            }
        }
    }

    graph.remove_all_incident_arcs(node);
}

/// Contract all nodes, always picking the least important one next.
/// Returns the contraction order and the arcs of the upward graphs.
pub(super) fn contract_by_importance(
    graph: &mut ContractionGraph,
    max_pop_count: usize,
    log: &mut ProgressLog,
) -> Result<(Vec<NodeId>, ContractedArcs, ContractedArcs)> {
    let node_count = graph.node_count();
    let mut shorter_path_test = ShorterPathTest::new(node_count, max_pop_count);

    log.message("Start building queue.");
    let mut queue = IndexdMinHeap::new(node_count);
    for node in 0..node_count as NodeId {
        let key = estimate_node_importance(graph, &mut shorter_path_test, node);
        queue.push(State { key, id: node });
        log.throttled(|| format!("Added {} of {} nodes to the queue.", node + 1, node_count));
    }
    log.message("Finished building queue.");

    log.message("Start contracting nodes.");
    let mut order = Vec::with_capacity(node_count);
    let mut forward = ContractedArcs::default();
    let mut backward = ContractedArcs::default();
    let mut neighbors = Vec::new();
    let mut is_neighbor = vec![false; node_count];

    while let Some(State { id: node, .. }) = queue.pop() {
        order.push(node);

        for arc in graph.incoming(node).iter().chain(graph.outgoing(node)) {
            if !is_neighbor[arc.node as usize] {
                is_neighbor[arc.node as usize] = true;
                neighbors.push(arc.node);
            }
        }

        forward.collect(node, graph.outgoing(node))?;
        backward.collect(node, graph.incoming(node))?;

        let (in_degree, out_degree) = (graph.incoming(node).len(), graph.outgoing(node).len());
        let neighbor_level = graph.level(node) + 1;
        contract_node(graph, &mut shorter_path_test, node);

        for &neighbor in &neighbors {
            is_neighbor[neighbor as usize] = false;
            graph.raise_level(neighbor, neighbor_level);
            let key = estimate_node_importance(graph, &mut shorter_path_test, neighbor);
            let state = State { key, id: neighbor };
            if !queue.decrease_key(state) {
                queue.increase_key(state);
            }
        }
        neighbors.clear();

        log.throttled(|| {
            format!(
                "Contracted {} of {}. The in degree of last node was {} and out degree was {}.",
                order.len(),
                node_count,
                in_degree,
                out_degree
            )
        });
    }
    log.message("Finished contracting nodes.");

    Ok((order, forward, backward))
}

/// Contract the nodes exactly in the given order.
pub(super) fn contract_in_order(
    graph: &mut ContractionGraph,
    order: &[NodeId],
    max_pop_count: usize,
    log: &mut ProgressLog,
) -> Result<(ContractedArcs, ContractedArcs)> {
    let node_count = graph.node_count();
    debug_assert_eq!(order.len(), node_count);
    let mut shorter_path_test = ShorterPathTest::new(node_count, max_pop_count);
    let mut forward = ContractedArcs::default();
    let mut backward = ContractedArcs::default();

    log.message("Start building contraction hierarchy with given rank.");
    for (i, &node) in order.iter().enumerate() {
        forward.collect(node, graph.outgoing(node))?;
        backward.collect(node, graph.incoming(node))?;

        let (in_degree, out_degree) = (graph.incoming(node).len(), graph.outgoing(node).len());
        contract_node(graph, &mut shorter_path_test, node);

        log.throttled(|| {
            format!(
                "Contracted {} of {}. The in degree of last node was {} and out degree was {}.",
                i + 1,
                node_count,
                in_degree,
                out_degree
            )
        });
    }
    log.message("Finished contracting nodes.");

    Ok((forward, backward))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracting_path_middle_inserts_shortcut() {
        let mut graph = ContractionGraph::new(3, &[0, 1], &[1, 2], &[3, 4]);
        let mut test = ShorterPathTest::new(3, 500);
        contract_node(&mut graph, &mut test, 1);

        assert!(graph.outgoing(1).is_empty());
        assert!(graph.incoming(1).is_empty());
        assert_eq!(
            graph.outgoing(0),
            &[ContractionArc {
                node: 2,
                weight: 7,
                hop_length: 2,
                mid_node: 1
            }]
        );
        assert_eq!(graph.incoming(2)[0].node, 0);
    }

    #[test]
    fn witness_prevents_shortcut() {
        // 0 -> 1 -> 2 costs 4, the direct arc 0 -> 2 only 3
        let mut graph = ContractionGraph::new(3, &[0, 1, 0], &[1, 2, 2], &[2, 2, 3]);
        let mut test = ShorterPathTest::new(3, 500);
        contract_node(&mut graph, &mut test, 1);

        assert_eq!(graph.outgoing(0).len(), 1);
        assert_eq!(graph.outgoing(0)[0].weight, 3);
        assert_eq!(graph.outgoing(0)[0].mid_node, INVALID_ID);
    }

    #[test]
    fn shortcut_replaces_longer_arc() {
        let mut graph = ContractionGraph::new(3, &[0, 1, 0], &[1, 2, 2], &[1, 1, 5]);
        let mut test = ShorterPathTest::new(3, 500);
        contract_node(&mut graph, &mut test, 1);

        assert_eq!(graph.outgoing(0).len(), 1);
        assert_eq!(graph.outgoing(0)[0].weight, 2);
        assert_eq!(graph.outgoing(0)[0].mid_node, 1);
        assert_eq!(graph.incoming(2), &[ContractionArc { node: 0, ..graph.outgoing(0)[0] }]);
    }

    #[test]
    fn given_order_collects_upward_arcs() {
        let mut graph = ContractionGraph::new(3, &[0, 1], &[1, 2], &[3, 4]);
        let mut log = ProgressLog::new(None);
        let (forward, backward) = contract_in_order(&mut graph, &[1, 0, 2], 500, &mut log).unwrap();

        assert_eq!(forward.tail, vec![1, 0]);
        assert_eq!(forward.head, vec![2, 2]);
        assert_eq!(forward.mid_node, vec![INVALID_ID, 1]);
        assert_eq!(backward.tail, vec![1]);
        assert_eq!(backward.head, vec![0]);
        assert_eq!(forward.num_shortcuts(), 1);
    }

    #[test]
    fn importance_order_contracts_everything() {
        let mut graph = ContractionGraph::new(4, &[0, 1, 2, 3], &[1, 2, 3, 0], &[1, 1, 1, 1]);
        let mut log = ProgressLog::new(None);
        let (mut order, forward, backward) = contract_by_importance(&mut graph, 500, &mut log).unwrap();
        assert!(forward.len() + backward.len() >= 4);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
