//! Bounded bidirectional witness search on the partially contracted graph.

use super::contraction::{ContractionArc, ContractionGraph};
use crate::datastr::{
    graph::*,
    index_heap::{IndexdMinHeap, State},
    timestamped_vector::TimestampFlags,
};

/// Decides whether a path not using a bypassed node exists which is at most as long as a candidate shortcut.
///
/// The forward search is pinned once per in-neighbor of the node being contracted
/// and its state is shared by all the out-neighbor targets tested afterwards.
/// Searches give up after `max_pop_count` settled nodes and then claim that no witness exists.
pub struct ShorterPathTest {
    max_pop_count: usize,
    bypass_node: NodeId,
    forward_distance: Vec<Weight>,
    backward_distance: Vec<Weight>,
    forward_queue: IndexdMinHeap<State<Weight>>,
    backward_queue: IndexdMinHeap<State<Weight>>,
    forward_pushed: TimestampFlags,
    backward_pushed: TimestampFlags,
}

impl ShorterPathTest {
    pub fn new(node_count: usize, max_pop_count: usize) -> ShorterPathTest {
        ShorterPathTest {
            max_pop_count,
            bypass_node: INVALID_ID,
            forward_distance: vec![INFINITY; node_count],
            backward_distance: vec![INFINITY; node_count],
            forward_queue: IndexdMinHeap::new(node_count),
            backward_queue: IndexdMinHeap::new(node_count),
            forward_pushed: TimestampFlags::new(node_count),
            backward_pushed: TimestampFlags::new(node_count),
        }
    }

    /// Start a new forward search from `source` which must not pass `bypass_node`.
    pub fn pin_source(&mut self, source: NodeId, bypass_node: NodeId) {
        self.forward_pushed.reset_all();
        self.forward_queue.clear();
        self.forward_queue.push(State { key: 0, id: source });
        self.forward_distance[source as usize] = 0;
        self.forward_pushed.set(source as usize);
        self.bypass_node = bypass_node;
    }

    /// Is there a path from the pinned source to `target` of length at most `len` avoiding the bypassed node?
    /// The forward search space grows across calls, the backward search starts over every time.
    pub fn does_shorter_or_equal_path_to_target_exist(&mut self, graph: &ContractionGraph, target: NodeId, len: Weight) -> bool {
        self.backward_pushed.reset_all();
        self.backward_queue.clear();
        self.backward_queue.push(State { key: 0, id: target });
        self.backward_distance[target as usize] = 0;
        self.backward_pushed.set(target as usize);

        if self.forward_pushed.is_set(target as usize) && self.forward_distance[target as usize] <= len {
            return true;
        }

        self.bidirectional_search(graph, len)
    }

    /// One shot variant without a pinned source.
    pub fn does_shorter_or_equal_path_exist(&mut self, graph: &ContractionGraph, source: NodeId, target: NodeId, len: Weight, bypass_node: NodeId) -> bool {
        if source == target {
            return true;
        }

        self.pin_source(source, bypass_node);
        self.backward_pushed.reset_all();
        self.backward_queue.clear();
        self.backward_queue.push(State { key: 0, id: target });
        self.backward_distance[target as usize] = 0;
        self.backward_pushed.set(target as usize);

        self.bidirectional_search(graph, len)
    }

    fn bidirectional_search(&mut self, graph: &ContractionGraph, len: Weight) -> bool {
        let ShorterPathTest {
            max_pop_count,
            bypass_node,
            forward_distance,
            backward_distance,
            forward_queue,
            backward_queue,
            forward_pushed,
            backward_pushed,
        } = self;

        let mut pop_count = 0;

        while let (Some(&forward_min), Some(&backward_min)) = (forward_queue.peek(), backward_queue.peek()) {
            if forward_min.key.saturating_add(backward_min.key) > len {
                return false;
            }

            let witness_found = if forward_min.key <= backward_min.key {
                settle_next(
                    forward_queue,
                    forward_pushed,
                    backward_pushed,
                    forward_distance,
                    backward_distance,
                    |node| graph.outgoing(node),
                    *bypass_node,
                    len,
                )
            } else {
                settle_next(
                    backward_queue,
                    backward_pushed,
                    forward_pushed,
                    backward_distance,
                    forward_distance,
                    |node| graph.incoming(node),
                    *bypass_node,
                    len,
                )
            };

            if witness_found {
                return true;
            }

            pop_count += 1;
            if pop_count > *max_pop_count {
                return false;
            }
        }

        false
    }
}

// Settles one node of one search direction.
// Returns true as soon as the two search spaces meet with a total length of at most `len`.
fn settle_next<'g>(
    queue: &mut IndexdMinHeap<State<Weight>>,
    pushed: &mut TimestampFlags,
    other_pushed: &TimestampFlags,
    distance: &mut [Weight],
    other_distance: &[Weight],
    arcs: impl Fn(NodeId) -> &'g [ContractionArc],
    bypass_node: NodeId,
    len: Weight,
) -> bool {
    let State { key: distance_to_popped, id: popped } = match queue.pop() {
        Some(state) => state,
        None => return false,
    };
    debug_assert_eq!(distance[popped as usize], distance_to_popped);

    if other_pushed.is_set(popped as usize) && distance_to_popped.saturating_add(other_distance[popped as usize]) <= len {
        return true;
    }

    let mut witness_found = false;

    for arc in arcs(popped) {
        let next = arc.node;
        if next == bypass_node {
            continue;
        }

        let next_distance = distance_to_popped.saturating_add(arc.weight);

        if pushed.is_set(next as usize) {
            if next_distance < distance[next as usize] {
                queue.decrease_key(State { key: next_distance, id: next });
                distance[next as usize] = next_distance;
            } else {
                continue;
            }
        } else {
            pushed.set(next as usize);
            distance[next as usize] = next_distance;
            queue.push(State { key: next_distance, id: next });
        }

        if other_pushed.is_set(next as usize) && next_distance.saturating_add(other_distance[next as usize]) <= len {
            witness_found = true;
        }
    }

    witness_found
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 -> 1 -> 2 with weight 2 each and a detour 0 -> 3 -> 2 with weight 1 + 4
    fn diamond() -> ContractionGraph {
        ContractionGraph::new(4, &[0, 1, 0, 3], &[1, 2, 3, 2], &[2, 2, 1, 4])
    }

    #[test]
    fn finds_witness_avoiding_bypass() {
        let graph = diamond();
        let mut test = ShorterPathTest::new(4, 500);
        assert!(test.does_shorter_or_equal_path_exist(&graph, 0, 2, 5, 1));
        assert!(!test.does_shorter_or_equal_path_exist(&graph, 0, 2, 4, 1));
        assert!(test.does_shorter_or_equal_path_exist(&graph, 0, 2, 4, 3));
        assert!(test.does_shorter_or_equal_path_exist(&graph, 2, 2, 0, 1));
    }

    #[test]
    fn pinned_source_answers_several_targets() {
        let graph = diamond();
        let mut test = ShorterPathTest::new(4, 500);
        test.pin_source(0, 3);
        assert!(test.does_shorter_or_equal_path_to_target_exist(&graph, 2, 4));
        assert!(test.does_shorter_or_equal_path_to_target_exist(&graph, 1, 2));
        assert!(!test.does_shorter_or_equal_path_to_target_exist(&graph, 1, 1));

        test.pin_source(0, 1);
        assert!(!test.does_shorter_or_equal_path_to_target_exist(&graph, 2, 4));
        assert!(test.does_shorter_or_equal_path_to_target_exist(&graph, 2, 5));
    }

    #[test]
    fn gives_up_after_budget() {
        // a long chain which only a search with enough pops can walk along
        let n = 20;
        let tail: Vec<NodeId> = (0..n - 1).collect();
        let head: Vec<NodeId> = (1..n).collect();
        let weight = vec![1; (n - 1) as usize];
        let graph = ContractionGraph::new(n as usize, &tail, &head, &weight);

        let mut generous = ShorterPathTest::new(n as usize, 500);
        assert!(generous.does_shorter_or_equal_path_exist(&graph, 0, n - 1, n, INVALID_ID));

        let mut stingy = ShorterPathTest::new(n as usize, 2);
        assert!(!stingy.does_shorter_or_equal_path_exist(&graph, 0, n - 1, n, INVALID_ID));
    }
}
