//! Basic variant of dijkstras algorithm.
//!
//! Plain one-to-all search on an adjacency array graph.
//! The hierarchies are checked against it.

use crate::datastr::{
    graph::*,
    index_heap::{IndexdMinHeap, State},
    timestamped_vector::TimestampedVector,
};

pub struct Dijkstra<'a> {
    graph: &'a OwnedGraph,
    distances: TimestampedVector<Weight>,
    predecessors: Vec<NodeId>,
    queue: IndexdMinHeap<State<Weight>>,
    num_queue_pops: usize,
}

impl<'a> Dijkstra<'a> {
    pub fn new(graph: &'a OwnedGraph) -> Self {
        let n = graph.num_nodes();
        Dijkstra {
            graph,
            distances: TimestampedVector::new(n, INFINITY),
            predecessors: vec![INVALID_ID; n],
            queue: IndexdMinHeap::new(n),
            num_queue_pops: 0,
        }
    }

    /// Start a new search from `from`.
    pub fn initialize_query(&mut self, from: NodeId) {
        self.queue.clear();
        self.distances.reset();
        self.num_queue_pops = 0;

        self.queue.push(State { key: 0, id: from });
        self.distances.set(from as usize, 0);
        self.predecessors[from as usize] = INVALID_ID;
    }

    /// Settle the next node, returns `None` once the queue ran empty.
    pub fn settle_next_node(&mut self) -> Option<NodeId> {
        let State { key: distance, id: node } = self.queue.pop()?;
        self.num_queue_pops += 1;

        for Link { node: head, weight } in self.graph.link_iter(node) {
            let next_distance = distance + weight;
            if next_distance < self.distances[head as usize] {
                self.distances.set(head as usize, next_distance);
                self.predecessors[head as usize] = node;
                let next = State { key: next_distance, id: head };
                if self.queue.contains_index(head as usize) {
                    self.queue.decrease_key(next);
                } else {
                    self.queue.push(next);
                }
            }
        }

        Some(node)
    }

    /// Distance from `from` to `to` or `INFINITY` if `to` is not reachable.
    pub fn distance(&mut self, from: NodeId, to: NodeId) -> Weight {
        self.initialize_query(from);
        while let Some(node) = self.settle_next_node() {
            if node == to {
                break;
            }
        }
        self.distances[to as usize]
    }

    /// Distances from `from` to every node.
    pub fn one_to_all(&mut self, from: NodeId) -> Vec<Weight> {
        self.initialize_query(from);
        while self.settle_next_node().is_some() {}
        (0..self.graph.num_nodes()).map(|node| self.distances[node]).collect()
    }

    pub fn tentative_distance(&self, node: NodeId) -> Weight {
        self.distances[node as usize]
    }

    pub fn predecessor(&self, node: NodeId) -> NodeId {
        self.predecessors[node as usize]
    }

    pub fn num_queue_pops(&self) -> usize {
        self.num_queue_pops
    }
}
