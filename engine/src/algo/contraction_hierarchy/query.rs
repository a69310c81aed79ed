//! Queries on a `ContractionHierarchy`.
//!
//! One-to-one queries run a bidirectional Dijkstra on the two upward graphs with stall-on-demand.
//! One-to-many and many-to-one queries first pin the target (or source) set, which collects the
//! upward search space of all pinned nodes once. Every following query then is one complete upward search
//! and a linear sweep over the pinned search space.

use super::{extra_weight::ExtraWeight, ContractionHierarchy, Side};
use crate::datastr::{
    graph::*,
    index_heap::{IndexdMinHeap, State},
    timestamped_vector::TimestampFlags,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Initialized,
    Run,
    SourcePinned,
    SourceRun,
    TargetPinned,
    TargetRun,
}

// Per direction workspace.
//
// After a pinned run a node in the pinned search space is either
// reached by the upward search (`pushed` set, predecessor node and arc from the upward graph)
// or reached by the sweep (`pushed` unset, `predecessor_arc` is an arc of the opposite graph or invalid).
#[derive(Debug)]
struct SearchSpace {
    pushed: TimestampFlags,
    queue: IndexdMinHeap<State<Weight>>,
    distance: Vec<Weight>,
    predecessor_node: Vec<NodeId>,
    predecessor_arc: Vec<EdgeId>,
}

impl SearchSpace {
    fn new(node_count: usize) -> SearchSpace {
        SearchSpace {
            pushed: TimestampFlags::new(node_count),
            queue: IndexdMinHeap::new(node_count),
            distance: vec![INFINITY; node_count],
            predecessor_node: vec![INVALID_ID; node_count],
            predecessor_arc: vec![INVALID_ID; node_count],
        }
    }

    fn reset(&mut self) {
        self.pushed.reset_all();
        self.queue.clear();
    }

    fn add_root(&mut self, node: NodeId, distance: Weight) {
        let idx = node as usize;
        if !self.queue.contains_index(idx) {
            self.queue.push(State { key: distance, id: node });
            self.distance[idx] = distance;
            self.predecessor_node[idx] = INVALID_ID;
        } else if distance < self.distance[idx] {
            self.distance[idx] = distance;
            self.queue.decrease_key(State { key: distance, id: node });
        }
        self.pushed.set(idx);
    }

    fn relax_upward_arcs(&mut self, node: NodeId, distance_to_node: Weight, up: &Side) {
        for arc in up.arc_range(node) {
            let head = up.head[arc];
            let distance = distance_to_node.saturating_add(up.weight[arc]);
            let idx = head as usize;

            if self.pushed.is_set(idx) {
                if distance < self.distance[idx] {
                    self.queue.decrease_key(State { key: distance, id: head });
                    self.distance[idx] = distance;
                    self.predecessor_node[idx] = node;
                    self.predecessor_arc[idx] = arc as EdgeId;
                }
            } else if distance < INFINITY {
                self.queue.push(State { key: distance, id: head });
                self.distance[idx] = distance;
                self.pushed.set(idx);
                self.predecessor_node[idx] = node;
                self.predecessor_arc[idx] = arc as EdgeId;
            }
        }
    }

    // Can we reach `node` at least as cheap by going down an arc of the opposite graph from an already reached node?
    fn can_stall_at(&self, node: NodeId, down: &Side) -> bool {
        down.arc_range(node).any(|arc| {
            let higher = down.head[arc] as usize;
            self.pushed.is_set(higher) && self.distance[higher].saturating_add(down.weight[arc]) <= self.distance[node as usize]
        })
    }

    fn settle_next(&mut self, other: &SearchSpace, up: &Side, down: &Side, best: &mut (Weight, NodeId)) {
        let State { key: distance, id: node } = match self.queue.pop() {
            Some(state) => state,
            None => return,
        };

        if other.pushed.is_set(node as usize) {
            let total = distance.saturating_add(other.distance[node as usize]);
            if total < best.0 {
                *best = (total, node);
            }
        }

        if !self.can_stall_at(node, down) {
            self.relax_upward_arcs(node, distance, up);
        }
    }

    fn full_upward_search(&mut self, up: &Side) {
        while let Some(State { key: distance, id: node }) = self.queue.pop() {
            self.relax_upward_arcs(node, distance, up);
        }
    }

    // Complete upward search followed by a sweep over `select_list` (decreasing rank) along the opposite graph.
    fn pinned_run(&mut self, select_list: &[NodeId], up: &Side, down: &Side) {
        self.full_upward_search(up);

        for &node in select_list {
            let idx = node as usize;
            let mut distance = if self.pushed.is_set(idx) { self.distance[idx] } else { INFINITY };
            let mut predecessor = INVALID_ID;

            for arc in down.arc_range(node) {
                let higher = down.head[arc] as usize;
                let candidate = self.distance[higher].saturating_add(down.weight[arc]);
                if candidate < distance {
                    distance = candidate;
                    predecessor = arc as EdgeId;
                }
            }

            if predecessor != INVALID_ID {
                self.distance[idx] = distance;
                self.predecessor_arc[idx] = predecessor;
                self.pushed.reset_one(idx);
            } else if distance == INFINITY {
                self.distance[idx] = INFINITY;
                self.predecessor_arc[idx] = INVALID_ID;
            }
        }
    }

    fn is_unreached_after_pinned_run(&self, node: NodeId) -> bool {
        !self.pushed.is_set(node as usize) && self.predecessor_arc[node as usize] == INVALID_ID
    }

    // Climb from a pinned node along sweep predecessors until the upward search space is reached.
    // Reports the arcs of the opposite graph on the way and returns the node where the search spaces meet.
    fn climb_sweep_predecessors(&self, mut node: NodeId, down: &Side, mut on_arc: impl FnMut(EdgeId)) -> NodeId {
        while !self.pushed.is_set(node as usize) {
            let arc = self.predecessor_arc[node as usize];
            on_arc(arc);
            debug_assert!(down.head[arc as usize] > node);
            node = down.head[arc as usize];
        }
        node
    }

    // Walk upward search predecessors down to the root, reporting the arcs on the way.
    fn walk_to_root(&self, mut node: NodeId, mut on_arc: impl FnMut(EdgeId)) -> NodeId {
        while self.predecessor_node[node as usize] != INVALID_ID {
            on_arc(self.predecessor_arc[node as usize]);
            node = self.predecessor_node[node as usize];
        }
        node
    }
}

// Collect the upward search space of the pinned nodes in the opposite graph ordered by decreasing rank.
fn pin(
    external_nodes: &[NodeId],
    rank: &[NodeId],
    pinned: &mut Vec<NodeId>,
    select_list: &mut Vec<NodeId>,
    queue: &mut IndexdMinHeap<State<Weight>>,
    up: &Side,
) {
    pinned.clear();
    select_list.clear();
    queue.clear();

    for &external in external_nodes {
        let node = rank[external as usize];
        pinned.push(node);
        queue.push_unless_contained(State { key: node, id: node });
    }

    while let Some(State { id: node, .. }) = queue.pop() {
        select_list.push(node);
        for arc in up.arc_range(node) {
            let head = up.head[arc];
            debug_assert!(node < head);
            queue.push_unless_contained(State { key: head, id: head });
        }
    }

    select_list.reverse();
}

/// Expand a CH arc into the input arcs it represents.
/// `on_input_arc` receives the input arc id and the input head node, in path order.
pub(super) fn unpack_arc(ch: &ContractionHierarchy, forward: bool, arc: EdgeId, mut on_input_arc: impl FnMut(EdgeId, NodeId)) {
    let mut stack = vec![(forward, arc)];
    while let Some((forward, arc)) = stack.pop() {
        let side = if forward { &ch.forward } else { &ch.backward };
        let (first, second) = (side.shortcut_first_arc[arc as usize], side.shortcut_second_arc[arc as usize]);
        if side.is_shortcut_an_original_arc.get(arc as usize) {
            on_input_arc(first, second);
        } else {
            // a shortcut is a backward arc followed by a forward arc
            stack.push((true, second));
            stack.push((false, first));
        }
    }
}

/// Query object for a `ContractionHierarchy`.
///
/// Holds the entire workspace, so creating one allocates memory linear in the number of nodes.
/// Reuse it for many queries, calling `reset` in between.
///
/// ```
/// # use road_hierarchies::algo::contraction_hierarchy::{ContractionHierarchy, query::ContractionHierarchyQuery, DEFAULT_MAX_POP_COUNT};
/// let ch = ContractionHierarchy::build(3, &[0, 1], &[1, 2], &[4, 2], None, DEFAULT_MAX_POP_COUNT)?;
/// let mut query = ContractionHierarchyQuery::new(&ch);
/// query.add_source(0, 0).add_target(2, 0).run();
/// assert_eq!(query.get_distance(), 6);
/// assert_eq!(query.get_node_path(), vec![0, 1, 2]);
/// # Ok::<(), road_hierarchies::Error>(())
/// ```
#[derive(Debug)]
pub struct ContractionHierarchyQuery<'a> {
    ch: &'a ContractionHierarchy,
    forward: SearchSpace,
    backward: SearchSpace,
    meeting_node: NodeId,
    pinned: Vec<NodeId>,
    select_list: Vec<NodeId>,
    state: QueryState,
}

impl<'a> ContractionHierarchyQuery<'a> {
    pub fn new(ch: &'a ContractionHierarchy) -> ContractionHierarchyQuery<'a> {
        let node_count = ch.node_count();
        ContractionHierarchyQuery {
            ch,
            forward: SearchSpace::new(node_count),
            backward: SearchSpace::new(node_count),
            meeting_node: INVALID_ID,
            pinned: Vec::new(),
            select_list: Vec::new(),
            state: QueryState::Initialized,
        }
    }

    /// Forget all sources, targets and pinned nodes.
    pub fn reset(&mut self) -> &mut Self {
        self.forward.reset();
        self.backward.reset();
        self.meeting_node = INVALID_ID;
        self.pinned.clear();
        self.select_list.clear();
        self.state = QueryState::Initialized;
        self
    }

    /// Attach another hierarchy. The workspace is reused if the node counts match.
    pub fn reset_with(&mut self, ch: &'a ContractionHierarchy) -> &mut Self {
        if ch.node_count() == self.forward.distance.len() {
            self.reset();
            self.ch = ch;
        } else {
            *self = ContractionHierarchyQuery::new(ch);
        }
        self
    }

    /// Add a source with an initial distance offset. Possible before `run` and after pinning targets.
    pub fn add_source(&mut self, node: NodeId, distance: Weight) -> &mut Self {
        assert!((node as usize) < self.ch.node_count(), "node out of bounds");
        assert!(matches!(self.state, QueryState::Initialized | QueryState::TargetPinned));
        self.forward.add_root(self.ch.rank[node as usize], distance);
        self
    }

    /// Add a target with an initial distance offset. Possible before `run` and after pinning sources.
    pub fn add_target(&mut self, node: NodeId, distance: Weight) -> &mut Self {
        assert!((node as usize) < self.ch.node_count(), "node out of bounds");
        assert!(matches!(self.state, QueryState::Initialized | QueryState::SourcePinned));
        self.backward.add_root(self.ch.rank[node as usize], distance);
        self
    }

    /// Run the bidirectional search. Requires at least one source and one target.
    pub fn run(&mut self) -> &mut Self {
        assert_eq!(self.state, QueryState::Initialized);
        assert!(!self.forward.queue.is_empty(), "must add at least one source before calling run");
        assert!(!self.backward.queue.is_empty(), "must add at least one target before calling run");

        let ch = self.ch;
        let mut best = (INFINITY, INVALID_ID);
        let mut forward_next = true;

        loop {
            let forward_finished = self.forward.queue.peek().map_or(true, |min| min.key >= best.0);
            let backward_finished = self.backward.queue.peek().map_or(true, |min| min.key >= best.0);

            if forward_finished && backward_finished {
                break;
            }
            if forward_finished {
                forward_next = false;
            }
            if backward_finished {
                forward_next = true;
            }

            if forward_next {
                self.forward.settle_next(&self.backward, &ch.forward, &ch.backward, &mut best);
            } else {
                self.backward.settle_next(&self.forward, &ch.backward, &ch.forward, &mut best);
            }
            forward_next = !forward_next;
        }

        self.meeting_node = best.1;
        self.state = QueryState::Run;
        self
    }

    /// Length of the shortest path, `INFINITY` if there is none.
    pub fn get_distance(&self) -> Weight {
        assert_eq!(self.state, QueryState::Run);
        if self.meeting_node == INVALID_ID {
            INFINITY
        } else {
            let meeting = self.meeting_node as usize;
            self.forward.distance[meeting].saturating_add(self.backward.distance[meeting])
        }
    }

    /// The source at which the shortest path starts, `INVALID_ID` if there is none.
    pub fn get_used_source(&self) -> NodeId {
        assert_eq!(self.state, QueryState::Run);
        if self.meeting_node == INVALID_ID {
            return INVALID_ID;
        }
        self.ch.order[self.forward.walk_to_root(self.meeting_node, |_| ()) as usize]
    }

    /// The target at which the shortest path ends, `INVALID_ID` if there is none.
    pub fn get_used_target(&self) -> NodeId {
        assert_eq!(self.state, QueryState::Run);
        if self.meeting_node == INVALID_ID {
            return INVALID_ID;
        }
        self.ch.order[self.backward.walk_to_root(self.meeting_node, |_| ()) as usize]
    }

    // Forward arcs from the source up to the meeting node in path order.
    fn up_path(&self) -> Vec<EdgeId> {
        let mut up_path = Vec::new();
        self.forward.walk_to_root(self.meeting_node, |arc| up_path.push(arc));
        up_path.reverse();
        up_path
    }

    // Backward arcs from the meeting node down to the target in path order.
    fn down_path(&self) -> Vec<EdgeId> {
        let mut down_path = Vec::new();
        self.backward.walk_to_root(self.meeting_node, |arc| down_path.push(arc));
        down_path
    }

    /// Input arc ids along the shortest path, empty if there is none.
    pub fn get_arc_path(&self) -> Vec<EdgeId> {
        assert_eq!(self.state, QueryState::Run);
        let mut path = Vec::new();
        if self.meeting_node != INVALID_ID {
            for arc in self.up_path() {
                unpack_arc(self.ch, true, arc, |input_arc, _| path.push(input_arc));
            }
            for arc in self.down_path() {
                unpack_arc(self.ch, false, arc, |input_arc, _| path.push(input_arc));
            }
        }
        path
    }

    /// Input node ids along the shortest path including source and target, empty if there is none.
    pub fn get_node_path(&self) -> Vec<NodeId> {
        assert_eq!(self.state, QueryState::Run);
        let mut path = Vec::new();
        if self.meeting_node != INVALID_ID {
            let source = self.forward.walk_to_root(self.meeting_node, |_| ());
            path.push(self.ch.order[source as usize]);
            for arc in self.up_path() {
                unpack_arc(self.ch, true, arc, |_, head| path.push(head));
            }
            for arc in self.down_path() {
                unpack_arc(self.ch, false, arc, |_, head| path.push(head));
            }
        }
        path
    }

    /// Drop the sources but keep the pinned targets.
    pub fn reset_source(&mut self) -> &mut Self {
        assert!(matches!(self.state, QueryState::TargetPinned | QueryState::TargetRun));
        self.forward.reset();
        self.state = QueryState::TargetPinned;
        self
    }

    /// Drop the targets but keep the pinned sources.
    pub fn reset_target(&mut self) -> &mut Self {
        assert!(matches!(self.state, QueryState::SourcePinned | QueryState::SourceRun));
        self.backward.reset();
        self.state = QueryState::SourcePinned;
        self
    }

    /// Fix the targets for many one-to-many queries. Sources are added afterwards.
    pub fn pin_targets(&mut self, targets: &[NodeId]) -> &mut Self {
        assert_eq!(self.state, QueryState::Initialized);
        assert!(targets.iter().all(|&node| (node as usize) < self.ch.node_count()), "node out of bounds");
        pin(targets, &self.ch.rank, &mut self.pinned, &mut self.select_list, &mut self.backward.queue, &self.ch.backward);
        self.state = QueryState::TargetPinned;
        self
    }

    /// Fix the sources for many many-to-one queries. Targets are added afterwards.
    pub fn pin_sources(&mut self, sources: &[NodeId]) -> &mut Self {
        assert_eq!(self.state, QueryState::Initialized);
        assert!(sources.iter().all(|&node| (node as usize) < self.ch.node_count()), "node out of bounds");
        pin(sources, &self.ch.rank, &mut self.pinned, &mut self.select_list, &mut self.forward.queue, &self.ch.forward);
        self.state = QueryState::SourcePinned;
        self
    }

    pub fn run_to_pinned_targets(&mut self) -> &mut Self {
        assert_eq!(self.state, QueryState::TargetPinned);
        assert!(!self.forward.queue.is_empty(), "must add at least one source before calling run");
        self.forward.pinned_run(&self.select_list, &self.ch.forward, &self.ch.backward);
        self.state = QueryState::TargetRun;
        self
    }

    pub fn run_to_pinned_sources(&mut self) -> &mut Self {
        assert_eq!(self.state, QueryState::SourcePinned);
        assert!(!self.backward.queue.is_empty(), "must add at least one target before calling run");
        self.backward.pinned_run(&self.select_list, &self.ch.backward, &self.ch.forward);
        self.state = QueryState::SourceRun;
        self
    }

    /// Distances to the pinned targets in the order they were pinned.
    pub fn get_distances_to_targets(&self) -> Vec<Weight> {
        let mut distances = vec![INFINITY; self.pinned.len()];
        self.get_distances_to_targets_into(&mut distances);
        distances
    }

    pub fn get_distances_to_targets_into(&self, distances: &mut [Weight]) {
        assert_eq!(self.state, QueryState::TargetRun);
        for (distance, &node) in distances.iter_mut().zip(&self.pinned) {
            *distance = self.forward.distance[node as usize];
        }
    }

    /// Distances from the pinned sources in the order they were pinned.
    pub fn get_distances_to_sources(&self) -> Vec<Weight> {
        let mut distances = vec![INFINITY; self.pinned.len()];
        self.get_distances_to_sources_into(&mut distances);
        distances
    }

    pub fn get_distances_to_sources_into(&self, distances: &mut [Weight]) {
        assert_eq!(self.state, QueryState::SourceRun);
        for (distance, &node) in distances.iter_mut().zip(&self.pinned) {
            *distance = self.backward.distance[node as usize];
        }
    }

    /// For every pinned target the source its shortest path starts at, `INVALID_ID` if unreachable.
    pub fn get_used_sources_to_targets(&self) -> Vec<NodeId> {
        let mut used = vec![INVALID_ID; self.pinned.len()];
        self.get_used_sources_to_targets_into(&mut used);
        used
    }

    pub fn get_used_sources_to_targets_into(&self, used: &mut [NodeId]) {
        assert_eq!(self.state, QueryState::TargetRun);
        Self::used_roots(&self.forward, &self.pinned, &self.ch.backward, &self.ch.order, used);
    }

    /// For every pinned source the target its shortest path ends at, `INVALID_ID` if unreachable.
    pub fn get_used_targets_to_sources(&self) -> Vec<NodeId> {
        let mut used = vec![INVALID_ID; self.pinned.len()];
        self.get_used_targets_to_sources_into(&mut used);
        used
    }

    pub fn get_used_targets_to_sources_into(&self, used: &mut [NodeId]) {
        assert_eq!(self.state, QueryState::SourceRun);
        Self::used_roots(&self.backward, &self.pinned, &self.ch.forward, &self.ch.order, used);
    }

    fn used_roots(search: &SearchSpace, pinned: &[NodeId], down: &Side, order: &[NodeId], used: &mut [NodeId]) {
        for (used, &node) in used.iter_mut().zip(pinned) {
            *used = if search.is_unreached_after_pinned_run(node) {
                INVALID_ID
            } else {
                let meeting = search.climb_sweep_predecessors(node, down, |_| ());
                order[search.walk_to_root(meeting, |_| ()) as usize]
            };
        }
    }

    /// Combine the extra weights along the shortest path with `link`.
    /// `T::default()` if there is no path.
    pub fn get_extra_weight_distance<T, W, L>(&self, extra_weight: &W, link: L) -> T
    where
        T: Default,
        W: ExtraWeight<T> + ?Sized,
        L: Fn(T, T) -> T,
    {
        assert_eq!(self.state, QueryState::Run);
        if self.meeting_node == INVALID_ID {
            return T::default();
        }

        let forward = self.up_path().into_iter().map(|arc| extra_weight.forward_arc_weight(self.ch, arc, &link));
        let backward = self.down_path().into_iter().map(|arc| extra_weight.backward_arc_weight(self.ch, arc, &link));
        forward.chain(backward).reduce(&link).unwrap_or_default()
    }

    /// Combined extra weights along the shortest paths to every pinned target.
    pub fn get_extra_weight_distances_to_targets<T, W, L>(&self, extra_weight: &W, link: L) -> Vec<T>
    where
        T: Default,
        W: ExtraWeight<T> + ?Sized,
        L: Fn(T, T) -> T,
    {
        assert_eq!(self.state, QueryState::TargetRun);
        let mut up_path = Vec::new();
        let mut down_path = Vec::new();

        self.pinned
            .iter()
            .map(|&target| {
                if self.forward.is_unreached_after_pinned_run(target) {
                    return T::default();
                }
                up_path.clear();
                down_path.clear();
                let meeting = self.forward.climb_sweep_predecessors(target, &self.ch.backward, |arc| down_path.push(arc));
                self.forward.walk_to_root(meeting, |arc| up_path.push(arc));

                let forward = up_path.iter().rev().map(|&arc| extra_weight.forward_arc_weight(self.ch, arc, &link));
                let backward = down_path.iter().rev().map(|&arc| extra_weight.backward_arc_weight(self.ch, arc, &link));
                forward.chain(backward).reduce(&link).unwrap_or_default()
            })
            .collect()
    }

    /// Combined extra weights along the shortest paths from every pinned source.
    pub fn get_extra_weight_distances_to_sources<T, W, L>(&self, extra_weight: &W, link: L) -> Vec<T>
    where
        T: Default,
        W: ExtraWeight<T> + ?Sized,
        L: Fn(T, T) -> T,
    {
        assert_eq!(self.state, QueryState::SourceRun);
        let mut up_path = Vec::new();
        let mut down_path = Vec::new();

        self.pinned
            .iter()
            .map(|&source| {
                if self.backward.is_unreached_after_pinned_run(source) {
                    return T::default();
                }
                up_path.clear();
                down_path.clear();
                let meeting = self.backward.climb_sweep_predecessors(source, &self.ch.forward, |arc| up_path.push(arc));
                self.backward.walk_to_root(meeting, |arc| down_path.push(arc));

                let forward = up_path.iter().map(|&arc| extra_weight.forward_arc_weight(self.ch, arc, &link));
                let backward = down_path.iter().map(|&arc| extra_weight.backward_arc_weight(self.ch, arc, &link));
                forward.chain(backward).reduce(&link).unwrap_or_default()
            })
            .collect()
    }
}
