//! Queries on a customized CCH metric.
//!
//! No priority queue is needed: the upward search space of a node is exactly its path to the root of the elimination tree,
//! and relaxing the nodes on that path bottom up settles them in a valid order.
//! Several sources (or targets) share the upper parts of their paths, each root only walks up
//! to the first node already claimed by an earlier root.
//!
//! ```
//! use road_hierarchies::algo::customizable_contraction_hierarchy::*;
//!
//! let cch = CustomizableContractionHierarchy::new(&[0, 1, 2], &[0, 1], &[1, 2], None, false).unwrap();
//! let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[3, 4]);
//! metric.customize();
//!
//! let mut query = CustomizableContractionHierarchyQuery::new(&metric);
//! query.add_source(0, 0).add_target(2, 0).run();
//! assert_eq!(query.get_distance(), 7);
//! assert_eq!(query.get_node_path(), vec![0, 1, 2]);
//! ```

use super::{CustomizableContractionHierarchy, CustomizableContractionHierarchyMetric};
use crate::{
    datastr::{graph::*, rank_select_map::BitVec},
    util::find_arc_given_sorted_head,
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
// `roots[i]` climbs the elimination tree up to, but excluding, `root_end[i]`.
// All these segments together are the search space, each node is on exactly one segment.
#[derive(Debug)]
struct SearchSpace {
    distance: Vec<Weight>,
    predecessor: Vec<NodeId>,
    in_search_space: BitVec,
    roots: Vec<NodeId>,
    root_end: Vec<NodeId>,
}

impl SearchSpace {
    fn new(node_count: usize) -> SearchSpace {
        SearchSpace {
            distance: vec![INFINITY; node_count],
            predecessor: vec![INVALID_ID; node_count],
            in_search_space: BitVec::new(node_count),
            roots: Vec::new(),
            root_end: Vec::new(),
        }
    }

    // Claim all unclaimed nodes on the path to the root, returns the first already claimed one.
    fn claim_path(&mut self, parent: &[NodeId], mut node: NodeId) -> NodeId {
        while node != INVALID_ID {
            if self.in_search_space.get(node as usize) {
                return node;
            }
            self.in_search_space.set(node as usize);
            node = parent[node as usize];
        }
        INVALID_ID
    }

    fn add_root(&mut self, parent: &[NodeId], node: NodeId, distance: Weight) {
        let idx = node as usize;
        if self.distance[idx] == INFINITY {
            self.distance[idx] = distance;
            self.predecessor[idx] = INVALID_ID;
            self.roots.push(node);
            let end = self.claim_path(parent, node);
            self.root_end.push(end);
        } else if distance < self.distance[idx] {
            self.distance[idx] = distance;
        }
    }

    fn pin(&mut self, parent: &[NodeId], nodes: impl Iterator<Item = NodeId>) {
        for node in nodes {
            self.roots.push(node);
            let end = self.claim_path(parent, node);
            self.root_end.push(end);
        }
    }

    fn for_each_node(&self, parent: &[NodeId], mut f: impl FnMut(NodeId)) {
        for (&root, &end) in self.roots.iter().zip(&self.root_end) {
            let mut node = root;
            while node != end {
                f(node);
                node = parent[node as usize];
            }
        }
    }

    // Relax the up arcs of all nodes in the search space, later roots first and every segment bottom up.
    // `on_node` sees every node once its distance is final.
    fn relax_upward(&mut self, cch: &CustomizableContractionHierarchy, weight: &[Weight], mut on_node: impl FnMut(NodeId, Weight)) {
        let parent = &cch.elimination_tree_parent;
        for i in (0..self.roots.len()).rev() {
            let mut node = self.roots[i];
            while node != self.root_end[i] {
                let distance_to_node = self.distance[node as usize];
                for arc in cch.up_range(node) {
                    let head = cch.up_head[arc] as usize;
                    let distance = distance_to_node + weight[arc];
                    if distance < self.distance[head] {
                        self.distance[head] = distance;
                        self.predecessor[head] = node;
                    }
                }
                on_node(node, distance_to_node);
                node = parent[node as usize];
            }
        }
    }

    fn reset_roots(&mut self, parent: &[NodeId]) {
        for (&root, &end) in self.roots.iter().zip(&self.root_end) {
            let mut node = root;
            while node != end {
                self.in_search_space.unset(node as usize);
                self.distance[node as usize] = INFINITY;
                node = parent[node as usize];
            }
        }
        self.roots.clear();
        self.root_end.clear();
    }

    fn walk_to_root(&self, mut node: NodeId) -> NodeId {
        while self.predecessor[node as usize] != INVALID_ID {
            node = self.predecessor[node as usize];
        }
        node
    }
}

// After the upward search of the free side, pull distances down into the search space of the pinned side.
// Nodes are processed top down, so all up neighbors of a node are final when it is processed.
fn sweep_pinned_search_space(
    cch: &CustomizableContractionHierarchy,
    weight: &[Weight],
    distance: &mut [Weight],
    pinned: &SearchSpace,
    stack: &mut Vec<NodeId>,
) {
    stack.clear();
    for i in (0..pinned.roots.len()).rev() {
        let mut node = pinned.roots[i];
        while node != pinned.root_end[i] {
            stack.push(node);
            node = cch.elimination_tree_parent[node as usize];
        }
    }

    while let Some(node) = stack.pop() {
        for arc in cch.up_range(node) {
            let candidate = distance[cch.up_head[arc] as usize] + weight[arc];
            if candidate < distance[node as usize] {
                distance[node as usize] = candidate;
            }
        }
    }
}

// Reset distances written by a sweep over another side's search space.
fn reset_swept_distances(parent: &[NodeId], pinned: &SearchSpace, distance: &mut [Weight]) {
    pinned.for_each_node(parent, |node| distance[node as usize] = INFINITY);
}

#[derive(Debug)]
pub struct CustomizableContractionHierarchyQuery<'a> {
    cch: &'a CustomizableContractionHierarchy,
    metric: &'a CustomizableContractionHierarchyMetric<'a>,
    forward: SearchSpace,
    backward: SearchSpace,
    meeting_node: NodeId,
    stack: Vec<NodeId>,
    state: QueryState,
}

impl<'a> CustomizableContractionHierarchyQuery<'a> {
    /// Create a query on a customized metric.
    pub fn new(metric: &'a CustomizableContractionHierarchyMetric<'a>) -> Self {
        let cch = metric.cch();
        let node_count = cch.node_count();
        CustomizableContractionHierarchyQuery {
            cch,
            metric,
            forward: SearchSpace::new(node_count),
            backward: SearchSpace::new(node_count),
            meeting_node: INVALID_ID,
            stack: Vec::new(),
            state: QueryState::Initialized,
        }
    }

    /// Forget all sources, targets and pinned nodes.
    pub fn reset(&mut self) -> &mut Self {
        let parent = &self.cch.elimination_tree_parent;
        match self.state {
            QueryState::TargetPinned | QueryState::TargetRun => reset_swept_distances(parent, &self.backward, &mut self.forward.distance),
            QueryState::SourcePinned | QueryState::SourceRun => reset_swept_distances(parent, &self.forward, &mut self.backward.distance),
            QueryState::Initialized | QueryState::Run => (),
        }
        self.forward.reset_roots(parent);
        self.backward.reset_roots(parent);
        self.meeting_node = INVALID_ID;
        self.state = QueryState::Initialized;
        self
    }

    /// Attach another metric. The workspace is reused if the metric belongs to the same CCH.
    pub fn reset_with(&mut self, metric: &'a CustomizableContractionHierarchyMetric<'a>) -> &mut Self {
        if std::ptr::eq(self.cch, metric.cch()) {
            self.reset();
            self.metric = metric;
        } else {
            *self = Self::new(metric);
        }
        self
    }

    /// Add a source with an initial distance offset. Possible before `run` and after pinning targets.
    pub fn add_source(&mut self, node: NodeId, distance: Weight) -> &mut Self {
        assert!((node as usize) < self.cch.node_count(), "node out of bounds");
        assert!(matches!(self.state, QueryState::Initialized | QueryState::TargetPinned));
        self.forward.add_root(&self.cch.elimination_tree_parent, self.cch.rank[node as usize], distance);
        self
    }

    /// Add a target with an initial distance offset. Possible before `run` and after pinning sources.
    pub fn add_target(&mut self, node: NodeId, distance: Weight) -> &mut Self {
        assert!((node as usize) < self.cch.node_count(), "node out of bounds");
        assert!(matches!(self.state, QueryState::Initialized | QueryState::SourcePinned));
        self.backward.add_root(&self.cch.elimination_tree_parent, self.cch.rank[node as usize], distance);
        self
    }

    /// Run the elimination tree search. Requires at least one source and one target.
    pub fn run(&mut self) -> &mut Self {
        assert_eq!(self.state, QueryState::Initialized);
        assert!(!self.forward.roots.is_empty(), "must add at least one source before calling run");
        assert!(!self.backward.roots.is_empty(), "must add at least one target before calling run");

        self.forward.relax_upward(self.cch, self.metric.forward(), |_, _| ());

        let forward = &self.forward;
        let mut best = (INFINITY, INVALID_ID);
        self.backward.relax_upward(self.cch, self.metric.backward(), |node, distance| {
            if forward.in_search_space.get(node as usize) {
                let total = forward.distance[node as usize] + distance;
                if total < best.0 {
                    best = (total, node);
                }
            }
        });

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
            self.forward.distance[meeting] + self.backward.distance[meeting]
        }
    }

    /// The source at which the shortest path starts, `INVALID_ID` if there is none.
    pub fn get_used_source(&self) -> NodeId {
        assert_eq!(self.state, QueryState::Run);
        if self.meeting_node == INVALID_ID {
            return INVALID_ID;
        }
        self.cch.order[self.forward.walk_to_root(self.meeting_node) as usize]
    }

    /// The target at which the shortest path ends, `INVALID_ID` if there is none.
    pub fn get_used_target(&self) -> NodeId {
        assert_eq!(self.state, QueryState::Run);
        if self.meeting_node == INVALID_ID {
            return INVALID_ID;
        }
        self.cch.order[self.backward.walk_to_root(self.meeting_node) as usize]
    }

    // Unpack a CCH arc into path segments, each given as (first node, cch arc, direction).
    // A forward arc x -> y is explained by a lower triangle x -> z -> y, a backward arc y -> x by y -> z -> x.
    // Arcs without a fitting triangle carry the weight of an input arc.
    fn unpack_arc(&self, forward: bool, arc: EdgeId, on_segment: &mut impl FnMut(NodeId, EdgeId, bool)) {
        let (cch, metric) = (self.cch, self.metric);
        let (forward_weight, backward_weight) = (metric.forward(), metric.backward());
        let mut stack = vec![(forward, arc)];

        while let Some((forward, arc)) = stack.pop() {
            let mut triangle = None;
            cch.for_each_lower_triangle_of_arc(arc, |t| {
                let (bottom, mid) = (t.bottom_arc as usize, t.mid_arc as usize);
                let fits = if forward {
                    forward_weight[arc as usize] == backward_weight[bottom] + forward_weight[mid]
                } else {
                    backward_weight[arc as usize] == forward_weight[bottom] + backward_weight[mid]
                };
                if fits {
                    triangle = Some(t);
                }
                !fits
            });

            match triangle {
                // pushed in reverse, so the first half of the path pops first
                Some(t) if forward => {
                    stack.push((true, t.mid_arc));
                    stack.push((false, t.bottom_arc));
                }
                Some(t) => {
                    stack.push((true, t.bottom_arc));
                    stack.push((false, t.mid_arc));
                }
                None if forward => on_segment(cch.up_tail[arc as usize], arc, true),
                None => on_segment(cch.up_head[arc as usize], arc, false),
            }
        }
    }

    // Calls `on_segment` for every unpacked segment in path order, returns the last node of the path.
    fn unpack_shortest_path(&self, mut on_segment: impl FnMut(NodeId, EdgeId, bool)) -> Option<NodeId> {
        if self.meeting_node == INVALID_ID {
            return None;
        }
        let cch = self.cch;

        let mut up_path = vec![self.meeting_node];
        let mut node = self.meeting_node;
        while self.forward.predecessor[node as usize] != INVALID_ID {
            node = self.forward.predecessor[node as usize];
            up_path.push(node);
        }
        for pair in up_path.windows(2).rev() {
            let arc = find_arc_given_sorted_head(&cch.up_first_out, &cch.up_head, pair[1], pair[0]);
            self.unpack_arc(true, arc, &mut on_segment);
        }

        let mut node = self.meeting_node;
        let mut next = self.backward.predecessor[node as usize];
        while next != INVALID_ID {
            let arc = find_arc_given_sorted_head(&cch.up_first_out, &cch.up_head, next, node);
            self.unpack_arc(false, arc, &mut on_segment);
            node = next;
            next = self.backward.predecessor[node as usize];
        }
        Some(node)
    }

    /// Input node ids along the shortest path including source and target, empty if there is none.
    pub fn get_node_path(&self) -> Vec<NodeId> {
        assert_eq!(self.state, QueryState::Run);
        let order = &self.cch.order;
        let mut path = Vec::new();
        if let Some(last) = self.unpack_shortest_path(|node, _, _| path.push(order[node as usize])) {
            path.push(order[last as usize]);
        }
        path
    }

    /// Input arc ids along the shortest path, empty if there is none.
    pub fn get_arc_path(&self) -> Vec<EdgeId> {
        assert_eq!(self.state, QueryState::Run);
        let metric = self.metric;
        let mut path = Vec::new();
        self.unpack_shortest_path(|_, arc, forward| {
            let input_arc = metric.original_arc(arc, forward);
            debug_assert!(input_arc.is_some(), "cch arc {} has no input arc of the same weight", arc);
            path.extend(input_arc);
        });
        path
    }

    /// Drop the sources but keep the pinned targets.
    pub fn reset_source(&mut self) -> &mut Self {
        assert!(matches!(self.state, QueryState::TargetPinned | QueryState::TargetRun));
        let parent = &self.cch.elimination_tree_parent;
        self.forward.reset_roots(parent);
        reset_swept_distances(parent, &self.backward, &mut self.forward.distance);
        self.state = QueryState::TargetPinned;
        self
    }

    /// Drop the targets but keep the pinned sources.
    pub fn reset_target(&mut self) -> &mut Self {
        assert!(matches!(self.state, QueryState::SourcePinned | QueryState::SourceRun));
        let parent = &self.cch.elimination_tree_parent;
        self.backward.reset_roots(parent);
        reset_swept_distances(parent, &self.forward, &mut self.backward.distance);
        self.state = QueryState::SourcePinned;
        self
    }

    /// Fix the targets for many one-to-many queries. Sources are added afterwards.
    pub fn pin_targets(&mut self, targets: &[NodeId]) -> &mut Self {
        assert_eq!(self.state, QueryState::Initialized);
        assert!(targets.iter().all(|&node| (node as usize) < self.cch.node_count()), "node out of bounds");
        let cch = self.cch;
        self.backward
            .pin(&cch.elimination_tree_parent, targets.iter().map(|&node| cch.rank[node as usize]));
        self.state = QueryState::TargetPinned;
        self
    }

    /// Fix the sources for many many-to-one queries. Targets are added afterwards.
    pub fn pin_sources(&mut self, sources: &[NodeId]) -> &mut Self {
        assert_eq!(self.state, QueryState::Initialized);
        assert!(sources.iter().all(|&node| (node as usize) < self.cch.node_count()), "node out of bounds");
        let cch = self.cch;
        self.forward
            .pin(&cch.elimination_tree_parent, sources.iter().map(|&node| cch.rank[node as usize]));
        self.state = QueryState::SourcePinned;
        self
    }

    pub fn run_to_pinned_targets(&mut self) -> &mut Self {
        assert_eq!(self.state, QueryState::TargetPinned);
        assert!(!self.forward.roots.is_empty(), "must add at least one source before calling run");
        self.forward.relax_upward(self.cch, self.metric.forward(), |_, _| ());
        sweep_pinned_search_space(self.cch, self.metric.backward(), &mut self.forward.distance, &self.backward, &mut self.stack);
        self.state = QueryState::TargetRun;
        self
    }

    pub fn run_to_pinned_sources(&mut self) -> &mut Self {
        assert_eq!(self.state, QueryState::SourcePinned);
        assert!(!self.backward.roots.is_empty(), "must add at least one target before calling run");
        self.backward.relax_upward(self.cch, self.metric.backward(), |_, _| ());
        sweep_pinned_search_space(self.cch, self.metric.forward(), &mut self.backward.distance, &self.forward, &mut self.stack);
        self.state = QueryState::SourceRun;
        self
    }

    /// Distances to the pinned targets in the order they were pinned.
    pub fn get_distances_to_targets(&self) -> Vec<Weight> {
        let mut distances = vec![INFINITY; self.backward.roots.len()];
        self.get_distances_to_targets_into(&mut distances);
        distances
    }

    pub fn get_distances_to_targets_into(&self, distances: &mut [Weight]) {
        assert_eq!(self.state, QueryState::TargetRun);
        for (distance, &target) in distances.iter_mut().zip(&self.backward.roots) {
            *distance = self.forward.distance[target as usize];
        }
    }

    /// Distances from the pinned sources in the order they were pinned.
    pub fn get_distances_to_sources(&self) -> Vec<Weight> {
        let mut distances = vec![INFINITY; self.forward.roots.len()];
        self.get_distances_to_sources_into(&mut distances);
        distances
    }

    pub fn get_distances_to_sources_into(&self, distances: &mut [Weight]) {
        assert_eq!(self.state, QueryState::SourceRun);
        for (distance, &source) in distances.iter_mut().zip(&self.forward.roots) {
            *distance = self.backward.distance[source as usize];
        }
    }
}
