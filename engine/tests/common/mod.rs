#![allow(dead_code)]

use rand::{prelude::*, rngs::StdRng};
use road_hierarchies::{algo::dijkstra::Dijkstra, datastr::graph::*};

/// Arc list of a test graph. May contain loops and parallel arcs.
pub struct ArcList {
    pub node_count: usize,
    pub tail: Vec<NodeId>,
    pub head: Vec<NodeId>,
    pub weight: Vec<Weight>,
}

impl ArcList {
    pub fn random(rng: &mut StdRng, node_count: usize, arc_count: usize, max_weight: Weight) -> ArcList {
        let mut arcs = ArcList {
            node_count,
            tail: Vec::with_capacity(arc_count),
            head: Vec::with_capacity(arc_count),
            weight: Vec::with_capacity(arc_count),
        };
        for _ in 0..arc_count {
            arcs.tail.push(rng.gen_range(0..node_count as NodeId));
            arcs.head.push(rng.gen_range(0..node_count as NodeId));
            arcs.weight.push(rng.gen_range(1..=max_weight));
        }
        arcs
    }

    // eight nodes, two loosely connected clusters
    pub fn eight_nodes() -> ArcList {
        ArcList {
            node_count: 8,
            tail: vec![0, 1, 1, 1, 2, 3, 4, 4, 4, 5, 6, 6, 6, 7, 7, 7],
            head: vec![4, 5, 6, 7, 6, 7, 0, 6, 7, 1, 1, 2, 4, 1, 3, 4],
            weight: vec![2, 2, 2, 2, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1],
        }
    }

    pub fn graph(&self) -> OwnedGraph {
        self.graph_with_weights(&self.weight)
    }

    pub fn graph_with_weights(&self, weight: &[Weight]) -> OwnedGraph {
        OwnedGraph::from_arcs(self.node_count, &self.tail, &self.head, weight)
    }
}

/// Distances between all pairs of nodes, `result[s][t]`.
pub fn all_pairs_distances(graph: &OwnedGraph) -> Vec<Vec<Weight>> {
    let mut dijkstra = Dijkstra::new(graph);
    (0..graph.num_nodes() as NodeId).map(|source| dijkstra.one_to_all(source)).collect()
}

pub fn random_order(rng: &mut StdRng, node_count: usize) -> Vec<NodeId> {
    let mut order: Vec<NodeId> = (0..node_count as NodeId).collect();
    order.shuffle(rng);
    order
}

/// Checks that the arcs form a contiguous path from `source` to `target` of the given length
/// and that it visits exactly the nodes of `node_path`.
pub fn assert_valid_path(arcs: &ArcList, weight: &[Weight], source: NodeId, target: NodeId, distance: Weight, arc_path: &[EdgeId], node_path: &[NodeId]) {
    assert_eq!(node_path.first(), Some(&source));
    assert_eq!(node_path.last(), Some(&target));
    assert_eq!(node_path.len(), arc_path.len() + 1);

    let mut length = 0;
    for (i, &arc) in arc_path.iter().enumerate() {
        assert_eq!(arcs.tail[arc as usize], node_path[i]);
        assert_eq!(arcs.head[arc as usize], node_path[i + 1]);
        length += weight[arc as usize];
    }
    assert_eq!(length, distance);
}
