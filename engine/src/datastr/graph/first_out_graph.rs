//! Goto static graph representation for route planning algorithms.
//!
//! We store the graph as an adjacency array using three collections: `first_out`, `head` and `weight`.
//! `head` and `weight` have each `m` elements, `first_out` has `n+1` elements.
//! `head[first_out[x]..first_out[x+1]]` contains all neighbors of `x`.

use super::*;
use crate::util::inverse_vector;
use std::ops::Range;

/// Container struct for the three collections of a graph.
/// Generic over the containers, so both owned and borrowed data works.
#[derive(Debug, Clone)]
pub struct FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer> {
    // index of first edge of each node +1 entry in the end
    first_out: FirstOutContainer,
    // the node ids to which each edge points
    head: HeadContainer,
    // the weight of each edge
    weight: WeightContainer,
}

pub type OwnedGraph = FirstOutGraph<Vec<EdgeId>, Vec<NodeId>, Vec<Weight>>;

impl<FirstOutContainer, HeadContainer, WeightContainer> FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    pub fn first_out(&self) -> &[EdgeId] {
        self.first_out.as_ref()
    }

    pub fn head(&self) -> &[NodeId] {
        self.head.as_ref()
    }

    pub fn weight(&self) -> &[Weight] {
        self.weight.as_ref()
    }

    /// Create a new `FirstOutGraph` from the three containers.
    pub fn new(first_out: FirstOutContainer, head: HeadContainer, weight: WeightContainer) -> Self {
        assert!(!first_out.as_ref().is_empty());
        assert!(first_out.as_ref().len() < <NodeId>::MAX as usize);
        assert!(head.as_ref().len() < <EdgeId>::MAX as usize);
        assert_eq!(first_out.as_ref()[0], 0);
        assert_eq!(*first_out.as_ref().last().unwrap_or(&0) as usize, head.as_ref().len());
        assert_eq!(weight.as_ref().len(), head.as_ref().len());

        FirstOutGraph { first_out, head, weight }
    }

    /// Decompose the graph into its three seperate data containers
    pub fn decompose(self) -> (FirstOutContainer, HeadContainer, WeightContainer) {
        (self.first_out, self.head, self.weight)
    }

    #[inline]
    pub fn neighbor_edge_indices(&self, node: NodeId) -> Range<usize> {
        (self.first_out()[node as usize] as usize)..(self.first_out()[node as usize + 1] as usize)
    }
}

impl OwnedGraph {
    /// Build an adjacency array from an arc list.
    /// Arcs are grouped by tail, the relative order of arcs with the same tail is kept.
    pub fn from_arcs(node_count: usize, tail: &[NodeId], head: &[NodeId], weight: &[Weight]) -> OwnedGraph {
        assert_eq!(tail.len(), head.len());
        assert_eq!(tail.len(), weight.len());

        let mut arcs: Vec<usize> = (0..tail.len()).collect();
        arcs.sort_by_key(|&arc| tail[arc]);
        let sorted_tail: Vec<NodeId> = arcs.iter().map(|&arc| tail[arc]).collect();

        OwnedGraph::new(
            inverse_vector(&sorted_tail, node_count),
            arcs.iter().map(|&arc| head[arc]).collect(),
            arcs.iter().map(|&arc| weight[arc]).collect(),
        )
    }

    /// Build the graph with all arcs reversed.
    pub fn reversed(&self) -> OwnedGraph {
        let mut reversed: Vec<Vec<Link>> = (0..self.num_nodes()).map(|_| Vec::new()).collect();

        // iterate over all edges and insert them in the reversed structure
        for node in 0..(self.num_nodes() as NodeId) {
            for Link { node: neighbor, weight } in self.link_iter(node) {
                reversed[neighbor as usize].push(Link { node, weight });
            }
        }

        Self::from_adjancecy_lists(reversed)
    }

    pub fn from_adjancecy_lists(adjancecy_lists: Vec<Vec<Link>>) -> OwnedGraph {
        // create first_out array by doing a prefix sum over the adjancecy list sizes
        let first_out = {
            let degrees = adjancecy_lists.iter().map(|neighbors| neighbors.len() as EdgeId);
            degrees_to_first_out(degrees).collect()
        };

        // append all adjancecy list and split the pairs into two seperate vectors
        let (head, weight) = adjancecy_lists
            .into_iter()
            .flat_map(|neighbors| neighbors.into_iter().map(|Link { node, weight }| (node, weight)))
            .unzip();

        OwnedGraph::new(first_out, head, weight)
    }
}

impl<FirstOutContainer, HeadContainer, WeightContainer> Graph for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    fn num_nodes(&self) -> usize {
        self.first_out().len() - 1
    }

    fn num_arcs(&self) -> usize {
        self.head().len()
    }

    fn degree(&self, node: NodeId) -> usize {
        let node = node as usize;
        (self.first_out()[node + 1] - self.first_out()[node]) as usize
    }
}

impl<FirstOutContainer, HeadContainer, WeightContainer> LinkIterable<Link> for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    #[allow(clippy::type_complexity)]
    type Iter<'a> = std::iter::Map<std::iter::Zip<std::slice::Iter<'a, NodeId>, std::slice::Iter<'a, Weight>>, fn((&NodeId, &Weight)) -> Link>
    where
        Self: 'a;

    #[inline]
    fn link_iter(&self, node: NodeId) -> Self::Iter<'_> {
        let range = self.neighbor_edge_indices(node);
        self.head()[range.clone()]
            .iter()
            .zip(self.weight()[range].iter())
            .map(|(&neighbor, &weight)| Link { node: neighbor, weight })
    }
}

/// Prefix sum over node degrees, yielding `n+1` first out values.
pub fn degrees_to_first_out<I: Iterator<Item = EdgeId>>(degrees: I) -> impl Iterator<Item = EdgeId> {
    std::iter::once(0).chain(degrees.scan(0, |state, degree| {
        *state += degree as EdgeId;
        Some(*state)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversal() {
        //
        //                  7
        //          +-----------------+
        //          |                 |
        //          v   1        2    |  2
        //          0 -----> 1 -----> 3 ---> 4
        //          |        ^        ^      ^
        //          |        | 1      |      |
        //          |        |        | 3    | 1
        //          +------> 2 -------+      |
        //           10      |               |
        //                   +---------------+
        //
        let graph = OwnedGraph::new(vec![0, 2, 3, 6, 8, 8, 8], vec![2, 1, 3, 1, 3, 4, 0, 4], vec![10, 1, 2, 1, 3, 1, 7, 2]);
        let expected = OwnedGraph::new(vec![0, 1, 3, 4, 6, 8, 8], vec![3, 0, 2, 0, 1, 2, 2, 3], vec![7, 1, 1, 10, 2, 3, 1, 2]);
        let reversed = graph.reversed();

        assert_eq!(reversed.first_out(), expected.first_out());
        assert_eq!(reversed.head(), expected.head());
        assert_eq!(reversed.weight(), expected.weight());
    }

    #[test]
    fn from_arcs_groups_by_tail() {
        let graph = OwnedGraph::from_arcs(4, &[2, 0, 2, 1], &[3, 1, 0, 2], &[5, 6, 7, 8]);
        assert_eq!(graph.first_out(), &[0, 1, 2, 4, 4]);
        assert_eq!(graph.head(), &[1, 2, 3, 0]);
        assert_eq!(graph.weight(), &[6, 8, 5, 7]);
        assert_eq!(graph.neighbor_edge_indices(2), 2..4);
        assert!(graph.neighbor_edge_indices(3).is_empty());
    }
}
