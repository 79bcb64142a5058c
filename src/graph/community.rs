//! Induced community graphs for structural comparison

use std::collections::HashMap;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Serialize, Deserialize};
use super::Graph;

/// Edge index representation for sparse adjacency
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeIndex {
    /// Source nodes for each edge
    pub src: Vec<usize>,
    /// Destination nodes for each edge
    pub dst: Vec<usize>,
}

impl EdgeIndex {
    /// Create from edge list
    pub fn from_edges(edges: Vec<(usize, usize)>) -> Self {
        let (src, dst): (Vec<_>, Vec<_>) = edges.into_iter().unzip();
        EdgeIndex { src, dst }
    }

    /// Get number of edges
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    /// Iterate edges as pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }
}

/// A community as a standalone labeled graph
///
/// Local node `i` stands for working-graph node `labels[i]`. Each undirected
/// edge is stored once with `src < dst`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityGraph {
    /// Number of nodes
    pub num_nodes: usize,
    /// Edge connectivity in local ids
    pub edge_index: EdgeIndex,
    /// Working-graph id of each local node
    pub labels: Vec<usize>,
}

impl CommunityGraph {
    /// Convert to a petgraph undirected graph weighted by working ids
    pub fn to_petgraph(&self) -> UnGraph<usize, ()> {
        let mut g = UnGraph::with_capacity(self.num_nodes, self.edge_index.num_edges());
        let nodes: Vec<NodeIndex> = self.labels.iter().map(|&label| g.add_node(label)).collect();
        for (s, d) in self.edge_index.iter() {
            g.add_edge(nodes[s], nodes[d], ());
        }
        g
    }

    /// Lengths of shortest paths between all connected pairs `i < j`
    pub fn shortest_path_lengths(&self) -> Vec<usize> {
        let g = self.to_petgraph();
        let mut lengths = Vec::new();
        for source in g.node_indices() {
            let dist = dijkstra(&g, source, None, |_| 1usize);
            lengths.extend(
                dist.into_iter()
                    .filter(|(target, _)| target.index() > source.index())
                    .map(|(_, d)| d),
            );
        }
        lengths
    }
}

/// Extract the subgraph of `graph` induced by `members`
///
/// Duplicate members are kept once, in first-seen order.
pub fn community_graph(graph: &Graph, members: &[usize]) -> CommunityGraph {
    let mut local: HashMap<usize, usize> = HashMap::with_capacity(members.len());
    let mut labels = Vec::with_capacity(members.len());
    for &node in members {
        local.entry(node).or_insert_with(|| {
            labels.push(node);
            labels.len() - 1
        });
    }

    let mut edges = Vec::new();
    for (i, &node) in labels.iter().enumerate() {
        for nb in graph.neighbors(node) {
            if let Some(&j) = local.get(nb) {
                if i < j {
                    edges.push((i, j));
                }
            }
        }
    }

    CommunityGraph {
        num_nodes: labels.len(),
        edge_index: EdgeIndex::from_edges(edges),
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_index() {
        let ei = EdgeIndex::from_edges(vec![(0, 1), (1, 2), (0, 2)]);
        assert_eq!(ei.num_edges(), 3);
        assert_eq!(ei.iter().nth(1), Some((1, 2)));
    }

    #[test]
    fn test_community_graph_is_induced() {
        let graph = Graph::from_edges(&[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]).unwrap();
        let community = community_graph(&graph, &[2, 0, 1, 0]);

        assert_eq!(community.num_nodes, 3);
        assert_eq!(community.labels, vec![2, 0, 1]);
        assert_eq!(community.edge_index.num_edges(), 3);
    }

    #[test]
    fn test_shortest_path_lengths() {
        let graph = Graph::from_edges(&[(0, 1), (1, 2), (2, 3)]).unwrap();
        let community = community_graph(&graph, &[0, 1, 2, 3]);
        let mut lengths = community.shortest_path_lengths();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![1, 1, 1, 2, 2, 3]);

        // Disconnected pairs are absent
        let split = community_graph(&graph, &[0, 1, 3]);
        assert_eq!(split.shortest_path_lengths(), vec![1]);
    }
}
