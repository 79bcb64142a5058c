//! Adjacency graph over contiguous node ids
//!
//! The working graph of a detection run is a relabeled k-ego subgraph of the dataset
//! graph. It keeps a read-only handle to that parent so generation can pull in nodes
//! that were outside the initial subgraph.

mod registry;
mod community;

pub use registry::NodeRegistry;
pub use community::{CommunityGraph, EdgeIndex, community_graph};

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use rand::Rng;
use rand::seq::SliceRandom;
use sprs::{CsMat, TriMat};
use crate::{Result, SeedGrowError};

static NO_NEIGHBORS: BTreeSet<usize> = BTreeSet::new();

/// Why a community walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkTermination {
    /// Every member was visited
    Covered,
    /// No unvisited member was adjacent to the visited set
    Disconnected,
}

/// One ordering of a community produced by a confined random walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityWalk {
    /// Visit order, starting with the start node
    pub order: Vec<usize>,
    /// Reason the walk stopped
    pub termination: WalkTermination,
}

impl CommunityWalk {
    /// Whether all members were reached
    pub fn is_complete(&self) -> bool {
        self.termination == WalkTermination::Covered
    }
}

/// Undirected simple graph on node ids `0..n`
///
/// - `neighbors` is symmetric and has no self-loops
/// - `degree` and `adjacency` are always rebuilt from `neighbors`
/// - the graph only grows; `version` increases on every mutation
#[derive(Clone, Debug)]
pub struct Graph {
    /// Neighbour table indexed by node id
    neighbors: Vec<BTreeSet<usize>>,
    /// Degree of each node
    degree: Vec<usize>,
    /// Symmetric 0/1 adjacency in CSR form
    adjacency: CsMat<f32>,
    /// Mutation counter
    version: u64,
    /// Graph this one was extracted from
    parent: Option<Arc<Graph>>,
}

impl Graph {
    /// Build a graph from an edge list
    ///
    /// Self-loops are dropped. Fails unless the touched node ids are exactly `0..n`.
    pub fn from_edges(edges: &[(usize, usize)]) -> Result<Self> {
        let mut table: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut max_id: Option<usize> = None;

        for &(u, v) in edges {
            max_id = Some(max_id.map_or(u.max(v), |m| m.max(u).max(v)));
            if u != v {
                table.entry(u).or_default().insert(v);
                table.entry(v).or_default().insert(u);
            }
        }

        let n_nodes = table.len();
        let expected = max_id.map_or(0, |m| m + 1);
        if expected != n_nodes {
            return Err(SeedGrowError::Labeling(format!(
                "max id + 1 is {} but {} distinct nodes have edges; re-label nodes first",
                expected, n_nodes
            )));
        }

        // Keys are exactly 0..n, so values come out in id order
        Ok(Graph::from_neighbors(table.into_values().collect()))
    }

    /// Build a graph from a symmetric neighbour table
    pub(crate) fn from_neighbors(neighbors: Vec<BTreeSet<usize>>) -> Self {
        let degree = neighbors.iter().map(BTreeSet::len).collect();
        let adjacency = build_adjacency(&neighbors);
        Graph {
            neighbors,
            degree,
            adjacency,
            version: 0,
            parent: None,
        }
    }

    /// Number of nodes
    pub fn n_nodes(&self) -> usize {
        self.neighbors.len()
    }

    /// Number of undirected edges
    pub fn n_edges(&self) -> usize {
        self.degree.iter().sum::<usize>() / 2
    }

    /// Whether `node` is a valid id
    pub fn contains(&self, node: usize) -> bool {
        node < self.neighbors.len()
    }

    /// Neighbours of a node (empty for unknown ids)
    pub fn neighbors(&self, node: usize) -> &BTreeSet<usize> {
        self.neighbors.get(node).unwrap_or(&NO_NEIGHBORS)
    }

    /// Degree of a node (0 for unknown ids)
    pub fn degree(&self, node: usize) -> usize {
        self.degree.get(node).copied().unwrap_or(0)
    }

    /// Symmetric adjacency matrix
    pub fn adjacency(&self) -> &CsMat<f32> {
        &self.adjacency
    }

    /// Mutation counter, used to detect stale features
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Attach the graph this one was extracted from
    pub fn set_parent(&mut self, parent: Arc<Graph>) {
        self.parent = Some(parent);
    }

    /// Graph this one was extracted from
    pub fn parent(&self) -> Option<&Arc<Graph>> {
        self.parent.as_ref()
    }

    /// Nodes adjacent to `nodes` but not in it
    pub fn outer_boundary<'a, I>(&self, nodes: I) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = &'a usize>,
    {
        let members: BTreeSet<usize> = nodes.into_iter().copied().collect();
        let mut boundary = BTreeSet::new();
        for &u in &members {
            boundary.extend(self.neighbors(u).iter().copied());
        }
        boundary.retain(|v| !members.contains(v));
        boundary
    }

    /// Expand `nodes` by `k` boundary rounds
    pub fn k_ego<'a, I>(&self, nodes: I, k: usize) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = &'a usize>,
    {
        let mut ego: BTreeSet<usize> = nodes.into_iter().copied().collect();
        let mut frontier = ego.clone();

        for _ in 0..k {
            let mut next = self.outer_boundary(&frontier);
            next.retain(|v| !ego.contains(v));
            if next.is_empty() {
                break;
            }
            ego.extend(next.iter().copied());
            frontier = next;
        }

        ego
    }

    /// Extract the k-ego of `nodes` as a standalone graph with ids `0..|ego|`
    ///
    /// New ids follow ascending old id. Returns the old -> new mapping.
    pub fn extract_relabeled_subgraph<'a, I>(&self, nodes: I, k: usize) -> (Graph, HashMap<usize, usize>)
    where
        I: IntoIterator<Item = &'a usize>,
    {
        let ego = self.k_ego(nodes, k);
        let mapping: HashMap<usize, usize> = ego
            .iter()
            .enumerate()
            .map(|(new_id, &old_id)| (old_id, new_id))
            .collect();

        let neighbors = ego
            .iter()
            .map(|&old_id| {
                self.neighbors(old_id)
                    .iter()
                    .filter_map(|nb| mapping.get(nb).copied())
                    .collect()
            })
            .collect();

        (Graph::from_neighbors(neighbors), mapping)
    }

    /// Order `members` by a random walk confined to their induced subgraph
    ///
    /// Each step picks a uniformly random unvisited member adjacent to the visited
    /// set. Stops early with [`WalkTermination::Disconnected`] when none is left.
    pub fn sample_walk_through_community<R: Rng + ?Sized>(
        &self,
        members: &[usize],
        start: Option<usize>,
        rng: &mut R,
    ) -> Result<CommunityWalk> {
        let start = match start {
            Some(s) => s,
            None => *members.choose(rng).ok_or_else(|| {
                SeedGrowError::Precondition("cannot walk an empty community".to_string())
            })?,
        };

        let mut remaining: BTreeSet<usize> = members.iter().copied().collect();
        remaining.remove(&start);
        let mut frontier = self.neighbors(start).clone();
        let mut order = vec![start];

        while !remaining.is_empty() {
            let candidates: Vec<usize> = frontier.intersection(&remaining).copied().collect();
            let Some(&next) = candidates.choose(rng) else {
                return Ok(CommunityWalk {
                    order,
                    termination: WalkTermination::Disconnected,
                });
            };
            remaining.remove(&next);
            frontier.extend(self.neighbors(next).iter().copied());
            order.push(next);
        }

        Ok(CommunityWalk {
            order,
            termination: WalkTermination::Covered,
        })
    }

    /// Insert nodes and edges; each key gains its listed neighbours symmetrically
    ///
    /// Ids at or above `n_nodes()` must form the contiguous range `n..n + new`.
    /// Re-inserting existing edges is a no-op.
    pub fn add_nodes_with_neighbors(&mut self, additions: &BTreeMap<usize, BTreeSet<usize>>) -> Result<()> {
        let n = self.n_nodes();
        let mut new_ids = BTreeSet::new();
        for (&node, nbs) in additions {
            new_ids.extend(std::iter::once(node).chain(nbs.iter().copied()).filter(|&id| id >= n));
        }

        let n_total = n + new_ids.len();
        if let Some(&max_id) = new_ids.iter().next_back() {
            if max_id >= n_total {
                return Err(SeedGrowError::Labeling(format!(
                    "new node {} leaves a gap after {} existing and {} new nodes",
                    max_id,
                    n,
                    new_ids.len()
                )));
            }
        }

        self.neighbors.resize_with(n_total, BTreeSet::new);
        for (&node, nbs) in additions {
            for &nb in nbs {
                if nb == node {
                    continue;
                }
                self.neighbors[node].insert(nb);
                self.neighbors[nb].insert(node);
            }
        }

        self.degree = self.neighbors.iter().map(BTreeSet::len).collect();
        self.adjacency = build_adjacency(&self.neighbors);
        self.version += 1;
        Ok(())
    }

    /// Whether the subgraph induced by `members` is connected
    pub fn is_connected_within(&self, members: &[usize]) -> bool {
        let member_set: BTreeSet<usize> = members.iter().copied().collect();
        let Some(&first) = member_set.iter().next() else {
            return false;
        };

        let mut visited = BTreeSet::from([first]);
        let mut queue = VecDeque::from([first]);
        while let Some(u) = queue.pop_front() {
            for &v in self.neighbors(u) {
                if member_set.contains(&v) && visited.insert(v) {
                    queue.push_back(v);
                }
            }
        }

        visited.len() == member_set.len()
    }
}

/// Build a CSR 0/1 adjacency from a neighbour table
fn build_adjacency(neighbors: &[BTreeSet<usize>]) -> CsMat<f32> {
    let n = neighbors.len();
    let nnz = neighbors.iter().map(BTreeSet::len).sum();
    let mut triplets = TriMat::with_capacity((n, n), nnz);
    for (u, nbs) in neighbors.iter().enumerate() {
        for &v in nbs {
            triplets.add_triplet(u, v, 1.0);
        }
    }
    triplets.to_csr()
}
