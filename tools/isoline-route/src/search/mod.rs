//! Cost-search trees
//!
//! A [`SearchTree`] is the result of a one-to-many shortest-path search
//! rooted at the query location: one [`TreeEntry`] per reached node, each
//! pointing at its parent by index. Trees are produced by a [`TreeFinder`]
//! and only read afterwards.

use crate::graph::RoadGraph;
use crate::params::SearchParameters;
use crate::profiles::RoutingProfile;
use isoline_common::{Error, Result};
use std::sync::Arc;

pub mod dijkstra;
pub use dijkstra::DijkstraTreeFinder;

/// A node reached by the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeEntry {
    /// Node id in the road graph
    pub node: u32,
    /// Graph edge used to reach the node (`None` for the root)
    pub edge: Option<u32>,
    /// Original road edge behind `edge` (`None` for the root)
    pub original_edge: Option<u32>,
    /// Cumulative cost from the root, seconds or metres
    pub cost: f64,
    /// Index of the parent entry in the tree
    pub parent: Option<usize>,
}

impl TreeEntry {
    pub fn root(node: u32) -> Self {
        Self {
            node,
            edge: None,
            original_edge: None,
            cost: 0.0,
            parent: None,
        }
    }
}

/// Arena of tree entries ordered by ascending node id
#[derive(Debug, Clone, Default)]
pub struct SearchTree {
    entries: Vec<TreeEntry>,
    root: Option<usize>,
}

impl SearchTree {
    /// A search that reached nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tree from entries in any order
    ///
    /// Entries are re-ordered by node id so that iteration, and everything
    /// derived from it, is deterministic. Parent indices are remapped.
    pub fn from_entries(entries: Vec<TreeEntry>, root: usize) -> Result<Self> {
        if root >= entries.len() {
            return Err(Error::InvalidGraph(format!(
                "search tree root {root} outside {} entries",
                entries.len()
            )));
        }
        if let Some(bad) = entries
            .iter()
            .position(|e| e.parent.is_some_and(|p| p >= entries.len()))
        {
            return Err(Error::InvalidGraph(format!(
                "search tree entry {bad} has a dangling parent"
            )));
        }

        if let Some(bad) = entries
            .iter()
            .position(|e| e.edge.is_some() != e.original_edge.is_some())
        {
            return Err(Error::InvalidGraph(format!(
                "search tree entry {bad} has only one of edge and original edge"
            )));
        }

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| entries[i].node);
        if order.windows(2).any(|w| entries[w[0]].node == entries[w[1]].node) {
            return Err(Error::InvalidGraph(
                "search tree contains a node twice".to_string(),
            ));
        }

        let mut remap = vec![0usize; entries.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            remap[old_idx] = new_idx;
        }

        let sorted = order
            .iter()
            .map(|&old_idx| {
                let mut entry = entries[old_idx];
                entry.parent = entry.parent.map(|p| remap[p]);
                entry
            })
            .collect();

        Ok(Self {
            entries: sorted,
            root: Some(remap[root]),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn root(&self) -> Option<&TreeEntry> {
        self.root.map(|idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&TreeEntry> {
        self.entries.get(idx)
    }

    pub fn parent(&self, entry: &TreeEntry) -> Option<&TreeEntry> {
        entry.parent.and_then(|idx| self.entries.get(idx))
    }

    /// Entry index for a node id
    pub fn find_node(&self, node: u32) -> Option<usize> {
        self.entries.binary_search_by_key(&node, |e| e.node).ok()
    }

    /// Largest cumulative cost in the tree
    pub fn max_cost(&self) -> f64 {
        self.entries.iter().map(|e| e.cost).fold(0.0, f64::max)
    }
}

/// Graph and profile a query runs against
#[derive(Clone)]
pub struct RouteSearchContext {
    graph: Arc<dyn RoadGraph>,
    profile: RoutingProfile,
    max_speed_kmh: f64,
}

impl RouteSearchContext {
    pub fn new(graph: Arc<dyn RoadGraph>, profile: RoutingProfile) -> Self {
        Self {
            graph,
            profile,
            max_speed_kmh: profile.max_speed_kmh(),
        }
    }

    pub fn graph(&self) -> &dyn RoadGraph {
        self.graph.as_ref()
    }

    pub fn profile(&self) -> RoutingProfile {
        self.profile
    }

    pub fn max_speed_kmh(&self) -> f64 {
        self.max_speed_kmh
    }
}

impl std::fmt::Debug for RouteSearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSearchContext")
            .field("nodes", &self.graph.node_count())
            .field("profile", &self.profile)
            .field("max_speed_kmh", &self.max_speed_kmh)
            .finish()
    }
}

/// One-to-many search producing the cost tree for a query
///
/// Contract: every node reachable within the largest requested range is
/// present, together with the first node past the range on each branch so
/// that edges crossing the range can be interpolated. An unreachable
/// location yields an empty tree, not an error.
pub trait TreeFinder: Send + Sync {
    fn find(&self, context: &RouteSearchContext, params: &SearchParameters) -> Result<SearchTree>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: u32, edge: u32, cost: f64, parent: usize) -> TreeEntry {
        TreeEntry {
            node,
            edge: Some(edge),
            original_edge: Some(edge),
            cost,
            parent: Some(parent),
        }
    }

    #[test]
    fn test_from_entries_sorts_and_remaps_parents() {
        // root is node 9, chain 9 -> 4 -> 1
        let entries = vec![TreeEntry::root(9), entry(4, 10, 5.0, 0), entry(1, 11, 8.0, 1)];
        let tree = SearchTree::from_entries(entries, 0).unwrap();

        let nodes: Vec<u32> = tree.entries().iter().map(|e| e.node).collect();
        assert_eq!(nodes, vec![1, 4, 9]);
        assert_eq!(tree.root().unwrap().node, 9);

        let leaf = tree.get(tree.find_node(1).unwrap()).unwrap();
        let mid = tree.parent(leaf).unwrap();
        assert_eq!(mid.node, 4);
        assert_eq!(tree.parent(mid).unwrap().node, 9);
        assert_eq!(tree.max_cost(), 8.0);
    }

    #[test]
    fn test_from_entries_rejects_bad_input() {
        assert!(SearchTree::from_entries(vec![TreeEntry::root(0)], 3).is_err());
        assert!(SearchTree::from_entries(vec![TreeEntry::root(0), entry(1, 0, 1.0, 7)], 0).is_err());
        assert!(SearchTree::from_entries(vec![TreeEntry::root(0), entry(0, 0, 1.0, 0)], 0).is_err());
    }

    #[test]
    fn test_from_entries_rejects_unpaired_edges() {
        let mut half = entry(1, 4, 1.0, 0);
        half.original_edge = None;
        let err = SearchTree::from_entries(vec![TreeEntry::root(0), half], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));

        let mut rooted = TreeEntry::root(0);
        rooted.edge = Some(2);
        assert!(SearchTree::from_entries(vec![rooted], 0).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let tree = SearchTree::empty();
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        assert_eq!(tree.max_cost(), 0.0);
    }
}
