//! Dead-end classification
//!
//! An edge is a dead end when no other tree entry continues through it,
//! i.e. its original edge id never shows up as the parent edge of another
//! entry. Dead ends are sampled coarsely: only their far node matters.

use rustc_hash::FxHashSet;

use crate::search::SearchTree;

/// Dead-end markers over the entries of one search tree
#[derive(Debug, Clone)]
pub struct DeadEnds {
    marks: Vec<bool>,
}

impl DeadEnds {
    /// Two passes over the tree: collect continued edges, then mark the rest
    pub fn classify(tree: &SearchTree) -> Self {
        let mut continued: FxHashSet<u32> =
            FxHashSet::with_capacity_and_hasher(tree.len() / 20, Default::default());

        for entry in tree.entries() {
            if entry.original_edge.is_none() {
                continue;
            }
            if let Some(parent_edge) = tree.parent(entry).and_then(|p| p.original_edge) {
                continued.insert(parent_edge);
            }
        }

        let marks = tree
            .entries()
            .iter()
            .map(|entry| match entry.original_edge {
                Some(edge) => !continued.contains(&edge),
                None => false,
            })
            .collect();

        Self { marks }
    }

    pub fn is_dead_end(&self, entry_idx: usize) -> bool {
        self.marks.get(entry_idx).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.marks.iter().filter(|&&m| m).count()
    }
}
