//! Bounded window of historical Merkle roots

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::Hash;

/// Sliding window of `(root_index, root)` pairs.
///
/// A validity proof is only acceptable while the root it was derived
/// against is still inside this window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RootHistory {
    window: VecDeque<(u64, Hash)>,
    capacity: usize,
}

impl RootHistory {
    /// Create an empty history retaining up to `capacity` roots
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a new root under the given root index, evicting the oldest
    /// entry once the window is full
    pub fn record(&mut self, root_index: u64, root: Hash) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back((root_index, root));
    }

    /// Whether a root index is still inside the validity window
    pub fn contains(&self, root_index: u64) -> bool {
        self.window.iter().any(|(idx, _)| *idx == root_index)
    }

    /// Root recorded under a given index, if still retained
    pub fn get(&self, root_index: u64) -> Option<Hash> {
        self.window
            .iter()
            .find(|(idx, _)| *idx == root_index)
            .map(|(_, root)| *root)
    }

    /// Most recently recorded `(root_index, root)` pair
    pub fn latest(&self) -> Option<(u64, Hash)> {
        self.window.back().copied()
    }

    /// Number of roots currently retained
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether no roots have been recorded yet
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
