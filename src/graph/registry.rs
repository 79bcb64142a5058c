//! Bidirectional mapping between dataset ids and working-graph ids

use std::collections::HashMap;
use crate::{Result, SeedGrowError};

/// Dataset id <-> working id registry
///
/// Working ids are always `0..len()`. The two directions stay mutually inverse;
/// the only mutation is [`NodeRegistry::register`], which appends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRegistry {
    old_to_new: HashMap<usize, usize>,
    new_to_old: Vec<usize>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an old -> new mapping whose values are exactly `0..len`
    pub fn from_forward(old_to_new: HashMap<usize, usize>) -> Result<Self> {
        let n = old_to_new.len();
        let mut slots: Vec<Option<usize>> = vec![None; n];
        for (&old, &new) in &old_to_new {
            let slot = slots
                .get_mut(new)
                .filter(|slot| slot.is_none())
                .ok_or_else(|| {
                    SeedGrowError::Registry(format!("working id {} is duplicated or outside 0..{}", new, n))
                })?;
            *slot = Some(old);
        }
        let new_to_old = slots.into_iter().flatten().collect();
        Ok(NodeRegistry { old_to_new, new_to_old })
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.new_to_old.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.new_to_old.is_empty()
    }

    /// Working id of a dataset id
    pub fn to_new(&self, old: usize) -> Option<usize> {
        self.old_to_new.get(&old).copied()
    }

    /// Dataset id of a working id
    pub fn to_old(&self, new: usize) -> Option<usize> {
        self.new_to_old.get(new).copied()
    }

    /// Whether a dataset id is registered
    pub fn contains_old(&self, old: usize) -> bool {
        self.old_to_new.contains_key(&old)
    }

    /// Working id for `old`, assigning the next free id if it is new
    pub fn register(&mut self, old: usize) -> usize {
        if let Some(new) = self.to_new(old) {
            return new;
        }
        let new = self.new_to_old.len();
        self.new_to_old.push(old);
        self.old_to_new.insert(old, new);
        new
    }

    /// Translate dataset ids to working ids
    pub fn map_to_new(&self, olds: &[usize]) -> Result<Vec<usize>> {
        olds.iter()
            .map(|&old| {
                self.to_new(old).ok_or_else(|| {
                    SeedGrowError::Registry(format!("dataset node {} is not in the working graph", old))
                })
            })
            .collect()
    }

    /// Translate working ids to dataset ids
    pub fn map_to_old(&self, news: &[usize]) -> Result<Vec<usize>> {
        news.iter()
            .map(|&new| {
                self.to_old(new).ok_or_else(|| {
                    SeedGrowError::Registry(format!("working node {} has no dataset id", new))
                })
            })
            .collect()
    }
}
