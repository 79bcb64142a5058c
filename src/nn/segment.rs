//! Offsets of one episode inside a flattened candidate batch

use std::ops::Range;
use crate::{Result, SeedGrowError};

/// Slice `start..end` of a flattened batch owned by one episode
///
/// Rows `start..split` are boundary candidates (one action each); rows
/// `split..end` are the episode's current community, read only by the stop head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// First row of the episode
    pub start: usize,
    /// First community row
    pub split: usize,
    /// One past the last row
    pub end: usize,
}

impl Segment {
    /// Create a segment, checking `start <= split <= end`
    pub fn new(start: usize, split: usize, end: usize) -> Result<Self> {
        if start > split || split > end {
            return Err(SeedGrowError::Precondition(format!(
                "segment offsets out of order: {}..{}..{}",
                start, split, end
            )));
        }
        Ok(Segment { start, split, end })
    }

    /// Rows holding boundary candidates
    pub fn candidates(&self) -> Range<usize> {
        self.start..self.split
    }

    /// Rows holding community members
    pub fn community(&self) -> Range<usize> {
        self.split..self.end
    }

    /// Number of boundary candidates
    pub fn n_candidates(&self) -> usize {
        self.split - self.start
    }

    /// Number of community rows
    pub fn n_community(&self) -> usize {
        self.end - self.split
    }

    /// Size of the action space: every candidate plus STOP
    pub fn n_actions(&self) -> usize {
        self.n_candidates() + 1
    }

    /// Action index of STOP
    pub fn stop_index(&self) -> usize {
        self.n_candidates()
    }
}
