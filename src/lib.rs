//! # SeedGrow: learned community expansion around a seed node
//!
//! This library grows a community around a seed node one boundary node at a time,
//! using a policy trained by imitation of known communities and by policy-gradient
//! reinforcement with an incremental set-similarity reward.
//!
//! ## Features
//!
//! - **Graph**: contiguous-id adjacency with k-ego extraction and online growth
//! - **Diffusion**: parameter-free decayed neighbour propagation of node indicators
//! - **Policy**: hierarchical {boundary node, STOP} distribution with exact gradients
//! - **Training**: imitation and REINFORCE over a lockstep batched environment
//! - **Curriculum**: kernel similarity + clustering to re-select training communities

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Graph structures and the id registry
pub mod graph;

/// Diffusion encoder and policy network
pub mod nn;

/// Environment, expander, metrics and configuration
pub mod core;

/// Curriculum selection and detection orchestration
pub mod detect;

/// Dataset I/O and helpers
pub mod utils;

// Re-export commonly used types
pub use graph::{Graph, NodeRegistry, CommunityWalk, WalkTermination};
pub use nn::{Agent, DiffusionEncoder, Segment};
pub use crate::core::{Action, ExpansionEnv, Expander, Scores, ExpanderConfig, DetectorConfig};
pub use detect::{Detector, Detection, ClusteringBackend, CurriculumSelector};

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum SeedGrowError {
    /// Node ids are not contiguous from zero
    #[error("Labeling error: {0}")]
    Labeling(String),

    /// A call was made in a state that forbids it
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Online extension needs a parent graph that is not set
    #[error("Graph has no parent to resolve node {0}")]
    MissingParent(usize),

    /// Id mapping lookup failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Diffused features were built for another graph version
    #[error("Stale features: built for graph version {found}, graph is at {expected}")]
    StaleFeatures {
        /// Version of the encoder's graph
        expected: u64,
        /// Version recorded on the features
        found: u64,
    },

    /// Categorical draw could not be made
    #[error("Sampling error: {0}")]
    Sampling(String),

    /// Clustering backend failure
    #[error("Clustering error: {0}")]
    Clustering(String),

    /// Similarity kernel failure
    #[error("Kernel error: {0}")]
    Kernel(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed input data
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the library
pub type Result<T> = std::result::Result<T, SeedGrowError>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        graph::{Graph, NodeRegistry, CommunityWalk, WalkTermination},
        nn::{Agent, DiffusionEncoder, DiffusedFeatures, NodeIndicators, Segment},
        core::{Action, ExpansionEnv, Expander, Scores, ExpanderConfig, DetectorConfig, CurriculumConfig},
        detect::{Detector, Detection, ClusteringBackend, CurriculumSelector, GraphKernel, ShortestPathKernel},
        Result, SeedGrowError,
    };
}
