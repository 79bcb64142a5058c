//! Expansion environment, training loops and run configuration

mod config;
mod env;
mod expander;
mod metrics;

pub use config::{ExpanderConfig, CurriculumConfig, DetectorConfig};
pub use env::{Action, ExpansionEnv, Trajectory};
pub use expander::{Expander, marginal_rewards, reward_to_go};
pub use metrics::{Scores, TrainingMetrics};
