//! Diffusion features and the expansion policy network

mod diffusion;
mod segment;
mod layers;
mod optimizer;
mod agent;

pub use diffusion::{DiffusionEncoder, DiffusedFeatures, NodeIndicators};
pub use segment::Segment;
pub use layers::{Param, Linear, LinearBlock, swish, swish_grad, log_softmax};
pub use optimizer::Adam;
pub use agent::{Agent, PolicyInput};
