//! Curriculum re-selection and per-seed detection runs

mod clustering;
mod curriculum;
mod detector;
mod kernel;

pub use clustering::ClusteringBackend;
pub use curriculum::CurriculumSelector;
pub use detector::{Detection, Detector};
pub use kernel::{GraphKernel, ShortestPathKernel};
