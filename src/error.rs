use thiserror::Error;

pub use crate::comfy::RenderError;

/// Failures while turning a rendered base image into the final artifact.
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("failed to decode base image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode artifact: {0}")]
    Encode(#[source] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("font error: {0}")]
    Font(String),
}

/// Cycle-level failures. None of these stop the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("No headlines available from any source")]
    FetchEmpty,

    #[error("Headline fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("A generation cycle is already running")]
    AlreadyRunning,
}

/// Which step of the per-headline pipeline a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureStage {
    /// Submitting or awaiting the render job.
    Render,
    /// Decoding, laying out or writing the composite.
    Compose,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Render => write!(f, "render"),
            FailureStage::Compose => write!(f, "compose"),
        }
    }
}
