//! Error types for the render-server client.
//!
//! [`RenderError`] covers the three ways a render job can end without an
//! image: the server never accepted it, the server reported a failure, or the
//! client gave up waiting.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving a job on the render server.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The server was unreachable, rejected the job, or answered without a
    /// job identifier.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The server reported that the job failed.
    #[error("generation failed for job {job_id}: {message}")]
    GenerationFailed { job_id: String, message: String },

    /// No terminal response was observed before the client-side deadline.
    /// Nothing is sent upstream; the job is simply abandoned.
    #[error("generation timed out for job {job_id} after {}s", waited.as_secs())]
    GenerationTimedOut { job_id: String, waited: Duration },
}
