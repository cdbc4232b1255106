pub mod client;
pub mod error;
pub mod prompt;
pub mod types;
pub mod workflow;

pub use client::RenderJobClient;
pub use error::RenderError;
pub use prompt::PromptBuilder;
pub use workflow::WorkflowTemplate;

use crate::selector::Style;

/// Anything that can turn a headline into raw image bytes.
#[allow(async_fn_in_trait)]
pub trait ImageRenderer {
    async fn generate(&self, headline: &str, style: Style) -> Result<Vec<u8>, RenderError>;
}
