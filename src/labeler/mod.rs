//! The classifier boundary: one name in, one label out.

mod client;

pub use client::{extract_label, ClientError, OpenAiClient};

use async_trait::async_trait;

/// Something that can label a name.
///
/// The pipeline only depends on this trait, so tests can substitute a
/// scripted classifier for the HTTP client.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `subject_name` using `prompt` as the system prompt.
    async fn classify(
        &self,
        prompt: &str,
        subject_name: &str,
        model: &str,
    ) -> Result<String, ClientError>;
}
