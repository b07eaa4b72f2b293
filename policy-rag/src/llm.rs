//! Language model trait used by the answer synthesizer.

use async_trait::async_trait;

use crate::error::Result;

/// A text-in, text-out language model.
///
/// Implementations are stateless from the caller's point of view: every call
/// is independent and carries the whole prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` and return the model's raw text output.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// The model name, used in logs and errors.
    fn name(&self) -> &str;
}
