pub mod factory;
pub mod openai;

use async_trait::async_trait;
use rampup_core::types::ChatMessage;
use rampup_core::Result;

/// A black-box large-language-model capability. Agents call it through this
/// trait and never depend on a concrete backend.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub use factory::create_provider;
pub use openai::OpenAIProvider;
