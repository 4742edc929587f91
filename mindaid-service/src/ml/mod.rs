//! Clients for the external ML services: the disorder classifier, the counseling LLM, and the
//! retrieval index that grounds counseling replies.

mod classifier;
mod llm;
mod retriever;

pub use classifier::{CLASS_LABELS, HttpClassifier};
pub use llm::OpenRouterChat;
pub use retriever::{HttpRetriever, NoRetriever, Passage};

use async_trait::async_trait;
use mindaid_flow::ChatMessage;

use crate::diagnosis::Disorder;

/// Maps a free-text narrative to one of the supported disorders
#[async_trait]
pub trait DisorderClassifier: Send + Sync {
    async fn classify(&self, narrative: &str) -> anyhow::Result<Disorder>;
}

/// A chat-completion model
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(
        &self,
        preamble: &str,
        prompt: &str,
        history: &[ChatMessage],
    ) -> anyhow::Result<String>;
}

/// Looks up passages relevant to a standalone question
#[async_trait]
pub trait GuidanceRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Passage>>;
}

/// Stand-in used when a service is not configured: every call fails with `reason`
pub struct Unconfigured {
    reason: &'static str,
}

impl Unconfigured {
    pub fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl DisorderClassifier for Unconfigured {
    async fn classify(&self, _narrative: &str) -> anyhow::Result<Disorder> {
        Err(anyhow::anyhow!(self.reason))
    }
}

#[async_trait]
impl ChatModel for Unconfigured {
    async fn chat(
        &self,
        _preamble: &str,
        _prompt: &str,
        _history: &[ChatMessage],
    ) -> anyhow::Result<String> {
        Err(anyhow::anyhow!(self.reason))
    }
}
