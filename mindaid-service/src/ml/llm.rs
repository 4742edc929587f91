use async_trait::async_trait;
use mindaid_flow::ChatMessage;
use rig::{client::CompletionClient, completion::Chat, providers::openrouter};
use tracing::debug;

use super::ChatModel;

/// Chat completions through OpenRouter via rig
pub struct OpenRouterChat {
    client: openrouter::Client,
    model: String,
}

impl OpenRouterChat {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenRouterChat {
    async fn chat(
        &self,
        preamble: &str,
        prompt: &str,
        history: &[ChatMessage],
    ) -> anyhow::Result<String> {
        let agent = self.client.agent(&self.model).preamble(preamble).build();
        let history = history.iter().map(rig::completion::Message::from).collect();

        debug!(model = %self.model, prompt_len = prompt.len(), "Calling chat model");
        let reply = agent.chat(prompt, history).await?;
        Ok(reply.trim().to_string())
    }
}
