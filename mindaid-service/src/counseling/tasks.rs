use async_trait::async_trait;
use mindaid_flow::{Context, FlowError, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ml::{ChatModel, GuidanceRetriever};
use crate::session_keys;

const CONTEXTUALIZE_PROMPT: &str = "Given a chat history and the latest user question which might reference context in the chat history, formulate a standalone question which can be understood without the chat history. Do NOT answer the question, just reformulate it if needed and otherwise return it as is.";

const COUNSELOR_PROMPT: &str = "Assume you are a mental health counselor. Learn from the counseling technique and sample conversation given to you and ask the patient the right questions about their situation. If you don't know the answer, say that you don't know. Use two sentences maximum and keep the answer concise. When you feel that the patient is satisfied, end the conversation.";

const PASSAGE_SEPARATOR: &str = "\n---\n";

async fn user_input(context: &Context) -> Result<String> {
    context
        .get(session_keys::USER_INPUT)
        .await
        .ok_or_else(|| FlowError::ContextError("user_input not found".to_string()))
}

/// Rewrites a follow-up into a question that stands on its own, so retrieval does not need the
/// conversation
pub struct ContextualizeQuestionTask {
    llm: Arc<dyn ChatModel>,
}

impl ContextualizeQuestionTask {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Task for ContextualizeQuestionTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = user_input(&context).await?;
        let history = context.get_chat_history().await;

        let question = if history.is_empty() {
            input
        } else {
            let rewritten = self
                .llm
                .chat(CONTEXTUALIZE_PROMPT, &input, &history)
                .await
                .map_err(|e| {
                    error!(task_id = %self.id(), error = %e, "Question contextualization failed");
                    FlowError::TaskExecutionFailed(format!("llm: {e}"))
                })?;
            if rewritten.is_empty() { input } else { rewritten }
        };

        debug!(question = %question, "Standalone question");
        context.set(session_keys::STANDALONE_QUESTION, question).await;

        Ok(TaskResult::new(None, NextAction::ContinueAndExecute))
    }
}

/// Fetches counseling material for the standalone question
pub struct RetrieveGuidanceTask {
    retriever: Arc<dyn GuidanceRetriever>,
}

impl RetrieveGuidanceTask {
    pub fn new(retriever: Arc<dyn GuidanceRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Task for RetrieveGuidanceTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let question: String = context
            .get(session_keys::STANDALONE_QUESTION)
            .await
            .ok_or_else(|| FlowError::ContextError("standalone question not found".to_string()))?;

        let passages = self.retriever.retrieve(&question).await.map_err(|e| {
            error!(task_id = %self.id(), error = %e, "Guidance retrieval failed");
            FlowError::TaskExecutionFailed(format!("retriever: {e}"))
        })?;

        if passages.is_empty() {
            warn!("No counseling passages retrieved");
        }

        let guidance = passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);
        context.set(session_keys::GUIDANCE, guidance).await;

        Ok(TaskResult::new(None, NextAction::ContinueAndExecute))
    }
}

/// Answers as the counselor and records the exchange in the session chat history
pub struct CounselReplyTask {
    llm: Arc<dyn ChatModel>,
}

impl CounselReplyTask {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    fn preamble(guidance: &str) -> String {
        if guidance.is_empty() {
            COUNSELOR_PROMPT.to_string()
        } else {
            format!("{COUNSELOR_PROMPT}\n\nCounseling technique and sample conversation:\n{guidance}")
        }
    }
}

#[async_trait]
impl Task for CounselReplyTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = user_input(&context).await?;
        let guidance: String = context
            .get(session_keys::GUIDANCE)
            .await
            .unwrap_or_default();
        let history = context.get_chat_history().await;

        let reply = self
            .llm
            .chat(&Self::preamble(&guidance), &input, &history)
            .await
            .map_err(|e| {
                error!(task_id = %self.id(), error = %e, "Counseling reply failed");
                FlowError::TaskExecutionFailed(format!("llm: {e}"))
            })?;

        context.add_user_message(input).await;
        context.add_assistant_message(reply.clone()).await;

        let history_len = context.chat_history_len().await;
        info!(task_id = %self.id(), history_len, "Counseling turn answered");

        Ok(TaskResult::new(Some(reply), NextAction::Continue))
    }
}
