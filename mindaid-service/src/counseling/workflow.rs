use mindaid_flow::{Graph, GraphBuilder, Task};
use std::sync::Arc;

use super::tasks::{ContextualizeQuestionTask, CounselReplyTask, RetrieveGuidanceTask};
use crate::ml::{ChatModel, GuidanceRetriever};

pub const COUNSELING_GRAPH: &str = "counseling";

pub fn counseling_session_id(username: &str) -> String {
    format!("{COUNSELING_GRAPH}:{username}")
}

/// contextualize -> retrieve -> reply, looping back to contextualize for the next message
pub fn build_counseling_workflow(
    llm: Arc<dyn ChatModel>,
    retriever: Arc<dyn GuidanceRetriever>,
) -> Graph {
    let contextualize = Arc::new(ContextualizeQuestionTask::new(llm.clone()));
    let retrieve = Arc::new(RetrieveGuidanceTask::new(retriever));
    let reply = Arc::new(CounselReplyTask::new(llm));

    let contextualize_id = contextualize.id().to_string();
    let retrieve_id = retrieve.id().to_string();
    let reply_id = reply.id().to_string();

    GraphBuilder::new(COUNSELING_GRAPH)
        .add_task(contextualize)
        .add_task(retrieve)
        .add_task(reply)
        .add_edge(contextualize_id.clone(), retrieve_id.clone())
        .add_edge(retrieve_id, reply_id.clone())
        .add_edge(reply_id, contextualize_id)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{NoRetriever, Passage};
    use crate::session_keys;
    use async_trait::async_trait;
    use mindaid_flow::{ChatMessage, ExecutionStatus, FlowError, FlowRunner, InMemorySessionStorage};
    use tokio::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Call {
        preamble: String,
        prompt: String,
        history_len: usize,
    }

    /// Echoes the prompt back and records every call
    #[derive(Default)]
    struct StubChat {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl ChatModel for StubChat {
        async fn chat(
            &self,
            preamble: &str,
            prompt: &str,
            history: &[ChatMessage],
        ) -> anyhow::Result<String> {
            self.calls.lock().await.push(Call {
                preamble: preamble.to_string(),
                prompt: prompt.to_string(),
                history_len: history.len(),
            });
            Ok(format!("reply to {prompt}"))
        }
    }

    struct StubRetriever {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GuidanceRetriever for StubRetriever {
        async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Passage>> {
            self.queries.lock().await.push(query.to_string());
            Ok(vec![
                Passage {
                    content: "Reflect feelings back".to_string(),
                    source: None,
                },
                Passage {
                    content: "Ask open questions".to_string(),
                    source: Some("manual.pdf".to_string()),
                },
            ])
        }
    }

    struct DownRetriever;

    #[async_trait]
    impl GuidanceRetriever for DownRetriever {
        async fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<Passage>> {
            Err(anyhow::anyhow!("index offline"))
        }
    }

    fn runner(llm: Arc<dyn ChatModel>, retriever: Arc<dyn GuidanceRetriever>) -> FlowRunner {
        let graph = build_counseling_workflow(llm, retriever);
        FlowRunner::new(Arc::new(graph), Arc::new(InMemorySessionStorage::new()))
            .with_max_chat_messages(4)
    }

    async fn say(runner: &FlowRunner, message: &str) -> mindaid_flow::Result<String> {
        let (result, _) = runner
            .run_with_input(&counseling_session_id("bob"), |ctx| {
                ctx.set_sync(session_keys::USER_INPUT, message)
            })
            .await?;
        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        Ok(result.response.unwrap_or_default())
    }

    #[tokio::test]
    async fn first_turn_skips_contextualization_and_grounds_the_reply() {
        let llm = Arc::new(StubChat::default());
        let retriever = Arc::new(StubRetriever {
            queries: Mutex::new(Vec::new()),
        });
        let runner = runner(llm.clone(), retriever.clone());

        let reply = say(&runner, "I feel lonely").await.unwrap();

        assert_eq!(reply, "reply to I feel lonely");
        assert_eq!(retriever.queries.lock().await.as_slice(), ["I feel lonely"]);
        let calls = llm.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].preamble.contains("Reflect feelings back\n---\nAsk open questions"));
        assert_eq!(calls[0].history_len, 0);
    }

    #[tokio::test]
    async fn follow_up_is_rewritten_before_retrieval() {
        let llm = Arc::new(StubChat::default());
        let retriever = Arc::new(StubRetriever {
            queries: Mutex::new(Vec::new()),
        });
        let runner = runner(llm.clone(), retriever.clone());

        say(&runner, "I feel lonely").await.unwrap();
        let reply = say(&runner, "why?").await.unwrap();

        let calls = llm.calls.lock().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].prompt, "why?");
        assert_eq!(calls[1].history_len, 2);
        assert!(calls[1].preamble.starts_with("Given a chat history"));
        assert_eq!(
            retriever.queries.lock().await.last().map(String::as_str),
            Some("reply to why?")
        );
        assert_eq!(reply, "reply to why?");

        let session = runner.session(&counseling_session_id("bob")).await.unwrap();
        assert_eq!(session.context.chat_history_len().await, 4);
    }

    #[tokio::test]
    async fn chat_history_stays_bounded() {
        let runner = runner(Arc::new(StubChat::default()), Arc::new(NoRetriever));

        for turn in 0..5 {
            say(&runner, &format!("message {turn}")).await.unwrap();
        }

        let session = runner.session(&counseling_session_id("bob")).await.unwrap();
        let history = session.context.get_chat_history().await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "message 3");
    }

    #[tokio::test]
    async fn retrieval_failure_surfaces_as_task_failure() {
        let runner = runner(Arc::new(StubChat::default()), Arc::new(DownRetriever));

        let err = say(&runner, "hello").await.unwrap_err();

        assert!(matches!(err, FlowError::TaskExecutionFailed(_)));
    }
}
