//! FlowRunner – loads a session, executes exactly **one** graph step, and persists the updated
//! session back to storage.
//!
//! Chat endpoints run one step per HTTP request: the user's message is written into the session
//! context, the current task runs, and the session is saved for the next roundtrip.
//!
//! ```rust,ignore
//! let (result, session) = runner
//!     .run_with_input(&session_id, |ctx| ctx.set_sync("user_input", message))
//!     .await?;
//! ```
//!
//! A session that does not exist yet is started at the graph's start task, so a client that
//! never called [`FlowRunner::start`] still gets a fresh workflow.

use std::sync::Arc;

use tracing::debug;

use crate::{
    context::Context,
    error::{FlowError, Result},
    graph::{ExecutionResult, Graph},
    storage::{Session, SessionStorage},
};

/// High-level helper that orchestrates the common _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
    storage: Arc<dyn SessionStorage>,
    max_chat_messages: Option<usize>,
}

impl FlowRunner {
    pub fn new(graph: Arc<Graph>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            graph,
            storage,
            max_chat_messages: None,
        }
    }

    /// Bound the chat log of every session this runner creates
    pub fn with_max_chat_messages(mut self, max: usize) -> Self {
        self.max_chat_messages = Some(max);
        self
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Create (or reset) `session_id` at the graph's start task and persist it.
    ///
    /// `seed` can place initial values in the fresh context.
    pub async fn start<F>(&self, session_id: &str, seed: F) -> Result<Session>
    where
        F: FnOnce(&Context),
    {
        let session = self.fresh_session(session_id)?;
        seed(&session.context);
        self.storage.save(session.clone()).await?;
        debug!(session_id = %session_id, graph_id = %self.graph.id, "Session started");
        Ok(session)
    }

    /// Write the caller's input into the session, execute one step, and persist the result.
    ///
    /// Returns the step outcome together with the session as it was saved.
    pub async fn run_with_input<F>(
        &self,
        session_id: &str,
        input: F,
    ) -> Result<(ExecutionResult, Session)>
    where
        F: FnOnce(&Context),
    {
        let mut session = match self.storage.get(session_id).await? {
            Some(session) => session,
            None => self.fresh_session(session_id)?,
        };

        input(&session.context);

        let result = self.graph.execute_session(&mut session).await?;
        self.storage.save(session.clone()).await?;

        Ok((result, session))
    }

    /// Load a session without running anything
    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    fn fresh_session(&self, session_id: &str) -> Result<Session> {
        let start = self
            .graph
            .start_task_id()
            .ok_or_else(|| FlowError::MissingStartTask(self.graph.id.clone()))?;

        let context = match self.max_chat_messages {
            Some(max) => Context::with_max_chat_messages(max),
            None => Context::new(),
        };

        Ok(Session::new_from_task(session_id.to_string(), &self.graph.id, &start)
            .with_context(context))
    }
}
