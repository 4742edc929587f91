//! Counseling chat: each user message runs contextualize -> retrieve -> reply in one request.

mod tasks;
mod workflow;

pub use tasks::{ContextualizeQuestionTask, CounselReplyTask, RetrieveGuidanceTask};
pub use workflow::{COUNSELING_GRAPH, build_counseling_workflow, counseling_session_id};
