use async_trait::async_trait;
use mindaid_flow::{Context, FlowError, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::instruments::{Disorder, Instrument, Progress, Step};
use super::workflow::THANK_YOU;
use crate::ml::DisorderClassifier;
use crate::models::GUEST_USER;
use crate::repository::UserRepository;
use crate::session_keys;

const TRIGGERS_PROMPT: &str = "Can you share any recent events or experiences that might have triggered these feelings or symptoms?";
const BACKGROUND_PROMPT: &str = "Have you experienced any significant traumas in the past, or do you have any habits or behaviors that you think might be affecting your mental health?";

async fn user_input(context: &Context) -> Result<String> {
    context
        .get(session_keys::USER_INPUT)
        .await
        .ok_or_else(|| FlowError::ContextError("user_input not found".to_string()))
}

async fn username(context: &Context) -> String {
    context
        .get(session_keys::USERNAME)
        .await
        .unwrap_or_else(|| GUEST_USER.to_string())
}

/// Narrative so far with `input` appended, space-separated
async fn extend_narrative(context: &Context, input: &str) -> String {
    let narrative: String = context
        .get(session_keys::NARRATIVE)
        .await
        .unwrap_or_default();
    if narrative.is_empty() {
        input.to_string()
    } else {
        format!("{narrative} {input}")
    }
}

/// First narrative turn: what the user has been feeling
pub struct SymptomsTask;

#[async_trait]
impl Task for SymptomsTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = user_input(&context).await?;
        let narrative = extend_narrative(&context, &input).await;
        context.set(session_keys::NARRATIVE, narrative).await;

        Ok(TaskResult::new(
            Some(TRIGGERS_PROMPT.to_string()),
            NextAction::Continue,
        ))
    }
}

/// Second narrative turn: recent triggers
pub struct TriggersTask;

#[async_trait]
impl Task for TriggersTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = user_input(&context).await?;
        let narrative = extend_narrative(&context, &input).await;
        context.set(session_keys::NARRATIVE, narrative).await;

        Ok(TaskResult::new(
            Some(BACKGROUND_PROMPT.to_string()),
            NextAction::Continue,
        ))
    }
}

/// Third narrative turn: classify the whole narrative and open the matching instrument
pub struct ClassifyTask {
    classifier: Arc<dyn DisorderClassifier>,
    users: Arc<dyn UserRepository>,
}

impl ClassifyTask {
    pub fn new(classifier: Arc<dyn DisorderClassifier>, users: Arc<dyn UserRepository>) -> Self {
        Self { classifier, users }
    }
}

#[async_trait]
impl Task for ClassifyTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = user_input(&context).await?;
        let username = username(&context).await;
        let narrative = extend_narrative(&context, &input).await;

        info!(
            username = %username,
            task_id = %self.id(),
            narrative_len = narrative.len(),
            "Classifying narrative"
        );

        // Context is only touched once the classifier answered, so a retry re-sends the same text
        let disorder = self.classifier.classify(&narrative).await.map_err(|e| {
            error!(username = %username, error = %e, "Disorder classification failed");
            FlowError::TaskExecutionFailed(format!("classifier: {e}"))
        })?;

        self.users
            .set_disorder(&username, disorder.as_str())
            .await
            .map_err(|e| FlowError::TaskExecutionFailed(e.to_string()))?;

        context.set(session_keys::NARRATIVE, narrative).await;
        context.set(session_keys::DISORDER, disorder).await;
        context.set(session_keys::PROGRESS, Progress::default()).await;
        context.remove(session_keys::SEVERITY).await;

        info!(username = %username, disorder = %disorder, "Disorder predicted");

        let instrument = disorder.instrument();
        let message = format!(
            "You have: {disorder}.\n{}\n\n{}",
            instrument.intro,
            instrument.opening_question()
        );

        Ok(TaskResult::new_with_status(
            Some(message),
            NextAction::Continue,
            Some(format!("Classified as {disorder}; starting questionnaire")),
        ))
    }
}

/// Walks one instrument, one answer per run
pub struct QuestionnaireTask {
    id: String,
    instrument: &'static Instrument,
    users: Arc<dyn UserRepository>,
}

impl QuestionnaireTask {
    pub fn new(disorder: Disorder, users: Arc<dyn UserRepository>) -> Self {
        Self {
            id: Self::task_id(disorder),
            instrument: disorder.instrument(),
            users,
        }
    }

    pub fn task_id(disorder: Disorder) -> String {
        format!("questionnaire::{}", disorder.as_str().to_lowercase())
    }
}

#[async_trait]
impl Task for QuestionnaireTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut progress: Progress = context
            .get(session_keys::PROGRESS)
            .await
            .unwrap_or_default();

        if progress.finished {
            return Ok(TaskResult::new(Some(THANK_YOU.to_string()), NextAction::End));
        }

        let input = user_input(&context).await?;

        match self.instrument.advance(&mut progress, &input) {
            Step::Reprompt(message) => {
                warn!(task_id = %self.id, "Answer outside the expected format");
                Ok(TaskResult::new(Some(message), NextAction::WaitForInput))
            }
            Step::Ask(question) => {
                context.set(session_keys::PROGRESS, progress).await;
                Ok(TaskResult::new(
                    Some(question.to_string()),
                    NextAction::WaitForInput,
                ))
            }
            Step::Finished { severity, message } => {
                let username = username(&context).await;
                self.users
                    .set_severity(&username, severity)
                    .await
                    .map_err(|e| FlowError::TaskExecutionFailed(e.to_string()))?;

                context.set(session_keys::PROGRESS, progress).await;
                context.set(session_keys::SEVERITY, severity).await;

                info!(
                    username = %username,
                    task_id = %self.id,
                    disorder = %self.instrument.disorder,
                    severity = %severity,
                    "Questionnaire completed"
                );

                Ok(TaskResult::new_with_status(
                    Some(message),
                    NextAction::End,
                    Some(format!("Severity assessed as {severity}")),
                ))
            }
        }
    }
}
