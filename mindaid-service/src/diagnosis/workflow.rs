use mindaid_flow::{Graph, GraphBuilder, Task};
use std::sync::Arc;

use super::instruments::Disorder;
use super::tasks::{ClassifyTask, QuestionnaireTask, SymptomsTask, TriggersTask};
use crate::ml::DisorderClassifier;
use crate::repository::UserRepository;
use crate::session_keys;

pub const DIAGNOSIS_GRAPH: &str = "diagnosis";

pub const OPENING_PROMPT: &str = "Hello! I am here to help you understand what you are going through. Could you describe the feelings or symptoms you have been experiencing lately?";

pub const THANK_YOU: &str =
    "Thank you for using our website. Refresh the page for another diagnosis";

pub fn diagnosis_session_id(username: &str) -> String {
    format!("{DIAGNOSIS_GRAPH}:{username}")
}

/// symptoms -> triggers -> classify -> questionnaire for the predicted disorder
pub fn build_diagnosis_workflow(
    classifier: Arc<dyn DisorderClassifier>,
    users: Arc<dyn UserRepository>,
) -> Graph {
    let symptoms = Arc::new(SymptomsTask);
    let triggers = Arc::new(TriggersTask);
    let classify = Arc::new(ClassifyTask::new(classifier, users.clone()));

    let symptoms_id = symptoms.id().to_string();
    let triggers_id = triggers.id().to_string();
    let classify_id = classify.id().to_string();

    let mut builder = GraphBuilder::new(DIAGNOSIS_GRAPH)
        .add_task(symptoms)
        .add_task(triggers)
        .add_task(classify)
        .add_edge(symptoms_id, triggers_id.clone())
        .add_edge(triggers_id, classify_id.clone());

    for disorder in Disorder::ALL {
        let questionnaire = Arc::new(QuestionnaireTask::new(disorder, users.clone()));
        let questionnaire_id = questionnaire.id().to_string();

        builder = builder
            .add_task(questionnaire)
            .add_conditional_edge(classify_id.clone(), questionnaire_id, move |context| {
                context.get_sync::<Disorder>(session_keys::DISORDER) == Some(disorder)
            });
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::instruments::{ADDICTION, DEPRESSION, INVALID_ANSWER, PTSD};
    use crate::models::NewUser;
    use crate::repository::InMemoryRepository;
    use async_trait::async_trait;
    use mindaid_flow::{ExecutionStatus, FlowError, FlowRunner, InMemorySessionStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Returns a fixed disorder and records what it was asked
    struct StubClassifier {
        disorder: Disorder,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl StubClassifier {
        fn new(disorder: Disorder) -> Arc<Self> {
            Arc::new(Self {
                disorder,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DisorderClassifier for StubClassifier {
        async fn classify(&self, narrative: &str) -> anyhow::Result<Disorder> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().await.push(narrative.to_string());
            Ok(self.disorder)
        }
    }

    struct DownClassifier;

    #[async_trait]
    impl DisorderClassifier for DownClassifier {
        async fn classify(&self, _narrative: &str) -> anyhow::Result<Disorder> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    async fn setup(classifier: Arc<dyn DisorderClassifier>) -> (FlowRunner, InMemoryRepository) {
        let users = InMemoryRepository::new();
        users
            .create_user(NewUser {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
                firstname: "Alice".to_string(),
                lastname: "Doe".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap();

        let graph = build_diagnosis_workflow(classifier, Arc::new(users.clone()));
        let runner = FlowRunner::new(Arc::new(graph), Arc::new(InMemorySessionStorage::new()));
        runner
            .start(&diagnosis_session_id("alice"), |ctx| {
                ctx.set_sync(session_keys::USERNAME, "alice")
            })
            .await
            .unwrap();
        (runner, users)
    }

    async fn say(runner: &FlowRunner, message: &str) -> (String, ExecutionStatus) {
        let (result, _) = runner
            .run_with_input(&diagnosis_session_id("alice"), |ctx| {
                ctx.set_sync(session_keys::USER_INPUT, message)
            })
            .await
            .unwrap();
        (result.response.unwrap_or_default(), result.status)
    }

    async fn narrate(runner: &FlowRunner) -> String {
        say(runner, "I can't sleep").await;
        say(runner, "I lost my job").await;
        say(runner, "I drink every night").await.0
    }

    #[tokio::test]
    async fn narrative_turns_are_classified_once_as_a_whole() {
        let classifier = StubClassifier::new(Disorder::Anxiety);
        let (runner, users) = setup(classifier.clone()).await;

        let (first, _) = say(&runner, "I feel on edge").await;
        assert!(first.starts_with("Can you share any recent events"));
        let (second, _) = say(&runner, "work is stressful").await;
        assert!(second.starts_with("Have you experienced any significant traumas"));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);

        let (third, status) = say(&runner, "no habits").await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            classifier.seen.lock().await.as_slice(),
            ["I feel on edge work is stressful no habits"]
        );
        assert!(third.starts_with("You have: Anxiety."));
        assert!(third.ends_with("Feeling nervous, anxious, or on edge?"));
        assert_eq!(status, ExecutionStatus::WaitingForInput);

        let user = users.find_user("alice").await.unwrap().unwrap();
        assert_eq!(user.disorder, "Anxiety");
        let session = runner.session(&diagnosis_session_id("alice")).await.unwrap();
        assert_eq!(
            session.current_task_id,
            QuestionnaireTask::task_id(Disorder::Anxiety)
        );
    }

    #[tokio::test]
    async fn anxiety_walk_persists_severity_then_thanks() {
        let (runner, users) = setup(StubClassifier::new(Disorder::Anxiety)).await;
        narrate(&runner).await;

        for answer in ["1", "1", "1", "1", "1", "1"] {
            let (_, status) = say(&runner, answer).await;
            assert_eq!(status, ExecutionStatus::WaitingForInput);
        }
        let (last, status) = say(&runner, "0").await;

        assert_eq!(status, ExecutionStatus::Completed);
        assert!(last.contains("Mild"));
        let session = runner.session(&diagnosis_session_id("alice")).await.unwrap();
        assert_eq!(
            session.context.get_sync::<String>(session_keys::SEVERITY).as_deref(),
            Some("Mild")
        );
        let user = users.find_user("alice").await.unwrap().unwrap();
        assert_eq!(user.severity, "Mild");

        let (after, status) = say(&runner, "hello?").await;
        assert_eq!(after, THANK_YOU);
        assert_eq!(status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn invalid_answers_reprompt_without_advancing() {
        let (runner, _) = setup(StubClassifier::new(Disorder::Depression)).await;
        narrate(&runner).await;
        say(&runner, "2").await;

        let (reply, status) = say(&runner, "sometimes").await;

        assert!(reply.starts_with(INVALID_ANSWER));
        assert!(reply.ends_with(DEPRESSION.items[1]));
        assert_eq!(status, ExecutionStatus::WaitingForInput);
        let (next, _) = say(&runner, "3").await;
        assert_eq!(next, DEPRESSION.items[2]);
    }

    #[tokio::test]
    async fn depression_walk_ends_after_nine_items() {
        let (runner, users) = setup(StubClassifier::new(Disorder::Depression)).await;
        let opening = narrate(&runner).await;
        assert!(opening.ends_with(DEPRESSION.items[0]));

        for (asked, answer) in ["2", "2", "2", "2", "2", "2", "2", "2"].into_iter().enumerate() {
            let (next, status) = say(&runner, answer).await;
            assert_eq!(next, DEPRESSION.items[asked + 1]);
            assert_eq!(status, ExecutionStatus::WaitingForInput);
        }
        let (last, status) = say(&runner, "0").await;

        assert_eq!(status, ExecutionStatus::Completed);
        assert!(last.starts_with(
            "The Severity of your Depression Disorder is Moderately Severe."
        ));
        let user = users.find_user("alice").await.unwrap().unwrap();
        assert_eq!(user.disorder, "Depression");
        assert_eq!(user.severity, "Moderately Severe");
    }

    #[tokio::test]
    async fn ptsd_gate_no_finishes_as_minimal() {
        let (runner, users) = setup(StubClassifier::new(Disorder::Ptsd)).await;
        let opening = narrate(&runner).await;
        assert!(opening.ends_with(PTSD.opening_question()));

        let (reply, status) = say(&runner, "No").await;

        assert_eq!(status, ExecutionStatus::Completed);
        assert!(reply.starts_with("PTSDs are generally caused"));
        let user = users.find_user("alice").await.unwrap().unwrap();
        assert_eq!(user.severity, "Minimal");
    }

    #[tokio::test]
    async fn addiction_walk_reaches_severe() {
        let (runner, users) = setup(StubClassifier::new(Disorder::Addiction)).await;
        narrate(&runner).await;

        for _ in 1..ADDICTION.items.len() {
            say(&runner, "3").await;
        }
        let (last, _) = say(&runner, "3").await;

        assert!(last.starts_with("The Severity of your Addiction Disorder is Severe."));
        assert_eq!(users.find_user("alice").await.unwrap().unwrap().severity, "Severe");
    }

    #[tokio::test]
    async fn restarting_clears_a_finished_questionnaire() {
        let (runner, _) = setup(StubClassifier::new(Disorder::Ptsd)).await;
        narrate(&runner).await;
        say(&runner, "no").await;

        runner
            .start(&diagnosis_session_id("alice"), |ctx| {
                ctx.set_sync(session_keys::USERNAME, "alice")
            })
            .await
            .unwrap();
        let (reply, _) = say(&runner, "I feel sad").await;

        assert!(reply.starts_with("Can you share any recent events"));
    }

    #[tokio::test]
    async fn classifier_failure_keeps_the_session_on_the_classify_step() {
        let (runner, users) = setup(Arc::new(DownClassifier)).await;
        say(&runner, "one").await;
        say(&runner, "two").await;

        let err = runner
            .run_with_input(&diagnosis_session_id("alice"), |ctx| {
                ctx.set_sync(session_keys::USER_INPUT, "three")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::TaskExecutionFailed(_)));
        let session = runner.session(&diagnosis_session_id("alice")).await.unwrap();
        assert_eq!(session.current_task_id, std::any::type_name::<ClassifyTask>());
        assert_eq!(
            session.context.get_sync::<String>(session_keys::NARRATIVE).as_deref(),
            Some("one two")
        );
        assert!(!users.find_user("alice").await.unwrap().unwrap().diagnosed());
    }
}
