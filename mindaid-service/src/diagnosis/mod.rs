//! The diagnosis questionnaire: three narrative turns, one classifier call, then the instrument
//! for the predicted disorder.

pub mod instruments;
mod tasks;
mod workflow;

pub use instruments::{AnswerDomain, Disorder, Instrument, Progress, Step};
pub use tasks::{ClassifyTask, QuestionnaireTask, SymptomsTask, TriggersTask};
pub use workflow::{
    DIAGNOSIS_GRAPH, OPENING_PROMPT, THANK_YOU, build_diagnosis_workflow, diagnosis_session_id,
};
