//! Keys used in workflow session contexts

pub const USER_INPUT: &str = "user_input";
pub const USERNAME: &str = "username";
/// Accumulated free-text narrative fed to the classifier
pub const NARRATIVE: &str = "narrative";
pub const DISORDER: &str = "disorder";
pub const PROGRESS: &str = "questionnaire_progress";
pub const SEVERITY: &str = "severity";
/// Standalone question produced by the contextualize step
pub const STANDALONE_QUESTION: &str = "standalone_question";
/// Retrieved passages joined into one block
pub const GUIDANCE: &str = "guidance";
