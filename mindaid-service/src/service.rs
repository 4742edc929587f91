use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use dashmap::DashMap;
use mindaid_flow::{ExecutionStatus, FlowRunner, SessionStorage};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    auth::{self, AuthUser, ChatUser},
    config::Config,
    counseling::{build_counseling_workflow, counseling_session_id},
    diagnosis::{Disorder, OPENING_PROMPT, build_diagnosis_workflow, diagnosis_session_id},
    error::{AppError, AppResult},
    ml::{ChatModel, DisorderClassifier, GuidanceRetriever},
    models::{
        AuthResponse, ChatRequest, CounselingResponse, DiagnosisResponse, Doctor, GUEST_USER,
        HistoryResponse, HomeResponse, LegacyChatQuery, LoginRequest, NO_EMAIL, NewUser,
        PageResponse, SignupRequest,
    },
    repository::{DoctorDirectory, UserRepository},
    session_keys,
    telemetry::correlation_id_middleware,
};

const NO_HISTORY: &str = "No conversation history available.";
const COUNSEL_GREETING: &str = "Hi, I am your counsellor. How have you been feeling lately?";
const NO_ACTIVE_WORKFLOW: &str = "Please visit the diagnosis or counseling page to start a session.";

/// Which chat page a user opened last; drives the legacy `/get` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Diagnosis,
    Counseling,
}

/// External collaborators the service is wired with
pub struct Dependencies {
    pub users: Arc<dyn UserRepository>,
    pub doctors: Arc<dyn DoctorDirectory>,
    pub sessions: Arc<dyn SessionStorage>,
    pub classifier: Arc<dyn DisorderClassifier>,
    pub llm: Arc<dyn ChatModel>,
    pub retriever: Arc<dyn GuidanceRetriever>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserRepository>,
    pub doctors: Arc<dyn DoctorDirectory>,
    pub diagnosis: FlowRunner,
    pub counseling: FlowRunner,
    pub active: Arc<DashMap<String, Workflow>>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: Config, deps: Dependencies) -> Self {
        let diagnosis = FlowRunner::new(
            Arc::new(build_diagnosis_workflow(deps.classifier, deps.users.clone())),
            deps.sessions.clone(),
        );
        let counseling = FlowRunner::new(
            Arc::new(build_counseling_workflow(deps.llm, deps.retriever)),
            deps.sessions,
        )
        .with_max_chat_messages(config.max_chat_messages);

        Self {
            cookie_key: auth::cookie_key(config.secret_key.as_deref()),
            config: Arc::new(config),
            users: deps.users,
            doctors: deps.doctors,
            diagnosis,
            counseling,
            active: Arc::new(DashMap::new()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/home", get(home))
        .route("/diagnosis", get(diagnosis_page))
        .route("/diagnosis/chat", post(diagnosis_chat))
        .route("/counsel", get(counsel_page))
        .route("/counsel/chat", post(counsel_chat))
        .route("/history", get(history))
        .route("/doctor", get(list_doctors))
        .route("/doctor/{username}", get(get_doctor))
        .route("/get", get(legacy_chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn required(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Passwords are hashed exactly as typed; only blank ones are refused
fn required_password(value: &str) -> Option<&str> {
    (!value.trim().is_empty()).then_some(value)
}

async fn signup(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(request): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let (Some(firstname), Some(lastname), Some(username), Some(password)) = (
        required(&request.firstname),
        required(&request.lastname),
        required(&request.username),
        required_password(&request.password),
    ) else {
        return Err(AppError::BadRequest(
            "First name, last name, username and password are required".to_string(),
        ));
    };

    if !auth::valid_username(username) {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits and . _ - @".to_string(),
        ));
    }

    if username.eq_ignore_ascii_case(GUEST_USER) {
        return Err(AppError::Conflict(
            "This username is reserved. Please choose a different username.".to_string(),
        ));
    }

    let password_hash = auth::hash_password(password.to_string(), state.config.bcrypt_cost).await?;
    let email = request
        .email
        .as_deref()
        .and_then(required)
        .unwrap_or(NO_EMAIL)
        .to_string();

    state
        .users
        .create_user(NewUser {
            username: username.to_string(),
            password_hash,
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            email,
        })
        .await?;

    info!(username = %username, "User signed up");

    Ok((
        StatusCode::CREATED,
        auth::issue_session(jar, username),
        Json(AuthResponse {
            username: username.to_string(),
            redirect: "/home".to_string(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let (Some(username), Some(password)) =
        (required(&request.username), required_password(&request.password))
    else {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    };

    let user = state
        .users
        .find_user(username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(password.to_string(), user.password).await? {
        info!(username = %username, "Rejected login");
        return Err(AppError::InvalidCredentials);
    }

    info!(username = %username, "User logged in");

    Ok((
        auth::issue_session(jar, username),
        Json(AuthResponse {
            username: username.to_string(),
            redirect: "/home".to_string(),
        }),
    ))
}

async fn logout(jar: SignedCookieJar) -> impl IntoResponse {
    (auth::clear_session(jar), Json(json!({ "redirect": "/" })))
}

async fn home(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> AppResult<Json<HomeResponse>> {
    let user = state
        .users
        .find_user(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {username} not found")))?;

    Ok(Json(HomeResponse {
        diagnosed: user.diagnosed(),
        counseled: user.counseled(),
        username: user.username,
        date: user.date,
        disorder: user.disorder,
        severity: user.severity,
    }))
}

async fn diagnosis_page(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> AppResult<Json<DiagnosisResponse>> {
    state
        .diagnosis
        .start(&diagnosis_session_id(&username), |ctx| {
            ctx.set_sync(session_keys::USERNAME, &username)
        })
        .await?;
    state.active.insert(username.clone(), Workflow::Diagnosis);

    info!(username = %username, "Diagnosis session reset");

    Ok(Json(DiagnosisResponse {
        message: OPENING_PROMPT.to_string(),
        disorder: None,
        severity: None,
        completed: false,
    }))
}

async fn diagnosis_chat(
    State(state): State<AppState>,
    ChatUser(username): ChatUser,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<DiagnosisResponse>> {
    Ok(Json(diagnose(&state, &username, &request.user_input).await?))
}

/// One diagnosis transition for `username`
async fn diagnose(state: &AppState, username: &str, input: &str) -> AppResult<DiagnosisResponse> {
    let input = required(input)
        .ok_or_else(|| AppError::BadRequest("Message must not be empty".to_string()))?;

    let (result, session) = state
        .diagnosis
        .run_with_input(&diagnosis_session_id(username), |ctx| {
            ctx.set_sync(session_keys::USERNAME, username);
            ctx.set_sync(session_keys::USER_INPUT, input);
        })
        .await?;

    let disorder = session
        .context
        .get_sync::<Disorder>(session_keys::DISORDER)
        .map(|d| d.to_string());
    let severity = session.context.get_sync::<String>(session_keys::SEVERITY);

    Ok(DiagnosisResponse {
        message: result.response.unwrap_or_default(),
        disorder,
        severity,
        completed: result.status == ExecutionStatus::Completed,
    })
}

async fn counsel_page(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> AppResult<Json<PageResponse>> {
    let session_id = counseling_session_id(&username);
    state
        .counseling
        .start(&session_id, |ctx| {
            ctx.set_sync(session_keys::USERNAME, &username)
        })
        .await?;

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    state.users.set_counseling_date(&username, &today).await?;
    state.active.insert(username.clone(), Workflow::Counseling);

    info!(username = %username, date = %today, "Counseling session reset");

    Ok(Json(PageResponse {
        username,
        message: COUNSEL_GREETING.to_string(),
    }))
}

async fn counsel_chat(
    State(state): State<AppState>,
    ChatUser(username): ChatUser,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<CounselingResponse>> {
    Ok(Json(counsel(&state, &username, &request.user_input).await?))
}

/// One counseling turn for `username`, recorded in the user's history
async fn counsel(state: &AppState, username: &str, input: &str) -> AppResult<CounselingResponse> {
    let input = required(input)
        .ok_or_else(|| AppError::BadRequest("Message must not be empty".to_string()))?;
    let session_id = counseling_session_id(username);

    let (result, _) = state
        .counseling
        .run_with_input(&session_id, |ctx| {
            ctx.set_sync(session_keys::USERNAME, username);
            ctx.set_sync(session_keys::USER_INPUT, input);
        })
        .await?;

    let reply = result.response.unwrap_or_default();
    state
        .users
        .append_history(username, &format!("User: {input} | AI: {reply}"))
        .await?;

    Ok(CounselingResponse {
        message: reply,
        session_id,
    })
}

async fn history(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> AppResult<Json<HistoryResponse>> {
    let history = state
        .users
        .find_user(&username)
        .await?
        .map(|user| user.history)
        .filter(|history| !history.is_empty())
        .unwrap_or_else(|| NO_HISTORY.to_string());

    Ok(Json(HistoryResponse { history }))
}

async fn list_doctors(State(state): State<AppState>) -> AppResult<Json<Vec<Doctor>>> {
    Ok(Json(state.doctors.list_doctors().await?))
}

async fn get_doctor(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Doctor>> {
    state
        .doctors
        .find_doctor(&username)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Doctor {username} not found")))
}

/// Single chat endpoint of the first frontend: answers through whichever page was opened last
async fn legacy_chat(
    State(state): State<AppState>,
    ChatUser(username): ChatUser,
    Query(query): Query<LegacyChatQuery>,
) -> AppResult<String> {
    let active = state.active.get(&username).map(|entry| *entry.value());

    match active {
        Some(Workflow::Diagnosis) => Ok(diagnose(&state, &username, &query.msg).await?.message),
        Some(Workflow::Counseling) => Ok(counsel(&state, &username, &query.msg).await?.message),
        None => Ok(NO_ACTIVE_WORKFLOW.to_string()),
    }
}
