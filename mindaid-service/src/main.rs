use mindaid_flow::{InMemorySessionStorage, PostgresSessionStorage, SessionStorage};
use mindaid_service::{
    AppState, Config, Dependencies, build_router,
    ml::{
        ChatModel, DisorderClassifier, GuidanceRetriever, HttpClassifier, HttpRetriever,
        NoRetriever, OpenRouterChat, Unconfigured,
    },
    repository::{DoctorDirectory, InMemoryRepository, PgRepository, UserRepository},
    telemetry::init_tracing,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

type Stores = (
    Arc<dyn UserRepository>,
    Arc<dyn DoctorDirectory>,
    Arc<dyn SessionStorage>,
);

fn in_memory_stores() -> Stores {
    let repository = InMemoryRepository::new();
    (
        Arc::new(repository.clone()),
        Arc::new(repository),
        Arc::new(InMemorySessionStorage::new()),
    )
}

/// Postgres when `DATABASE_URL` is set and reachable, process memory otherwise
async fn create_stores(config: &Config) -> Stores {
    let Some(database_url) = &config.database_url else {
        info!("Using in-memory users and sessions (set DATABASE_URL to use PostgreSQL)");
        return in_memory_stores();
    };

    info!("Using PostgreSQL for users and sessions");
    let repository = match PgRepository::connect(database_url).await {
        Ok(repository) => repository,
        Err(e) => {
            error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                e
            );
            return in_memory_stores();
        }
    };

    let sessions: Arc<dyn SessionStorage> =
        match PostgresSessionStorage::from_pool(repository.pool().clone()).await {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                error!(
                    "Failed to prepare session table: {}. Sessions are kept in memory.",
                    e
                );
                Arc::new(InMemorySessionStorage::new())
            }
        };

    (Arc::new(repository.clone()), Arc::new(repository), sessions)
}

fn create_ml_clients(
    config: &Config,
) -> anyhow::Result<(
    Arc<dyn DisorderClassifier>,
    Arc<dyn ChatModel>,
    Arc<dyn GuidanceRetriever>,
)> {
    let classifier: Arc<dyn DisorderClassifier> = match &config.classifier_url {
        Some(url) => Arc::new(HttpClassifier::new(url.as_str())?),
        None => Arc::new(Unconfigured::new("CLASSIFIER_URL not set")),
    };

    let llm: Arc<dyn ChatModel> = match &config.openrouter_api_key {
        Some(api_key) => Arc::new(OpenRouterChat::new(api_key, config.counsel_model.as_str())),
        None => Arc::new(Unconfigured::new("OPENROUTER_API_KEY not set")),
    };

    let retriever: Arc<dyn GuidanceRetriever> = match &config.retriever_url {
        Some(url) => Arc::new(HttpRetriever::new(url.as_str(), config.retriever_top_k)?),
        None => Arc::new(NoRetriever),
    };

    Ok((classifier, llm, retriever))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let (users, doctors, sessions) = create_stores(&config).await;
    let (classifier, llm, retriever) = create_ml_clients(&config)?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(
        config,
        Dependencies {
            users,
            doctors,
            sessions,
            classifier,
            llm,
            retriever,
        },
    );
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("MindAid service running on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
