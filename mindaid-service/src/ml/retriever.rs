use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::GuidanceRetriever;

/// A chunk of counseling material returned by the retrieval service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    passages: Vec<Passage>,
}

/// Queries a vector-search service over HTTP (`POST {"query", "top_k"}`)
pub struct HttpRetriever {
    client: reqwest::Client,
    url: String,
    top_k: usize,
}

impl HttpRetriever {
    pub fn new(url: impl Into<String>, top_k: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            top_k,
        })
    }
}

#[async_trait]
impl GuidanceRetriever for HttpRetriever {
    async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Passage>> {
        let response = self
            .client
            .post(&self.url)
            .json(&RetrieveRequest {
                query,
                top_k: self.top_k,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<RetrieveResponse>()
            .await?;

        info!(count = response.passages.len(), "Retrieved counseling passages");
        Ok(response.passages)
    }
}

/// Counseling without grounding material
pub struct NoRetriever;

#[async_trait]
impl GuidanceRetriever for NoRetriever {
    async fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<Passage>> {
        Ok(Vec::new())
    }
}
