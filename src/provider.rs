use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Movie {0} not found")]
    NotFound(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CrewMember {
    pub name: String,
    pub job: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Credits {
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

/// Movie details with credits appended, as returned by a lookup by id.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub poster_path: Option<String>,
    pub runtime: Option<u32>,
    pub overview: Option<String>,
    #[serde(default)]
    pub credits: Credits,
}

/// One hit of a title search, passed through to clients unchanged.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub id: u64,
}

#[derive(Deserialize)]
struct SearchPage {
    results: Vec<SearchResult>,
}

#[async_trait]
pub trait MovieProvider: Send + Sync {
    async fn movie_details(&self, id: u64) -> Result<MovieDetails, ProviderError>;

    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchResult>, ProviderError>;
}

pub struct TmdbClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Querying movie provider: {}", url);

        self.http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(ProviderError::Status(status.as_u16(), error_text))
}

#[async_trait]
impl MovieProvider for TmdbClient {
    async fn movie_details(&self, id: u64) -> Result<MovieDetails, ProviderError> {
        let response = self
            .get(
                &format!("/movie/{}", id),
                &[("append_to_response", "credits")],
            )
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(id));
        }

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchResult>, ProviderError> {
        let page: SearchPage = check_status(self.get("/search/movie", &[("query", title)]).await?)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(page.results)
    }
}
