//! HTTP client for the coordinator API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{ConfigurationSource, DocumentQuery, RemotePipeline};
use crate::config::{ConfigurationMap, CoordinatorConfig};
use crate::document::Document;
use crate::errors::PipelineError;
use crate::identity::StageIdentity;

const PROPERTIES_PATH: &str = "/getProperties";
const GET_DOCUMENT_PATH: &str = "/getDocument";
const WRITE_DOCUMENT_PATH: &str = "/writeDocument";
const FAILED_DOCUMENT_PATH: &str = "/failedDocument";

/// Shared HTTP client for one coordinator configuration.
#[derive(Debug, Clone)]
pub struct HttpCoordinator {
    client: Client,
    config: CoordinatorConfig,
}

impl HttpCoordinator {
    /// Creates a coordinator client.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be built.
    pub fn new(config: CoordinatorConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PipelineError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Creates the document pipeline for `identity`.
    ///
    /// # Errors
    ///
    /// Fails if the coordinator address does not form a valid URL.
    pub fn pipeline(&self, identity: &StageIdentity) -> Result<HttpRemotePipeline, PipelineError> {
        let base_url = parse_base_url(identity)?;

        info!(
            stage = %identity.name(),
            base_url = %base_url,
            timeout_seconds = self.config.timeout_seconds,
            "Created coordinator pipeline client"
        );

        Ok(HttpRemotePipeline {
            coordinator: self.clone(),
            stage: identity.name().to_string(),
            base_url,
        })
    }
}

#[async_trait]
impl ConfigurationSource for HttpCoordinator {
    async fn fetch_configuration(
        &self,
        identity: &StageIdentity,
    ) -> Result<ConfigurationMap, PipelineError> {
        let url = endpoint(&parse_base_url(identity)?, PROPERTIES_PATH, identity.name())?;
        debug!(url = %url, "Fetching stage configuration");

        // Fetched once: bootstrap failures are fatal, not retried.
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Coordinator rejected configuration request");
            return Err(PipelineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<serde_json::Value>().await? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(PipelineError::malformed(format!(
                "expected a JSON object of properties, got {other}"
            ))),
        }
    }
}

/// Document exchange for one stage over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemotePipeline {
    coordinator: HttpCoordinator,
    stage: String,
    base_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureReport<'a> {
    document: &'a Document,
    reason: &'a str,
    failed_at: String,
}

impl HttpRemotePipeline {
    fn url(&self, path: &str) -> Result<Url, PipelineError> {
        endpoint(&self.base_url, path, &self.stage)
    }

    /// POSTs `body`, retrying transient failures per the retry configuration.
    async fn post_with_retry<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), PipelineError> {
        let url = self.url(path)?;
        let retry = &self.coordinator.config.retry;
        let mut attempt = 0;

        loop {
            let result = match self.coordinator.client.post(url.clone()).json(body).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    let retryable = retry.should_retry_status(status);
                    (PipelineError::Status { status, body }, retryable)
                }
                Err(e) => (PipelineError::from(e), true),
            };

            let (err, retryable) = result;
            if !retryable || attempt >= retry.max_retries {
                error!(url = %url, attempts = attempt + 1, error = %err, "Coordinator request failed");
                return Err(err);
            }

            let delay = retry.delay_for_attempt(attempt);
            warn!(
                url = %url,
                error = %err,
                retry = attempt + 1,
                max_retries = retry.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Coordinator request failed, will retry"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl RemotePipeline for HttpRemotePipeline {
    async fn fetch_document(&self, query: &DocumentQuery) -> Result<Option<Document>, PipelineError> {
        let url = self.url(GET_DOCUMENT_PATH)?;
        let response = self.coordinator.client.post(url).json(query).send().await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(PipelineError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let text = response.text().await?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }

        serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| PipelineError::malformed(format!("invalid document: {e}")))
    }

    async fn submit(&self, document: &Document) -> Result<(), PipelineError> {
        self.post_with_retry(WRITE_DOCUMENT_PATH, document).await
    }

    async fn mark_failed(&self, document: &Document, reason: &str) -> Result<(), PipelineError> {
        let report = FailureReport {
            document,
            reason,
            failed_at: Utc::now().to_rfc3339(),
        };
        self.post_with_retry(FAILED_DOCUMENT_PATH, &report).await
    }
}

fn parse_base_url(identity: &StageIdentity) -> Result<Url, PipelineError> {
    Url::parse(&identity.coordinator_url()).map_err(|e| PipelineError::InvalidEndpoint {
        reason: format!("{}: {e}", identity.coordinator_url()),
    })
}

fn endpoint(base_url: &Url, path: &str, stage: &str) -> Result<Url, PipelineError> {
    let mut url = base_url.join(path).map_err(|e| PipelineError::InvalidEndpoint {
        reason: format!("Failed to construct URL: {e}"),
    })?;
    url.query_pairs_mut().append_pair("stage", stage);
    Ok(url)
}
