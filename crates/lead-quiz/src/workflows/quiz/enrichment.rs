use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::domain::SessionKey;
use crate::telemetry::{record_degradation, DegradedPath};

/// Postcode → lead score capability provided by an external service.
#[async_trait]
pub trait PostcodeEnricher: Send + Sync {
    async fn lookup(&self, postcode: &str) -> Result<u32, EnrichmentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("postcode is empty")]
    EmptyPostcode,
    #[error("enrichment request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("enrichment endpoint responded with status {0}")]
    Status(u16),
    #[error("enrichment response malformed: {0}")]
    Malformed(String),
    #[error("enrichment timed out after {0:?}")]
    TimedOut(Duration),
}

/// Calls `GET {endpoint}?postcode=...` and reads the numeric `score` field.
#[derive(Debug, Clone)]
pub struct HttpPostcodeEnricher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPostcodeEnricher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PostcodeEnricher for HttpPostcodeEnricher {
    async fn lookup(&self, postcode: &str) -> Result<u32, EnrichmentError> {
        let postcode = postcode.trim();
        if postcode.is_empty() {
            return Err(EnrichmentError::EmptyPostcode);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("postcode", postcode)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| EnrichmentError::Malformed(err.to_string()))?;
        parse_score(&body)
    }
}

/// Fixed score, used when no enrichment endpoint is configured and by the CLI demo.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPostcodeEnricher {
    score: u32,
}

impl StaticPostcodeEnricher {
    pub fn new(score: u32) -> Self {
        Self { score }
    }
}

#[async_trait]
impl PostcodeEnricher for StaticPostcodeEnricher {
    async fn lookup(&self, _postcode: &str) -> Result<u32, EnrichmentError> {
        Ok(self.score)
    }
}

/// Fractional scores are rounded; negative or non-numeric scores are malformed.
pub(crate) fn parse_score(body: &Value) -> Result<u32, EnrichmentError> {
    let score = body
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| EnrichmentError::Malformed("missing numeric 'score' field".to_string()))?;

    if !score.is_finite() || score < 0.0 {
        return Err(EnrichmentError::Malformed(format!(
            "score {score} is not a non-negative number"
        )));
    }

    Ok(score.round().min(f64::from(u32::MAX)) as u32)
}

/// Runs one bounded lookup. Every failure, including the timeout, resolves to 0.
pub async fn resolve_postcode_score(
    enricher: &dyn PostcodeEnricher,
    postcode: &str,
    timeout: Duration,
    session_key: &SessionKey,
) -> u32 {
    match tokio::time::timeout(timeout, enricher.lookup(postcode)).await {
        Ok(Ok(score)) => score,
        Ok(Err(err)) => {
            record_degradation(DegradedPath::Enrichment, session_key.as_str(), &err);
            0
        }
        Err(_) => {
            let err = EnrichmentError::TimedOut(timeout);
            record_degradation(DegradedPath::Enrichment, session_key.as_str(), &err);
            0
        }
    }
}
