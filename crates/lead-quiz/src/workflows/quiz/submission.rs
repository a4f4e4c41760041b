use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::domain::{AnswerState, ContactInfo};
use super::scoring::ScoreResult;

/// Form payload handed to the external form backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadSubmission {
    #[serde(rename = "form-name")]
    pub form_name: String,
    /// JSON-encoded answers, opaque to the form backend.
    pub answers: String,
    pub raw_score: u32,
    pub postcode_score: u32,
    pub final_score: u32,
    pub lead_tier: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub postcode: String,
    pub attribution: String,
    pub submitted_at: String,
}

impl LeadSubmission {
    pub fn build(
        form_name: &str,
        answers: &AnswerState,
        contact: &ContactInfo,
        score: &ScoreResult,
        attribution: Option<&str>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, SubmissionError> {
        Ok(Self {
            form_name: form_name.to_string(),
            answers: serde_json::to_string(answers)?,
            raw_score: score.raw_score,
            postcode_score: score.postcode_score,
            final_score: score.final_score,
            lead_tier: score.tier.label().to_string(),
            name: contact.name.trim().to_string(),
            email: contact.email.trim().to_string(),
            phone: contact.phone.trim().to_string(),
            postcode: contact.postcode.trim().to_string(),
            attribution: normalize_attribution(attribution),
            submitted_at: submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }
}

/// Query string of the page at submit time, without the leading `?`.
pub fn normalize_attribution(raw: Option<&str>) -> String {
    raw.map(|value| value.trim().trim_start_matches('?').to_string())
        .unwrap_or_default()
}

/// Acknowledgement of a successful handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Trait describing the outbound lead handoff (form backend, CRM webhook, ...).
#[async_trait]
pub trait SubmissionAdapter: Send + Sync {
    async fn submit(&self, lead: &LeadSubmission) -> Result<SubmissionReceipt, SubmissionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("could not encode answers: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("form endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("form endpoint rejected the submission with status {status}")]
    Rejected { status: u16 },
    #[error("form backend unavailable: {0}")]
    Unavailable(String),
}

/// Posts leads as `application/x-www-form-urlencoded`, following redirects.
#[derive(Debug, Clone)]
pub struct HttpFormSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFormSubmitter {
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
impl SubmissionAdapter for HttpFormSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        let response = self.client.post(&self.endpoint).form(lead).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(SubmissionReceipt {
                status: status.as_u16(),
                location: Some(response.url().to_string()),
            })
        } else {
            Err(SubmissionError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

/// Records leads in the log when no form endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSubmitter;

#[async_trait]
impl SubmissionAdapter for LoggingSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        tracing::info!(
            form = %lead.form_name,
            tier = %lead.lead_tier,
            final_score = lead.final_score,
            "lead captured without a form endpoint"
        );
        Ok(SubmissionReceipt {
            status: 200,
            location: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::quiz::scoring::LeadTier;
    use chrono::TimeZone;

    #[test]
    fn build_flattens_score_contact_and_attribution() {
        let contact = ContactInfo {
            name: " Ada Lovelace ".to_string(),
            email: "ada@example.test".to_string(),
            phone: "07700 900123".to_string(),
            postcode: "SW1A 1AA".to_string(),
            consent: true,
        };
        let score = ScoreResult {
            raw_score: 12,
            postcode_score: 2,
            final_score: 14,
            tier: LeadTier::Warm,
            components: Vec::new(),
        };
        let submitted_at = Utc
            .with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
            .single()
            .expect("valid timestamp");

        let lead = LeadSubmission::build(
            "dental-quiz",
            &AnswerState::default(),
            &contact,
            &score,
            Some("?utm_source=google&utm_campaign=implants"),
            submitted_at,
        )
        .expect("lead builds");

        assert_eq!(lead.name, "Ada Lovelace");
        assert_eq!(lead.lead_tier, "Warm");
        assert_eq!(lead.final_score, 14);
        assert_eq!(lead.answers, "{}");
        assert_eq!(lead.attribution, "utm_source=google&utm_campaign=implants");
        assert_eq!(lead.submitted_at, "2026-03-14T09:30:00Z");
    }

    #[test]
    fn missing_attribution_is_blank() {
        assert_eq!(normalize_attribution(None), "");
        assert_eq!(normalize_attribution(Some("  ")), "");
    }
}
