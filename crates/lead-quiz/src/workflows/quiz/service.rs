use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::catalog::QuestionCatalog;
use super::domain::SessionKey;
use super::engine::QuizEngine;
use super::enrichment::PostcodeEnricher;
use super::repository::{DecodeError, PersistedSession, SessionRepository};
use super::session::{QuizError, QuizSession};
use super::submission::SubmissionAdapter;
use crate::config::QuizConfig;
use crate::telemetry::{record_degradation, DegradedPath};

/// Submission settings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    pub form_name: String,
    pub success_redirect: String,
    pub enrichment_timeout: Duration,
    pub session_ttl: Duration,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self::from(&QuizConfig::default())
    }
}

impl From<&QuizConfig> for QuizSettings {
    fn from(config: &QuizConfig) -> Self {
        Self {
            form_name: config.form_name.clone(),
            success_redirect: config.success_redirect.clone(),
            enrichment_timeout: config.enrichment_timeout,
            session_ttl: config.session_ttl,
        }
    }
}

/// Service composing the catalog, session store, enrichment and form handoff.
pub struct QuizService<R> {
    catalog: Arc<QuestionCatalog>,
    repository: Arc<R>,
    enricher: Arc<dyn PostcodeEnricher>,
    adapter: Arc<dyn SubmissionAdapter>,
    settings: QuizSettings,
    in_flight: Mutex<HashSet<SessionKey>>,
}

impl<R> QuizService<R>
where
    R: SessionRepository + 'static,
{
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        repository: Arc<R>,
        enricher: Arc<dyn PostcodeEnricher>,
        adapter: Arc<dyn SubmissionAdapter>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            catalog,
            repository,
            enricher,
            adapter,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    pub(crate) fn enricher(&self) -> &dyn PostcodeEnricher {
        self.enricher.as_ref()
    }

    pub(crate) fn adapter(&self) -> &dyn SubmissionAdapter {
        self.adapter.as_ref()
    }

    /// Resumes the stored session for `key`, or starts a fresh one.
    ///
    /// Unreadable, outdated, expired or incompatible blobs are discarded rather than surfaced.
    pub fn open(&self, key: SessionKey) -> QuizEngine<'_, R> {
        let session = self.restore(&key).unwrap_or_else(|| QuizSession::new(&self.catalog));
        QuizEngine::new(self, key, session)
    }

    fn restore(&self, key: &SessionKey) -> Option<QuizSession> {
        let blob = match self.repository.load(key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                record_degradation(DegradedPath::SessionLoad, key.as_str(), &err);
                return None;
            }
        };

        let restored = PersistedSession::decode(&blob).and_then(|stored| {
            if stored.is_expired(self.settings.session_ttl, Utc::now()) {
                return Err(DecodeError::Expired {
                    updated_at: stored.updated_at,
                });
            }
            stored.restore(&self.catalog)
        });

        match restored {
            Ok(session) => {
                debug!(session_key = %key, stage = session.stage().label(), "session resumed");
                Some(session)
            }
            Err(err) => {
                self.discard(key, &err);
                None
            }
        }
    }

    fn discard(&self, key: &SessionKey, err: &DecodeError) {
        record_degradation(DegradedPath::SessionDecode, key.as_str(), err);
        if let Err(err) = self.repository.clear(key) {
            record_degradation(DegradedPath::SessionClear, key.as_str(), &err);
        }
    }

    /// Marks `key` as submitting until the returned claim is dropped.
    pub(crate) fn claim_submission(
        &self,
        key: &SessionKey,
    ) -> Result<SubmissionClaim<'_>, QuizError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(key.clone()) {
            return Err(QuizError::SubmissionInProgress);
        }

        Ok(SubmissionClaim {
            in_flight: &self.in_flight,
            key: key.clone(),
        })
    }

    pub fn is_submitting(&self, key: &SessionKey) -> bool {
        self.in_flight
            .lock()
            .map(|in_flight| in_flight.contains(key))
            .unwrap_or(false)
    }
}

/// Releases the in-flight marker for a session when dropped.
pub(crate) struct SubmissionClaim<'a> {
    in_flight: &'a Mutex<HashSet<SessionKey>>,
    key: SessionKey,
}

impl Drop for SubmissionClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.key);
    }
}
