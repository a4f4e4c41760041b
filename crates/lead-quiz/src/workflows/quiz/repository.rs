use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::QuestionCatalog;
use super::domain::{AnswerState, ContactInfo, SessionKey};
use super::session::{QuizSession, QuizStage};

/// Version written into every stored session blob.
pub const SCHEMA_VERSION: u32 = 1;

/// Storage abstraction for resumable sessions. Values are opaque encoded blobs.
pub trait SessionRepository: Send + Sync {
    fn load(&self, key: &SessionKey) -> Result<Option<String>, RepositoryError>;
    fn save(&self, key: &SessionKey, blob: &str) -> Result<(), RepositoryError>;
    fn clear(&self, key: &SessionKey) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Stored shape of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub schema_version: u32,
    pub step: usize,
    pub answers: AnswerState,
    pub contact: ContactInfo,
    #[serde(default)]
    pub postcode_score: Option<u32>,
    /// Reason of the last rejected handoff, shown again when the session resumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn capture(session: &QuizSession, catalog: &QuestionCatalog) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            step: session.step(catalog),
            answers: session.answers().clone(),
            contact: session.contact().clone(),
            postcode_score: session.postcode_score(),
            failure: match session.stage() {
                QuizStage::Failed { reason } => Some(reason.clone()),
                _ => None,
            },
            updated_at: Utc::now(),
        }
    }

    /// True once the blob has sat untouched for longer than `ttl`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        is_older_than(self.updated_at, ttl, now)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The version is checked before the body so older shapes are never half-read.
    pub fn decode(blob: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(blob)?;
        let found = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64);
        if found != Some(u64::from(SCHEMA_VERSION)) {
            return Err(DecodeError::VersionMismatch {
                found,
                expected: SCHEMA_VERSION,
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Rebuilds a live session, refusing blobs that no longer fit the catalog.
    pub fn restore(self, catalog: &QuestionCatalog) -> Result<QuizSession, DecodeError> {
        if self.step >= catalog.total_steps() {
            return Err(DecodeError::Incompatible(format!(
                "step {} outside 0..{}",
                self.step,
                catalog.total_steps()
            )));
        }

        for (question_id, answer) in self.answers.iter() {
            let question = catalog.question(question_id).ok_or_else(|| {
                DecodeError::Incompatible(format!("unknown question '{question_id}'"))
            })?;
            if !answer.matches_kind(question.kind) {
                return Err(DecodeError::Incompatible(format!(
                    "answer to '{question_id}' is not {}",
                    question.kind.label()
                )));
            }
            if let Some(value) = answer
                .values()
                .into_iter()
                .find(|value| question.option(value).is_none())
            {
                return Err(DecodeError::Incompatible(format!(
                    "question '{question_id}' has no option '{value}'"
                )));
            }
        }

        Ok(QuizSession::from_parts(
            catalog,
            self.step,
            self.answers,
            self.contact,
            self.postcode_score,
            self.failure,
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed session blob: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("session schema version {found:?} does not match {expected}")]
    VersionMismatch { found: Option<u64>, expected: u32 },
    #[error("session no longer matches the question catalog: {0}")]
    Incompatible(String),
    #[error("session last saved at {updated_at} has expired")]
    Expired { updated_at: DateTime<Utc> },
}

/// Timestamps in the future never count as expired.
fn is_older_than(saved_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match now.signed_duration_since(saved_at).to_std() {
        Ok(age) => age > ttl,
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    blob: String,
    saved_at: DateTime<Utc>,
}

/// Process-local store, also used by tests.
///
/// With a time-to-live, entries untouched for longer are dropped on the next save.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionRepository {
    sessions: Arc<Mutex<HashMap<SessionKey, StoredBlob>>>,
    ttl: Option<Duration>,
}

impl MemorySessionRepository {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            ttl: Some(ttl),
        }
    }

    fn sessions(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<SessionKey, StoredBlob>>, RepositoryError> {
        self.sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session mutex poisoned".to_string()))
    }

    pub(crate) fn save_at(
        &self,
        key: &SessionKey,
        blob: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions()?;
        if let Some(ttl) = self.ttl {
            sessions.retain(|_, stored| !is_older_than(stored.saved_at, ttl, now));
        }
        sessions.insert(
            key.clone(),
            StoredBlob {
                blob: blob.to_string(),
                saved_at: now,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRepository for MemorySessionRepository {
    fn load(&self, key: &SessionKey) -> Result<Option<String>, RepositoryError> {
        Ok(self.sessions()?.get(key).map(|stored| stored.blob.clone()))
    }

    fn save(&self, key: &SessionKey, blob: &str) -> Result<(), RepositoryError> {
        self.save_at(key, blob, Utc::now())
    }

    fn clear(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        self.sessions()?.remove(key);
        Ok(())
    }
}

/// One JSON file per session key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionRepository {
    dir: PathBuf,
}

impl FileSessionRepository {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl SessionRepository for FileSessionRepository {
    fn load(&self, key: &SessionKey) -> Result<Option<String>, RepositoryError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &SessionKey, blob: &str) -> Result<(), RepositoryError> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let staging = target.with_extension("json.tmp");
        std::fs::write(&staging, blob)?;
        std::fs::rename(&staging, &target)?;
        Ok(())
    }

    fn clear(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
