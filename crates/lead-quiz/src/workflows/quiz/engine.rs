use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{Question, QuestionCatalog};
use super::domain::{AnswerState, ContactInfo, ContactUpdate, SessionKey};
use super::enrichment::resolve_postcode_score;
use super::repository::{PersistedSession, SessionRepository};
use super::scoring::{ScoreResult, ScoringEngine};
use super::service::QuizService;
use super::session::{QuizError, QuizSession, QuizStage};
use super::submission::{LeadSubmission, SubmissionReceipt};
use crate::telemetry::{record_degradation, DegradedPath};

/// One visitor's quiz, bound to its storage key. Every transition is persisted.
pub struct QuizEngine<'a, R> {
    service: &'a QuizService<R>,
    key: SessionKey,
    session: QuizSession,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub score: ScoreResult,
    pub receipt: SubmissionReceipt,
    pub redirect_to: String,
}

/// Snapshot rendered to the front end after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_key: SessionKey,
    pub stage: QuizStage,
    pub step: usize,
    pub total_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<Question>,
    pub answers: AnswerState,
    pub contact: ContactInfo,
    pub score: ScoreResult,
    pub submitting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a, R> QuizEngine<'a, R>
where
    R: SessionRepository + 'static,
{
    pub(crate) fn new(service: &'a QuizService<R>, key: SessionKey, session: QuizSession) -> Self {
        Self {
            service,
            key,
            session,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn stage(&self) -> &QuizStage {
        self.session.stage()
    }

    pub fn step(&self) -> usize {
        self.session.step(self.catalog())
    }

    /// True while this session, or another request for the same key, is mid-handoff.
    pub fn is_submitting(&self) -> bool {
        matches!(self.session.stage(), QuizStage::Submitting)
            || self.service.is_submitting(&self.key)
    }

    fn ensure_idle(&self) -> Result<(), QuizError> {
        if self.is_submitting() {
            Err(QuizError::SubmissionInProgress)
        } else {
            Ok(())
        }
    }

    fn catalog(&self) -> &'a QuestionCatalog {
        self.service.catalog()
    }

    /// Live score for the current answers and any resolved postcode score.
    pub fn score(&self) -> ScoreResult {
        ScoringEngine::new(self.catalog())
            .score(self.session.answers(), self.session.postcode_score())
    }

    pub fn view(&self) -> SessionView {
        let catalog = self.catalog();
        let error = match self.session.stage() {
            QuizStage::Failed { reason } => Some(reason.clone()),
            _ => None,
        };

        SessionView {
            session_key: self.key.clone(),
            stage: self.session.stage().clone(),
            step: self.session.step(catalog),
            total_steps: catalog.total_steps(),
            current_question: self.session.current_question(catalog).cloned(),
            answers: self.session.answers().clone(),
            contact: self.session.contact().clone(),
            score: self.score(),
            submitting: self.is_submitting(),
            error,
        }
    }

    pub fn next(&mut self) -> Result<&QuizStage, QuizError> {
        self.ensure_idle()?;
        let catalog = self.catalog();
        if self.session.next(catalog) {
            debug!(session_key = %self.key, stage = self.session.stage().label(), "quiz advanced");
        }
        self.persist();
        Ok(self.session.stage())
    }

    pub fn back(&mut self) -> Result<&QuizStage, QuizError> {
        self.ensure_idle()?;
        let catalog = self.catalog();
        if self.session.back(catalog) {
            debug!(session_key = %self.key, stage = self.session.stage().label(), "quiz stepped back");
        }
        self.persist();
        Ok(self.session.stage())
    }

    pub fn set_answer(&mut self, question_id: &str, value: &str) -> Result<(), QuizError> {
        self.ensure_idle()?;
        let catalog = self.catalog();
        self.session.set_answer(catalog, question_id, value)?;
        self.persist();
        Ok(())
    }

    pub fn update_contact(&mut self, update: ContactUpdate) -> Result<(), QuizError> {
        self.ensure_idle()?;
        self.session.update_contact(update)?;
        self.persist();
        Ok(())
    }

    /// Validates contact details, enriches the postcode once and hands the lead off.
    ///
    /// Rejected attempts (validation, concurrent submit) leave the session untouched. A failed
    /// handoff moves to `Failed` with answers and contact details kept for a retry.
    pub async fn submit(
        &mut self,
        attribution: Option<&str>,
    ) -> Result<SubmissionOutcome, QuizError> {
        let _claim = self.service.claim_submission(&self.key)?;
        self.session.begin_submit()?;
        self.persist();

        let postcode_score = resolve_postcode_score(
            self.service.enricher(),
            &self.session.contact().postcode,
            self.service.settings().enrichment_timeout,
            &self.key,
        )
        .await;
        self.session.record_postcode_score(postcode_score);

        let score = self.score();
        let handoff = match LeadSubmission::build(
            &self.service.settings().form_name,
            self.session.answers(),
            self.session.contact(),
            &score,
            attribution,
            Utc::now(),
        ) {
            Ok(lead) => self.service.adapter().submit(&lead).await,
            Err(err) => Err(err),
        };

        match handoff {
            Ok(receipt) => {
                info!(
                    session_key = %self.key,
                    tier = score.tier.label(),
                    final_score = score.final_score,
                    "lead submitted"
                );
                let catalog = self.catalog();
                self.session.complete_submit(catalog);
                self.clear_store();
                Ok(SubmissionOutcome {
                    score,
                    receipt,
                    redirect_to: self.service.settings().success_redirect.clone(),
                })
            }
            Err(err) => {
                warn!(session_key = %self.key, error = %err, "lead submission failed");
                self.session.fail_submit(err.to_string());
                self.persist();
                Err(QuizError::Submission(err))
            }
        }
    }

    /// Discards answers and contact details and clears the stored session.
    ///
    /// Refused while a handoff for the key is in flight.
    pub fn reset(&mut self) -> Result<&QuizStage, QuizError> {
        self.ensure_idle()?;
        let catalog = self.catalog();
        self.session.reset(catalog);
        self.clear_store();
        debug!(session_key = %self.key, "quiz reset");
        Ok(self.session.stage())
    }

    fn persist(&self) {
        let blob = match PersistedSession::capture(&self.session, self.catalog()).encode() {
            Ok(blob) => blob,
            Err(err) => {
                record_degradation(DegradedPath::SessionSave, self.key.as_str(), &err);
                return;
            }
        };

        if let Err(err) = self.service.repository().save(&self.key, &blob) {
            record_degradation(DegradedPath::SessionSave, self.key.as_str(), &err);
        }
    }

    fn clear_store(&self) {
        if let Err(err) = self.service.repository().clear(&self.key) {
            record_degradation(DegradedPath::SessionClear, self.key.as_str(), &err);
        }
    }
}
