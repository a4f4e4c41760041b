use serde::Serialize;

use super::catalog::{Question, QuestionCatalog};
use super::domain::{AnswerState, ContactInfo, ContactUpdate, ContactValidationError};
use super::submission::SubmissionError;

/// Position of a session in the quiz flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizStage {
    Answering { step: usize },
    ContactCapture,
    Submitting,
    Submitted,
    /// Contact capture after a rejected handoff; retrying `submit` is allowed.
    Failed { reason: String },
}

impl QuizStage {
    pub const fn label(&self) -> &'static str {
        match self {
            QuizStage::Answering { .. } => "answering",
            QuizStage::ContactCapture => "contact_capture",
            QuizStage::Submitting => "submitting",
            QuizStage::Submitted => "submitted",
            QuizStage::Failed { .. } => "failed",
        }
    }

    fn for_step(step: usize, catalog: &QuestionCatalog) -> Self {
        if step < catalog.question_count() {
            QuizStage::Answering { step }
        } else {
            QuizStage::ContactCapture
        }
    }

    fn accepts_contact(&self) -> bool {
        matches!(self, QuizStage::ContactCapture | QuizStage::Failed { .. })
    }
}

/// Errors raised while applying a transition.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("cannot {action} while the quiz is {stage}")]
    InvalidTransition {
        action: &'static str,
        stage: &'static str,
    },
    #[error("question '{requested}' is not on the current step")]
    QuestionNotActive {
        requested: String,
        active: Option<String>,
    },
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),
    #[error("question '{question_id}' has no option '{value}'")]
    UnknownOption { question_id: String, value: String },
    #[error("{0}")]
    Validation(#[from] ContactValidationError),
    #[error("a submission is already in progress for this session")]
    SubmissionInProgress,
    #[error("we couldn't send your details, please try again ({0})")]
    Submission(#[from] SubmissionError),
}

/// Answers, contact details and position for one visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    stage: QuizStage,
    answers: AnswerState,
    contact: ContactInfo,
    postcode_score: Option<u32>,
}

impl QuizSession {
    pub fn new(catalog: &QuestionCatalog) -> Self {
        Self {
            stage: QuizStage::for_step(0, catalog),
            answers: AnswerState::for_catalog(catalog),
            contact: ContactInfo::default(),
            postcode_score: None,
        }
    }

    /// Rebuilds a session at `step`; answers missing from `answers` stay unanswered.
    ///
    /// A `failure` is only kept on the contact step, where it resumes as `Failed`.
    pub(crate) fn from_parts(
        catalog: &QuestionCatalog,
        step: usize,
        answers: AnswerState,
        contact: ContactInfo,
        postcode_score: Option<u32>,
        failure: Option<String>,
    ) -> Self {
        let mut merged = AnswerState::for_catalog(catalog);
        for (question_id, answer) in answers.iter() {
            merged.insert(question_id.clone(), answer.clone());
        }

        let resumed = QuizStage::for_step(step.min(catalog.question_count()), catalog);
        let stage = match (resumed, failure) {
            (QuizStage::ContactCapture, Some(reason)) => QuizStage::Failed { reason },
            (stage, _) => stage,
        };

        Self {
            stage,
            answers: merged,
            contact,
            postcode_score,
        }
    }

    pub fn stage(&self) -> &QuizStage {
        &self.stage
    }

    pub fn answers(&self) -> &AnswerState {
        &self.answers
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn postcode_score(&self) -> Option<u32> {
        self.postcode_score
    }

    /// Step index in `[0, total_steps - 1]`; every non-answering stage sits on the contact step.
    pub fn step(&self, catalog: &QuestionCatalog) -> usize {
        match self.stage {
            QuizStage::Answering { step } => step,
            _ => catalog.question_count(),
        }
    }

    pub fn current_question<'c>(&self, catalog: &'c QuestionCatalog) -> Option<&'c Question> {
        match self.stage {
            QuizStage::Answering { step } => catalog.question_at(step),
            _ => None,
        }
    }

    /// Advances even when the current question is unanswered. Returns whether the stage changed.
    pub fn next(&mut self, catalog: &QuestionCatalog) -> bool {
        match self.stage {
            QuizStage::Answering { step } => {
                self.stage = QuizStage::for_step(step + 1, catalog);
                true
            }
            _ => false,
        }
    }

    /// No-op on the first step and once a submission has started.
    pub fn back(&mut self, catalog: &QuestionCatalog) -> bool {
        match self.stage {
            QuizStage::Answering { step } if step > 0 => {
                self.stage = QuizStage::Answering { step: step - 1 };
                true
            }
            QuizStage::ContactCapture | QuizStage::Failed { .. }
                if catalog.question_count() > 0 =>
            {
                self.stage = QuizStage::Answering {
                    step: catalog.question_count() - 1,
                };
                true
            }
            _ => false,
        }
    }

    /// Only the question on the current step can be answered.
    pub fn set_answer(
        &mut self,
        catalog: &QuestionCatalog,
        question_id: &str,
        value: &str,
    ) -> Result<(), QuizError> {
        let QuizStage::Answering { step } = self.stage else {
            return Err(QuizError::InvalidTransition {
                action: "answer a question",
                stage: self.stage.label(),
            });
        };

        let question = catalog
            .question(question_id)
            .ok_or_else(|| QuizError::UnknownQuestion(question_id.to_string()))?;

        let active = catalog.question_at(step);
        if active.map(|active| active.id.as_str()) != Some(question_id) {
            return Err(QuizError::QuestionNotActive {
                requested: question_id.to_string(),
                active: active.map(|active| active.id.clone()),
            });
        }

        if question.option(value).is_none() {
            return Err(QuizError::UnknownOption {
                question_id: question_id.to_string(),
                value: value.to_string(),
            });
        }

        self.answers.apply(&question.id, question.kind, value);
        Ok(())
    }

    pub fn update_contact(&mut self, update: ContactUpdate) -> Result<(), QuizError> {
        if !self.stage.accepts_contact() {
            return Err(QuizError::InvalidTransition {
                action: "update contact details",
                stage: self.stage.label(),
            });
        }

        self.contact.apply(update);
        Ok(())
    }

    /// Validates the contact form and enters `Submitting`. Rejections leave the session untouched.
    pub fn begin_submit(&mut self) -> Result<(), QuizError> {
        match self.stage {
            QuizStage::ContactCapture | QuizStage::Failed { .. } => {}
            QuizStage::Submitting => return Err(QuizError::SubmissionInProgress),
            _ => {
                return Err(QuizError::InvalidTransition {
                    action: "submit",
                    stage: self.stage.label(),
                })
            }
        }

        self.contact.validate()?;
        self.stage = QuizStage::Submitting;
        Ok(())
    }

    pub fn record_postcode_score(&mut self, score: u32) {
        self.postcode_score = Some(score);
    }

    /// Successful handoff: answers and contact details are discarded.
    pub fn complete_submit(&mut self, catalog: &QuestionCatalog) {
        self.answers = AnswerState::for_catalog(catalog);
        self.contact = ContactInfo::default();
        self.postcode_score = None;
        self.stage = QuizStage::Submitted;
    }

    /// Failed handoff: everything stays in place for a retry.
    pub fn fail_submit(&mut self, reason: impl Into<String>) {
        self.stage = QuizStage::Failed {
            reason: reason.into(),
        };
    }

    pub fn reset(&mut self, catalog: &QuestionCatalog) {
        *self = Self::new(catalog);
    }
}
