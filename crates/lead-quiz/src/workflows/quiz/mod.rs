//! Lead-scoring quiz: question catalog, scoring, resumable sessions, postcode enrichment and
//! form handoff.

pub mod catalog;
pub mod domain;
pub mod engine;
pub mod enrichment;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod session;
pub mod submission;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, Question, QuestionCatalog, QuestionKind, QuestionOption};
pub use domain::{
    Answer, AnswerState, ContactField, ContactInfo, ContactUpdate, ContactValidationError,
    InvalidSessionKey, SessionKey, DEFAULT_SESSION_KEY,
};
pub use engine::{QuizEngine, SessionView, SubmissionOutcome};
pub use enrichment::{
    resolve_postcode_score, EnrichmentError, HttpPostcodeEnricher, PostcodeEnricher,
    StaticPostcodeEnricher,
};
pub use repository::{
    DecodeError, FileSessionRepository, MemorySessionRepository, PersistedSession,
    RepositoryError, SessionRepository, SCHEMA_VERSION,
};
pub use router::{quiz_router, AnswerRequest};
pub use scoring::{LeadTier, ScoreComponent, ScoreResult, ScoringEngine};
pub use service::{QuizService, QuizSettings};
pub use session::{QuizError, QuizSession, QuizStage};
pub use submission::{
    normalize_attribution, HttpFormSubmitter, LeadSubmission, LoggingSubmitter,
    SubmissionAdapter, SubmissionError, SubmissionReceipt,
};
