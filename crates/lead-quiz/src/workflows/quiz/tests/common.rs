use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::workflows::quiz::domain::{AnswerState, ContactUpdate, SessionKey};
use crate::workflows::quiz::enrichment::{EnrichmentError, PostcodeEnricher};
use crate::workflows::quiz::repository::{RepositoryError, SessionRepository};
use crate::workflows::quiz::submission::{
    LeadSubmission, SubmissionAdapter, SubmissionError, SubmissionReceipt,
};
use crate::workflows::quiz::{
    quiz_router, MemorySessionRepository, QuestionCatalog, QuizEngine, QuizService, QuizSettings,
};

pub(super) fn catalog() -> QuestionCatalog {
    QuestionCatalog::standard()
}

pub(super) fn answers(pairs: &[(&str, &str)]) -> AnswerState {
    let catalog = catalog();
    let mut state = AnswerState::for_catalog(&catalog);
    for (question_id, value) in pairs {
        let question = catalog.question(question_id).expect("known question");
        state.apply(question_id, question.kind, value);
    }
    state
}

pub(super) fn tab(name: &str) -> SessionKey {
    SessionKey::parse(name).expect("valid session key")
}

pub(super) fn complete_contact() -> Vec<ContactUpdate> {
    vec![
        ContactUpdate::Name("Ada Lovelace".to_string()),
        ContactUpdate::Email("ada@example.test".to_string()),
        ContactUpdate::Phone("07700 900123".to_string()),
        ContactUpdate::Postcode("SW1A 1AA".to_string()),
        ContactUpdate::Consent(true),
    ]
}

/// Walks the standard quiz: cosmetic, this week, skip, whitening + straightening,
/// pay as you go, relaxed. Raw score 12.
pub(super) fn answer_scenario<R>(engine: &mut QuizEngine<'_, R>)
where
    R: SessionRepository + 'static,
{
    let steps: [&[&str]; 6] = [
        &["cosmetic"],
        &["this_week"],
        &[],
        &["whitening", "straightening"],
        &["pay_as_you_go"],
        &["relaxed"],
    ];

    for (question, values) in catalog().questions().iter().zip(steps) {
        for value in values {
            engine
                .set_answer(&question.id, value)
                .expect("answer accepted");
        }
        engine.next().expect("quiz advances");
    }
}

pub(super) fn fill_contact<R>(engine: &mut QuizEngine<'_, R>)
where
    R: SessionRepository + 'static,
{
    for update in complete_contact() {
        engine.update_contact(update).expect("contact accepted");
    }
}

pub(super) fn build_service<E, A>(
    enricher: Arc<E>,
    adapter: Arc<A>,
) -> (QuizService<MemorySessionRepository>, MemorySessionRepository)
where
    E: PostcodeEnricher + 'static,
    A: SubmissionAdapter + 'static,
{
    let repository = MemorySessionRepository::default();
    let service = QuizService::new(
        Arc::new(catalog()),
        Arc::new(repository.clone()),
        enricher,
        adapter,
        QuizSettings::default(),
    );
    (service, repository)
}

pub(super) fn quiz_router_with_service(
    service: QuizService<MemorySessionRepository>,
) -> axum::Router {
    quiz_router(Arc::new(service))
}

/// Returns a fixed score and counts lookups.
#[derive(Default)]
pub(super) struct RecordingEnricher {
    score: u32,
    postcodes: Mutex<Vec<String>>,
}

impl RecordingEnricher {
    pub(super) fn scoring(score: u32) -> Self {
        Self {
            score,
            postcodes: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.postcodes.lock().expect("enricher mutex poisoned").len()
    }

    pub(super) fn postcodes(&self) -> Vec<String> {
        self.postcodes.lock().expect("enricher mutex poisoned").clone()
    }
}

#[async_trait]
impl PostcodeEnricher for RecordingEnricher {
    async fn lookup(&self, postcode: &str) -> Result<u32, EnrichmentError> {
        self.postcodes
            .lock()
            .expect("enricher mutex poisoned")
            .push(postcode.to_string());
        Ok(self.score)
    }
}

#[derive(Default)]
pub(super) struct UnreachableEnricher {
    calls: AtomicUsize,
}

impl UnreachableEnricher {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostcodeEnricher for UnreachableEnricher {
    async fn lookup(&self, _postcode: &str) -> Result<u32, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EnrichmentError::Status(503))
    }
}

/// Records handed-off leads; rejects the first `failures` attempts.
#[derive(Default)]
pub(super) struct RecordingSubmitter {
    failures: AtomicUsize,
    leads: Mutex<Vec<LeadSubmission>>,
}

impl RecordingSubmitter {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            leads: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn leads(&self) -> Vec<LeadSubmission> {
        self.leads.lock().expect("submitter mutex poisoned").clone()
    }
}

#[async_trait]
impl SubmissionAdapter for RecordingSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SubmissionError::Rejected { status: 500 });
        }

        self.leads
            .lock()
            .expect("submitter mutex poisoned")
            .push(lead.clone());
        Ok(SubmissionReceipt {
            status: 200,
            location: Some("/thank-you".to_string()),
        })
    }
}

/// Parks every handoff until released, then rejects it.
#[derive(Default)]
pub(super) struct GatedSubmitter {
    entered: Notify,
    release: Notify,
}

impl GatedSubmitter {
    pub(super) async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub(super) fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl SubmissionAdapter for GatedSubmitter {
    async fn submit(&self, _lead: &LeadSubmission) -> Result<SubmissionReceipt, SubmissionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Err(SubmissionError::Rejected { status: 503 })
    }
}

pub(super) struct UnavailableRepository;

impl SessionRepository for UnavailableRepository {
    fn load(&self, _key: &SessionKey) -> Result<Option<String>, RepositoryError> {
        Err(RepositoryError::Unavailable("storage disabled".to_string()))
    }

    fn save(&self, _key: &SessionKey, _blob: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("storage disabled".to_string()))
    }

    fn clear(&self, _key: &SessionKey) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("storage disabled".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
