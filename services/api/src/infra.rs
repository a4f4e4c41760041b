use lead_quiz::config::QuizConfig;
use lead_quiz::error::AppError;
use lead_quiz::workflows::quiz::{
    FileSessionRepository, HttpFormSubmitter, HttpPostcodeEnricher, LoggingSubmitter,
    MemorySessionRepository, PostcodeEnricher, QuestionCatalog, QuizService, QuizSettings,
    RepositoryError, SessionKey, SessionRepository, StaticPostcodeEnricher, SubmissionAdapter,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const FORM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Session store selected from `QUIZ_SESSION_DIR`.
#[derive(Debug, Clone)]
pub(crate) enum ConfiguredSessionRepository {
    Memory(MemorySessionRepository),
    File(FileSessionRepository),
}

impl ConfiguredSessionRepository {
    pub(crate) fn from_config(config: &QuizConfig) -> Self {
        match &config.session_dir {
            Some(dir) => Self::File(FileSessionRepository::new(dir)),
            None => Self::Memory(MemorySessionRepository::with_ttl(config.session_ttl)),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }
}

impl SessionRepository for ConfiguredSessionRepository {
    fn load(&self, key: &SessionKey) -> Result<Option<String>, RepositoryError> {
        match self {
            Self::Memory(repository) => repository.load(key),
            Self::File(repository) => repository.load(key),
        }
    }

    fn save(&self, key: &SessionKey, blob: &str) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(repository) => repository.save(key, blob),
            Self::File(repository) => repository.save(key, blob),
        }
    }

    fn clear(&self, key: &SessionKey) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(repository) => repository.clear(key),
            Self::File(repository) => repository.clear(key),
        }
    }
}

pub(crate) fn load_catalog(path: Option<&Path>) -> Result<QuestionCatalog, AppError> {
    match path {
        Some(path) => QuestionCatalog::from_path(path).map_err(AppError::from),
        None => Ok(QuestionCatalog::standard()),
    }
}

/// Wires the quiz service from configuration. Missing endpoints fall back to local stand-ins.
pub(crate) fn build_quiz_service(
    config: &QuizConfig,
) -> Result<QuizService<ConfiguredSessionRepository>, AppError> {
    let catalog = load_catalog(config.catalog_path.as_deref())?;

    let enricher: Arc<dyn PostcodeEnricher> = match &config.enrichment_url {
        Some(url) => Arc::new(HttpPostcodeEnricher::new(
            url.clone(),
            config.enrichment_timeout,
        )?),
        None => Arc::new(StaticPostcodeEnricher::new(0)),
    };

    let adapter: Arc<dyn SubmissionAdapter> = match &config.submission_url {
        Some(url) => Arc::new(HttpFormSubmitter::new(url.clone(), FORM_TIMEOUT)?),
        None => Arc::new(LoggingSubmitter),
    };

    let repository = ConfiguredSessionRepository::from_config(config);
    info!(
        questions = catalog.question_count(),
        sessions = repository.label(),
        enrichment = config.enrichment_url.is_some(),
        form_endpoint = config.submission_url.is_some(),
        "quiz service configured"
    );

    Ok(QuizService::new(
        Arc::new(catalog),
        Arc::new(repository),
        enricher,
        adapter,
        QuizSettings::from(config),
    ))
}

/// Parses `question_id=value` pairs given on the command line.
pub(crate) fn parse_answer(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((question_id, value))
            if !question_id.trim().is_empty() && !value.trim().is_empty() =>
        {
            Ok((question_id.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!(
            "failed to parse '{raw}' as question_id=value (e.g. visit_reason=pain)"
        )),
    }
}
