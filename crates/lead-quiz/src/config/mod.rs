use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ENRICHMENT_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_FORM_NAME: &str = "dental-quiz";
const DEFAULT_SUCCESS_REDIRECT: &str = "/thank-you";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub quiz: QuizConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            quiz: QuizConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// External collaborators and storage used by the quiz workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizConfig {
    /// Postcode scoring endpoint. Enrichment resolves to 0 when unset.
    pub enrichment_url: Option<String>,
    pub enrichment_timeout: Duration,
    /// Form backend receiving finished leads. Leads are only logged when unset.
    pub submission_url: Option<String>,
    pub form_name: String,
    pub success_redirect: String,
    /// Directory for file-backed sessions; sessions stay in memory when unset.
    pub session_dir: Option<PathBuf>,
    /// Stored sessions untouched for longer restart from the first question.
    pub session_ttl: Duration,
    /// CSV catalog replacing the built-in questions.
    pub catalog_path: Option<PathBuf>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            enrichment_url: None,
            enrichment_timeout: Duration::from_millis(DEFAULT_ENRICHMENT_TIMEOUT_MS),
            submission_url: None,
            form_name: DEFAULT_FORM_NAME.to_string(),
            success_redirect: DEFAULT_SUCCESS_REDIRECT.to_string(),
            session_dir: None,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            catalog_path: None,
        }
    }
}

impl QuizConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let enrichment_timeout_ms = match non_empty_var("QUIZ_ENRICHMENT_TIMEOUT_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or(ConfigError::InvalidEnrichmentTimeout)?,
            None => DEFAULT_ENRICHMENT_TIMEOUT_MS,
        };

        let session_ttl_secs = match non_empty_var("QUIZ_SESSION_TTL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidSessionTtl)?,
            None => DEFAULT_SESSION_TTL_SECS,
        };

        Ok(Self {
            enrichment_url: non_empty_var("QUIZ_ENRICHMENT_URL"),
            enrichment_timeout: Duration::from_millis(enrichment_timeout_ms),
            submission_url: non_empty_var("QUIZ_SUBMISSION_URL"),
            form_name: non_empty_var("QUIZ_FORM_NAME")
                .unwrap_or_else(|| DEFAULT_FORM_NAME.to_string()),
            success_redirect: non_empty_var("QUIZ_SUCCESS_REDIRECT")
                .unwrap_or_else(|| DEFAULT_SUCCESS_REDIRECT.to_string()),
            session_dir: non_empty_var("QUIZ_SESSION_DIR").map(PathBuf::from),
            session_ttl: Duration::from_secs(session_ttl_secs),
            catalog_path: non_empty_var("QUIZ_CATALOG_PATH").map(PathBuf::from),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEnrichmentTimeout,
    InvalidSessionTtl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEnrichmentTimeout => write!(
                f,
                "QUIZ_ENRICHMENT_TIMEOUT_MS must be a positive number of milliseconds"
            ),
            ConfigError::InvalidSessionTtl => {
                write!(f, "QUIZ_SESSION_TTL_SECS must be a positive number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidEnrichmentTimeout
            | ConfigError::InvalidSessionTtl => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
