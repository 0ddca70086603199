use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use reqwest::StatusCode;
use sqlx::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limited by external provider")]
    RateLimited,
    #[error("External error: {0}")]
    External(String),
    #[error("Unauthorized")]
    Unauthorized,
}



impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            AppError::RateLimited => {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (StatusCode::TOO_MANY_REQUESTS, headers, "Rate limited").into_response()
            },
            AppError::External(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: Error) -> Self {
        AppError::Db(value)
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}

/// Transport-level failure from an LLM provider call (completion,
/// summary, embedding). Mirrors `ProviderErrorKind` for the debate
/// engine's transport but keeps its own variants since an LLM call has
/// no `empty`/`missing_price` notion.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider disabled")]
    Disabled,
    #[error("LLM provider rate limited")]
    RateLimited,
    #[error("LLM request timed out")]
    Timeout,
    #[error("LLM network error: {0}")]
    NetworkError(String),
    #[error("LLM API error: {0}")]
    ApiError(String),
    #[error("LLM returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Non-fatal failure kinds a provider call can surface. Never escapes a
/// request handler: the pipeline catches these and records a note instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    MissingKey,
    RateLimited,
    Http5xx,
    Http4xx,
    NetworkError,
    Empty,
    MissingPrice,
    Schema,
    Timeout,
}

impl ProviderErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderErrorKind::MissingKey => "missing_key",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Http5xx => "http_5xx",
            ProviderErrorKind::Http4xx => "http_4xx",
            ProviderErrorKind::NetworkError => "network_error",
            ProviderErrorKind::Empty => "empty",
            ProviderErrorKind::MissingPrice => "missing_price",
            ProviderErrorKind::Schema => "schema",
            ProviderErrorKind::Timeout => "timeout",
        }
    }
}

/// A single degraded-path note, formatted `"<source>_error:<detail>"` per
/// the propagation policy: every non-fatal failure becomes text here
/// instead of an error return.
#[derive(Debug, Clone, Default)]
pub struct EngineNotes {
    notes: Vec<String>,
    pub data_missing: Vec<String>,
    pub degraded: bool,
}

impl EngineNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_error(&mut self, source: &str, kind: ProviderErrorKind, detail: &str) {
        self.notes.push(format!("{source}_error:{}:{detail}", kind.as_str()));
        if matches!(kind, ProviderErrorKind::Http5xx | ProviderErrorKind::NetworkError | ProviderErrorKind::Timeout) {
            self.degraded = true;
        }
    }

    pub fn budget_exceeded(&mut self, stage: &str) {
        self.notes.push(format!("{stage}_budget_exceeded"));
        self.degraded = true;
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.notes.push(text.into());
    }

    pub fn missing_field(&mut self, field: impl Into<String>) {
        self.data_missing.push(field.into());
    }

    pub fn storage_error(&mut self, detail: &str) {
        self.notes.push(format!("storage_error:{detail}"));
    }

    pub fn contract_error(&mut self, provider: &str, detail: &str) {
        self.notes.push(format!("{provider}_contract_error:{detail}"));
    }

    pub fn as_slice(&self) -> &[String] {
        &self.notes
    }

    pub fn into_vec(self) -> Vec<String> {
        self.notes
    }

    pub fn extend(&mut self, other: EngineNotes) {
        self.notes.extend(other.notes);
        self.data_missing.extend(other.data_missing);
        self.degraded = self.degraded || other.degraded;
    }
}

