//! Usage: Crate-wide infrastructure error model (`CODE: message` strings).
//!
//! Sign-in failures shown to the user are modelled separately by
//! `domain::sign_in::SignInError`; `AppError` covers settings, HTTP, callback
//! listener and browser plumbing, and is converted at the gateway boundary.

use std::sync::Arc;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: String,
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `SCREAMING_CASE` identifiers only; anything else is free-form text.
fn is_error_code(candidate: &str) -> bool {
    candidate.starts_with(|c: char| c.is_ascii_uppercase())
        && candidate
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn parse_prefixed(raw: &str) -> Option<(&str, &str)> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("Error:")
        .map(str::trim_start)
        .unwrap_or(trimmed);
    let (code, rest) = trimmed.split_once(':')?;
    let code = code.trim();
    is_error_code(code).then(|| (code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        match parse_prefixed(&value) {
            Some((code, "")) => AppError::new(code, value.trim()),
            Some((code, message)) => AppError::new(code, message),
            None => AppError::new("INTERNAL_ERROR", value),
        }
    }
}

impl From<&'static str> for AppError {
    fn from(value: &'static str) -> Self {
        AppError::from(value.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::new("IO_ERROR", value.to_string()).with_source(value)
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}
