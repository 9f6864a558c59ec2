//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Timed out after {elapsed_ms} ms waiting for {target}")]
    Timeout { target: String, elapsed_ms: u64 },

    #[error("Option '{option}' not found in {target} after {elapsed_ms} ms")]
    OptionNotFound {
        target: String,
        option: String,
        elapsed_ms: u64,
    },

    #[error(
        "No logout control found (tried: {}); visible buttons: [{}]",
        .tried.join(", "),
        .visible_buttons.join(", ")
    )]
    ElementNotFound {
        tried: Vec<String>,
        visible_buttons: Vec<String>,
    },

    #[error("Assertion failed: {0}")]
    ValidationAssertion(String),

    #[error("Uncaught application error: {0}")]
    Application(String),

    #[error("WebDriver error: {error} - {message}")]
    WebDriver { error: String, message: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scenario panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl E2eError {
    /// Stable name of the error kind, as written to run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::Timeout { .. } => "TimeoutError",
            E2eError::OptionNotFound { .. } => "OptionNotFoundError",
            E2eError::ElementNotFound { .. } => "ElementNotFoundError",
            E2eError::ValidationAssertion(_) => "ValidationAssertionError",
            E2eError::Application(_) => "ApplicationError",
            E2eError::WebDriver { .. } | E2eError::Driver(_) => "DriverError",
            E2eError::ServerStartup(_) | E2eError::ServerHealthCheck(_) => "ServerError",
            E2eError::Fixture(_) => "FixtureError",
            E2eError::Config(_) => "ConfigError",
            E2eError::Panicked(_) => "PanicError",
            E2eError::Io(_) => "IoError",
            E2eError::Json(_) | E2eError::Yaml(_) => "SerializationError",
            E2eError::Http(_) => "HttpError",
            E2eError::Image(_) | E2eError::Base64(_) => "ImageError",
        }
    }

    /// Only wait timeouts are worth retrying; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, E2eError::Timeout { .. })
    }

    pub(crate) fn timeout(target: impl Into<String>, elapsed_ms: u64) -> Self {
        E2eError::Timeout {
            target: target.into(),
            elapsed_ms,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_not_found_lists_candidates_and_buttons() {
        let err = E2eError::ElementNotFound {
            tried: vec!["[data-testid=\"logout-button\"]".into(), "button \"Sair\"".into()],
            visible_buttons: vec!["Adicionar Item".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("logout-button"));
        assert!(msg.contains("Adicionar Item"));
        assert_eq!(err.kind(), "ElementNotFoundError");
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(E2eError::timeout("x", 10).is_retryable());
        assert!(!E2eError::ValidationAssertion("x".into()).is_retryable());
    }
}
