//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Template Errors
// ============================================================================

/// Category of template error
///
/// Every variant is reported to the client as a 500; the kind tells the
/// caller (and the logs) which precondition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateErrorKind {
    /// No environment was installed under the requested application key
    EnvironmentNotConfigured,
    /// The environment's loader does not know the template name
    TemplateNotFound,
    /// The handler produced a context that is not a mapping
    InvalidContext,
    /// The context-processor middleware ran without a processor chain
    ProcessorsNotConfigured,
}

impl TemplateErrorKind {
    /// Stable upper-case code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::EnvironmentNotConfigured => "ENVIRONMENT_NOT_CONFIGURED",
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::InvalidContext => "INVALID_CONTEXT",
            Self::ProcessorsNotConfigured => "PROCESSORS_NOT_CONFIGURED",
        }
    }
}

impl fmt::Display for TemplateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentNotConfigured => write!(f, "environment_not_configured"),
            Self::TemplateNotFound => write!(f, "template_not_found"),
            Self::InvalidContext => write!(f, "invalid_context"),
            Self::ProcessorsNotConfigured => write!(f, "processors_not_configured"),
        }
    }
}

/// Template error with its kind and the message sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TemplateError {
    /// What went wrong
    pub kind: TemplateErrorKind,
    /// Client-facing message
    pub message: String,
}

impl TemplateError {
    /// Create a new template error
    pub fn new(kind: TemplateErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// No environment under `app_key`
    pub fn environment_not_configured(app_key: impl fmt::Display) -> Self {
        Self::new(
            TemplateErrorKind::EnvironmentNotConfigured,
            format!(
                "Template engine is not initialized, call axum_jinja::setup(..., app_key={}) first",
                app_key
            ),
        )
    }

    /// Unknown template name
    pub fn template_not_found(template_name: &str) -> Self {
        Self::new(
            TemplateErrorKind::TemplateNotFound,
            format!("Template '{}' not found", template_name),
        )
    }

    /// Handler context of kind `kind` is not a mapping
    pub fn invalid_context(kind: &str) -> Self {
        Self::new(
            TemplateErrorKind::InvalidContext,
            format!("context should be mapping, not {}", kind),
        )
    }

    /// No processor chain under `key`
    pub fn processors_not_configured(key: impl fmt::Display) -> Self {
        Self::new(
            TemplateErrorKind::ProcessorsNotConfigured,
            format!(
                "Context processors are not configured, call axum_jinja::setup(..., context_processors_key={}) first",
                key
            ),
        )
    }

    /// The error kind
    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

// ============================================================================
// Crate Error
// ============================================================================

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Template lookup or context error
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Template engine failure while loading or rendering
    #[error("Render error: {0}")]
    Render(Box<minijinja::Error>),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(Box<http::Error>),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The template error, if this is one
    pub fn as_template_error(&self) -> Option<&TemplateError> {
        match self {
            Error::Template(err) => Some(err),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (message, template_error) = match self {
            Error::Template(err) => {
                tracing::error!(code = err.kind.code(), "Template error: {}", err.message);
                (err.message.clone(), Some(err))
            }
            Error::Render(err) => {
                tracing::error!("Render error: {:#}", err);
                ("Internal Server Error".to_string(), None)
            }
            Error::Config(err) => {
                tracing::error!("Configuration error: {}", err);
                ("Internal Server Error".to_string(), None)
            }
            Error::Http(err) => {
                tracing::error!("HTTP error: {}", err);
                ("Internal Server Error".to_string(), None)
            }
            Error::Io(err) => {
                tracing::error!("IO error: {}", err);
                ("Internal Server Error".to_string(), None)
            }
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal Server Error".to_string(), None)
            }
        };

        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, message).into_response();
        if let Some(err) = template_error {
            response.extensions_mut().insert(err);
        }
        response
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Error::Render(Box::new(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}
