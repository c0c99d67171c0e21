//! Error taxonomy
//!
//! Every failure in the client and manager layers is one of these variants.
//! Nothing below the tool boundary catches and swallows an error, and nothing
//! retries automatically.

use thiserror::Error;

use crate::resource::ResourceKind;

/// A payload or caller input that failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} payload: field `{field}` {reason}")]
pub struct ValidationError {
    /// Record or input shape being validated (e.g. `app`, `operation`)
    pub kind: &'static str,
    /// Offending field, dotted for nested members (e.g. `_links.account`)
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(kind: &'static str, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("API request failed with status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("not found: {path} ({detail})")]
    NotFound { path: String, detail: String },

    #[error("operation {operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },

    #[error("operation {operation} did not finish after {attempts} polls")]
    OperationTimeout { operation: String, attempts: u32 },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },

    #[error("no {kind} with handle {handle}{}", scope_suffix(.scope))]
    NoMatch {
        kind: ResourceKind,
        handle: String,
        scope: Option<String>,
    },

    #[error("{matches} {kind} records share handle {handle}{}", ambiguity_hint(.scope))]
    Ambiguous {
        kind: ResourceKind,
        handle: String,
        matches: usize,
        /// Kind whose handle would narrow the match, if any
        scope: Option<ResourceKind>,
    },
}

impl Error {
    /// HTTP status for errors that came from the remote service.
    ///
    /// `NotFound` reports 404 so it can be handled as a specialized `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

fn scope_suffix(scope: &Option<String>) -> String {
    scope.as_deref().map(|s| format!(" in {s}")).unwrap_or_default()
}

fn ambiguity_hint(scope: &Option<ResourceKind>) -> String {
    match scope {
        Some(kind) => format!("; provide the {kind} handle"),
        None => String::new(),
    }
}

/// Render an error as a single line for the tool boundary.
pub fn describe_error(error: &Error) -> String {
    match error {
        Error::Api { status: 401, .. } => {
            "Authentication failed. Log in with the Aptible CLI or set APTIBLE_TOKEN.".to_string()
        }
        Error::Api { status: 403, .. } => {
            "Permission denied. Check your Aptible role permissions.".to_string()
        }
        Error::Api { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        Error::Api { status, detail } if *status >= 500 => {
            format!("Aptible API temporarily unavailable ({status}): {detail}")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_reports_404_status() {
        let err = Error::NotFound {
            path: "/apps/1".to_string(),
            detail: "missing".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());

        let err = Error::Api {
            status: 500,
            detail: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_validation_error_names_field() {
        let err: Error = ValidationError::new("app", "handle", "is missing").into();
        assert_eq!(err.to_string(), "invalid app payload: field `handle` is missing");
    }

    #[test]
    fn test_no_match_mentions_scope() {
        let err = Error::NoMatch {
            kind: ResourceKind::App,
            handle: "web".to_string(),
            scope: Some("account staging".to_string()),
        };
        assert_eq!(err.to_string(), "no app with handle web in account staging");
    }

    #[test]
    fn test_ambiguous_hint_follows_scope() {
        let err = Error::Ambiguous {
            kind: ResourceKind::App,
            handle: "web".to_string(),
            matches: 2,
            scope: Some(ResourceKind::Account),
        };
        assert_eq!(
            err.to_string(),
            "2 app records share handle web; provide the account handle"
        );

        let err = Error::Ambiguous {
            kind: ResourceKind::Stack,
            handle: "shared-us-west-1".to_string(),
            matches: 2,
            scope: None,
        };
        assert_eq!(err.to_string(), "2 stack records share handle shared-us-west-1");
    }

    #[test]
    fn test_describe_error_masks_auth_failures() {
        let err = Error::Api {
            status: 401,
            detail: "token expired".to_string(),
        };
        assert!(describe_error(&err).starts_with("Authentication failed"));
    }
}
