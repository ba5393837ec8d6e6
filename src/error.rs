// Error types for the vmfleet library.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias using the vmfleet [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

const BODY_PREVIEW_CHARS: usize = 200;

/// What went wrong on the wire: the status if the server answered, a body
/// preview and a short reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    pub status: Option<StatusCode>,
    pub body: String,
    pub reason: String,
}

impl HttpFailure {
    /// Failure for a response that came back with a non-2xx status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        Self {
            status: Some(status),
            body: truncate_body(body),
            reason: "server rejected request".into(),
        }
    }

    /// Failure where no usable response was received.
    pub fn transport(err: &reqwest::Error) -> Self {
        Self {
            status: err.status(),
            body: String::new(),
            reason: err.to_string(),
        }
    }

    /// Whether the body preview carries the backend's duplicate-record message.
    pub fn is_duplicate(&self) -> bool {
        self.body.contains(DUPLICATE_RECORD_MARKER)
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        if !self.body.is_empty() {
            write!(f, ": {}", self.body)?;
        }
        Ok(())
    }
}

/// Message the backend uses when a unique field already exists.
pub const DUPLICATE_RECORD_MARKER: &str = "Duplicate record detected.";

/// Cut a response body down to a log-friendly preview.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_CHARS {
        let mut preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        preview.push_str("...");
        preview
    } else {
        body.to_string()
    }
}

/// Core error types for vmfleet operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Listing or fetching users failed
    #[error("failed to fetch users: {0}")]
    UsersFetch(HttpFailure),

    /// Listing or fetching VMs failed
    #[error("failed to fetch VMs: {0}")]
    VmsFetch(HttpFailure),

    /// A user already exists for this email
    #[error("user already exists with email {email}")]
    DuplicateUser { email: String, failure: HttpFailure },

    /// Creating a user failed for any other reason
    #[error("failed to create user {email}: {failure}")]
    UserCreation { email: String, failure: HttpFailure },

    /// Creating a VM failed on the wire
    #[error("failed to create VM {name}: {failure}")]
    VmCreation { name: String, failure: HttpFailure },

    /// The server accepted the VM but answered with something unusable
    #[error("VM creation for {name} returned an empty or invalid body: {body}")]
    VmInvalidResponse { name: String, body: String },

    #[error("failed to update user {id}: {failure}")]
    UserUpdate { id: i64, failure: HttpFailure },

    #[error("failed to update VM {id}: {failure}")]
    VmUpdate { id: i64, failure: HttpFailure },

    #[error("failed to delete user {id}: {failure}")]
    UserDelete { id: i64, failure: HttpFailure },

    #[error("failed to delete VM {id}: {failure}")]
    VmDelete { id: i64, failure: HttpFailure },

    /// One of the custom VM actions (attach, stop) failed
    #[error("failed to {action} VM {vm_id}: {failure}")]
    VmAction {
        action: &'static str,
        vm_id: i64,
        failure: HttpFailure,
    },

    #[error("login failed for {email}: {failure}")]
    Login { email: String, failure: HttpFailure },

    #[error("failed to fetch account info: {0}")]
    UserInfo(HttpFailure),

    /// No usable token could be obtained
    #[error("token error: {0}")]
    Token(String),

    /// No credentials could be resolved from any source
    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The HTTP status carried by a remote error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.failure().and_then(|f| f.status)
    }

    /// The wire failure behind a remote error.
    pub fn failure(&self) -> Option<&HttpFailure> {
        match self {
            Self::UsersFetch(f) | Self::VmsFetch(f) | Self::UserInfo(f) => Some(f),
            Self::DuplicateUser { failure, .. }
            | Self::UserCreation { failure, .. }
            | Self::VmCreation { failure, .. }
            | Self::UserUpdate { failure, .. }
            | Self::VmUpdate { failure, .. }
            | Self::UserDelete { failure, .. }
            | Self::VmDelete { failure, .. }
            | Self::VmAction { failure, .. }
            | Self::Login { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(250);
        let preview = truncate_body(&body);
        assert_eq!(preview.len(), 203);
        assert!(preview.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn display_carries_canonical_status() {
        let failure = HttpFailure::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        let err = Error::UsersFetch(failure);
        let text = err.to_string();
        assert!(text.contains("429 Too Many Requests"), "{text}");
        assert!(text.contains("slow down"));
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn duplicate_marker_detected_in_body() {
        let failure = HttpFailure::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"code":"ERROR_FATAL","message":"Duplicate record detected."}"#,
        );
        assert!(failure.is_duplicate());
        assert!(!HttpFailure::from_status(StatusCode::BAD_REQUEST, "nope").is_duplicate());
    }

    #[test]
    fn local_errors_have_no_status() {
        assert_eq!(Error::Token("missing".into()).status(), None);
    }
}
