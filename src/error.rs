//! Error types shared by every client component.
//!
//! DESIGN
//! ======
//! One crate-wide `WallError` keeps call sites simple: every backend call,
//! validation step, and config parse returns it. `ErrorCode` gives each
//! variant a stable code and a retry classification so the backoff helper
//! never has to match on variants itself.

// =============================================================================
// ERROR CODE
// =============================================================================

/// Stable machine-readable classification for an error.
pub trait ErrorCode {
    /// Short code such as `"E_TIMEOUT"`.
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same call may succeed.
    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Client-side validation failures. These never reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("content must not be empty")]
    EmptyContent,
    #[error("a category must be selected")]
    MissingCategory,
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("passwords do not match")]
    PasswordMismatch,
}

// =============================================================================
// UPLOAD
// =============================================================================

/// Why an image upload was rejected by the storage service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadFailure {
    #[error("storage bucket `{bucket}` does not exist")]
    BucketMissing { bucket: String },
    #[error("storage policy rejected the upload")]
    PolicyViolation,
    #[error("{0}")]
    Other(String),
}

impl UploadFailure {
    /// Classify a storage error message the way the storage API words them.
    #[must_use]
    pub fn classify(bucket: &str, message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("bucket not found") || lower.contains("bucket does not exist") {
            Self::BucketMissing { bucket: bucket.to_owned() }
        } else if lower.contains("row-level security") {
            Self::PolicyViolation
        } else {
            Self::Other(message.to_owned())
        }
    }
}

// =============================================================================
// WALL ERROR
// =============================================================================

/// Errors produced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum WallError {
    /// The backend is not configured; writes are disabled.
    #[error("backend not configured: running in demo mode")]
    DemoMode,

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The call did not complete within its time budget.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The request never produced a response (DNS, connect, reset).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend responded with status {status}")]
    Response { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The operation requires a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// Input was rejected before any request was issued.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The image could not be stored.
    #[error("image upload failed: {0}")]
    Upload(UploadFailure),

    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl WallError {
    /// Map a transport error, keeping timeouts distinguishable.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { secs: timeout_secs }
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl ErrorCode for WallError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DemoMode => "E_DEMO_MODE",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::Timeout { .. } => "E_TIMEOUT",
            Self::Request(_) => "E_REQUEST",
            Self::Response { .. } => "E_RESPONSE",
            Self::Parse(_) => "E_PARSE",
            Self::NotSignedIn => "E_NOT_SIGNED_IN",
            Self::Validation(_) => "E_VALIDATION",
            Self::Upload(_) => "E_UPLOAD",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Request(_) | Self::Response { status: 429 | 500..=599, .. }
        )
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
