#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Error type shared by every Themis operation.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ThemisError>;

/// Everything that can go wrong while talking to Themis.
#[derive(Error, Debug)]
pub enum ThemisError {
    /// A submit or download was attempted on something that is not an
    /// exercise, or the exercise page carries no submit form.
    #[error("`{path}` does not accept submissions")]
    NotSubmittable {
        /// Path of the node.
        path: String,
    },

    /// The portal answered an upload or trigger with a non-success response.
    #[error("{operation} was rejected by {url} (HTTP {status})")]
    RequestRejected {
        /// What we were trying to do, e.g. "upload" or "re-trigger".
        operation: &'static str,
        /// URL the request ended up at.
        url:       String,
        /// HTTP status code returned.
        status:    u16,
    },

    /// None of the files in a batch match a suffix accepted by the exercise.
    #[error("none of {files:?} has a file type accepted by this exercise")]
    UnknownFileType {
        /// Files that were offered.
        files: Vec<String>,
    },

    /// A named child, course or group lookup had no match.
    #[error("no entry named `{name}` in `{parent}`")]
    NotFound {
        /// The name that was looked up.
        name:   String,
        /// Path of the node that was searched.
        parent: String,
    },

    /// The node has no status block.
    #[error("status information is not available for `{path}`")]
    NotAvailable {
        /// Path of the node.
        path: String,
    },

    /// The course page reported an error instead of its content.
    #[error("course `{path}` is unavailable")]
    CourseUnavailable {
        /// Path of the course.
        path: String,
    },

    /// Polling did not converge within the configured bounds.
    #[error("judging at {location} did not finish after {polls} polls")]
    Timeout {
        /// Result location that was being polled.
        location: String,
        /// Number of polls issued before giving up.
        polls:    u32,
    },

    /// The caller cancelled the poll loop.
    #[error("polling of {location} was cancelled")]
    Cancelled {
        /// Result location that was being polled.
        location: String,
    },

    /// The remote bounced us to the login page.
    #[error("session is no longer authenticated (redirected while fetching {url})")]
    SessionInvalid {
        /// URL that was requested.
        url: String,
    },

    /// Credentials were refused.
    #[error("login for user {user} failed")]
    LoginFailed {
        /// User that tried to log in.
        user: String,
    },

    /// A credential provider had nothing to offer.
    #[error("no credentials available: {0}")]
    MissingCredentials(String),

    /// A page lacks a structure that must be present.
    #[error("unexpected page at {url}: {reason}")]
    MalformedPage {
        /// URL of the page.
        url:    String,
        /// What was missing or wrong.
        reason: String,
    },

    /// The HTTP client failed before a response was available.
    #[error("{method} {url} failed")]
    Transport {
        /// HTTP method.
        method: &'static str,
        /// Requested URL.
        url:    String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A local file could not be read or written.
    #[error("could not access {}", path.display())]
    Io {
        /// Local path involved.
        path:   PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A URL could not be built from the base URL and a path.
    #[error("invalid url for `{0}`")]
    Url(String, #[source] url::ParseError),
}

impl ThemisError {
    /// Builds a [`ThemisError::MalformedPage`].
    pub(crate) fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPage {
            url:    url.into(),
            reason: reason.into(),
        }
    }

    /// Returns true when the error can only be fixed by logging in again.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::SessionInvalid { .. } | Self::LoginFailed { .. } | Self::MissingCredentials(_)
        )
    }
}
