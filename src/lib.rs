//! # temmies
//!
//! A client for the Themis coursework portal: browse years, courses and
//! exercises, submit files, and wait for the judge to finish every test case.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// The shared client handle
pub mod client;
/// Client settings and lookup policies
pub mod config;
/// Downloading test cases and attachments
pub mod download;
/// Error type used throughout the crate
pub mod error;
/// Helpers shared by the HTML parsers
pub(crate) mod html;
/// Submitting files and polling for judge results
pub mod judge;
/// Folders and exercises of the navigation tree
pub mod node;
/// Logging in and providing credentials
pub mod session;
/// Status blocks of folders and exercises
pub mod status;
/// Submission pages and case statuses
pub mod submission;
/// The HTTP boundary
pub mod transport;
/// Academic years
pub mod year;

pub use client::Themis;
pub use config::{ClientConfig, FileTypePolicy, NameMatch};
pub use download::Download;
pub use error::{Result, ThemisError};
pub use judge::{
    CancellationToken, JudgedSubmission, Pause, PollHooks, Reporter, SubmitOptions,
    SubmitOutcome,
};
pub use node::{Node, NodeKind};
pub use session::{CredentialProvider, Credentials, EnvCredentials};
pub use status::{StatusMap, StatusOptions, StatusValue, SubmissionLink};
pub use submission::{BugReason, CaseStatus, Outcome, Submission};
pub use transport::{Blob, HttpTransport, Page, Transport, Upload, UploadFile};
pub use year::Year;
