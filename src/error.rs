//! Error taxonomy for the navigation and filtering core.
//!
//! Recoverable conditions (`ConfigError`, `ExternalAppError`) are resolved
//! where they occur and only logged. `FilterError` is surfaced to the fetch
//! layer as a distinct result so a broken matcher never degrades to `Allow`.
//! `InvariantViolation` aborts the current evaluation.

use thiserror::Error;

/// A rule or filter definition that could not be compiled. The offending
/// entry is dropped at load time; the rest of the set is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rule {id}: empty pattern")]
    EmptyPattern { id: String },
    #[error("rule {id}: invalid regex `{pattern}`: {message}")]
    InvalidRegex {
        id: String,
        pattern: String,
        message: String,
    },
    #[error("rule {id}: malformed pattern `{pattern}`: {reason}")]
    MalformedPattern {
        id: String,
        pattern: String,
        reason: &'static str,
    },
    #[error("rule {id}: duplicate id")]
    DuplicateRule { id: String },
    #[error("cannot read {path}: {message}")]
    Unreadable { path: String, message: String },
    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Failure to hand a navigation to an external application.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalAppError {
    #[error("no application can handle this link")]
    NotFound,
    #[error("launching the application was denied")]
    SecurityDenied,
}

/// A logic bug. Never recovered from: the evaluation in progress stops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("settings snapshot for tab {owner} presented for tab {tab}")]
    SnapshotOwnedByOtherTab { owner: u64, tab: u64 },
}

/// Error raised while classifying a resource request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("{stage} filter failed on {url}: {message}")]
    Evaluation {
        stage: &'static str,
        url: String,
        message: String,
    },
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Hard failure on the navigation path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error("unknown tab {0}")]
    UnknownTab(u64),
}

pub type NavResult<T> = Result<T, NavError>;
