//! Error taxonomy shared by every component of the tracker.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why no usable orbital elements could be obtained for an identifier.
///
/// All of these surface to callers as [`Error::NotFound`]; the cause is kept so
/// that logs and diagnostics can still tell a dead network from an unknown id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request never produced a response (DNS, connect, timeout, body read).
    Transport(String),
    /// The catalog answered with a non-2xx status.
    Status(u16),
    /// The catalog answered 2xx with nothing but whitespace.
    EmptyBody,
    /// The body parsed, but held no record for the requested identifier.
    NoMatchingRecord,
    /// Nothing stored locally and no remote source to ask.
    Unavailable,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Transport(msg) => write!(f, "transport failure: {msg}"),
            FetchFailure::Status(code) => write!(f, "catalog returned HTTP {code}"),
            FetchFailure::EmptyBody => f.write_str("catalog returned an empty body"),
            FetchFailure::NoMatchingRecord => f.write_str("catalog response held no matching record"),
            FetchFailure::Unavailable => f.write_str("no catalog source available"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// No usable elements exist for the identifier, locally or remotely.
    #[error("TLE for NORAD {norad_id} not found ({cause})")]
    NotFound { norad_id: u32, cause: FetchFailure },

    /// SGP4 reported a non-zero status; outputs for this call must not be used.
    #[error("SGP4 error code {code}: {message}")]
    Propagation { code: i32, message: String },

    /// A bulk catalog download failed.
    #[error("Catalog download failed ({0})")]
    CatalogUnavailable(FetchFailure),

    /// Element lines could not be decoded into an element set at all.
    #[error("Invalid orbital elements: {0}")]
    InvalidElements(String),

    /// The persistence collaborator failed.
    #[error("Store error: {0}")]
    Store(String),

    #[error("File I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for the failures a batch computation skips instead of aborting on.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Propagation { .. } | Error::InvalidElements(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn io_err(path: impl Into<PathBuf>, err: std::io::Error) -> Error {
    Error::Io {
        path: path.into(),
        source: err,
    }
}
