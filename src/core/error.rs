//! Error types.
//!
//! Strata distinguishes four failure domains: configuration errors (reported
//! before any mutation), I/O and backend errors (abort the current run, which
//! is safe to re-execute), torn writes (total loss of trust in the DB set),
//! and user-configuration errors such as a missing genesis on an empty data
//! directory. Internal components never terminate the process; every error is
//! propagated up to the top-level command.

use std::path::PathBuf;
use thiserror::Error;

/// Common Strata error conditions.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Invalid or ambiguous configuration (bad route pattern, unknown
    /// backend type, malformed TOML).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Two logical requests would overlap under the new layout.
    ///
    /// Detected before any mutation; the route table must be fixed.
    #[error(
        "contradictory new DB layout: requests {req0:?} and {req1:?} both target \
         {db_type}/{db_name} with nested tables ({table0:?} vs {table1:?})"
    )]
    ContradictoryLayout {
        req0: String,
        req1: String,
        db_type: String,
        db_name: String,
        table0: String,
        table1: String,
    },

    /// The on-disk layout does not match the configured route table.
    #[error("incompatible chainstore DB layout: {message}; run `strata db migrate` to recover")]
    IncompatibleLayout { message: String },

    /// A flush was interrupted mid-write; the DB set cannot be trusted.
    #[error("dirty flush marker: {message}")]
    TornWrite { message: String },

    /// The migration staging area holds leftover data from a previous run.
    ///
    /// A crash between deleting old DBs and moving staged DBs leaves the only
    /// copy of the data under `tmp/`; it must be inspected manually.
    #[error(
        "staging area {path:?} is not empty; a previous migration may have been \
         interrupted; inspect and clear it before re-running"
    )]
    StagingLeftover { path: PathBuf },

    /// Empty data directory and no genesis to start from.
    #[error("missing genesis for an empty data directory")]
    MissingGenesis,

    /// Filesystem-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage-engine failure.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// Failed to encode or decode a persisted record.
    #[error("codec error: {message}")]
    Codec { message: String },
}

impl StrataError {
    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a Backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a TornWrite error.
    pub fn torn_write(message: impl Into<String>) -> Self {
        Self::TornWrite {
            message: message.into(),
        }
    }

    /// Check if this error was raised before any on-disk mutation.
    ///
    /// Only configuration-domain errors carry this guarantee.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::ContradictoryLayout { .. } | Self::StagingLeftover { .. }
        )
    }
}

impl From<rocksdb::Error> for StrataError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

impl From<bincode::Error> for StrataError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}

/// Result type using StrataError.
pub type Result<T, E = StrataError> = std::result::Result<T, E>;
