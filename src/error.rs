//! Fatal error taxonomy.
//!
//! Only run-level failures are errors. Everything that can go wrong with a
//! single document is recorded as an [`OutcomeStatus`](crate::models::OutcomeStatus)
//! and never aborts the batch loop.

use thiserror::Error;

/// Which side of the migration a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Source,
    Destination,
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Store::Source => write!(f, "source"),
            Store::Destination => write!(f, "destination"),
        }
    }
}

/// Errors that abort a validation run.
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// Invalid configuration or run intent; raised before any data access.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A store could not be reached, or the connection failed mid-stream.
    #[error("{store} connectivity error: {source}")]
    Connectivity {
        store: Store,
        #[source]
        source: sqlx::Error,
    },

    /// The result file could not be created or written.
    #[error("result sink error: {0}")]
    Sink(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    pub fn source_store(source: sqlx::Error) -> Self {
        ValidatorError::Connectivity {
            store: Store::Source,
            source,
        }
    }

    pub fn destination_store(source: sqlx::Error) -> Self {
        ValidatorError::Connectivity {
            store: Store::Destination,
            source,
        }
    }
}
