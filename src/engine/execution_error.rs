use thiserror::Error;

use crate::{client::ClientError, extensions::ExtensionError, metadata::ResolutionError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{operation} without a WHERE clause is blocked. Add a WHERE clause or change the {operation} setting")]
    GuardRejection { operation: String },
    /// A record failed after `applied` records had already been changed; nothing is rolled back.
    #[error("{source} ({applied} records were changed before the error)")]
    PartialMutation {
        applied: usize,
        #[source]
        source: ClientError,
    },
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Query cannot be executed from the {0} state")]
    InvalidState(String),
    #[error("Query cancelled after {applied} records were changed")]
    Cancelled { applied: usize },
}
