use thiserror::Error;

use crate::{engine::ExecutionError, metadata::ResolutionError, parser::ParseError, translator::TranslationError};

/// Any failure surfaced by translating or executing a statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
