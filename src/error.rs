//! Crate-level error type.

use thiserror::Error;

use crate::budget::EstimationError;
use crate::oracle::{OracleError, ParseError};

/// Errors surfaced by the public pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("response parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("estimation error: {0}")]
    Estimation(#[from] EstimationError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
