//! Error types for Authenticode parsing operations.
//! Hard failures only; decoding problems inside a signature degrade to
//! warnings on the affected component instead of surfacing here.

use thiserror::Error;

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Error types surfaced to the caller. Everything else a hostile blob can
/// trigger is reported through the warning sink.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum ParseError {
    #[error("input exceeds configured ceiling: {size} > {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },
}
