use thiserror::Error;

/// Why a line could not be turned into a typed event.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("expected {expected} command, found {found:?}")]
    Command { expected: &'static str, found: String },
    #[error("field `{field}` is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
    #[error("chat type {0:?} is not valid here")]
    ChatType(String),
}
