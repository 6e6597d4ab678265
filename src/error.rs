use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by request decoding and cache lifecycle calls.
///
/// Admission outcomes are not errors: a rejected booking is a plain `false`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A required form field was absent from the request body.
    #[error("missing field {field}")]
    MissingField { field: &'static str },

    /// A numeric form field did not parse as a non-negative integer.
    #[error("invalid {field}: {value:?} is not a non-negative integer")]
    InvalidNumber { field: &'static str, value: String },

    /// The film name was present but blank.
    #[error("film must not be empty")]
    EmptyFilm,

    /// `start_cleanup` was called while a routine was already running.
    #[error("cleanup routine is already running")]
    CleanupAlreadyRunning,

    /// The cleanup tick interval must be non-zero.
    #[error("cleanup interval must be greater than zero")]
    InvalidInterval,
}
