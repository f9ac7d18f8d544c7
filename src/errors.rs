use thiserror::Error;
use uuid::Uuid;

/// Enumerates errors returned by the store subsystem. Finding no rows
/// is not an error: lookups return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// Represents a store that could not be reached at all.
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Why a participant number failed validation. The messages are shown
/// to participants as-is.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The number was missing, not numeric or not positive.
    #[error("Please enter a valid participant number.")]
    InvalidInput,

    /// No issued participant has this number.
    #[error("Invalid participant number. Please check your participant number and try again.")]
    NotFound,

    /// A post-test already exists for this number.
    #[error("You have already submitted a post-test. Each participant can only submit once.")]
    AlreadySubmitted,

    /// The existing-response lookup failed.
    #[error("Error checking existing responses. Please try again.")]
    BackendUnavailable,
}

/// Enumerates problems with the answers in a submitted form.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Please answer every question ({field} is missing).")]
    MissingAnswer { field: &'static str },

    #[error("The answer to {field} must be a number, not {raw:?}.")]
    NotANumber { field: &'static str, raw: String },

    #[error("The answer to {field} must be between {min} and {max}, not {value}.")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i16,
        max: i16,
    },

    #[error("Please choose a burnout level.")]
    MissingBurnoutLevel,

    #[error("Unknown burnout level {0:?}.")]
    UnknownBurnoutLevel(String),

    #[error("Please answer the app feedback question {field}.")]
    MissingAppFeedback { field: &'static str },
}

/// Enumerates the ways a submission can fail. Every variant leaves the
/// session able to retry except [`SubmissionError::AlreadyCompleted`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Validating the participant number at submit time failed.
    #[error(transparent)]
    Participant(#[from] ValidationError),

    /// The answers are incomplete or out of range.
    #[error(transparent)]
    Form(#[from] FormError),

    /// The re-check just before insert found an existing response.
    #[error("You have already submitted a post-test. Each participant can only submit once.")]
    AlreadySubmitted,

    /// The re-check just before insert could not be performed.
    #[error("Error checking existing responses. Please try again.")]
    CheckFailed,

    /// The insert itself failed.
    #[error("Failed to save your responses. Please try again.")]
    SaveFailed,

    /// Another submission from this session is still running.
    #[error("Your responses are already being submitted.")]
    InProgress,

    /// This session has already submitted successfully.
    #[error("This post-test has already been submitted.")]
    AlreadyCompleted,
}

/// Enumerates high-level errors returned by the HTTP layer.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents a request for a session that doesn’t exist or has expired.
    #[error("Unknown or expired session {0}")]
    UnknownSession(Uuid),

    /// Represents a failed submission.
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
