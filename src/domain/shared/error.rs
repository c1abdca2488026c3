//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid time range: end must be after start")]
    InvalidRange,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Requested slot overlaps an existing booking")]
    OverlapConflict,

    #[error("Booking not found: {0}")]
    NotFound(String),

    /// The booking referenced by an inbound event does not exist (yet).
    #[error("Booking referenced by event not found: {0}")]
    BookingNotFound(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

impl DomainError {
    /// Whether the caller may retry the same request as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::StorageUnavailable(_) | DomainError::DeadlineExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(DomainError::StorageUnavailable("down".to_string()).is_retryable());
        assert!(DomainError::DeadlineExceeded.is_retryable());
        assert!(!DomainError::OverlapConflict.is_retryable());
        assert!(!DomainError::InvalidRange.is_retryable());
        assert!(!DomainError::NotFound("x".to_string()).is_retryable());
    }

    #[test]
    fn test_transition_message() {
        let err = DomainError::InvalidStateTransition {
            from: "CANCELLED",
            to: "CONFIRMED",
        };
        assert_eq!(err.to_string(), "Invalid state transition: CANCELLED -> CONFIRMED");
    }
}
