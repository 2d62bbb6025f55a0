//! Repository error types.

use thiserror::Error;
use vtapi_models::JobValidationError;

/// Result type for repository operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors returned by the job repository.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    InvalidJob(String),

    #[error("job not found")]
    JobNotFound,

    #[error("transaction conflict: {0} was modified concurrently")]
    TransactionConflict(String),

    #[error("corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Redis error: {0}")]
    Redis(redis::RedisError),
}

impl DbError {
    pub fn corrupt_record(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if the caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::TransactionConflict(_) | DbError::BackendUnavailable(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::JobNotFound)
    }

    /// True if the connection that produced this error should not be reused.
    pub(crate) fn poisons_connection(&self) -> bool {
        matches!(self, DbError::BackendUnavailable(_) | DbError::Redis(_))
    }
}

impl From<redis::RedisError> for DbError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
        {
            DbError::BackendUnavailable(err.to_string())
        } else {
            DbError::Redis(err)
        }
    }
}

impl From<JobValidationError> for DbError {
    fn from(err: JobValidationError) -> Self {
        DbError::InvalidJob(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[test]
    fn test_invalid_job_message() {
        let err = DbError::from(JobValidationError::MissingId);
        assert!(matches!(err, DbError::InvalidJob(_)));
        assert_eq!(err.to_string(), "job id is required");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(DbError::JobNotFound.to_string(), "job not found");
        assert!(DbError::JobNotFound.is_not_found());
    }

    #[test]
    fn test_io_errors_map_to_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DbError::from(redis::RedisError::from(io));
        assert!(matches!(err, DbError::BackendUnavailable(_)));
        assert!(err.is_retryable());
        assert!(err.poisons_connection());
    }

    #[test]
    fn test_command_errors_stay_redis() {
        let err = DbError::from(redis::RedisError::from((
            ErrorKind::TypeError,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        )));
        assert!(matches!(err, DbError::Redis(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = DbError::TransactionConflict("job:abc".to_string());
        assert!(err.is_retryable());
        assert!(!err.poisons_connection());
    }
}
