//! Errors - エラー型と分類
//!
//! Stage-local, recoverable failures are folded into the task's error list
//! as strings. `FlockError` is what propagates: invalid transitions, the
//! rate-limit abort and storage failures.

use super::ids::TaskId;
use super::state::TaskStatus;

/// ErrorKind は実行エラーの分類（ログのフィールドに使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller asked for something the state machine forbids.
    Transition,
    /// The external API refused service; the whole task aborts.
    RateLimited,
    /// Storage or network failure.
    Infrastructure,
    /// Unknown task id.
    NotFound,
}

/// Storage collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Directory-lookup collaborator failure.
///
/// `RateLimited` must stay distinguishable from plain network errors: it is
/// the only lookup failure that aborts a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("rate limited by directory API: {0}")]
    RateLimited(String),

    #[error("directory network error: {0}")]
    Network(String),

    #[error("directory API error {code}: {message}")]
    Api { code: i64, message: String },
}

/// Content-source collaborator failure (posts/comments).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("content source network error: {0}")]
    Network(String),

    #[error("content source API error {code}: {message}")]
    Api { code: i64, message: String },
}

/// FlockError はドメインエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlockError {
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("{0}")]
    RateLimited(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlockError::InvalidTransition { .. } => ErrorKind::Transition,
            FlockError::TaskNotFound(_) => ErrorKind::NotFound,
            FlockError::RateLimited(_) => ErrorKind::RateLimited,
            FlockError::Store(_) => ErrorKind::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert_with_question_mark() {
        fn fails() -> Result<(), FlockError> {
            Err(StoreError::Unavailable("down".into()))?;
            Ok(())
        }

        let err = fails().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.to_string(), "store unavailable: down");
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = FlockError::InvalidTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::Processing,
        };
        assert_eq!(err.to_string(), "invalid transition completed -> processing");
        assert_eq!(err.kind(), ErrorKind::Transition);
    }
}
