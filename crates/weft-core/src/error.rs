use thiserror::Error;

/// Failure reported for one dispatch attempt.
///
/// The classification is what the dispatcher acts on:
/// - `Transient`: the only retryable kind, and only for items that opted in,
///   while the retry ceiling has not been exceeded.
/// - `Permanent`: fails the item immediately.
/// - `Internal`: a dispatch fault (e.g. the consumer call aborted); never
///   retried.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ConsumeError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from the on-disk queue files (`save_logs`, `save_queue`,
/// `load_queue`).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("queue file io: {0}")]
    Io(#[from] std::io::Error),

    #[error("queue file codec: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(ConsumeError::transient("nav timeout").is_retryable());
        assert!(!ConsumeError::permanent("bad credentials").is_retryable());
        assert!(!ConsumeError::Internal("task aborted".into()).is_retryable());
    }

    #[test]
    fn display_carries_classification() {
        let err = ConsumeError::transient("nav timeout");
        assert_eq!(err.to_string(), "transient: nav timeout");
    }
}
