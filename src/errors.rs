//! Error types for the bounded pool

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by factories and cleanup functions
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Pool is exhausted - {max_size} objects already exist and none could be produced")]
    Exhausted { max_size: usize },

    #[error("Object creation failed: {0}")]
    Creation(#[source] Arc<dyn Error + Send + Sync + 'static>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Pool has been disposed")]
    Disposed,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl PoolError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn creation(cause: BoxError) -> Self {
        Self::Creation(Arc::from(cause))
    }

    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// ```
    /// use esox_boundedpool::PoolError;
    ///
    /// assert!(PoolError::Exhausted { max_size: 4 }.is_retryable());
    /// assert!(!PoolError::Disposed.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::Creation(_) | Self::Timeout(_)
        )
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_error_keeps_its_source() {
        let cause: BoxError = "socket refused".into();
        let err = PoolError::creation(cause);

        assert_eq!(err.to_string(), "Object creation failed: socket refused");
        assert_eq!(err.source().unwrap().to_string(), "socket refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        assert!(!PoolError::configuration("max_pool_size must be > 0").is_retryable());
        assert!(!PoolError::InvalidArgument("foreign object").is_retryable());
        assert!(!PoolError::Disposed.is_retryable());
    }
}
