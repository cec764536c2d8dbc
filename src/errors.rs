//! Error types for the object pool

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a resource factory.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Failed to create pooled resource: {0}")]
    Creation(Arc<dyn Error + Send + Sync + 'static>),

    #[error("No resource became available within {0:?}")]
    Timeout(Duration),

    #[error("Pool has been disposed")]
    Closed,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to export metrics: {0}")]
    MetricsExport(String),
}

impl PoolError {
    pub(crate) fn creation(err: impl Into<BoxError>) -> Self {
        PoolError::Creation(Arc::from(err.into()))
    }

    /// Whether this error came from the resource factory.
    pub fn is_creation(&self) -> bool {
        matches!(self, PoolError::Creation(_))
    }
}

/// Failure while resetting or releasing a returned resource.
///
/// These never reach the caller that returned the resource; they are
/// logged and handed to [`PoolConfiguration::with_cleanup_hook`].
///
/// [`PoolConfiguration::with_cleanup_hook`]: crate::PoolConfiguration::with_cleanup_hook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanupError {
    #[error("reset_state panicked: {0}")]
    ResetPanicked(String),

    #[error("release_resources failed: {0}")]
    ReleaseFailed(String),

    #[error("release_resources panicked: {0}")]
    ReleasePanicked(String),
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
