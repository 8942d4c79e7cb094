//! Pool error types.

use std::time::Duration;
use thiserror::Error;

/// Errors returned when acquiring a connection.
#[derive(Debug, Error)]
pub enum PoolError<E: std::error::Error + 'static> {
    /// Opening a new backend connection failed.
    #[error("failed to open backend connection: {0}")]
    Connect(#[source] E),

    /// Every connection stayed in use for the whole configured wait.
    #[error("connection pool exhausted: no connection released within {0:?}")]
    Timeout(Duration),
}
