//! Backend connection management.
//!
//! [`ConnectionPool`] bounds and reuses connections built by a
//! [`ManageConnection`] implementation. [`DirectConnector`] is the deliberately
//! unpooled alternative: every call opens a fresh connection that the caller
//! drops right after use.

mod direct;
mod error;
mod manager;
mod pool;
mod tests;

pub use direct::DirectConnector;
pub use error::PoolError;
pub use manager::ManageConnection;
pub use pool::{ConnectionPool, PoolConfig, PoolStatus, PooledConnection};
