//! The seam between the pool and a concrete backend.

/// Opens and checks connections for a [`ConnectionPool`](super::ConnectionPool).
///
/// Methods are blocking; they are called from worker threads, never from the
/// accept loop.
pub trait ManageConnection: Send + Sync + 'static {
    type Connection: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection.
    fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Cheap, non-blocking check for a connection that can no longer be used,
    /// e.g. because the server closed it. Broken connections are discarded
    /// instead of being handed out or returned to the idle set.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool;
}
