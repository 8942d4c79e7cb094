//! Unpooled connections.

use log::debug;

use crate::pool::manager::ManageConnection;

/// Opens a brand-new connection per call.
///
/// Used for infrequent writes where keeping connections around is not worth
/// it. The caller owns the connection and should drop it as soon as the call
/// is done; nothing is tracked or reused.
#[derive(Debug, Clone)]
pub struct DirectConnector<M> {
    manager: M,
}

impl<M: ManageConnection> DirectConnector<M> {
    pub fn new(manager: M) -> Self {
        Self { manager }
    }

    /// Open a fresh connection.
    pub fn connect(&self) -> Result<M::Connection, M::Error> {
        debug!("Opening direct backend connection");
        self.manager.connect()
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }
}
