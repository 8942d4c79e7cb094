//! The HTTP front end.
//!
//! Owns the listening socket, reads one request per connection, hands it to
//! the [`Dispatcher`](crate::dispatch::Dispatcher) and writes the single
//! response. Optionally forks into several serving processes that share the
//! listening socket.

mod response;
mod config;
mod error;
mod http_server;
mod process;

// Re-export public items
pub use response::{HttpResponse, StatusCode, SERVER_HEADER};
pub use config::{ServerConfig, DEFAULT_MAX_BUFFER_SIZE};
pub use error::Error;
pub use http_server::{HttpServer, StartHook};
pub use process::MAX_RESTARTS;
