//! A minimal HTTP request-dispatch runtime serving graph identifier
//! allocation.
//!
//! Requests are routed by exact path to handlers registered once at startup.
//! Handlers run on a bounded worker pool so slow backend calls never stall
//! the accept loop, and return a [`ResponseEnvelope`] that the writer turns
//! into exactly one HTTP response.
//!
//! # Features
//!
//! - HTTP/1.x request parsing with `Content-Length` bodies
//! - A frozen route table and a dispatcher that captures handler failures
//! - JSON, raw and template-rendered response envelopes
//! - A bounded, self-healing connection pool and an unpooled direct mode
//! - Optional fork-and-bind multi-process serving
//!
//! # Examples
//!
//! ## Registering a route
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use id_allocation::{HttpRequest, HttpServer, ResponseEnvelope, RouteRegistry, ServerConfig};
//! use id_allocation::dispatch::HandlerResult;
//!
//! struct Ping {
//!     request: Arc<HttpRequest>,
//! }
//!
//! impl Ping {
//!     fn pong(&self) -> HandlerResult {
//!         Ok(ResponseEnvelope::success(json!({"path": self.request.path})))
//!     }
//! }
//!
//! let mut registry = RouteRegistry::new();
//! registry.register("/ping", |request| Ping { request }, "pong", Ping::pong);
//!
//! let server = HttpServer::new(ServerConfig::default(), registry);
//! assert!(server.dispatcher().registry().resolve("/ping").is_some());
//! ```
//!
//! ## Parsing a request
//!
//! ```
//! use id_allocation::{parse_request, Method};
//!
//! let request = parse_request(b"GET /a/b?tpl=list HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! assert_eq!(request.method, Method::GET);
//! assert_eq!(request.path, "/a/b");
//! assert_eq!(request.get_query_param("tpl").map(String::as_str), Some("list"));
//! ```

pub mod allocation;
pub mod dispatch;
pub mod envelope;
pub mod logging;
pub mod parser;
pub mod pool;
pub mod server;
pub mod settings;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use server::{Error as ServerError, HttpResponse, HttpServer, ServerConfig, StatusCode};
pub use dispatch::{Dispatcher, RequestContext, RouteRegistry, WorkerPool};
pub use envelope::ResponseEnvelope;
pub use pool::{ConnectionPool, DirectConnector, ManageConnection, PoolConfig};
pub use settings::{load_settings, AppConfig, ConfigError, Environment};
