//! HTTP request parser.
//!
//! Parses a buffered HTTP/1.x request (request line, headers and a
//! `Content-Length` framed body) into an [`HttpRequest`]. The server's reader
//! uses [`find_head_end`] and [`HttpRequest::content_length`] to know when a
//! request has been fully received.

mod request;
mod method;
mod version;
mod error;

pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

pub use request::{find_head_end, parse_head, parse_request};
