//! Request dispatch.
//!
//! The [`RouteRegistry`] maps exact paths to handlers and is frozen once the
//! [`Dispatcher`] owns it. The dispatcher resolves on the connection task and
//! runs the handler on the bounded [`WorkerPool`], so slow handlers never hold
//! up request intake.

mod context;
mod dispatcher;
mod error;
mod registry;
mod worker;

pub use context::RequestContext;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, HandlerError, HandlerResult};
pub use registry::{Route, RouteRegistry};
pub use worker::{JobError, WorkerPool};
