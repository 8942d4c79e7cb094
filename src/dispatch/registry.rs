//! Exact-path route table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use log::warn;

use crate::dispatch::error::HandlerResult;
use crate::parser::HttpRequest;

/// A handler bound to a route: builds a per-request handler value from the
/// request and invokes the operation on it.
pub type HandlerFn = Arc<dyn Fn(Arc<HttpRequest>) -> HandlerResult + Send + Sync>;

/// A registered route.
#[derive(Clone)]
pub struct Route {
    /// The exact path this route serves.
    pub path: String,
    /// Name of the operation, for logs and fault messages.
    pub operation: String,
    /// Constructs the handler and runs the operation.
    pub handler: HandlerFn,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Path → route mapping, built at startup and read-only while serving.
///
/// Lookup is an exact string match: no patterns, no trailing-slash
/// normalization. The method never takes part in routing.
#[derive(Debug, Default, Clone)]
pub struct RouteRegistry {
    routes: HashMap<String, Route>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `operation` on handlers built by `factory` for `path`.
    ///
    /// A handler value is constructed for every request and dropped after the
    /// operation returns; nothing survives between requests. Registering the
    /// same path twice replaces the earlier route.
    pub fn register<H, F, O>(&mut self, path: impl Into<String>, factory: F, operation: impl Into<String>, op: O)
    where
        H: 'static,
        F: Fn(Arc<HttpRequest>) -> H + Send + Sync + 'static,
        O: Fn(&H) -> HandlerResult + Send + Sync + 'static,
    {
        let path = path.into();
        let operation = operation.into();
        let handler: HandlerFn = Arc::new(move |request| {
            let handler = factory(request);
            op(&handler)
        });

        let route = Route {
            path: path.clone(),
            operation,
            handler,
        };

        if let Some(previous) = self.routes.insert(path.clone(), route) {
            warn!("Route {path} registered twice, replacing operation {op}", op = previous.operation);
        }
    }

    /// Look up the route for an exact path.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes ordered by path.
    pub fn routes(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.routes.values().collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path));
        routes
    }
}
