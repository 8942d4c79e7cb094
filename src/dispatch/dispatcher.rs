//! Route resolution and handler invocation.

use std::sync::Arc;
use log::{debug, error, warn};

use crate::dispatch::context::RequestContext;
use crate::dispatch::error::DispatchError;
use crate::dispatch::registry::RouteRegistry;
use crate::dispatch::worker::WorkerPool;
use crate::envelope::ResponseEnvelope;
use crate::server::StatusCode;

/// Resolves requests against a frozen [`RouteRegistry`] and runs handlers on a
/// [`WorkerPool`].
///
/// Each call to [`Dispatcher::dispatch`] invokes at most one handler exactly
/// once; there are no retries.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
    workers: WorkerPool,
}

impl Dispatcher {
    /// Take ownership of the registry; it is immutable from here on.
    pub fn new(registry: RouteRegistry, workers: WorkerPool) -> Self {
        Self {
            registry: Arc::new(registry),
            workers,
        }
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Dispatch the request held by `ctx`.
    ///
    /// On failure the status and reason are recorded on the context and
    /// `None` is returned; the response writer turns that into a 404 carrying
    /// the reason.
    pub async fn dispatch(&self, ctx: &mut RequestContext) -> Option<ResponseEnvelope> {
        match self.try_dispatch(ctx).await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                match &e {
                    DispatchError::RouteNotFound(_) => warn!("{e}"),
                    DispatchError::HandlerFault { .. } => error!("{e}"),
                }
                ctx.fail(StatusCode::NOT_FOUND, e.to_string());
                None
            }
        }
    }

    /// Resolve and invoke without touching the context's failure slots.
    pub async fn try_dispatch(&self, ctx: &RequestContext) -> Result<ResponseEnvelope, DispatchError> {
        let route = self
            .registry
            .resolve(ctx.path())
            .ok_or_else(|| DispatchError::RouteNotFound(ctx.path().to_string()))?;

        debug!("{method} {path} -> {operation}", method = ctx.method(), path = ctx.path(), operation = route.operation);

        let handler = Arc::clone(&route.handler);
        let request = ctx.shared_request();
        let outcome = self.workers.run(move || handler(request)).await;

        let fault = |reason: String| DispatchError::HandlerFault {
            operation: route.operation.clone(),
            reason,
        };

        match outcome {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(e)) => Err(fault(e.to_string())),
            Err(e) => Err(fault(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use serde_json::json;

    use super::*;
    use crate::dispatch::HandlerResult;
    use crate::parser::{HttpRequest, HttpVersion, Method};

    struct Counted {
        calls: Arc<AtomicUsize>,
    }

    impl Counted {
        fn ok(&self) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResponseEnvelope::success(json!({"ok": true})))
        }

        fn fail(&self) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Box::new(io::Error::other("backend unreachable")))
        }

        fn explode(&self) -> HandlerResult {
            panic!("index out of range")
        }
    }

    fn dispatcher(calls: &Arc<AtomicUsize>) -> Dispatcher {
        let mut registry = RouteRegistry::new();
        let factory = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            move |_: Arc<HttpRequest>| Counted { calls: Arc::clone(&calls) }
        };
        registry.register("/counted/ok", factory(calls), "ok", Counted::ok);
        registry.register("/counted/fail", factory(calls), "fail", Counted::fail);
        registry.register("/counted/explode", factory(calls), "explode", Counted::explode);
        Dispatcher::new(registry, WorkerPool::new(2))
    }

    fn context(path: &str) -> RequestContext {
        RequestContext::new(HttpRequest::new(Method::GET, path, HttpVersion::Http10, HashMap::new()))
    }

    #[tokio::test]
    async fn test_dispatch_success_forwards_envelope() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctx = context("/counted/ok");

        let envelope = dispatcher(&calls).dispatch(&mut ctx).await;

        assert_eq!(envelope, Some(ResponseEnvelope::success(json!({"ok": true}))));
        assert_eq!(ctx.status, StatusCode::OK);
        assert!(ctx.reason.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_route_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctx = context("/unknown");

        let envelope = dispatcher(&calls).dispatch(&mut ctx).await;

        assert!(envelope.is_none());
        assert_eq!(ctx.status, StatusCode::NOT_FOUND);
        assert_eq!(ctx.reason, "no route matches /unknown");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_fault() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ctx = context("/counted/fail");

        let envelope = dispatcher(&calls).dispatch(&mut ctx).await;

        assert!(envelope.is_none());
        assert_eq!(ctx.status, StatusCode::NOT_FOUND);
        assert_eq!(ctx.reason, "fail failed: backend unreachable");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_fault() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(&calls);
        let ctx = context("/counted/explode");

        let result = dispatcher.try_dispatch(&ctx).await;

        assert!(matches!(
            result,
            Err(DispatchError::HandlerFault { ref operation, ref reason })
                if operation == "explode" && reason.contains("index out of range")
        ));
        assert_eq!(dispatcher.workers().available(), 2);
    }
}
