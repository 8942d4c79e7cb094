//! HTTP server implementation.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::signal;
use log::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, RequestContext, RouteRegistry, WorkerPool};
use crate::envelope::{write_response, NoTemplates, TemplateRenderer};
use crate::parser::{find_head_end, parse_head, HttpRequest, Method};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// Runs once per serving process, on a worker, before the first accept.
pub type StartHook = Arc<dyn Fn() + Send + Sync>;

const READ_CHUNK: usize = 8 * 1024;

/// Everything a connection task needs, shared by all of them.
struct ServerState {
    dispatcher: Dispatcher,
    renderer: Arc<dyn TemplateRenderer>,
    request_limit: usize,
}

/// An HTTP server.
///
/// Every connection carries exactly one request and one response. Handlers
/// run on the dispatcher's worker pool, never on the accept loop.
pub struct HttpServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
    renderer: Arc<dyn TemplateRenderer>,
    on_start: Option<StartHook>,
}

impl HttpServer {
    /// Create a server for the routes in `registry`, with a worker pool of
    /// `config.thread_count` slots.
    pub fn new(config: ServerConfig, registry: RouteRegistry) -> Self {
        let dispatcher = Dispatcher::new(registry, WorkerPool::new(config.thread_count));
        Self {
            config,
            dispatcher,
            renderer: Arc::new(NoTemplates),
            on_start: None,
        }
    }

    /// Use `renderer` for `Render` envelopes and `tpl` requests.
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Run `hook` in every serving process before it starts accepting.
    pub fn on_process_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn shared_state(&self) -> Arc<ServerState> {
        Arc::new(ServerState {
            dispatcher: self.dispatcher.clone(),
            renderer: Arc::clone(&self.renderer),
            request_limit: self.config.request_limit(),
        })
    }

    /// Log the server settings and registered endpoints.
    fn display_server_info(&self) {
        info!(
            "{name} serving on http://{addr}, work path {work_path}, {threads} worker threads",
            name = self.config.server_name,
            addr = self.config.addr(),
            work_path = self.config.work_path,
            threads = self.config.thread_count
        );
        info!("Data path {data_path}", data_path = self.config.data_path());

        info!("Registered endpoints:");
        for route in self.dispatcher().registry().routes() {
            info!("  {path} -> {operation}", path = route.path, operation = route.operation);
        }
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn start(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        self.serve(listener).await
    }

    async fn run_start_hook(&self) {
        let Some(hook) = self.on_start.clone() else {
            return;
        };
        // Hooks may block on backend connections, which must not happen on
        // the runtime's own threads.
        if let Err(e) = tokio::task::spawn_blocking(move || hook()).await {
            error!("Process start hook failed: {e}");
        }
    }

    /// Handle accept errors. Returns true when the loop should stop.
    async fn handle_accept_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // Usually descriptor exhaustion; give in-flight connections time to finish.
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let drained = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timed out, abandoning {len} connections", len = tasks.len());
        }
        info!("Server shutdown complete");
    }

    /// Serve connections from `listener` until Ctrl+C.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Error> {
        self.run_start_hook().await;
        self.display_server_info();
        info!("Server listening on http://{addr}", addr = listener.local_addr()?);

        let shared = self.shared_state();
        let mut tasks = JoinSet::new();
        let ctrl_c = signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    match result {
                        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
                        Err(e) => error!("Error waiting for Ctrl+C: {e}"),
                    }
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((mut socket, addr)) => {
                            let state = Arc::clone(&shared);
                            tasks.spawn(async move {
                                if let Err(e) = state.handle(&mut socket).await {
                                    warn!("Error handling connection from {addr}: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            if Self::handle_accept_error(e).await {
                                break;
                            }
                        }
                    }
                }

                // Reap finished connections so the set does not grow unbounded.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;
        self.dispatcher.workers().close();

        Ok(())
    }

    /// Read one request from `socket`, dispatch it, and write its response.
    ///
    /// Exactly one response is written unless the peer disconnects before
    /// sending a complete request. Requests that are answered with a
    /// transport error (400, 405, 413) still return the error for logging.
    pub async fn handle_connection(&self, socket: &mut (impl AsyncRead + AsyncWrite + Unpin)) -> Result<(), Error> {
        self.shared_state().handle(socket).await
    }
}

impl ServerState {
    async fn handle(&self, socket: &mut (impl AsyncRead + AsyncWrite + Unpin)) -> Result<(), Error> {
        let request = match read_request(socket, self.request_limit).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                let response = match &e {
                    Error::PayloadTooLarge { limit } => HttpResponse::plain(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!("Request exceeds the {limit} byte limit"),
                    ),
                    Error::ParseError(parse_error) => HttpResponse::plain(
                        StatusCode::BAD_REQUEST,
                        format!("Error parsing request: {parse_error}"),
                    ),
                    _ => return Err(e),
                };
                send(socket, &response).await?;
                return Err(e);
            }
        };

        debug!("{method} {target}", method = request.method, target = request.target);

        if !request.method.is_dispatchable() {
            let allowed = Method::DISPATCHABLE.map(|m| m.as_str()).join(", ");
            let response = HttpResponse::plain(
                StatusCode::METHOD_NOT_ALLOWED,
                format!(
                    "Method {method} not allowed for path: {path}. Allowed methods: {allowed}",
                    method = request.method,
                    path = request.path
                ),
            )
            .with_header("Allow", allowed);
            send(socket, &response).await?;
            return Err(Error::MethodNotAllowed(request.method, request.path));
        }

        let mut ctx = RequestContext::new(request);
        let result = self.dispatcher.dispatch(&mut ctx).await;
        let response = write_response(&ctx, result, self.renderer.as_ref());
        send(socket, &response).await
    }
}

async fn send(socket: &mut (impl AsyncWrite + Unpin), response: &HttpResponse) -> Result<(), Error> {
    socket.write_all(&response.to_bytes()).await?;
    socket.flush().await?;
    Ok(())
}

/// Read the head, then exactly `Content-Length` body bytes.
///
/// Returns `None` when the peer closes without sending anything.
async fn read_request(socket: &mut (impl AsyncRead + Unpin), limit: usize) -> Result<Option<HttpRequest>, Error> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0; READ_CHUNK];

    let head_complete = loop {
        if find_head_end(&buf).is_some() {
            break true;
        }
        if buf.len() > limit {
            return Err(Error::PayloadTooLarge { limit });
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break false;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    if buf.is_empty() {
        return Ok(None);
    }

    // A peer that half-closes after a head without the blank line still gets
    // an answer; the parser decides whether the head is usable.
    let (mut request, head_len) = parse_head(&buf)?;
    let body_len = if head_complete { request.content_length()? } else { 0 };

    let total = head_len.saturating_add(body_len);
    if total > limit {
        return Err(Error::PayloadTooLarge { limit });
    }

    while buf.len() < total {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::IncompleteRequest(buf.len()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    request.body = buf[head_len..total].to_vec();
    Ok(Some(request))
}
