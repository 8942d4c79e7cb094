//! Process model: serve from this process, or fork `process_count` children
//! that share one listening socket.

use std::io;
use tokio::runtime::{Builder, Runtime};

use crate::server::error::Error;
use crate::server::http_server::HttpServer;

/// Abnormal child exits the parent will replace before giving up on them.
pub const MAX_RESTARTS: usize = 100;

fn build_runtime() -> io::Result<Runtime> {
    Builder::new_multi_thread().enable_all().build()
}

impl HttpServer {
    /// Serve until shutdown, blocking the calling thread.
    ///
    /// Must be called outside any async runtime: each serving process builds
    /// its own, and in multi-process mode only after the fork.
    pub fn run(self) -> Result<(), Error> {
        if self.config().process_count == 0 {
            let runtime = build_runtime()?;
            return runtime.block_on(self.start());
        }

        #[cfg(unix)]
        {
            return self.run_forked();
        }

        #[cfg(not(unix))]
        {
            log::warn!("process_count is only supported on unix, serving from one process");
            let runtime = build_runtime()?;
            return runtime.block_on(self.start());
        }
    }
}

#[cfg(unix)]
mod fork {
    use std::collections::HashSet;
    use std::io;
    use std::net::TcpListener as StdTcpListener;
    use tokio::net::TcpListener;
    use log::{error, info, warn};

    use super::{build_runtime, MAX_RESTARTS};
    use crate::server::error::Error;
    use crate::server::http_server::HttpServer;

    impl HttpServer {
        pub(super) fn run_forked(self) -> Result<(), Error> {
            let listener = StdTcpListener::bind(self.config().addr())?;
            listener.set_nonblocking(true)?;
            info!(
                "Bound {addr}, starting {count} worker processes",
                addr = self.config().addr(),
                count = self.config().process_count
            );

            // Ctrl+C reaches the whole process group; children shut down
            // gracefully and the parent waits for them instead of dying first.
            // SAFETY: installs the SIG_IGN disposition, no handler code runs.
            unsafe {
                libc::signal(libc::SIGINT, libc::SIG_IGN);
            }

            let mut children = HashSet::new();
            for _ in 0..self.config().process_count {
                children.insert(self.fork_child(&listener)?);
            }

            let mut restarts = 0;
            while !children.is_empty() {
                let mut status: libc::c_int = 0;
                // SAFETY: `status` is a valid out-pointer for the call.
                let pid = unsafe { libc::waitpid(-1, &mut status, 0) };
                if pid < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(Error::Process(format!("waitpid failed: {err}")));
                }
                if !children.remove(&pid) {
                    continue;
                }

                if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 {
                    info!("Worker process {pid} exited");
                    continue;
                }

                if restarts >= MAX_RESTARTS {
                    error!("Worker process {pid} died (status {status}), restart limit reached");
                    continue;
                }
                restarts += 1;
                warn!("Worker process {pid} died (status {status}), restarting ({restarts}/{MAX_RESTARTS})");
                children.insert(self.fork_child(&listener)?);
            }

            info!("All worker processes exited");
            Ok(())
        }

        fn fork_child(&self, listener: &StdTcpListener) -> Result<libc::pid_t, Error> {
            // SAFETY: the parent never starts a runtime or any other thread,
            // so the child inherits a consistent single-threaded state.
            let pid = unsafe { libc::fork() };
            match pid {
                -1 => Err(Error::Process(format!("fork failed: {}", io::Error::last_os_error()))),
                0 => {
                    let code = match self.serve_child(listener) {
                        Ok(()) => 0,
                        Err(e) => {
                            error!("Worker process failed: {e}");
                            1
                        }
                    };
                    std::process::exit(code);
                }
                pid => {
                    info!("Started worker process {pid}");
                    Ok(pid)
                }
            }
        }

        fn serve_child(&self, listener: &StdTcpListener) -> Result<(), Error> {
            let listener = listener.try_clone()?;
            let runtime = build_runtime()?;
            runtime.block_on(async {
                let listener = TcpListener::from_std(listener)?;
                self.serve(listener).await
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_builds_outside_async_context() {
        let runtime = build_runtime().unwrap();
        let value = runtime.block_on(async { 1 + 1 });
        assert_eq!(value, 2);
    }
}
