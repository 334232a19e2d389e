//! Coordinated graceful shutdown.
//!
//! A single [`CancellationToken`] fans out to every long-running task. On
//! signal the token is cancelled and tasks get a shared deadline to drain;
//! whatever is still running at the deadline is aborted. Mid-flight events
//! interrupted this way are simply redelivered on the next start.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct ShutdownController {
    token: CancellationToken,
    timeout: Duration,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl ShutdownController {
    pub fn new(timeout: Duration) -> Self {
        ShutdownController {
            token: CancellationToken::new(),
            timeout,
            tasks: Vec::new(),
        }
    }

    /// The token tasks should watch for cancellation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawns a task that participates in graceful shutdown.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(future)));
    }

    /// Cancels all tasks and waits for them to drain, sharing one deadline.
    pub async fn shutdown(self) {
        info!(timeout_secs = self.timeout.as_secs(), "shutting down");
        self.token.cancel();

        let deadline = tokio::time::Instant::now() + self.timeout;
        for (name, handle) in self.tasks {
            let abort = handle.abort_handle();
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => debug!(task = name, "task stopped"),
                Ok(Err(err)) => error!(task = name, error = %err, "task panicked"),
                Err(_) => {
                    warn!(task = name, "task did not stop before deadline, aborting");
                    abort.abort();
                }
            }
        }
        info!("shutdown complete");
    }
}

/// Resolves when the process receives SIGINT or SIGTERM.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
