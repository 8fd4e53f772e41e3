use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use miniblog_core::config::LiveConfig;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::backend::GroupBackend;
use crate::dispatcher::Dispatcher;
use crate::memory::MemoryBackend;
use crate::session::{Outbound, Session};

/// Everything the server needs for live updates: the group backend, the
/// dispatcher content operations call, and shutdown bookkeeping for the
/// per-connection session tasks.
pub struct LiveHub {
    backend: Arc<dyn GroupBackend>,
    dispatcher: Dispatcher,
    config: LiveConfig,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl LiveHub {
    pub fn new(backend: Arc<dyn GroupBackend>, config: LiveConfig) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&backend),
            config.group.clone(),
            Duration::from_millis(config.publish_timeout_ms),
        );
        Self {
            backend,
            dispatcher,
            config,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Hub backed by the single-process [`MemoryBackend`].
    pub fn in_memory(config: LiveConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new(config.max_dropped));
        Self::new(backend, config)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// New `Connecting` session on the configured group.
    pub fn session(&self) -> (Arc<Session>, Outbound) {
        Session::new(
            Arc::clone(&self.backend),
            self.config.group.clone(),
            self.config.queue_capacity,
        )
    }

    /// Token cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_interval_secs)
    }

    /// Wrap a session task so shutdown can wait for it.
    pub fn track<F: Future>(&self, task: F) -> impl Future<Output = F::Output> {
        self.tasks.track_future(task)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Current members of the configured group; 0 if the backend is unreachable.
    pub async fn subscriber_count(&self) -> usize {
        match self.backend.member_count(&self.config.group).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "could not read live subscriber count");
                0
            }
        }
    }

    /// Close every session and wait up to `grace` for them to deregister.
    /// Returns `false` if some session tasks were still running at the deadline.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tasks.close();
        let open = self.tasks.len();
        info!(open_sessions = open, "closing live sessions");
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(remaining = self.tasks.len(), "live sessions still open after grace period");
            return false;
        }
        true
    }
}
