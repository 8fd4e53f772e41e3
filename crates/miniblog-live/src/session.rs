use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use miniblog_protocol::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::GroupBackend;
use crate::error::{LiveError, Result};
use crate::subscriber::{SubscriberHandle, SubscriberId};

/// Floor for the heartbeat period; it also bounds each client write.
const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

/// Queue a session drains towards its client.
pub type Outbound = mpsc::Receiver<Frame>;

/// Session lifecycle: linear progression, no backwards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    WriteFailed,
    /// The backend dropped this subscriber (slow consumer).
    Evicted,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::Evicted => "evicted",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// Write half of a client connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Frame) -> Result<()>;

    /// Keep-alive probe. Transports without one can rely on the default.
    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One live-update subscriber.
///
/// The session never holds a sender for its own queue: once it has joined,
/// the backend owns the only [`SubscriberHandle`], so eviction shows up here
/// as a closed [`Outbound`].
pub struct Session {
    id: SubscriberId,
    group: String,
    backend: Arc<dyn GroupBackend>,
    state: AtomicU8,
    pending: Mutex<Option<SubscriberHandle>>,
}

impl Session {
    /// Create a session in `Connecting` state with a queue of `capacity` frames.
    pub fn new(
        backend: Arc<dyn GroupBackend>,
        group: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, Outbound) {
        let (handle, outbound) = SubscriberHandle::channel(capacity);
        let session = Arc::new(Self {
            id: handle.id(),
            group: group.into(),
            backend,
            state: AtomicU8::new(SessionState::Connecting as u8),
            pending: Mutex::new(Some(handle)),
        });
        (session, outbound)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Connecting → Open`: join the group.
    ///
    /// If the session was closed while the join was in flight, the membership
    /// is rolled back here and `SessionClosed` is returned.
    pub async fn open(&self) -> Result<()> {
        let handle = self
            .pending
            .lock()
            .map_err(|_| LiveError::SessionClosed)?
            .take()
            .ok_or(LiveError::SessionClosed)?;
        if self.state() != SessionState::Connecting {
            return Err(LiveError::SessionClosed);
        }

        if let Err(e) = self.backend.join(&self.group, handle).await {
            self.state
                .store(SessionState::Closed as u8, Ordering::Release);
            warn!(subscriber = %self.id, group = %self.group, error = %e, "join failed");
            return Err(e);
        }

        let promoted = self.state.compare_exchange(
            SessionState::Connecting as u8,
            SessionState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if promoted.is_err() {
            // closed mid-join; close() skipped the leave because we were not Open yet
            if let Err(e) = self.backend.leave(&self.group, self.id).await {
                warn!(subscriber = %self.id, group = %self.group, error = %e, "rollback leave failed");
            }
            return Err(LiveError::SessionClosed);
        }

        info!(subscriber = %self.id, group = %self.group, "live session open");
        Ok(())
    }

    /// Enter `Closed`. Only the first call has an effect and deregisters;
    /// returns whether this call performed the transition.
    pub async fn close(&self, reason: CloseReason) -> bool {
        let prev = SessionState::from_u8(
            self.state
                .swap(SessionState::Closed as u8, Ordering::AcqRel),
        );
        match prev {
            SessionState::Closed => false,
            SessionState::Connecting => {
                debug!(subscriber = %self.id, reason = reason.as_str(), "session closed before open");
                true
            }
            SessionState::Open => {
                if let Err(e) = self.backend.leave(&self.group, self.id).await {
                    warn!(subscriber = %self.id, group = %self.group, error = %e, "leave failed");
                }
                info!(subscriber = %self.id, group = %self.group, reason = reason.as_str(), "live session closed");
                true
            }
        }
    }

    /// Write one frame to the client. A failed write closes the session.
    pub async fn deliver<S: FrameSink + ?Sized>(&self, sink: &mut S, frame: Frame) -> Result<()> {
        if self.state() != SessionState::Open {
            return Err(LiveError::SessionClosed);
        }
        if let Err(e) = sink.send_frame(frame).await {
            warn!(subscriber = %self.id, error = %e, "write to client failed");
            self.close(CloseReason::WriteFailed).await;
            return Err(LiveError::SessionClosed);
        }
        Ok(())
    }

    /// Drive an open session until the client leaves, a write fails, the
    /// backend evicts it or `shutdown` fires. Always ends `Closed`.
    ///
    /// A single write (frame or ping) that takes longer than `heartbeat`
    /// counts as failed, and shutdown abandons a write in progress.
    pub async fn run<S, F>(
        &self,
        mut outbound: Outbound,
        sink: &mut S,
        client_gone: F,
        shutdown: CancellationToken,
        heartbeat: Duration,
    ) -> CloseReason
    where
        S: FrameSink + ?Sized,
        F: Future<Output = ()> + Send,
    {
        if self.state() != SessionState::Open {
            self.close(CloseReason::ClientClosed).await;
            return CloseReason::ClientClosed;
        }

        tokio::pin!(client_gone);
        let heartbeat = heartbeat.max(MIN_HEARTBEAT);
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let reason = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break CloseReason::Shutdown,

                _ = &mut client_gone => break CloseReason::ClientClosed,

                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        let write = self.deliver(sink, frame);
                        if let Some(reason) = self.guarded_write(write, &shutdown, heartbeat).await {
                            break reason;
                        }
                    }
                    None => break CloseReason::Evicted,
                },

                _ = tick.tick() => {
                    let write = sink.ping();
                    if let Some(reason) = self.guarded_write(write, &shutdown, heartbeat).await {
                        break reason;
                    }
                }
            }
        };

        self.close(reason).await;
        reason
    }

    /// Await one client write, giving up after `limit` or on shutdown.
    /// Returns the reason to stop, or `None` if the write went through.
    async fn guarded_write<W>(
        &self,
        write: W,
        shutdown: &CancellationToken,
        limit: Duration,
    ) -> Option<CloseReason>
    where
        W: Future<Output = Result<()>>,
    {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => Some(CloseReason::Shutdown),

            res = tokio::time::timeout(limit, write) => match res {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    debug!(subscriber = %self.id, error = %e, "client write failed");
                    Some(CloseReason::WriteFailed)
                }
                Err(_) => {
                    warn!(
                        subscriber = %self.id,
                        timeout_ms = limit.as_millis() as u64,
                        "write to client stalled"
                    );
                    Some(CloseReason::WriteFailed)
                }
            },
        }
    }
}
