use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use miniblog_protocol::{encode, DomainEvent, EventError, PostPayload};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::backend::{GroupBackend, PublishReport};
use crate::error::LiveError;

/// Publishes domain events to the live-update group.
///
/// Content operations call the `notify_*` methods after their mutation has
/// committed. Delivery is best-effort: backend failures and timeouts are
/// logged and counted, never returned. The only error a caller can see is
/// an [`EventError`] for an event missing a required value.
pub struct Dispatcher {
    backend: Arc<dyn GroupBackend>,
    group: String,
    publish_timeout: Duration,
    published: AtomicU64,
    recipients: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub published: u64,
    pub recipients: u64,
    pub dropped: u64,
    pub failures: u64,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn GroupBackend>,
        group: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            group: group.into(),
            publish_timeout,
            published: AtomicU64::new(0),
            recipients: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub async fn notify_post_created(&self, post: PostPayload) -> Result<(), EventError> {
        self.emit(&DomainEvent::post_created(post)?).await.map(|_| ())
    }

    pub async fn notify_post_updated(&self, post: PostPayload) -> Result<(), EventError> {
        self.emit(&DomainEvent::post_updated(post)?).await.map(|_| ())
    }

    pub async fn notify_post_deleted(&self, id: i64) {
        // a bare id always validates
        let _ = self.emit(&DomainEvent::post_deleted(id)).await;
    }

    pub async fn notify_comment_added(
        &self,
        post_id: i64,
        user: &str,
        content: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), EventError> {
        let event = DomainEvent::comment_added(post_id, user, content, timestamp)?;
        self.emit(&event).await.map(|_| ())
    }

    pub async fn notify_generic(&self, message: impl Into<String>) -> Result<(), EventError> {
        self.emit(&DomainEvent::notice(message)?).await.map(|_| ())
    }

    /// Validate, encode once and publish to the group.
    ///
    /// Only a malformed event is an error. Backend failures and timeouts are
    /// logged and counted, and yield an empty report.
    pub async fn emit(&self, event: &DomainEvent) -> Result<PublishReport, EventError> {
        event.validate()?;
        let event_type = event.event_type();
        let frame = encode(event);

        let outcome =
            match tokio::time::timeout(self.publish_timeout, self.backend.publish(&self.group, frame))
                .await
            {
                Ok(res) => res,
                Err(_) => Err(LiveError::Timeout {
                    ms: self.publish_timeout.as_millis() as u64,
                }),
            };

        match outcome {
            Ok(report) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                self.recipients
                    .fetch_add(report.delivered as u64, Ordering::Relaxed);
                self.dropped
                    .fetch_add(report.dropped as u64, Ordering::Relaxed);
                if report.attempted == 0 {
                    debug!(event_type, group = %self.group, "no live subscribers");
                } else {
                    info!(
                        event_type,
                        group = %self.group,
                        recipients = report.delivered,
                        dropped = report.dropped,
                        "broadcast live update"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    event_type,
                    group = %self.group,
                    backend = self.backend.name(),
                    error = %e,
                    "failed to broadcast live update"
                );
                Ok(PublishReport::default())
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            published: self.published.load(Ordering::Relaxed),
            recipients: self.recipients.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
