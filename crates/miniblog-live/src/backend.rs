use async_trait::async_trait;
use miniblog_protocol::Frame;

use crate::error::Result;
use crate::subscriber::{SubscriberHandle, SubscriberId};

/// Group-membership pub/sub capability the fan-out is written against.
///
/// The in-process [`MemoryBackend`](crate::memory::MemoryBackend) is the
/// default; a networked broker plugs in by implementing the same three
/// operations. Groups exist implicitly: the first `join` creates one and the
/// last `leave` forgets it.
#[async_trait]
pub trait GroupBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Add `handle` to `group`. Joining twice with the same id is a no-op.
    async fn join(&self, group: &str, handle: SubscriberHandle) -> Result<()>;

    /// Remove `id` from `group`. Removing an absent member is a no-op.
    async fn leave(&self, group: &str, id: SubscriberId) -> Result<()>;

    /// Offer `frame` to every member of `group` at call time.
    ///
    /// Must not wait on any single member: a slow subscriber loses the frame
    /// instead of delaying the rest.
    async fn publish(&self, group: &str, frame: Frame) -> Result<PublishReport>;

    /// Number of current members of `group`.
    async fn member_count(&self, group: &str) -> Result<usize>;
}

/// What a single publish did, per member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Members the frame was offered to.
    pub attempted: usize,
    pub delivered: usize,
    /// Members whose queue was full.
    pub dropped: usize,
    /// Members whose session had already gone; removed from the group.
    pub stale: usize,
    /// Slow members removed after exceeding the drop limit.
    pub evicted: usize,
}
