use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use miniblog_protocol::Frame;
use tracing::{debug, warn};

use crate::backend::{GroupBackend, PublishReport};
use crate::error::Result;
use crate::subscriber::{Offer, SubscriberHandle, SubscriberId};

/// Single-process group backend.
///
/// Membership lives in a `DashMap` keyed by group name; each shard lock is
/// held only long enough to mutate or snapshot a member set, never while
/// frames are offered.
pub struct MemoryBackend {
    groups: DashMap<String, HashMap<SubscriberId, SubscriberHandle>>,
    /// Full-queue drops tolerated before a member is evicted. `0` disables eviction.
    max_dropped: u64,
}

impl MemoryBackend {
    pub fn new(max_dropped: u64) -> Self {
        Self {
            groups: DashMap::new(),
            max_dropped,
        }
    }

    /// Number of groups with at least one member.
    #[cfg(test)]
    fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn remove_member(&self, group: &str, id: SubscriberId) -> bool {
        let (removed, emptied) = match self.groups.get_mut(group) {
            Some(mut members) => {
                let removed = members.remove(&id).is_some();
                (removed, members.is_empty())
            }
            None => (false, false),
        };
        if emptied {
            // re-checked under the shard lock: a concurrent join may have refilled it
            self.groups.remove_if(group, |_, members| members.is_empty());
        }
        removed
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(miniblog_core::config::DEFAULT_MAX_DROPPED)
    }
}

#[async_trait]
impl GroupBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn join(&self, group: &str, handle: SubscriberHandle) -> Result<()> {
        let id = handle.id();
        let mut members = self.groups.entry(group.to_string()).or_default();
        members.entry(id).or_insert(handle);
        debug!(group, subscriber = %id, members = members.len(), "subscriber joined group");
        Ok(())
    }

    async fn leave(&self, group: &str, id: SubscriberId) -> Result<()> {
        if self.remove_member(group, id) {
            debug!(group, subscriber = %id, "subscriber left group");
        }
        Ok(())
    }

    async fn publish(&self, group: &str, frame: Frame) -> Result<PublishReport> {
        let targets: Vec<SubscriberHandle> = match self.groups.get(group) {
            Some(members) => members.values().cloned().collect(),
            None => return Ok(PublishReport::default()),
        };

        let mut report = PublishReport {
            attempted: targets.len(),
            ..PublishReport::default()
        };
        let mut to_remove = Vec::new();

        for handle in &targets {
            match handle.offer(frame.clone()) {
                Offer::Delivered => report.delivered += 1,
                Offer::Dropped { total } => {
                    report.dropped += 1;
                    if self.max_dropped > 0 && total >= self.max_dropped {
                        warn!(group, subscriber = %handle.id(), drops = total, "evicting slow subscriber");
                        report.evicted += 1;
                        to_remove.push(handle.id());
                    } else {
                        warn!(group, subscriber = %handle.id(), total_drops = total, "subscriber queue full, frame dropped");
                    }
                }
                Offer::Closed => {
                    report.stale += 1;
                    to_remove.push(handle.id());
                }
            }
        }
        // drop the snapshot's senders so evicted sessions observe a closed queue
        drop(targets);

        for id in to_remove {
            self.remove_member(group, id);
        }

        Ok(report)
    }

    async fn member_count(&self, group: &str) -> Result<usize> {
        Ok(self.groups.get(group).map(|m| m.len()).unwrap_or(0))
    }
}
