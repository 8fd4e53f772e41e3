// End-to-end fan-out behaviour: membership under churn, per-subscriber
// isolation, and the dispatcher's best-effort contract.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use miniblog_core::config::LiveConfig;
use miniblog_live::{
    CloseReason, Dispatcher, FrameSink, GroupBackend, LiveError, LiveHub, MemoryBackend,
    PublishReport, SessionState, SubscriberHandle, SubscriberId,
};
use miniblog_protocol::{timestamp, Frame, PostPayload};
use serde_json::{json, Value};
use tokio::sync::mpsc;

const GROUP: &str = "blog_updates";

fn dispatcher(backend: Arc<dyn GroupBackend>) -> Dispatcher {
    Dispatcher::new(backend, GROUP, Duration::from_secs(1))
}

fn decode(frame: &Frame) -> Value {
    serde_json::from_str(frame).unwrap()
}

#[tokio::test]
async fn both_subscribers_receive_post_created() {
    let backend = Arc::new(MemoryBackend::default());
    let (a, mut rx_a) = SubscriberHandle::channel(8);
    let (b, mut rx_b) = SubscriberHandle::channel(8);
    backend.join(GROUP, a).await.unwrap();
    backend.join(GROUP, b).await.unwrap();

    let post = PostPayload {
        id: 1,
        title: "Hi".into(),
        description: "d".into(),
        timestamp: timestamp::parse("2024-01-01 00:00:00").unwrap(),
        status: "Ongoing".into(),
    };
    dispatcher(backend).notify_post_created(post).await.unwrap();

    let expected = json!({
        "type": "blog_post_update",
        "id": 1,
        "title": "Hi",
        "description": "d",
        "timestamp": "2024-01-01 00:00:00",
        "status": "Ongoing",
    });
    assert_eq!(decode(&rx_a.recv().await.unwrap()), expected);
    assert_eq!(decode(&rx_b.recv().await.unwrap()), expected);
}

#[tokio::test]
async fn departed_subscriber_is_not_targeted() {
    let backend = Arc::new(MemoryBackend::default());
    let (handle, mut rx) = SubscriberHandle::channel(8);
    let id = handle.id();
    backend.join(GROUP, handle).await.unwrap();
    backend.leave(GROUP, id).await.unwrap();

    let d = dispatcher(backend.clone());
    let ts = timestamp::parse("2024-01-01 00:00:01").unwrap();
    let report = d
        .emit(&miniblog_protocol::DomainEvent::comment_added(5, "alice", "nice", ts).unwrap())
        .await
        .unwrap();
    assert_eq!(report.attempted, 0);
    assert!(rx.try_recv().is_err());
    assert_eq!(d.stats().failures, 0);
}

struct Unreachable;

#[async_trait]
impl GroupBackend for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }
    async fn join(&self, _: &str, _: SubscriberHandle) -> Result<(), LiveError> {
        Err(LiveError::BackendUnavailable("redis:6379 refused".into()))
    }
    async fn leave(&self, _: &str, _: SubscriberId) -> Result<(), LiveError> {
        Err(LiveError::BackendUnavailable("redis:6379 refused".into()))
    }
    async fn publish(&self, _: &str, _: Frame) -> Result<PublishReport, LiveError> {
        Err(LiveError::BackendUnavailable("redis:6379 refused".into()))
    }
    async fn member_count(&self, _: &str) -> Result<usize, LiveError> {
        Err(LiveError::BackendUnavailable("redis:6379 refused".into()))
    }
}

#[tokio::test]
async fn post_deleted_with_backend_down_returns_normally() {
    let d = dispatcher(Arc::new(Unreachable));
    d.notify_post_deleted(3).await;
    assert_eq!(d.stats().failures, 1);
}

#[tokio::test]
async fn one_attempt_per_subscriber_regardless_of_others() {
    let backend = Arc::new(MemoryBackend::default());
    let mut receivers = Vec::new();
    for i in 0..5 {
        let (h, rx) = SubscriberHandle::channel(8);
        backend.join(GROUP, h).await.unwrap();
        // subscriber 2 disconnects without leaving
        if i != 2 {
            receivers.push(rx);
        }
    }

    let report = backend.publish(GROUP, Frame::from("x")).await.unwrap();
    assert_eq!(report.attempted, 5);
    assert_eq!(report.delivered, 4);
    assert_eq!(report.stale, 1);

    for rx in receivers.iter_mut() {
        assert_eq!(&*rx.recv().await.unwrap(), "x");
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn slow_subscriber_does_not_affect_others() {
    let backend = Arc::new(MemoryBackend::new(0));
    let (slow, _slow_rx) = SubscriberHandle::channel(1);
    let (fast, mut fast_rx) = SubscriberHandle::channel(64);
    backend.join(GROUP, slow).await.unwrap();
    backend.join(GROUP, fast).await.unwrap();

    for i in 0..20 {
        let report = backend.publish(GROUP, Frame::from(i.to_string())).await.unwrap();
        assert_eq!(report.attempted, 2);
    }
    for i in 0..20 {
        assert_eq!(&*fast_rx.recv().await.unwrap(), i.to_string());
    }
}

#[tokio::test]
async fn membership_is_a_point_in_time_snapshot() {
    let backend = Arc::new(MemoryBackend::default());
    let (early, mut early_rx) = SubscriberHandle::channel(8);
    let (leaver, mut leaver_rx) = SubscriberHandle::channel(8);
    let leaver_id = leaver.id();
    backend.join(GROUP, early).await.unwrap();
    backend.join(GROUP, leaver).await.unwrap();
    backend.leave(GROUP, leaver_id).await.unwrap();

    backend.publish(GROUP, Frame::from("first")).await.unwrap();

    let (late, mut late_rx) = SubscriberHandle::channel(8);
    backend.join(GROUP, late).await.unwrap();
    backend.publish(GROUP, Frame::from("second")).await.unwrap();

    assert_eq!(&*early_rx.recv().await.unwrap(), "first");
    assert_eq!(&*early_rx.recv().await.unwrap(), "second");
    assert_eq!(&*late_rx.recv().await.unwrap(), "second");
    assert!(late_rx.try_recv().is_err());
    assert!(leaver_rx.recv().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_leaves_exact_membership() {
    let backend = Arc::new(MemoryBackend::default());
    let mut tasks = Vec::new();

    for i in 0..64 {
        let backend = Arc::clone(&backend);
        tasks.push(tokio::spawn(async move {
            let (handle, rx) = SubscriberHandle::channel(4);
            let id = handle.id();
            backend.join(GROUP, handle.clone()).await.unwrap();
            backend.join(GROUP, handle).await.unwrap();
            let _ = backend.publish(GROUP, Frame::from("churn")).await.unwrap();
            let keep = i % 3 == 0;
            if !keep {
                backend.leave(GROUP, id).await.unwrap();
                backend.leave(GROUP, id).await.unwrap();
            }
            (keep, rx)
        }));
    }

    let mut kept = 0;
    let mut receivers = Vec::new();
    for task in tasks {
        let (keep, rx) = task.await.unwrap();
        if keep {
            kept += 1;
        }
        receivers.push(rx);
    }
    assert_eq!(backend.member_count(GROUP).await.unwrap(), kept);
}

#[tokio::test]
async fn membership_matches_joined_minus_left() {
    let backend = Arc::new(MemoryBackend::default());
    let mut expected = HashSet::new();
    let mut receivers = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..10 {
        let (h, rx) = SubscriberHandle::channel(1);
        ids.push(h.id());
        backend.join(GROUP, h).await.unwrap();
        receivers.push(rx);
    }
    for (i, id) in ids.iter().enumerate() {
        if i % 2 == 0 {
            backend.leave(GROUP, *id).await.unwrap();
        } else {
            expected.insert(*id);
        }
    }
    let report = backend.publish(GROUP, Frame::from("x")).await.unwrap();
    assert_eq!(report.attempted, expected.len());
    for (i, rx) in receivers.iter_mut().enumerate() {
        assert_eq!(rx.try_recv().is_ok(), i % 2 == 1);
    }
}

struct ChannelSink(mpsc::UnboundedSender<String>);

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), LiveError> {
        self.0
            .send(frame.to_string())
            .map_err(|e| LiveError::Transport(e.to_string()))
    }
}

#[tokio::test]
async fn hub_shutdown_closes_every_session_once() {
    let hub = Arc::new(LiveHub::in_memory(LiveConfig::default()));
    let mut client_rxs = Vec::new();
    let mut sessions = Vec::new();
    let mut handles = Vec::new();

    for _ in 0..3 {
        let (session, outbound) = hub.session();
        session.open().await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        client_rxs.push(rx);
        sessions.push(Arc::clone(&session));

        let shutdown = hub.shutdown_token();
        let heartbeat = hub.heartbeat();
        let task = hub.track(async move {
            let mut sink = ChannelSink(tx);
            session
                .run(outbound, &mut sink, std::future::pending(), shutdown, heartbeat)
                .await
        });
        handles.push(tokio::spawn(task));
    }
    assert_eq!(hub.subscriber_count().await, 3);

    hub.dispatcher().notify_generic("maintenance").await.unwrap();
    for rx in client_rxs.iter_mut() {
        let frame = rx.recv().await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&frame).unwrap(),
            json!({"type": "notification", "message": "maintenance"})
        );
    }

    assert!(hub.shutdown(Duration::from_secs(2)).await);
    for handle in handles {
        assert_eq!(handle.await.unwrap(), CloseReason::Shutdown);
    }
    for session in &sessions {
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.close(CloseReason::Shutdown).await);
    }
    assert_eq!(hub.subscriber_count().await, 0);
}

/// Client that stopped reading: the write never completes.
struct StalledSink;

#[async_trait]
impl FrameSink for StalledSink {
    async fn send_frame(&mut self, _frame: Frame) -> Result<(), LiveError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn hub_shutdown_force_closes_stalled_session() {
    let hub = Arc::new(LiveHub::in_memory(LiveConfig::default()));
    let (session, outbound) = hub.session();
    session.open().await.unwrap();

    let shutdown = hub.shutdown_token();
    let heartbeat = hub.heartbeat();
    let task = {
        let session = Arc::clone(&session);
        hub.track(async move {
            session
                .run(outbound, &mut StalledSink, std::future::pending(), shutdown, heartbeat)
                .await
        })
    };
    let handle = tokio::spawn(task);

    hub.dispatcher().notify_generic("maintenance").await.unwrap();
    // the session is now parked inside the stalled write
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(hub.shutdown(Duration::from_millis(300)).await);
    assert_eq!(handle.await.unwrap(), CloseReason::Shutdown);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(hub.subscriber_count().await, 0);
}
