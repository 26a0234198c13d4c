mod support;

use std::sync::Arc;
use std::time::Duration;

use alertline::notifications::ack::ack_channel;
use alertline::notifications::channel::{ChannelKind, NotificationChannel};
use alertline::notifications::dispatcher::Dispatcher;
use alertline::notifications::queue::{NotificationStatus, RetryQueue, RetryQueueConfig};
use alertline::notifications::registry::ChannelRegistry;
use alertline::notifications::types::{Category, ChannelOutcome};

use support::{Behavior, LogCapture, ScriptedChannel, request};

fn queue_with(channel: Arc<ScriptedChannel>) -> RetryQueue {
    let (acks, _rx) = ack_channel();
    let registry = ChannelRegistry::new(vec![channel as Arc<dyn NotificationChannel>]);
    RetryQueue::new(Dispatcher::new(registry, acks), RetryQueueConfig::default())
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_request_is_dropped_after_five_sweeps() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let push = ScriptedChannel::new("push", ChannelKind::BackgroundPush, Behavior::Fail);
    let queue = queue_with(push.clone());
    queue.start().await;

    let id = queue.enqueue(request(Category::Booking)).await;
    queue.attempt(&id).await.expect("queued").settled().await;
    assert_eq!(push.sends(), 1);

    tokio::time::sleep(Duration::from_secs(149)).await;
    let pending = queue.get(&id).await.expect("still queued before the fifth sweep");
    assert_eq!(pending.attempt_count, 5);
    assert_eq!(push.sends(), 5);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!queue.contains(&id).await);
    assert_eq!(push.sends(), 5);
    assert_eq!(logs.count("notification_exhausted"), 1);

    let record = queue.record(&id).await.expect("history kept");
    assert_eq!(record.status, NotificationStatus::Exhausted);
    assert_eq!(record.attempts, 5);
    assert!(record.delivered_channels.is_empty());
    assert!(record.last_error.is_some());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(logs.count("notification_exhausted"), 1);
    assert_eq!(push.sends(), 5);
    queue.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn acknowledged_request_is_never_redispatched() {
    let push = ScriptedChannel::new("push", ChannelKind::BackgroundPush, Behavior::Deliver);
    let queue = queue_with(push.clone());
    queue.start().await;

    let id = queue.enqueue(request(Category::Booking)).await;
    queue.attempt(&id).await.expect("queued").settled().await;
    assert!(queue.acknowledge(&id).await);
    assert!(!queue.acknowledge(&id).await);
    assert!(queue.is_empty().await);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(push.sends(), 1);
    assert!(queue.attempt(&id).await.is_none());
    let record = queue.record(&id).await.expect("history kept");
    assert_eq!(record.status, NotificationStatus::Acknowledged);
    assert_eq!(record.delivered_channels, vec!["push".to_string()]);
    queue.destroy().await;
}

#[tokio::test(start_paused = true)]
async fn delivered_but_unacknowledged_expires_without_failure() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let push = ScriptedChannel::new("push", ChannelKind::BackgroundPush, Behavior::Deliver);
    let queue = queue_with(push.clone());
    queue.start().await;

    let id = queue.enqueue(request(Category::Message)).await;
    queue.attempt(&id).await.expect("queued").settled().await;
    let queued = queue.get(&id).await.expect("delivery does not remove the request");
    assert_eq!(
        queued.per_channel_outcome.get("push"),
        Some(&ChannelOutcome::Delivered)
    );

    tokio::time::sleep(Duration::from_secs(151)).await;
    assert!(!queue.contains(&id).await);
    assert_eq!(logs.count("notification_expired"), 1);
    assert_eq!(logs.count("notification_exhausted"), 0);
    let record = queue.record(&id).await.expect("history kept");
    assert_eq!(record.status, NotificationStatus::Exhausted);
    assert!(record.last_error.is_none());
    queue.destroy().await;
}

#[tokio::test]
async fn manual_sweeps_count_attempts() {
    let push = ScriptedChannel::new("push", ChannelKind::BackgroundPush, Behavior::Fail);
    let queue = queue_with(push.clone());
    let id = queue.enqueue(request(Category::Alert)).await;
    assert_eq!(queue.get(&id).await.unwrap().attempt_count, 0);
    queue.attempt(&id).await.unwrap().settled().await;

    for expected in 2..=5 {
        let summary = queue.sweep().await;
        assert_eq!(summary.retried, 1);
        assert_eq!(queue.get(&id).await.unwrap().attempt_count, expected);
    }
    assert!(queue.attempt(&id).await.is_none());
    let summary = queue.sweep().await;
    assert_eq!(summary.retried, 0);
    assert_eq!(summary.exhausted, 1);
    assert_eq!(summary.exhausted_ids, vec![id.clone()]);
    assert!(queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn destroy_stops_sweeping_and_drops_pending() {
    let push = ScriptedChannel::new("push", ChannelKind::BackgroundPush, Behavior::Fail);
    let queue = queue_with(push.clone());
    queue.start().await;
    queue.start().await;
    assert!(queue.is_running().await);

    let id = queue.enqueue(request(Category::Booking)).await;
    queue.attempt(&id).await.unwrap().settled().await;
    queue.destroy().await;
    assert!(!queue.is_running().await);
    assert!(queue.is_empty().await);
    let record = queue.record(&id).await.expect("history kept");
    assert_eq!(record.status, NotificationStatus::Dropped);
    assert_eq!(record.attempts, 1);

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(push.sends(), 1);
}

#[tokio::test]
async fn exhausted_ids_are_announced() {
    let push = ScriptedChannel::new("push", ChannelKind::BackgroundPush, Behavior::Fail);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let queue = queue_with(push.clone()).with_exhausted_notifier(tx);
    let id = queue.enqueue(request(Category::Alert)).await;
    queue.attempt(&id).await.unwrap().settled().await;
    for _ in 0..4 {
        queue.sweep().await;
    }
    assert!(rx.try_recv().is_err());

    queue.sweep().await;
    assert_eq!(rx.try_recv().unwrap(), id);
    assert!(rx.try_recv().is_err());
}
