use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use roster_core::poller::{JsonUnreadFile, UnreadCountSource, UnreadPoller};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct CountingSource {
    calls: Arc<AtomicU64>,
}

impl UnreadCountSource for CountingSource {
    async fn unread_count(&self) -> anyhow::Result<u64> {
        Ok(self.calls.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Succeeds on the first call only.
#[derive(Clone, Default)]
struct FlakySource {
    calls: Arc<AtomicU64>,
}

impl UnreadCountSource for FlakySource {
    async fn unread_count(&self) -> anyhow::Result<u64> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(9),
            _ => Err(anyhow!("notifications endpoint unavailable")),
        }
    }
}

const PERIOD: Duration = Duration::from_secs(300);

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn polls_immediately_then_every_period() {
    let source = CountingSource::default();
    let calls = source.calls.clone();
    let handle = UnreadPoller::start(source, PERIOD);
    let mut updates = handle.subscribe();

    updates.changed().await.expect("first poll");
    assert_eq!(handle.latest(), Some(1));

    tokio::time::advance(Duration::from_secs(299)).await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    updates.changed().await.expect("second poll");
    assert_eq!(handle.latest(), Some(2));
    assert!(handle.is_running());

    handle.stop().await;
    tokio::time::advance(PERIOD * 3).await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_keeps_previous_value() {
    let source = FlakySource::default();
    let calls = source.calls.clone();
    let handle = UnreadPoller::start(source, PERIOD);
    let mut updates = handle.subscribe();

    updates.changed().await.expect("first poll");
    assert_eq!(handle.latest(), Some(9));

    updates.changed().await.expect("failed attempt is published");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let state = handle.state();
    assert_eq!(state.latest, Some(9));
    assert_eq!(state.attempts, 2);
    assert!(
        state
            .last_error
            .as_deref()
            .is_some_and(|err| err.contains("unavailable"))
    );

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn source_that_always_fails_still_wakes_subscribers() {
    let temp = tempdir().expect("tempdir");
    let handle = UnreadPoller::start(JsonUnreadFile::new(temp.path().join("missing.json")), PERIOD);
    let mut updates = handle.subscribe();

    updates.changed().await.expect("first attempt");
    let first = updates.borrow_and_update().clone();
    assert_eq!(first.attempts, 1);
    assert_eq!(first.latest, None);
    assert!(first.last_error.is_some());

    updates.changed().await.expect("second attempt");
    assert_eq!(updates.borrow_and_update().attempts, 2);
    assert_eq!(handle.latest(), None);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_cancels_polling() {
    let source = CountingSource::default();
    let calls = source.calls.clone();
    let handle = UnreadPoller::start(source, PERIOD);
    let mut updates = handle.subscribe();

    updates.changed().await.expect("first poll");
    drop(handle);

    tokio::time::advance(PERIOD * 2).await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(updates.changed().await.is_err(), "poller task should have exited");
}

#[tokio::test]
async fn reads_count_from_json_file() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("unread.json");
    std::fs::write(&path, r#"{"unread": 3}"#).expect("write unread file");

    let source = JsonUnreadFile::new(&path);
    assert_eq!(source.unread_count().await.expect("unread count"), 3);

    let missing = JsonUnreadFile::new(temp.path().join("missing.json"));
    assert!(missing.unread_count().await.is_err());
}
