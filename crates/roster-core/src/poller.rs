//! Periodic unread-notification count, tied to the lifetime of a handle.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(300);

/// What the poller has seen so far. Every attempt bumps `attempts`, so
/// subscribers are woken by failures as well as by new counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    pub latest: Option<u64>,
    pub attempts: u64,
    pub last_error: Option<String>,
}

pub trait UnreadCountSource: Send + Sync + 'static {
    fn unread_count(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

pub struct UnreadPoller;

impl UnreadPoller {
    /// Spawns the polling task on the current tokio runtime. The first poll
    /// runs immediately, then once per `period`.
    pub fn start<S>(source: S, period: Duration) -> PollerHandle
    where
        S: UnreadCountSource,
    {
        let period = if period.is_zero() {
            warn!("zero poll period requested; using one second");
            Duration::from_secs(1)
        } else {
            period
        };

        let (latest_tx, latest_rx) = watch::channel(PollState::default());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        info!(period_secs = period.as_secs_f64(), "starting unread-count poller");
        let task = tokio::spawn(poll_loop(source, period, latest_tx, cancel_rx));

        PollerHandle {
            latest: latest_rx,
            cancel: cancel_tx,
            task: Some(task),
        }
    }
}

async fn poll_loop<S>(
    source: S,
    period: Duration,
    latest: watch::Sender<PollState>,
    mut cancel: watch::Receiver<bool>,
) where
    S: UnreadCountSource,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            result = source.unread_count() => result,
        };

        match result {
            Ok(count) => {
                debug!(count, "polled unread count");
                latest.send_modify(|state| {
                    state.attempts += 1;
                    state.latest = Some(count);
                    state.last_error = None;
                });
            }
            Err(err) => {
                warn!(error = %err, "unread-count poll failed; keeping previous value");
                latest.send_modify(|state| {
                    state.attempts += 1;
                    state.last_error = Some(format!("{err:#}"));
                });
            }
        }
    }

    debug!("unread-count poller stopped");
}

/// Owns a running poller. Stopping or dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollerHandle {
    latest: watch::Receiver<PollState>,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn latest(&self) -> Option<u64> {
        self.latest.borrow().latest
    }

    pub fn state(&self) -> PollState {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.latest.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stop(mut self) {
        self.cancel.send_replace(true);
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "unread-count poller ended abnormally");
        }
        info!("stopped unread-count poller");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

/// Reads the count from a JSON file holding either `{"unread": n}` or a
/// bare number.
#[derive(Debug, Clone)]
pub struct JsonUnreadFile {
    path: PathBuf,
}

impl JsonUnreadFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UnreadCountSource for JsonUnreadFile {
    async fn unread_count(&self) -> anyhow::Result<u64> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        parse_unread(&raw).with_context(|| format!("failed parsing {}", self.path.display()))
    }
}

pub fn parse_unread(raw: &str) -> anyhow::Result<u64> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let count = match &value {
        Value::Object(map) => map.get("unread").or_else(|| map.get("count")),
        other => Some(other),
    };

    count
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("expected a non-negative unread count, got {value}"))
}
