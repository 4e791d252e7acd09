//! Coalescing of bursts of file changes.
//!
//! The game rewrites its advancements, stats and unlocks files together on
//! every autosave, and may write each in several chunks. Ticking on every
//! raw notification would reconcile half-written files over and over, so
//! changes are held per key until the key has been quiet for the interval,
//! and only the latest value is released.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use waypost_monitor::utils::debounce::Debouncer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (ready_tx, mut ready_rx) = mpsc::channel(16);
//!     let debouncer = Debouncer::new(Duration::from_millis(250), ready_tx);
//!
//!     let stats = PathBuf::from("saves/World/stats/player.json");
//!     debouncer.send("snapshots", stats.clone()).await.unwrap();
//!     debouncer.send("snapshots", stats).await.unwrap();
//!
//!     // One release for the whole burst.
//!     let (_, last_path) = ready_rx.recv().await.unwrap();
//!     println!("tick after change to {}", last_path.display());
//! }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, trace, warn};

/// Capacity of the debouncer's input queue.
const INPUT_CAPACITY: usize = 256;

/// Idle wake-up interval when nothing is pending.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Errors returned by [`Debouncer::send`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebouncerError {
    /// The background task has stopped.
    #[error("debouncer channel closed")]
    ChannelClosed,
}

/// Releases the latest value for a key once the key has been quiet for the interval.
#[derive(Debug)]
pub struct Debouncer<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
    V: Send + 'static,
{
    input_tx: mpsc::Sender<(K, V)>,
    task: JoinHandle<()>,
}

impl<K, V> Debouncer<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
    V: Send + 'static,
{
    /// Spawns the background task on the current Tokio runtime.
    #[must_use]
    pub fn new(interval: Duration, output_tx: mpsc::Sender<(K, V)>) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let task = tokio::spawn(debounce_loop(interval, input_rx, output_tx));
        Self { input_tx, task }
    }

    /// Queues a value, replacing any pending value for `key` and restarting its timer.
    ///
    /// # Errors
    ///
    /// Returns [`DebouncerError::ChannelClosed`] if the background task has stopped.
    pub async fn send(&self, key: K, value: V) -> Result<(), DebouncerError> {
        self.input_tx
            .send((key, value))
            .await
            .map_err(|_| DebouncerError::ChannelClosed)
    }

    /// Non-blocking variant of [`send`](Self::send); returns `false` if the
    /// queue is full or closed.
    pub fn try_send(&self, key: K, value: V) -> bool {
        self.input_tx.try_send((key, value)).is_ok()
    }

    /// Returns `true` once the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct Pending<V> {
    value: V,
    deadline: Instant,
}

async fn debounce_loop<K, V>(
    interval: Duration,
    mut input_rx: mpsc::Receiver<(K, V)>,
    output_tx: mpsc::Sender<(K, V)>,
) where
    K: Clone + Eq + Hash + Debug,
{
    let mut pending: HashMap<K, Pending<V>> = HashMap::new();
    debug!(interval_ms = interval.as_millis(), "Debouncer started");

    loop {
        let next_deadline = pending.values().map(|p| p.deadline).min();
        let wait = async move {
            match next_deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => sleep(IDLE_POLL).await,
            }
        };

        tokio::select! {
            received = input_rx.recv() => match received {
                Some((key, value)) => {
                    trace!(key = ?key, "Change queued");
                    let deadline = Instant::now() + interval;
                    pending.insert(key, Pending { value, deadline });
                }
                None => {
                    debug!(pending = pending.len(), "Debouncer input closed, flushing");
                    for (key, entry) in pending.drain() {
                        release(&output_tx, key, entry.value).await;
                    }
                    break;
                }
            },
            () = wait => {
                let now = Instant::now();
                let due: Vec<K> = pending
                    .iter()
                    .filter(|(_, p)| p.deadline <= now)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in due {
                    if let Some(entry) = pending.remove(&key) {
                        release(&output_tx, key, entry.value).await;
                    }
                }
            }
        }
    }

    debug!("Debouncer stopped");
}

async fn release<K: Debug, V>(output_tx: &mpsc::Sender<(K, V)>, key: K, value: V) {
    trace!(key = ?key, "Releasing debounced change");
    if let Err(e) = output_tx.send((key, value)).await {
        warn!(error = %e, "Debounced change dropped, receiver closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::time::timeout;

    fn debouncer<K, V>(interval_ms: u64) -> (Debouncer<K, V>, mpsc::Receiver<(K, V)>)
    where
        K: Clone + Eq + Hash + Debug + Send + 'static,
        V: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        (Debouncer::new(Duration::from_millis(interval_ms), tx), rx)
    }

    #[tokio::test]
    async fn test_burst_releases_latest_value_once() {
        let (debouncer, mut rx) = debouncer::<&str, PathBuf>(50);

        for file in ["advancements/p.json", "stats/p.json", "unlocks/p.json"] {
            debouncer.send("snapshots", PathBuf::from(file)).await.unwrap();
        }

        let (key, value) = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("released within timeout")
            .unwrap();
        assert_eq!(key, "snapshots");
        assert_eq!(value, PathBuf::from("unlocks/p.json"));

        let more = timeout(Duration::from_millis(120), rx.recv()).await;
        assert!(more.is_err(), "burst must release only once");
    }

    #[tokio::test]
    async fn test_not_released_before_quiet_period() {
        let (debouncer, mut rx) = debouncer::<&str, u32>(150);
        debouncer.send("k", 1).await.unwrap();

        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
        assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_new_change_restarts_timer() {
        let (debouncer, mut rx) = debouncer::<&str, u32>(100);

        debouncer.send("k", 1).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        debouncer.send("k", 2).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        debouncer.send("k", 3).await.unwrap();

        let (_, value) = timeout(Duration::from_millis(300), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (debouncer, mut rx) = debouncer::<String, u32>(40);
        debouncer.send("a".to_string(), 1).await.unwrap();
        debouncer.send("b".to_string(), 2).await.unwrap();
        debouncer.send("a".to_string(), 3).await.unwrap();

        let mut received = HashMap::new();
        for _ in 0..2 {
            if let Ok(Some((k, v))) = timeout(Duration::from_millis(300), rx.recv()).await {
                received.insert(k, v);
            }
        }
        assert_eq!(received.get("a"), Some(&3));
        assert_eq!(received.get("b"), Some(&2));
    }

    #[tokio::test]
    async fn test_pending_flushed_on_drop() {
        let (debouncer, mut rx) = debouncer::<&str, u32>(10_000);
        assert!(debouncer.try_send("k", 7));
        drop(debouncer);

        let (_, value) = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("flushed on close")
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_tolerated() {
        let (debouncer, rx) = debouncer::<&str, u32>(10);
        drop(rx);
        debouncer.send("k", 1).await.unwrap();
        sleep(Duration::from_millis(80)).await;
        assert!(!debouncer.is_finished());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            DebouncerError::ChannelClosed.to_string(),
            "debouncer channel closed"
        );
    }
}
