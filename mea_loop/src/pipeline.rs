//! Closed-loop tasks and the queues between them.
//!
//! ```text
//! ┌───────────────┐ SampleBatch ┌──────────────┐
//! │ IngestionTask │────────────►│ AnalysisTask │
//! └───────────────┘  bounded    └──────────────┘
//!
//! ┌───────────────┐ StimRequest ┌─────────────────┐   ┌────────────┐
//! │  TriggerTask  │────────────►│ StimulationTask │──►│ Controller │
//! └───────────────┘  bounded    └─────────────────┘   └────────────┘
//! ```
//!
//! Every task polls a shared `running` flag and ends within one receive
//! timeout of it being cleared.

use crate::config::StimTarget;
use crate::error::LoopError;
use crate::plan::StimulationPlan;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use mea_array::ElectrodeArrayController;
use mea_stream::{SampleBatch, SampleStream};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Poll period of blocked sends and receives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a full queue does with a new item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Discard the oldest queued item.
    #[default]
    DropOldest,
    /// Wait for room while running.
    Block,
}

/// Producer side of a bounded queue with a backpressure policy.
pub struct QueueSender<T> {
    tx: Sender<T>,
    /// Consumer handle used to evict the oldest item.
    evict: Option<Receiver<T>>,
    dropped: Arc<AtomicU64>,
    name: &'static str,
}

/// Bounded queue of `capacity` items.
pub fn bounded_queue<T>(
    name: &'static str,
    capacity: usize,
    policy: Backpressure,
) -> (QueueSender<T>, Receiver<T>) {
    let (tx, rx) = channel::bounded(capacity);
    let evict = match policy {
        Backpressure::DropOldest => Some(rx.clone()),
        Backpressure::Block => None,
    };
    let sender = QueueSender {
        tx,
        evict,
        dropped: Arc::new(AtomicU64::new(0)),
        name,
    };
    (sender, rx)
}

impl<T> QueueSender<T> {
    /// Queue `item`. Returns `false` when a blocking send was abandoned
    /// because `running` was cleared.
    pub fn send(&self, item: T, running: &AtomicBool) -> Result<bool, LoopError> {
        match &self.evict {
            Some(evict) => self.send_dropping_oldest(item, evict),
            None => self.send_blocking(item, running),
        }
    }

    fn send_dropping_oldest(&self, mut item: T, evict: &Receiver<T>) -> Result<bool, LoopError> {
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return Ok(true),
                Err(TrySendError::Full(back)) => {
                    if evict.try_recv().is_ok() {
                        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!("Queue '{}' full, dropped oldest item ({} total)", self.name, dropped);
                    }
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(LoopError::ChannelClosed(self.name));
                }
            }
        }
    }

    fn send_blocking(&self, mut item: T, running: &AtomicBool) -> Result<bool, LoopError> {
        loop {
            match self.tx.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(back)) => {
                    if !running.load(Ordering::SeqCst) {
                        return Ok(false);
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(LoopError::ChannelClosed(self.name));
                }
            }
        }
    }

    /// Items evicted so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receive with a poll timeout until `running` is cleared. `None` on stop
/// or when every sender is gone.
fn recv_while_running<T>(rx: &Receiver<T>, running: &AtomicBool) -> Option<T> {
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(item) => return Some(item),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
    None
}

fn join<T>(name: &'static str, handle: JoinHandle<Result<T, LoopError>>) -> Result<T, LoopError> {
    handle.join().map_err(|_| LoopError::TaskPanicked(name))?
}

fn spawn<T, F>(name: &'static str, f: F) -> Result<JoinHandle<Result<T, LoopError>>, LoopError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LoopError> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| LoopError::Unsupported(format!("cannot spawn '{name}': {e}")))
}

/// Counters of a finished ingestion task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub batches: u64,
    pub dropped: u64,
}

/// Reads sample batches and queues them.
pub struct IngestionTask {
    handle: JoinHandle<Result<IngestionStats, LoopError>>,
}

impl IngestionTask {
    /// Connect `stream` on a new thread and sample `n_samples` frames of
    /// `channels` per batch until `running` is cleared. The stream is
    /// disconnected on every exit path.
    pub fn spawn(
        mut stream: Box<dyn SampleStream>,
        n_samples: usize,
        channels: Vec<usize>,
        queue: QueueSender<SampleBatch>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, LoopError> {
        let handle = spawn("ingestion", move || {
            stream.connect()?;
            info!("Connected to sample stream ({} channels)", channels.len());

            let mut stats = IngestionStats::default();
            let result = (|| {
                while running.load(Ordering::SeqCst) {
                    let batch = stream.sample(n_samples, &channels)?;
                    if !queue.send(batch, &running)? {
                        break;
                    }
                    stats.batches += 1;
                }
                Ok::<_, LoopError>(())
            })();

            let disconnected = stream.disconnect();
            result?;
            disconnected?;
            stats.dropped = queue.dropped();
            info!(
                "Sample stream closed after {} batches ({} dropped)",
                stats.batches, stats.dropped
            );
            Ok(stats)
        })?;
        Ok(Self { handle })
    }

    /// Wait for the thread and return its result.
    pub fn join(self) -> Result<IngestionStats, LoopError> {
        join("ingestion", self.handle)
    }

    /// `true` once the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Summary of the last analysed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivitySummary {
    pub batches: u64,
    pub samples: u64,
    /// Mean absolute amplitude per channel of the last batch.
    pub last_mean_abs: Vec<f32>,
}

/// Consumes sample batches.
pub struct AnalysisTask {
    handle: JoinHandle<Result<ActivitySummary, LoopError>>,
}

impl AnalysisTask {
    /// Summarize batches until `running` is cleared or the queue closes.
    pub fn spawn(batches: Receiver<SampleBatch>, running: Arc<AtomicBool>) -> Result<Self, LoopError> {
        let handle = spawn("analysis", move || {
            let mut summary = ActivitySummary::default();
            while let Some(batch) = recv_while_running(&batches, &running) {
                debug!("Received {} samples", batch.n_samples());
                summary.batches += 1;
                summary.samples += batch.n_samples() as u64;
                summary.last_mean_abs = batch.mean_abs();
            }
            info!(
                "Activity analysis done: {} batches, {} samples",
                summary.batches, summary.samples
            );
            Ok(summary)
        })?;
        Ok(Self { handle })
    }

    /// Wait for the thread and return its result.
    pub fn join(self) -> Result<ActivitySummary, LoopError> {
        join("analysis", self.handle)
    }

    /// `true` once the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// One stimulation request.
#[derive(Debug, Clone, PartialEq)]
pub struct StimRequest {
    pub targets: Vec<StimTarget>,
}

/// Emits the configured stimulation pattern at a fixed period.
pub struct TriggerTask {
    handle: JoinHandle<Result<u64, LoopError>>,
}

impl TriggerTask {
    /// Queue a request for `targets` every `interval`.
    pub fn spawn(
        targets: Vec<StimTarget>,
        interval: Duration,
        queue: QueueSender<StimRequest>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, LoopError> {
        let handle = spawn("trigger", move || {
            info!("Start pattern generation every {:?}", interval);
            let mut sent = 0u64;
            while sleep_while_running(interval, &running) {
                let request = StimRequest {
                    targets: targets.clone(),
                };
                if !queue.send(request, &running)? {
                    break;
                }
                sent += 1;
                debug!("Sent stimulation pattern {}", sent);
            }
            Ok(sent)
        })?;
        Ok(Self { handle })
    }

    /// Wait for the thread and return its result.
    pub fn join(self) -> Result<u64, LoopError> {
        join("trigger", self.handle)
    }

    /// `true` once the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Sleep `total` in poll-sized steps. `false` if `running` was cleared.
fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool {
    let mut left = total;
    while !left.is_zero() {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let step = left.min(POLL_INTERVAL);
        thread::sleep(step);
        left -= step;
    }
    running.load(Ordering::SeqCst)
}

/// Delivers stimulation requests through a [`StimulationPlan`].
///
/// Holds the controller lock for the duration of one request, so
/// reconfiguration never interleaves with a replay.
pub struct StimulationTask {
    handle: JoinHandle<Result<u64, LoopError>>,
}

impl StimulationTask {
    /// Deliver queued requests through `plan`.
    pub fn spawn(
        controller: Arc<Mutex<ElectrodeArrayController>>,
        mut plan: StimulationPlan,
        requests: Receiver<StimRequest>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, LoopError> {
        let handle = spawn("stimulation", move || {
            info!("Ready for stimulation requests ({})", plan.mode_name());
            let mut delivered = 0u64;
            while let Some(request) = recv_while_running(&requests, &running) {
                let mut controller = controller.lock();
                match plan.trigger(&mut controller, &request.targets) {
                    Ok(programs) => delivered += programs as u64,
                    Err(e) => {
                        error!("Stimulation failed: {}", e);
                        return Err(e);
                    }
                }
            }
            info!("Delivered {} stimulation programs", delivered);
            Ok(delivered)
        })?;
        Ok(Self { handle })
    }

    /// Wait for the thread and return its result.
    pub fn join(self) -> Result<u64, LoopError> {
        join("stimulation", self.handle)
    }

    /// `true` once the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_oldest_keeps_newest_items() {
        let running = AtomicBool::new(true);
        let (tx, rx) = bounded_queue("test", 2, Backpressure::DropOldest);
        for i in 0..5 {
            assert!(tx.send(i, &running).unwrap());
        }
        assert_eq!(tx.dropped(), 3);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn block_gives_up_when_stopped() {
        let running = AtomicBool::new(true);
        let (tx, rx) = bounded_queue("test", 1, Backpressure::Block);
        assert!(tx.send(1, &running).unwrap());
        running.store(false, Ordering::SeqCst);
        assert!(!tx.send(2, &running).unwrap());
        assert_eq!(tx.dropped(), 0);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn block_reports_closed_consumer() {
        let running = AtomicBool::new(true);
        let (tx, rx) = bounded_queue::<u32>("test", 1, Backpressure::Block);
        drop(rx);
        assert!(matches!(
            tx.send(1, &running),
            Err(LoopError::ChannelClosed("test"))
        ));
    }

    #[test]
    fn receive_stops_with_flag() {
        let running = AtomicBool::new(false);
        let (tx, rx) = bounded_queue("test", 1, Backpressure::Block);
        tx.send(1, &AtomicBool::new(true)).unwrap();
        assert_eq!(recv_while_running(&rx, &running), None);
    }

    #[test]
    fn sleep_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        assert!(!sleep_while_running(Duration::from_secs(10), &running));
    }
}
