//! Analytics Collector
//!
//! Background task owning the analytics state. Recording is fire-and-forget
//! over a bounded channel: when the channel is full the event is dropped and
//! counted, so the calling path never waits on analytics. Queries never fail;
//! an unreachable collector yields zero-value reports.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::analytics::{
    AnalyticsState, EfficiencyMetrics, Metadata, OperationEvent, OperationResult, PatternAnalysis,
    TimeSeriesSnapshot, UsageReport,
};
use crate::cache::SharedClock;
use crate::config::AnalyticsConfig;

enum Message {
    Record(OperationEvent),
    Usage(oneshot::Sender<UsageReport>),
    Efficiency(oneshot::Sender<EfficiencyMetrics>),
    Patterns(oneshot::Sender<PatternAnalysis>),
    TimeSeries(oneshot::Sender<Vec<TimeSeriesSnapshot>>),
    RecentOperations(oneshot::Sender<Vec<OperationEvent>>),
    Snapshot(oneshot::Sender<TimeSeriesSnapshot>),
    Shutdown,
}

/// Cloneable handle to the analytics task.
#[derive(Debug, Clone)]
pub struct AnalyticsCollector {
    tx: mpsc::Sender<Message>,
    collecting: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    clock: SharedClock,
    query_timeout: Duration,
}

impl AnalyticsCollector {
    /// Spawns the collector task with collection enabled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: AnalyticsConfig, clock: SharedClock) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let collector = Self {
            tx,
            collecting: Arc::new(AtomicBool::new(true)),
            dropped: Arc::new(AtomicU64::new(0)),
            clock,
            query_timeout: config.query_timeout,
        };

        let worker = Worker {
            snapshot_interval: config.snapshot_interval.max(Duration::from_millis(1)),
            state: AnalyticsState::new(config),
            collecting: collector.collecting.clone(),
            dropped: collector.dropped.clone(),
            clock: collector.clock.clone(),
        };
        tokio::spawn(worker.run(rx));
        info!("Analytics collector started");
        collector
    }

    // == Collection Toggle ==
    pub fn start_collection(&self) {
        self.collecting.store(true, Ordering::SeqCst);
        debug!("Analytics collection enabled");
    }

    /// Stops recording and snapshotting; collected history is kept.
    pub fn stop_collection(&self) {
        self.collecting.store(false, Ordering::SeqCst);
        debug!("Analytics collection disabled");
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting.load(Ordering::SeqCst)
    }

    /// Number of events dropped because the channel was full or closed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // == Record ==
    /// Records an operation without waiting. No-op while collection is off.
    pub fn record_operation(
        &self,
        operation: &str,
        key: &str,
        result: OperationResult,
        duration_ms: f64,
        metadata: Metadata,
    ) {
        if !self.is_collecting() {
            return;
        }
        let event = OperationEvent {
            operation: operation.to_string(),
            key: key.to_string(),
            result,
            duration_ms,
            timestamp_ms: self.clock.now_ms(),
            metadata,
        };
        if self.tx.try_send(Message::Record(event)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(operation, key, "Analytics channel full or closed, event dropped");
        }
    }

    // == Queries ==
    pub async fn get_usage_report(&self) -> UsageReport {
        self.query(Message::Usage).await
    }

    pub async fn get_efficiency_metrics(&self) -> EfficiencyMetrics {
        self.query(Message::Efficiency).await
    }

    pub async fn analyze_patterns(&self) -> PatternAnalysis {
        self.query(Message::Patterns).await
    }

    /// Retained snapshots, oldest first.
    pub async fn time_series(&self) -> Vec<TimeSeriesSnapshot> {
        self.query(Message::TimeSeries).await
    }

    /// Buffered operation events, oldest first.
    pub async fn recent_operations(&self) -> Vec<OperationEvent> {
        self.query(Message::RecentOperations).await
    }

    /// Takes a snapshot immediately instead of waiting for the next tick.
    pub async fn take_snapshot(&self) -> TimeSeriesSnapshot {
        self.query(Message::Snapshot).await
    }

    /// Stops the collector task.
    pub async fn shutdown(&self) {
        self.stop_collection();
        if self.tx.send(Message::Shutdown).await.is_err() {
            debug!("Analytics collector already stopped");
        }
    }

    async fn query<T: Default>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Message) -> T {
        let (reply, response) = oneshot::channel();
        let request = async {
            self.tx.send(build(reply)).await.ok()?;
            response.await.ok()
        };
        match timeout(self.query_timeout, request).await {
            Ok(Some(report)) => report,
            _ => {
                debug!("Analytics collector unavailable, returning empty report");
                T::default()
            }
        }
    }
}

// == Worker ==
struct Worker {
    state: AnalyticsState,
    snapshot_interval: Duration,
    collecting: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    clock: SharedClock,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        let mut ticker = interval_at(Instant::now() + self.snapshot_interval, self.snapshot_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Shutdown) | None => break,
                    Some(message) => self.handle(message),
                },
                _ = ticker.tick() => {
                    if self.collecting.load(Ordering::SeqCst) {
                        let snapshot = self.state.take_snapshot(self.clock.now_ms());
                        trace!(operations = snapshot.operations_in_interval, "Analytics snapshot taken");
                    }
                }
            }
        }

        info!(
            tracked_keys = self.state.tracked_keys(),
            "Analytics collector stopped"
        );
    }

    fn handle(&mut self, message: Message) {
        // A dropped reply means the caller timed out; nothing to do.
        match message {
            Message::Record(event) => self.state.record(event),
            Message::Usage(reply) => {
                let _ = reply.send(self.state.usage_report(self.dropped.load(Ordering::Relaxed)));
            }
            Message::Efficiency(reply) => {
                let _ = reply.send(self.state.efficiency_metrics());
            }
            Message::Patterns(reply) => {
                let _ = reply.send(self.state.analyze_patterns(self.clock.now_ms()));
            }
            Message::TimeSeries(reply) => {
                let _ = reply.send(self.state.time_series());
            }
            Message::RecentOperations(reply) => {
                let _ = reply.send(self.state.recent_operations());
            }
            Message::Snapshot(reply) => {
                let _ = reply.send(self.state.take_snapshot(self.clock.now_ms()));
            }
            Message::Shutdown => {}
        }
    }
}
