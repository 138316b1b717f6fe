// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fixed-interval driver of the sync loop.
//!
//! A single control task owns the in-flight cycle, the [`StateStore`] writes
//! and the observer notifications. Each cycle (liveness probe, then aggregate
//! refresh) runs in its own task and is joined back by the control task, so at
//! most one request is outstanding and ticks that fire meanwhile are skipped
//! rather than queued.

mod observer;
mod probe;

pub use observer::{SkipReason, SyncObserver};
pub use probe::{AlwaysRunning, LivenessProbe, TcpLivenessProbe};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::aggregator::StateAggregator;
use crate::error::RequestError;
use crate::snapshot::Snapshot;
use crate::store::StateStore;

enum CycleOutcome {
    NotRunning,
    Refreshed(Result<Snapshot, RequestError>),
}

pub struct PollScheduler {
    aggregator: StateAggregator,
    store: Arc<StateStore>,
    interval: Duration,
    probe: Arc<dyn LivenessProbe>,
    observers: Vec<Arc<dyn SyncObserver>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("aggregator", &self.aggregator)
            .field("interval", &self.interval)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl PollScheduler {
    /// Creates a scheduler that assumes the server is always running and has
    /// no observers.
    pub fn new(aggregator: StateAggregator, store: Arc<StateStore>, interval: Duration) -> Self {
        Self {
            aggregator,
            store,
            interval,
            probe: Arc::new(AlwaysRunning),
            observers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Uses `cancel` as the shutdown signal. Pass the token given to the
    /// aggregator's [`crate::retry::RetryCoordinator`] so that shutting the
    /// scheduler down also abandons pending retry delays.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawns the control task. The first cycle fires immediately.
    pub fn start(self) -> SchedulerHandle {
        let (poll_tx, poll_rx) = mpsc::channel(1);
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run(poll_rx));
        SchedulerHandle {
            cancel,
            poll_tx,
            join,
        }
    }

    async fn run(self, mut poll_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<CycleOutcome>> = None;
        debug!(
            interval_ms = self.interval.as_millis() as u64,
            "poll scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                joined = join_in_flight(&mut in_flight) => {
                    in_flight = None;
                    match joined {
                        Ok(outcome) => self.finish(outcome),
                        Err(err) => warn!(%err, "poll cycle task failed"),
                    }
                }
                _ = ticker.tick() => self.begin(&mut in_flight),
                Some(()) = poll_rx.recv() => {
                    debug!("immediate poll requested");
                    self.begin(&mut in_flight);
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            handle.abort();
            let _ = handle.await;
        }
        debug!("poll scheduler stopped");
    }

    fn begin(&self, in_flight: &mut Option<JoinHandle<CycleOutcome>>) {
        if in_flight.is_some() {
            self.skip(SkipReason::CycleInFlight);
            return;
        }
        let aggregator = self.aggregator.clone();
        let probe = Arc::clone(&self.probe);
        *in_flight = Some(tokio::spawn(async move {
            if !probe.is_running().await {
                return CycleOutcome::NotRunning;
            }
            CycleOutcome::Refreshed(aggregator.refresh().await)
        }));
    }

    fn finish(&self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::NotRunning => self.skip(SkipReason::ServerNotRunning),
            CycleOutcome::Refreshed(Ok(snapshot)) => {
                let snapshot = self.store.replace(snapshot);
                let generation = self.store.generation();
                debug!(
                    generation,
                    configured = snapshot.configured_streams.len(),
                    active = snapshot.active_stream_names.len(),
                    pushes = snapshot.pushes.len(),
                    clients = snapshot.clients.len(),
                    "snapshot replaced"
                );
                for observer in &self.observers {
                    observer.on_snapshot_replaced(&snapshot, generation);
                }
            }
            CycleOutcome::Refreshed(Err(err)) => {
                warn!(%err, "state sync failed; keeping previous snapshot");
                for observer in &self.observers {
                    observer.on_refresh_error(&err);
                }
            }
        }
    }

    fn skip(&self, reason: SkipReason) {
        debug!(%reason, "poll cycle skipped");
        for observer in &self.observers {
            observer.on_cycle_skipped(reason);
        }
    }
}

async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<CycleOutcome>>,
) -> Result<CycleOutcome, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Controls a running [`PollScheduler`].
pub struct SchedulerHandle {
    cancel: CancellationToken,
    poll_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.join.is_finished())
            .finish()
    }
}

impl SchedulerHandle {
    /// Requests a cycle right away, subject to the usual skip rules.
    /// Returns `false` if a request is already pending or the scheduler has
    /// stopped.
    pub fn poll_now(&self) -> bool {
        self.poll_tx.try_send(()).is_ok()
    }

    /// Stops the timer, abandons any in-flight cycle and waits for the
    /// control task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            if !err.is_cancelled() {
                warn!(%err, "poll scheduler task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportFailure;
    use crate::http::{ApiResponse, CommandExecutor, RequestTimeout};
    use crate::retry::RetryCoordinator;
    use crate::snapshot::StreamName;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum Event {
        Replaced(u64),
        Failed(RequestError),
        Skipped(SkipReason),
    }

    struct ChannelObserver(mpsc::UnboundedSender<Event>);

    impl SyncObserver for ChannelObserver {
        fn on_snapshot_replaced(&self, _snapshot: &Snapshot, generation: u64) {
            let _ = self.0.send(Event::Replaced(generation));
        }

        fn on_refresh_error(&self, error: &RequestError) {
            let _ = self.0.send(Event::Failed(error.clone()));
        }

        fn on_cycle_skipped(&self, reason: SkipReason) {
            let _ = self.0.send(Event::Skipped(reason));
        }
    }

    /// Replays scripted results after `latency`; repeats `NoData` once drained.
    struct ScriptedExecutor {
        script: Mutex<VecDeque<Result<ApiResponse, RequestError>>>,
        latency: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(latency: Duration, script: Vec<Result<Value, RequestError>>) -> Arc<Self> {
            let script = script
                .into_iter()
                .map(|step| {
                    step.map(|value| match value {
                        Value::Object(map) => map,
                        other => panic!("scripted response must be an object: {other}"),
                    })
                })
                .collect();
            Arc::new(Self {
                script: Mutex::new(script),
                latency,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _command: &Value,
            _timeout: RequestTimeout,
        ) -> Result<ApiResponse, RequestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.script
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or(Err(RequestError::NoData))
        }
    }

    struct NotRunning;

    #[async_trait]
    impl LivenessProbe for NotRunning {
        async fn is_running(&self) -> bool {
            false
        }
    }

    struct Harness {
        store: Arc<StateStore>,
        events: mpsc::UnboundedReceiver<Event>,
        handle: SchedulerHandle,
    }

    fn start(
        executor: Arc<ScriptedExecutor>,
        max_retries: u32,
        interval: Duration,
        probe: Arc<dyn LivenessProbe>,
    ) -> Harness {
        let cancel = CancellationToken::new();
        let retry = RetryCoordinator::new(
            executor,
            max_retries,
            Duration::from_secs(2),
            cancel.clone(),
        );
        let store = Arc::new(StateStore::new());
        let (tx, events) = mpsc::unbounded_channel();
        let handle = PollScheduler::new(StateAggregator::new(retry), Arc::clone(&store), interval)
            .with_probe(probe)
            .with_observer(Arc::new(ChannelObserver(tx)))
            .with_cancellation(cancel)
            .start();
        Harness {
            store,
            events,
            handle,
        }
    }

    fn live(name: &str) -> Result<Value, RequestError> {
        Ok(json!({"active_streams": [name]}))
    }

    async fn next(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        events.recv().await.expect("scheduler event")
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_running_skips_without_network() {
        let executor = ScriptedExecutor::new(Duration::ZERO, vec![live("live")]);
        let mut harness = start(
            executor.clone(),
            0,
            Duration::from_secs(10),
            Arc::new(NotRunning),
        );

        for _ in 0..3 {
            assert_eq!(
                next(&mut harness.events).await,
                Event::Skipped(SkipReason::ServerNotRunning)
            );
        }
        assert_eq!(executor.calls(), 0);
        assert_eq!(harness.store.generation(), 0);
        assert_eq!(*harness.store.current(), Snapshot::default());

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_skipped_not_queued() {
        let executor = ScriptedExecutor::new(
            Duration::from_secs(15),
            vec![live("first"), live("second")],
        );
        let mut harness = start(
            executor.clone(),
            0,
            Duration::from_secs(10),
            Arc::new(AlwaysRunning),
        );
        let started = Instant::now();

        assert_eq!(
            next(&mut harness.events).await,
            Event::Skipped(SkipReason::CycleInFlight)
        );
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(executor.calls(), 1);

        assert_eq!(next(&mut harness.events).await, Event::Replaced(1));
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(executor.calls(), 1);

        // The next cycle starts on the following tick, not on completion.
        assert_eq!(
            next(&mut harness.events).await,
            Event::Skipped(SkipReason::CycleInFlight)
        );
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert_eq!(executor.calls(), 2);

        assert_eq!(next(&mut harness.events).await, Event::Replaced(2));
        assert!(harness
            .store
            .current()
            .is_active(&StreamName::from("second")));

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let executor = ScriptedExecutor::new(
            Duration::ZERO,
            vec![live("live"), Err(RequestError::Http(500))],
        );
        let mut harness = start(
            executor.clone(),
            0,
            Duration::from_secs(10),
            Arc::new(AlwaysRunning),
        );

        assert_eq!(next(&mut harness.events).await, Event::Replaced(1));
        let before = harness.store.current();

        assert_eq!(
            next(&mut harness.events).await,
            Event::Failed(RequestError::Http(500))
        );
        let after = harness.store.current();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(harness.store.generation(), 1);
        assert!(after.is_active(&StreamName::from("live")));

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_now_runs_before_next_tick() {
        let executor = ScriptedExecutor::new(Duration::ZERO, vec![live("a"), live("b")]);
        let mut harness = start(
            executor.clone(),
            0,
            Duration::from_secs(60),
            Arc::new(AlwaysRunning),
        );
        let started = Instant::now();

        assert_eq!(next(&mut harness.events).await, Event::Replaced(1));
        assert!(harness.handle.poll_now());
        assert_eq!(next(&mut harness.events).await, Event::Replaced(2));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(executor.calls(), 2);

        harness.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_pending_retry() {
        let refused = || {
            Err(RequestError::Network(TransportFailure::ConnectionFailed(
                "refused".into(),
            )))
        };
        let executor = ScriptedExecutor::new(Duration::ZERO, vec![refused(), refused()]);
        let harness = start(
            executor.clone(),
            3,
            Duration::from_secs(10),
            Arc::new(AlwaysRunning),
        );

        // First attempt fails at t=0; the retry is due at t=2s.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(executor.calls(), 1);

        let started = Instant::now();
        harness.handle.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(executor.calls(), 1);
        assert_eq!(harness.store.generation(), 0);
    }

    #[tokio::test]
    async fn test_poll_now_after_shutdown_is_rejected() {
        let executor = ScriptedExecutor::new(Duration::ZERO, vec![]);
        let Harness { handle, .. } =
            start(executor, 0, Duration::from_secs(10), Arc::new(AlwaysRunning));
        let cancel = handle.cancel.clone();
        let poll_tx = handle.poll_tx.clone();
        handle.shutdown().await;
        assert!(cancel.is_cancelled());
        assert!(poll_tx.try_send(()).is_err());
    }
}
