use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{Clock, SystemClock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use super::{AggregatorCommandQueuer, DataPointQueuer};
use crate::aggregator::Command;
use crate::error::{Error, Result};
use crate::model::Ident;
use crate::rrd::ClockPdp;

/// How a paced metric is accumulated between flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacedMetricKind {
    /// Values are added up and the total is sent to the aggregator.
    Sum,
    /// Values are averaged over time and sent as a data point.
    Gauge,
}

/// A single update submitted to a [`PacedMetricWorker`].
#[derive(Debug, Clone, PartialEq)]
pub struct PacedMetric {
    pub kind: PacedMetricKind,
    pub ident: Ident,
    pub value: f64,
}

/// Configuration for a [`PacedMetricWorker`].
#[derive(Debug, Clone)]
pub struct PacedMetricConfig {
    /// Interval between flushes of the accumulated state.
    pub flush_interval: Duration,
    /// Maximum number of updates waiting to be applied.
    pub queue_capacity: usize,
}

impl Default for PacedMetricConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            queue_capacity: 10_000,
        }
    }
}

#[derive(Debug)]
struct PacedSum {
    ident: Ident,
    sum: f64,
}

#[derive(Debug)]
struct PacedGauge {
    ident: Ident,
    pdp: ClockPdp,
}

/// Per-identity accumulators, keyed by the identity's canonical string.
///
/// Sums start over after every flush. Gauges live for as long as the worker
/// does; a flush only resets their averaging.
struct Accumulators {
    sums: HashMap<String, PacedSum>,
    gauges: HashMap<String, PacedGauge>,
    clock: Arc<dyn Clock>,
}

impl Accumulators {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sums: HashMap::new(),
            gauges: HashMap::new(),
            clock,
        }
    }

    fn apply(&mut self, metric: PacedMetric) {
        let key = metric.ident.to_string();
        match metric.kind {
            PacedMetricKind::Sum => {
                self.sums
                    .entry(key)
                    .or_insert_with(|| PacedSum {
                        ident: metric.ident,
                        sum: 0.0,
                    })
                    .sum += metric.value;
            }
            PacedMetricKind::Gauge => {
                let clock = &self.clock;
                self.gauges
                    .entry(key)
                    .or_insert_with(|| PacedGauge {
                        ident: metric.ident,
                        pdp: ClockPdp::new(clock.clone()),
                    })
                    .pdp
                    .add_value(metric.value);
            }
        }
    }

    fn flush(&mut self, acq: &dyn AggregatorCommandQueuer, dpq: &dyn DataPointQueuer) {
        for (_, sum) in std::mem::take(&mut self.sums) {
            acq.queue_aggregator_command(Command::add(sum.ident, sum.sum));
        }
        for gauge in self.gauges.values_mut() {
            let value = gauge.pdp.reset();
            if value.is_nan() {
                continue;
            }
            if let Some(end) = gauge.pdp.end_ms() {
                dpq.queue_data_point(gauge.ident.clone(), end, value);
            }
        }
    }
}

/// Coalesces bursts of metric updates and forwards them on a fixed cadence.
///
/// Updates arrive through a [`PacedMetricHandle`]. Every `flush_interval`
/// the accumulated sums are sent to the aggregator as add commands and each
/// gauge's time-weighted average is sent as a data point. Gauges that were
/// not updated since the previous flush are skipped.
///
/// The worker stops once every handle is dropped, after one final flush.
pub struct PacedMetricWorker {
    name: String,
    config: PacedMetricConfig,
    clock: Arc<dyn Clock>,
    acq: Arc<dyn AggregatorCommandQueuer>,
    dpq: Arc<dyn DataPointQueuer>,
}

impl PacedMetricWorker {
    pub fn new(
        name: impl Into<String>,
        config: PacedMetricConfig,
        acq: Arc<dyn AggregatorCommandQueuer>,
        dpq: Arc<dyn DataPointQueuer>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock: Arc::new(SystemClock),
            acq,
            dpq,
        }
    }

    /// Uses `clock` to time gauge updates.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawns the worker and returns the handle to feed it.
    pub fn start(self) -> (PacedMetricHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let jh = tokio::spawn(self.run(rx));
        (PacedMetricHandle { tx }, jh)
    }

    async fn run(self, mut rx: mpsc::Receiver<PacedMetric>) {
        let (flush_tx, mut flush_rx) = mpsc::channel(1);
        let stop_tok = CancellationToken::new();
        let signal_jh = tokio::spawn(periodic_flush_signal(
            flush_tx,
            self.config.flush_interval,
            self.name.clone(),
            stop_tok.clone(),
        ));

        let mut acc = Accumulators::new(self.clock.clone());
        tracing::info!("{}: started", self.name);

        loop {
            tokio::select! {
                Some(()) = flush_rx.recv() => {
                    acc.flush(self.acq.as_ref(), self.dpq.as_ref());
                }
                metric = rx.recv() => {
                    match metric {
                        Some(metric) => acc.apply(metric),
                        // All handles dropped
                        None => break,
                    }
                }
            }
        }

        tracing::info!("{}: input closed, final flush", self.name);
        acc.flush(self.acq.as_ref(), self.dpq.as_ref());

        stop_tok.cancel();
        if let Err(err) = signal_jh.await {
            tracing::warn!("{}: flush timer task failed: {}", self.name, err);
        }
    }
}

/// Posts a flush trigger every `period`. A trigger that finds the previous
/// one still pending is dropped.
async fn periodic_flush_signal(
    flush_tx: mpsc::Sender<()>,
    period: Duration,
    name: String,
    stop_tok: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match flush_tx.try_send(()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(())) => {
                        tracing::warn!("{name}: dropping flush timer on the floor - busy system?");
                    }
                    Err(TrySendError::Closed(())) => break,
                }
            }
            _ = stop_tok.cancelled() => {
                break;
            }
        }
    }
}

/// Submits updates to a running [`PacedMetricWorker`].
#[derive(Debug, Clone)]
pub struct PacedMetricHandle {
    tx: mpsc::Sender<PacedMetric>,
}

impl PacedMetricHandle {
    /// Queues an update, waiting for room if the queue is full.
    ///
    /// Fails with [`Error::Shutdown`] if the worker has exited.
    pub async fn send(&self, metric: PacedMetric) -> Result<()> {
        self.tx.send(metric).await.map_err(|_| Error::Shutdown)
    }

    pub async fn sum(&self, ident: Ident, value: f64) -> Result<()> {
        self.send(PacedMetric {
            kind: PacedMetricKind::Sum,
            ident,
            value,
        })
        .await
    }

    pub async fn gauge(&self, ident: Ident, value: f64) -> Result<()> {
        self.send(PacedMetric {
            kind: PacedMetricKind::Gauge,
            ident,
            value,
        })
        .await
    }
}
