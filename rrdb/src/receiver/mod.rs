//! Ingestion-side plumbing between metric producers and the aggregator and
//! data point consumers.

mod dsfinder;
mod paced;

use tokio::sync::mpsc;

pub use dsfinder::{DsFinder, SimpleDsFinder};
pub use paced::{PacedMetric, PacedMetricConfig, PacedMetricHandle, PacedMetricKind, PacedMetricWorker};

use crate::aggregator::Command;
use crate::model::{DataPoint, Ident};

/// Sink for aggregator commands.
pub trait AggregatorCommandQueuer: Send + Sync {
    fn queue_aggregator_command(&self, cmd: Command);
}

/// Sink for raw data points.
pub trait DataPointQueuer: Send + Sync {
    fn queue_data_point(&self, ident: Ident, timestamp_ms: i64, value: f64);
}

impl AggregatorCommandQueuer for mpsc::UnboundedSender<Command> {
    fn queue_aggregator_command(&self, cmd: Command) {
        if let Err(err) = self.send(cmd) {
            tracing::warn!(ident = %err.0.ident, "aggregator queue closed, dropping command");
        }
    }
}

impl DataPointQueuer for mpsc::UnboundedSender<DataPoint> {
    fn queue_data_point(&self, ident: Ident, timestamp_ms: i64, value: f64) {
        let dp = DataPoint {
            ident,
            timestamp_ms,
            value,
        };
        if let Err(err) = self.send(dp) {
            tracing::warn!(ident = %err.0.ident, "data point queue closed, dropping point");
        }
    }
}
