//! rrdb - round-robin time series ingestion and storage data path.
//!
//! rrdb stores each time series as a datasource holding a set of round-robin
//! archives: fixed-size circular buffers, one per resolution, that overwrite
//! their oldest slot as time moves on.
//!
//! # Architecture
//!
//! - **Receiver**: [`PacedMetricWorker`] coalesces bursts of sum and gauge
//!   updates per identity and forwards them on a fixed cadence to the
//!   aggregator and data point sinks.
//! - **SerDe**: the [`Fetcher`] and [`Flusher`] traits are the persistence
//!   boundary. [`MemSerDe`] is the in-memory reference backend and
//!   [`DsFlushBatch`] turns dirty datasources into segment-batched writes.
//! - **Series**: [`RraSeries`] reads an archive as a forward-only,
//!   optionally down-sampled sequence of `(time, value)` samples.
//!
//! # Example
//!
//! ```ignore
//! use rrdb::{DsSpec, Fetcher, Ident, MemSerDe, Series};
//!
//! #[tokio::main]
//! async fn main() -> rrdb::Result<()> {
//!     let serde = MemSerDe::new();
//!     let ds = serde
//!         .fetch_or_create_data_source(Ident::from([("name", "cpu")]), &DsSpec::default())
//!         .await?;
//!
//!     let mut series = serde.fetch_series(&ds, from_ms, to_ms, 100).await?;
//!     while series.next() {
//!         println!("{:?} {}", series.current_time(), series.current_value());
//!     }
//!     Ok(())
//! }
//! ```

// Internal modules
mod aggregator;
mod receiver;
mod rrd;
mod serde;
mod series;

// Public API modules
mod config;
pub(crate) mod error;
pub(crate) mod model;

// Public re-exports
pub use aggregator::{Command, CommandKind};
pub use config::{Config, DsSpecConfig, RraConfig, load_config};
pub use error::{Error, Result};
pub use model::{DataPoint, Ident};
pub use receiver::{
    AggregatorCommandQueuer, DataPointQueuer, DsFinder, PacedMetric, PacedMetricConfig,
    PacedMetricHandle, PacedMetricKind, PacedMetricWorker, SimpleDsFinder,
};
pub use rrd::{
    ArchiveAccess, ClockPdp, DataSource, DataSourcer, DsSpec, DsState, Pdp, RoundRobinArchive,
    RoundRobinArchiver, RraSpec, RraState, SharedArchive, slot_index,
};
pub use self::serde::{
    DEFAULT_SEGMENT_WIDTH, DbDataSource, DsFlushBatch, DsRecord, Fetcher, Flusher, MemSerDe,
    SearchQuery, SearchResult, SerDe, select_archive,
};
pub use series::{RraSeries, Samples, Series};
