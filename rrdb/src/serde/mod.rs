//! The persistence boundary.
//!
//! Storage backends plug in by implementing [`Fetcher`] and [`Flusher`]; any
//! type implementing both is a [`SerDe`]. [`MemSerDe`] is the in-memory
//! reference backend.

mod dbds;
mod flush;
mod memory;
mod record;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

pub use dbds::DbDataSource;
pub use flush::DsFlushBatch;
pub use memory::{DEFAULT_SEGMENT_WIDTH, MemSerDe};
pub use record::DsRecord;

use crate::error::Result;
use crate::model::Ident;
use crate::rrd::{ArchiveAccess, DsSpec, DsState, RraState, SharedArchive};
use crate::series::Series;

/// Filter for [`Fetcher::search`], as tag key to value.
pub type SearchQuery = BTreeMap<String, String>;

/// Cursor over the identities matched by a search.
///
/// Positioned before the first row; call [`next`](SearchResult::next) before
/// reading [`ident`](SearchResult::ident).
pub trait SearchResult: Send {
    fn next(&mut self) -> bool;
    fn ident(&self) -> Option<&Ident>;
    fn close(&mut self) -> Result<()>;
}

/// Read side of a storage backend.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn search(&self, query: SearchQuery) -> Result<Box<dyn SearchResult>>;

    /// Returns every known datasource. The list is a snapshot; records
    /// created afterwards are not in it.
    async fn fetch_data_sources(&self) -> Result<Vec<DbDataSource>>;

    /// Returns the datasource for `ident`, creating it from `spec` if it does
    /// not exist yet. At most one record is ever created per identity, even
    /// under concurrent callers; the one caller that created it sees
    /// [`DbDataSource::created`] set.
    async fn fetch_or_create_data_source(
        &self,
        ident: Ident,
        spec: &DsSpec,
    ) -> Result<DbDataSource>;

    /// Returns a series over one of `ds`'s archives for the window
    /// `[from, to]`, down-sampled to about `max_points` samples when
    /// `max_points > 0`.
    async fn fetch_series(
        &self,
        ds: &DbDataSource,
        from: i64,
        to: i64,
        max_points: i64,
    ) -> Result<Box<dyn Series>>;
}

/// Write side of a storage backend. Every operation is batched by segment
/// and returns the number of rows written.
#[async_trait]
pub trait Flusher: Send + Sync {
    /// Writes slot `slot` of archive position `rra_idx` for every datasource
    /// in segment `seg`. `dps` is keyed by in-segment index.
    async fn flush_data_points(
        &self,
        rra_idx: usize,
        seg: i64,
        slot: i64,
        dps: &HashMap<i64, f64>,
    ) -> Result<usize>;

    /// Writes top-level datasource state, keyed by in-segment index.
    async fn flush_ds_states(&self, seg: i64, states: &HashMap<i64, DsState>) -> Result<usize>;

    /// Writes archive state for archive position `rra_idx`, keyed by
    /// in-segment index.
    async fn flush_rra_states(
        &self,
        rra_idx: usize,
        seg: i64,
        states: &HashMap<i64, RraState>,
    ) -> Result<usize>;
}

/// A complete storage backend.
pub trait SerDe: Fetcher + Flusher {
    fn fetcher(&self) -> &dyn Fetcher;
    fn flusher(&self) -> &dyn Flusher;
}

impl<T: Fetcher + Flusher> SerDe for T {
    fn fetcher(&self) -> &dyn Fetcher {
        self
    }

    fn flusher(&self) -> &dyn Flusher {
        self
    }
}

/// Picks the archive to read for a window starting at `from`.
///
/// The finest archive whose live range `(latest - step * size, latest]`
/// reaches back to `from` wins. If none does, the archive spanning the most
/// time is used. Returns `None` only for an empty slice.
pub fn select_archive(rras: &[SharedArchive], from: i64) -> Option<&SharedArchive> {
    let shapes: Vec<_> = rras
        .iter()
        .map(|rra| ArchiveAccess::Locked(rra.clone()).shape())
        .collect();

    let covering = shapes
        .iter()
        .enumerate()
        .filter(|(_, (latest, step, size))| {
            let span = step.as_millis() as i64 * size;
            latest.is_some_and(|latest| from > latest - span)
        })
        .min_by_key(|(_, (_, step, _))| *step)
        .map(|(i, _)| i);

    let idx = covering.or_else(|| {
        shapes
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, (_, step, size))| step.as_millis() as i64 * size)
            .map(|(i, _)| i)
    })?;
    rras.get(idx)
}
