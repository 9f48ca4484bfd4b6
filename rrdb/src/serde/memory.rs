use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DbDataSource, Fetcher, Flusher, SearchQuery, SearchResult, select_archive};
use crate::error::{Error, Result};
use crate::model::Ident;
use crate::rrd::{ArchiveAccess, DataSource, DsSpec, DsState, RraState};
use crate::series::{RraSeries, Series};

/// Datasources per storage segment when none is configured.
pub const DEFAULT_SEGMENT_WIDTH: i64 = 200;

struct MemState {
    by_ident: HashMap<String, DbDataSource>,
    last_id: i64,
}

/// Rows written through the [`Flusher`] operations.
#[derive(Default)]
struct Tables {
    /// (rra_idx, seg, slot, idx) -> value
    data_points: HashMap<(usize, i64, i64, i64), f64>,
    /// (seg, idx) -> state
    ds_states: HashMap<(i64, i64), DsState>,
    /// (rra_idx, seg, idx) -> state
    rra_states: HashMap<(usize, i64, i64), RraState>,
}

/// A [`SerDe`](super::SerDe) that keeps everything in memory.
///
/// A single read/write lock guards the identity map and the id counter.
/// Lookups take it shared; find-or-create takes it exclusively, so an
/// identity is never registered twice.
///
/// Ids start at 1 and map to storage addresses as
/// `seg = (id - 1) / segment_width`, `idx = (id - 1) % segment_width`.
pub struct MemSerDe {
    state: RwLock<MemState>,
    segment_width: i64,
    tables: Mutex<Tables>,
}

impl Default for MemSerDe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemSerDe {
    pub fn new() -> Self {
        Self::with_segment_width(DEFAULT_SEGMENT_WIDTH)
    }

    pub fn with_segment_width(segment_width: i64) -> Self {
        Self {
            state: RwLock::new(MemState {
                by_ident: HashMap::new(),
                last_id: 0,
            }),
            segment_width: segment_width.max(1),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Storage address `(seg, idx)` for a datasource id.
    pub fn address(&self, id: i64) -> (i64, i64) {
        let n = (id - 1).max(0);
        (n / self.segment_width, n % self.segment_width)
    }

    pub fn data_point(&self, rra_idx: usize, seg: i64, slot: i64, idx: i64) -> Option<f64> {
        let tables = self.tables.lock().expect("lock poisoned");
        tables.data_points.get(&(rra_idx, seg, slot, idx)).copied()
    }

    pub fn ds_state(&self, seg: i64, idx: i64) -> Option<DsState> {
        let tables = self.tables.lock().expect("lock poisoned");
        tables.ds_states.get(&(seg, idx)).copied()
    }

    pub fn rra_state(&self, rra_idx: usize, seg: i64, idx: i64) -> Option<RraState> {
        let tables = self.tables.lock().expect("lock poisoned");
        tables.rra_states.get(&(rra_idx, seg, idx)).copied()
    }
}

struct MemSearchResult {
    rows: Vec<Ident>,
    pos: Option<usize>,
}

impl SearchResult for MemSearchResult {
    fn next(&mut self) -> bool {
        let pos = self.pos.map_or(0, |pos| pos + 1);
        self.pos = Some(pos.min(self.rows.len()));
        pos < self.rows.len()
    }

    fn ident(&self) -> Option<&Ident> {
        self.pos.and_then(|pos| self.rows.get(pos))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Fetcher for MemSerDe {
    /// Returns every known identity; the query is not applied.
    async fn search(&self, _query: SearchQuery) -> Result<Box<dyn SearchResult>> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state.by_ident.values().collect();
        rows.sort_by_key(|ds| ds.id());
        Ok(Box::new(MemSearchResult {
            rows: rows.into_iter().map(|ds| ds.ident().clone()).collect(),
            pos: None,
        }))
    }

    async fn fetch_data_sources(&self) -> Result<Vec<DbDataSource>> {
        let state = self.state.read().await;
        let mut result: Vec<_> = state.by_ident.values().cloned().collect();
        result.sort_by_key(|ds| ds.id());
        Ok(result)
    }

    async fn fetch_or_create_data_source(
        &self,
        ident: Ident,
        spec: &DsSpec,
    ) -> Result<DbDataSource> {
        let key = ident.to_string();
        let mut state = self.state.write().await;
        if let Some(ds) = state.by_ident.get(&key) {
            return Ok(ds.clone());
        }

        state.last_id += 1;
        let id = state.last_id;
        let (seg, idx) = self.address(id);
        let ds = DbDataSource::new(id, ident, seg, idx, Some(Arc::new(DataSource::new(spec))));
        state.by_ident.insert(key, ds.clone());
        tracing::debug!(id, seg, idx, ident = %ds.ident(), "created datasource");
        Ok(ds.with_created(true))
    }

    async fn fetch_series(
        &self,
        ds: &DbDataSource,
        from: i64,
        to: i64,
        max_points: i64,
    ) -> Result<Box<dyn Series>> {
        let rra = select_archive(ds.rras(), from).ok_or_else(|| {
            Error::InvalidInput(format!("datasource {} has no archives", ds.id()))
        })?;
        let mut series = RraSeries::new(ArchiveAccess::Locked(rra.clone()));
        series.set_time_range(from, Some(to));
        if max_points > 0 {
            series.set_max_points(max_points);
        }
        Ok(Box::new(series))
    }
}

#[async_trait]
impl Flusher for MemSerDe {
    async fn flush_data_points(
        &self,
        rra_idx: usize,
        seg: i64,
        slot: i64,
        dps: &HashMap<i64, f64>,
    ) -> Result<usize> {
        let mut tables = self.tables.lock().expect("lock poisoned");
        for (&idx, &value) in dps {
            tables.data_points.insert((rra_idx, seg, slot, idx), value);
        }
        Ok(dps.len())
    }

    async fn flush_ds_states(&self, seg: i64, states: &HashMap<i64, DsState>) -> Result<usize> {
        let mut tables = self.tables.lock().expect("lock poisoned");
        for (&idx, &state) in states {
            tables.ds_states.insert((seg, idx), state);
        }
        Ok(states.len())
    }

    async fn flush_rra_states(
        &self,
        rra_idx: usize,
        seg: i64,
        states: &HashMap<i64, RraState>,
    ) -> Result<usize> {
        let mut tables = self.tables.lock().expect("lock poisoned");
        for (&idx, &state) in states {
            tables.rra_states.insert((rra_idx, seg, idx), state);
        }
        Ok(states.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrd::RraSpec;
    use crate::serde::SerDe;
    use std::time::Duration;

    fn spec() -> DsSpec {
        DsSpec {
            step: Duration::from_secs(10),
            heartbeat: Duration::from_secs(7200),
            rras: vec![RraSpec::new(Duration::from_secs(10), 6)],
        }
    }

    #[tokio::test]
    async fn should_create_once_then_find() {
        // given
        let serde = MemSerDe::new();
        let ident = Ident::from([("name", "a")]);

        // when
        let created = serde
            .fetch_or_create_data_source(ident.clone(), &spec())
            .await
            .unwrap();
        let found = serde
            .fetch_or_create_data_source(ident, &spec())
            .await
            .unwrap();

        // then
        assert!(created.created());
        assert!(!found.created());
        assert_eq!(created.id(), 1);
        assert_eq!(found.id(), 1);
        assert_eq!(serde.fetch_data_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_treat_reordered_pairs_as_same_ident() {
        // given
        let serde = MemSerDe::new();
        let a = Ident::from([("name", "cpu"), ("host", "x")]);
        let b = Ident::from([("host", "x"), ("name", "cpu")]);

        // when
        let first = serde.fetch_or_create_data_source(a, &spec()).await.unwrap();
        let second = serde.fetch_or_create_data_source(b, &spec()).await.unwrap();

        // then
        assert_eq!(first.id(), second.id());
        assert!(!second.created());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_create_exactly_once_under_concurrent_callers() {
        // given
        let serde = Arc::new(MemSerDe::new());
        let ident = Ident::from([("name", "contended")]);

        // when
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let serde = serde.clone();
                let ident = ident.clone();
                tokio::spawn(async move {
                    serde
                        .fetch_or_create_data_source(ident, &spec())
                        .await
                        .unwrap()
                })
            })
            .collect();
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        // then
        assert_eq!(results.iter().filter(|ds| ds.created()).count(), 1);
        assert!(results.iter().all(|ds| ds.id() == 1));
        assert_eq!(serde.fetch_data_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_assign_segments_by_width() {
        // given
        let serde = MemSerDe::with_segment_width(2);

        // when
        let mut addresses = Vec::new();
        for name in ["a", "b", "c"] {
            let ds = serde
                .fetch_or_create_data_source(Ident::from([("name", name)]), &spec())
                .await
                .unwrap();
            addresses.push((ds.id(), ds.seg(), ds.idx()));
        }

        // then
        assert_eq!(addresses, vec![(1, 0, 0), (2, 0, 1), (3, 1, 0)]);
    }

    #[tokio::test]
    async fn should_search_all_identities() {
        // given
        let serde = MemSerDe::new();
        for name in ["a", "b"] {
            serde
                .fetch_or_create_data_source(Ident::from([("name", name)]), &spec())
                .await
                .unwrap();
        }

        // when
        let mut result = serde.search(SearchQuery::new()).await.unwrap();
        let mut names = Vec::new();
        while result.next() {
            names.push(result.ident().unwrap().name().unwrap().to_string());
        }

        // then
        assert_eq!(names, vec!["a", "b"]);
        assert!(!result.next());
        assert!(result.ident().is_none());
        assert!(result.close().is_ok());
    }

    #[tokio::test]
    async fn should_snapshot_data_sources() {
        // given
        let serde = MemSerDe::new();
        serde
            .fetch_or_create_data_source(Ident::from([("name", "a")]), &spec())
            .await
            .unwrap();
        let snapshot = serde.fetch_data_sources().await.unwrap();

        // when
        serde
            .fetch_or_create_data_source(Ident::from([("name", "b")]), &spec())
            .await
            .unwrap();

        // then
        assert_eq!(snapshot.len(), 1);
        assert_eq!(serde.fetch_data_sources().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_fetch_series_over_datasource_archive() {
        // given
        let serde = MemSerDe::new();
        let ds = serde
            .fetch_or_create_data_source(Ident::from([("name", "a")]), &spec())
            .await
            .unwrap();
        {
            let mut rra = ds.rras()[0].write().unwrap();
            rra.set_dp(50_000, 1.0);
            rra.set_dp(60_000, 2.0);
        }

        // when
        let mut series = serde.fetch_series(&ds, 50_000, 60_000, 0).await.unwrap();

        // then
        assert!(series.next());
        assert_eq!((series.current_time(), series.current_value()), (Some(50_000), 1.0));
        assert!(series.next());
        assert_eq!((series.current_time(), series.current_value()), (Some(60_000), 2.0));
        assert!(!series.next());
    }

    #[tokio::test]
    async fn should_propagate_max_points_to_series() {
        // given
        let serde = MemSerDe::new();
        let ds = serde
            .fetch_or_create_data_source(Ident::from([("name", "a")]), &spec())
            .await
            .unwrap();
        ds.rras()[0].write().unwrap().set_dp(60_000, 1.0);

        // when
        let series = serde.fetch_series(&ds, 0, 60_000, 3).await.unwrap();

        // then
        assert_eq!(series.max_points(), 3);
        assert_eq!(series.group_by(), Some(Duration::from_secs(20)));
        assert_eq!(series.time_range(), (Some(0), Some(60_000)));
    }

    #[tokio::test]
    async fn should_reject_series_without_archives() {
        // given
        let serde = MemSerDe::new();
        let ds = DbDataSource::new(1, Ident::from([("name", "a")]), 0, 0, None);

        // when
        let result = serde.fetch_series(&ds, 0, 10_000, 0).await;

        // then
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn should_record_flushed_rows() {
        // given
        let serde = MemSerDe::new();
        let flusher = serde.flusher();
        let state = DsState {
            last_update: Some(10_000),
            value: 1.5,
            duration: Duration::from_secs(10),
        };

        // when
        let dps = flusher
            .flush_data_points(1, 0, 4, &HashMap::from([(0, 1.0), (3, 2.0)]))
            .await
            .unwrap();
        let states = flusher
            .flush_ds_states(0, &HashMap::from([(3, state)]))
            .await
            .unwrap();

        // then
        assert_eq!((dps, states), (2, 1));
        assert_eq!(serde.data_point(1, 0, 4, 3), Some(2.0));
        assert_eq!(serde.data_point(0, 0, 4, 3), None);
        assert_eq!(serde.ds_state(0, 3), Some(state));
        assert_eq!(serde.rra_state(1, 0, 3), None);
    }
}
