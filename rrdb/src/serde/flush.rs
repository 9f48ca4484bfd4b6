use std::collections::{BTreeMap, HashMap};

use super::{DbDataSource, Flusher};
use crate::error::Result;
use crate::rrd::{DsState, RoundRobinArchiver, RraState};

/// Datasources waiting to be written, grouped by storage segment.
///
/// [`flush`](Self::flush) turns the batch into bulk [`Flusher`] calls: per
/// segment one datasource-state write, one archive-state write per archive
/// position, and one data-point write per (archive position, slot).
#[derive(Debug, Default)]
pub struct DsFlushBatch {
    by_seg: BTreeMap<i64, Vec<DbDataSource>>,
}

/// Rows for one archive position within a segment.
#[derive(Default)]
struct ArchiveRows {
    states: HashMap<i64, RraState>,
    /// slot -> idx -> value
    dps: BTreeMap<i64, HashMap<i64, f64>>,
}

#[derive(Default)]
struct SegmentRows {
    ds_states: HashMap<i64, DsState>,
    archives: Vec<ArchiveRows>,
}

impl DsFlushBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ds: DbDataSource) {
        self.by_seg.entry(ds.seg()).or_default().push(ds);
    }

    pub fn len(&self) -> usize {
        self.by_seg.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seg.is_empty()
    }

    /// Writes the batch and returns the total rows affected.
    ///
    /// Stops at the first failing write and returns its error.
    pub async fn flush(self, flusher: &dyn Flusher) -> Result<usize> {
        let mut total = 0;
        for (seg, members) in &self.by_seg {
            let seg = *seg;
            let rows = collect_segment(members);

            let mut seg_total = flusher.flush_ds_states(seg, &rows.ds_states).await?;
            for (rra_idx, archive) in rows.archives.iter().enumerate() {
                seg_total += flusher
                    .flush_rra_states(rra_idx, seg, &archive.states)
                    .await?;
                for (slot, dps) in &archive.dps {
                    seg_total += flusher.flush_data_points(rra_idx, seg, *slot, dps).await?;
                }
            }
            tracing::debug!(seg, datasources = members.len(), rows = seg_total, "flushed segment");
            total += seg_total;
        }
        Ok(total)
    }
}

impl Extend<DbDataSource> for DsFlushBatch {
    fn extend<I: IntoIterator<Item = DbDataSource>>(&mut self, iter: I) {
        for ds in iter {
            self.push(ds);
        }
    }
}

/// Snapshots the rows of one segment, holding each archive lock only while
/// it is read.
fn collect_segment(members: &[DbDataSource]) -> SegmentRows {
    let mut rows = SegmentRows::default();
    for ds in members {
        let Some(state) = ds.state() else {
            continue;
        };
        rows.ds_states.insert(ds.idx(), state);

        for (rra_idx, rra) in ds.rras().iter().enumerate() {
            if rows.archives.len() <= rra_idx {
                rows.archives.resize_with(rra_idx + 1, ArchiveRows::default);
            }
            let archive = &mut rows.archives[rra_idx];
            let rra = rra.read().expect("lock poisoned");
            archive.states.insert(ds.idx(), rra.state());
            for (&slot, &value) in rra.dps() {
                archive.dps.entry(slot).or_default().insert(ds.idx(), value);
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::Ident;
    use crate::rrd::{DataSource, DsSpec, RraSpec};
    use crate::serde::MemSerDe;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn ds(id: i64, seg: i64, idx: i64) -> DbDataSource {
        let spec = DsSpec {
            step: Duration::from_secs(10),
            heartbeat: Duration::from_secs(60),
            rras: vec![
                RraSpec::new(Duration::from_secs(10), 6),
                RraSpec::new(Duration::from_secs(60), 4),
            ],
        };
        let ident = Ident::from([("name", format!("ds{id}"))]);
        DbDataSource::new(id, ident, seg, idx, Some(Arc::new(DataSource::new(&spec))))
    }

    #[derive(Default)]
    struct RecordingFlusher {
        calls: Mutex<Vec<String>>,
        fail_rra_states: bool,
    }

    #[async_trait]
    impl Flusher for RecordingFlusher {
        async fn flush_data_points(
            &self,
            rra_idx: usize,
            seg: i64,
            slot: i64,
            dps: &HashMap<i64, f64>,
        ) -> Result<usize> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("dps {rra_idx} {seg} {slot} {}", dps.len()));
            Ok(dps.len())
        }

        async fn flush_ds_states(&self, seg: i64, states: &HashMap<i64, DsState>) -> Result<usize> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("ds {seg} {}", states.len()));
            Ok(states.len())
        }

        async fn flush_rra_states(
            &self,
            rra_idx: usize,
            seg: i64,
            states: &HashMap<i64, RraState>,
        ) -> Result<usize> {
            if self.fail_rra_states {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("rra {rra_idx} {seg} {}", states.len()));
            Ok(states.len())
        }
    }

    #[tokio::test]
    async fn should_group_writes_by_segment_and_slot() {
        // given
        let a = ds(1, 0, 0);
        let b = ds(2, 0, 1);
        let c = ds(3, 1, 0);
        a.rras()[0].write().unwrap().set_dp(10_000, 1.0);
        b.rras()[0].write().unwrap().set_dp(10_000, 2.0);
        b.rras()[0].write().unwrap().set_dp(20_000, 3.0);
        let mut batch = DsFlushBatch::new();
        batch.extend([a, b, c]);
        let flusher = RecordingFlusher::default();

        // when
        let rows = batch.flush(&flusher).await.unwrap();

        // then
        let calls = flusher.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "ds 0 2",
                "rra 0 0 2",
                "dps 0 0 1 2",
                "dps 0 0 2 1",
                "rra 1 0 2",
                "ds 1 1",
                "rra 0 1 1",
                "rra 1 1 1",
            ]
        );
        // 2 + 2 + 2 + 1 + 2 in segment 0, 1 + 1 + 1 in segment 1
        assert_eq!(rows, 12);
    }

    #[tokio::test]
    async fn should_return_first_failure() {
        // given
        let mut batch = DsFlushBatch::new();
        batch.push(ds(1, 0, 0));
        let flusher = RecordingFlusher {
            fail_rra_states: true,
            ..Default::default()
        };

        // when
        let result = batch.flush(&flusher).await;

        // then
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(flusher.calls.lock().unwrap().clone(), vec!["ds 0 1"]);
    }

    #[tokio::test]
    async fn should_flush_into_mem_serde() {
        // given
        let serde = MemSerDe::new();
        let a = ds(1, 0, 0);
        a.rras()[1].write().unwrap().set_dp(120_000, 4.0);
        let mut batch = DsFlushBatch::new();
        batch.push(a);

        // when
        batch.flush(&serde).await.unwrap();

        // then - 120s at 60s over 4 slots
        assert_eq!(serde.data_point(1, 0, 2, 0), Some(4.0));
        assert_eq!(serde.rra_state(1, 0, 0).unwrap().latest, Some(120_000));
        let state = serde.ds_state(0, 0).unwrap();
        assert_eq!(state.last_update, None);
        assert!(state.value.is_nan());
    }

    #[test]
    fn should_count_batched_datasources() {
        // given
        let mut batch = DsFlushBatch::new();
        assert!(batch.is_empty());

        // when
        batch.extend([ds(1, 0, 0), ds(2, 0, 1), ds(3, 1, 0)]);

        // then
        assert_eq!(batch.len(), 3);
    }
}
