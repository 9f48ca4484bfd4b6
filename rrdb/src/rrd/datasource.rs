use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::archive::{RoundRobinArchive, RraSpec, SharedArchive};

/// Describes how to build a datasource: its primary step, heartbeat and
/// archives, finest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DsSpec {
    pub step: Duration,
    pub heartbeat: Duration,
    pub rras: Vec<RraSpec>,
}

impl Default for DsSpec {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(10),
            heartbeat: Duration::from_secs(2 * 3600),
            rras: vec![
                // 10s for a day, 1m for a week, 1h for a year
                RraSpec::new(Duration::from_secs(10), 8640),
                RraSpec::new(Duration::from_secs(60), 10080),
                RraSpec::new(Duration::from_secs(3600), 8760),
            ],
        }
    }
}

/// Top-level state of a datasource, written by
/// [`Flusher::flush_ds_states`](crate::Flusher::flush_ds_states).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DsState {
    /// Time of the last update in ms, `None` if never updated.
    pub last_update: Option<i64>,
    /// Value accumulated for the step in progress.
    pub value: f64,
    /// Time accumulated into `value`.
    pub duration: Duration,
}

impl Default for DsState {
    fn default() -> Self {
        Self {
            last_update: None,
            value: f64::NAN,
            duration: Duration::ZERO,
        }
    }
}

/// A time series datasource: top-level state plus its round-robin archives.
pub trait DataSourcer: Send + Sync + fmt::Debug {
    fn step(&self) -> Duration;
    fn heartbeat(&self) -> Duration;
    fn state(&self) -> DsState;
    /// Archives, in the order they were specified.
    fn rras(&self) -> &[SharedArchive];
    /// Returns an independent duplicate; later writes to either side are not
    /// visible to the other.
    fn copy(&self) -> Arc<dyn DataSourcer>;
}

#[derive(Debug)]
pub struct DataSource {
    step: Duration,
    heartbeat: Duration,
    state: RwLock<DsState>,
    rras: Vec<SharedArchive>,
}

impl DataSource {
    pub fn new(spec: &DsSpec) -> Self {
        let rras = spec
            .rras
            .iter()
            .map(|rra| Arc::new(RwLock::new(RoundRobinArchive::new(rra))))
            .collect();
        Self::with_parts(spec.step, spec.heartbeat, DsState::default(), rras)
    }

    /// Assembles a datasource from already-loaded parts.
    pub fn with_parts(
        step: Duration,
        heartbeat: Duration,
        state: DsState,
        rras: Vec<SharedArchive>,
    ) -> Self {
        Self {
            step,
            heartbeat,
            state: RwLock::new(state),
            rras,
        }
    }

    pub fn set_state(&self, state: DsState) {
        *self.state.write().expect("lock poisoned") = state;
    }
}

impl DataSourcer for DataSource {
    fn step(&self) -> Duration {
        self.step
    }

    fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    fn state(&self) -> DsState {
        *self.state.read().expect("lock poisoned")
    }

    fn rras(&self) -> &[SharedArchive] {
        &self.rras
    }

    fn copy(&self) -> Arc<dyn DataSourcer> {
        let rras = self
            .rras
            .iter()
            .map(|rra| {
                let rra = rra.read().expect("lock poisoned").clone();
                Arc::new(RwLock::new(rra))
            })
            .collect();
        Arc::new(DataSource::with_parts(
            self.step,
            self.heartbeat,
            self.state(),
            rras,
        ))
    }
}
