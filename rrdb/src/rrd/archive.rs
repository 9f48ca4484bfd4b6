use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Shape of a round-robin archive: sampling interval and number of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RraSpec {
    pub step: Duration,
    pub size: i64,
}

impl RraSpec {
    pub fn new(step: Duration, size: i64) -> Self {
        Self { step, size }
    }
}

/// Persisted state of an archive, written by
/// [`Flusher::flush_rra_states`](crate::Flusher::flush_rra_states).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RraState {
    /// End of the most recent slot written, in ms.
    pub latest: Option<i64>,
    /// Partially consolidated value for the slot in progress.
    pub value: f64,
    /// Time accumulated into `value`.
    pub duration: Duration,
}

/// Read capability over a fixed-size circular buffer of values.
///
/// Slots are addressed with [`slot_index`]. Values exist only for slots that
/// have been written; a missing slot reads as "no data".
pub trait RoundRobinArchiver: Send + Sync {
    /// End of the most recent slot written, in ms, or `None` if never written.
    fn latest(&self) -> Option<i64>;
    fn step(&self) -> Duration;
    fn size(&self) -> i64;
    /// Values keyed by slot index.
    fn dps(&self) -> &HashMap<i64, f64>;
}

/// Maps a slot end time to its position in an archive of `size` slots.
pub fn slot_index(time_ms: i64, step: Duration, size: i64) -> i64 {
    let step_ms = (step.as_millis() as i64).max(1);
    time_ms.div_euclid(step_ms).rem_euclid(size.max(1))
}

/// In-memory round-robin archive.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRobinArchive {
    step: Duration,
    size: i64,
    latest: Option<i64>,
    dps: HashMap<i64, f64>,
    value: f64,
    duration: Duration,
}

impl RoundRobinArchive {
    pub fn new(spec: &RraSpec) -> Self {
        Self {
            step: spec.step,
            size: spec.size,
            latest: None,
            dps: HashMap::new(),
            value: f64::NAN,
            duration: Duration::ZERO,
        }
    }

    pub fn spec(&self) -> RraSpec {
        RraSpec::new(self.step, self.size)
    }

    /// Stores `value` in the slot ending at `end_ms`.
    ///
    /// `latest` only moves forward; writing an older slot overwrites it in
    /// place without rewinding the archive.
    pub fn set_dp(&mut self, end_ms: i64, value: f64) {
        let slot = slot_index(end_ms, self.step, self.size);
        self.dps.insert(slot, value);
        if self.latest.is_none_or(|latest| end_ms > latest) {
            self.latest = Some(end_ms);
        }
    }

    /// Records the consolidation state of the slot in progress.
    pub fn set_pending(&mut self, value: f64, duration: Duration) {
        self.value = value;
        self.duration = duration;
    }

    pub fn state(&self) -> RraState {
        RraState {
            latest: self.latest,
            value: self.value,
            duration: self.duration,
        }
    }
}

impl RoundRobinArchiver for RoundRobinArchive {
    fn latest(&self) -> Option<i64> {
        self.latest
    }

    fn step(&self) -> Duration {
        self.step
    }

    fn size(&self) -> i64 {
        self.size
    }

    fn dps(&self) -> &HashMap<i64, f64> {
        &self.dps
    }
}

/// An archive shared between writers and readers behind a read/write lock.
pub type SharedArchive = Arc<RwLock<RoundRobinArchive>>;

/// How a reader reaches an archive.
///
/// `Locked` archives may be written concurrently, so every value lookup takes
/// the read lock for the duration of that single lookup. `Unlocked` archives
/// are read directly; callers must keep writers away while reading.
pub enum ArchiveAccess<A: RoundRobinArchiver> {
    Locked(Arc<RwLock<A>>),
    Unlocked(Arc<A>),
}

impl<A: RoundRobinArchiver> ArchiveAccess<A> {
    /// Reads `(latest, step, size)` in one consistent view.
    pub(crate) fn shape(&self) -> (Option<i64>, Duration, i64) {
        match self {
            ArchiveAccess::Locked(lock) => {
                let rra = lock.read().expect("lock poisoned");
                (rra.latest(), rra.step(), rra.size())
            }
            ArchiveAccess::Unlocked(rra) => (rra.latest(), rra.step(), rra.size()),
        }
    }

    pub(crate) fn dp(&self, slot: i64) -> Option<f64> {
        match self {
            ArchiveAccess::Locked(lock) => lock
                .read()
                .expect("lock poisoned")
                .dps()
                .get(&slot)
                .copied(),
            ArchiveAccess::Unlocked(rra) => rra.dps().get(&slot).copied(),
        }
    }
}

impl<A: RoundRobinArchiver> Clone for ArchiveAccess<A> {
    fn clone(&self) -> Self {
        match self {
            ArchiveAccess::Locked(lock) => ArchiveAccess::Locked(lock.clone()),
            ArchiveAccess::Unlocked(rra) => ArchiveAccess::Unlocked(rra.clone()),
        }
    }
}
