use std::time::Duration;

use crate::error::Result;
use crate::rrd::{ArchiveAccess, RoundRobinArchiver, slot_index};

use super::Series;

/// A [`Series`] over a round-robin archive.
///
/// The archive's latest time, step and size are captured once at
/// construction. Each call to [`next`](Series::next) walks the cursor forward
/// one step per underlying slot, from `from` up to and including `to`. A
/// slot is only read when the cursor falls inside the archive's live range
/// `(latest - step * size, latest]`; outside it the sample is NaN but
/// iteration continues.
///
/// When grouping, each advance consumes `round(group_by / step)` slots and
/// yields the mean of the finite values among them (NaN if there are none).
///
/// # Concurrency
///
/// With [`ArchiveAccess::Locked`] the archive's read lock is held for one
/// slot lookup at a time, never across a whole advance, so writers are not
/// held up. A scan may therefore observe different write states across
/// samples.
pub struct RraSeries<A: RoundRobinArchiver> {
    rra: ArchiveAccess<A>,
    latest: Option<i64>,
    step: Duration,
    size: i64,
    pos: Option<i64>,
    tim: Option<i64>,
    exhausted: bool,
    alias: String,
    from: Option<i64>,
    to: Option<i64>,
    group_by: Option<Duration>,
    derived_group_by: Option<Duration>,
    max_points: i64,
    grp_val: f64,
}

impl<A: RoundRobinArchiver> RraSeries<A> {
    /// Creates a series over `rra`.
    ///
    /// For an [`ArchiveAccess::Unlocked`] archive the caller must keep writers
    /// out while this runs so that latest, step and size are consistent.
    pub fn new(rra: ArchiveAccess<A>) -> Self {
        let (latest, step, size) = rra.shape();
        Self {
            rra,
            latest,
            step,
            size,
            pos: None,
            tim: None,
            exhausted: false,
            alias: String::new(),
            from: None,
            to: None,
            group_by: None,
            derived_group_by: None,
            max_points: 0,
            grp_val: f64::NAN,
        }
    }

    fn step_ms(&self) -> i64 {
        self.step.as_millis() as i64
    }

    fn span_ms(&self) -> i64 {
        self.step_ms() * self.size
    }

    /// Number of underlying slots folded into one output sample.
    fn moves(&self, group_by: Option<Duration>) -> usize {
        match group_by {
            Some(group_by) if self.step_ms() > 0 && group_by > self.step => {
                ((group_by.as_secs_f64() / self.step.as_secs_f64() + 0.5) as usize).max(1)
            }
            _ => 1,
        }
    }

    /// Grouping duration implied by the point budget over `[from, to]`.
    fn derive_group_by(&self, from: i64, to: i64, truncate: bool) -> Option<Duration> {
        if self.max_points <= 0 {
            return None;
        }
        let (from, to) = if truncate {
            (self.truncate(from), self.truncate(to))
        } else {
            (from, to)
        };
        let per_point = (to - from) / self.max_points;
        (per_point > 0).then(|| Duration::from_millis(per_point as u64))
    }

    fn truncate(&self, time: i64) -> i64 {
        let step_ms = self.step_ms();
        if step_ms <= 0 {
            return time;
        }
        time - time.rem_euclid(step_ms)
    }

    fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let (Some(from), Some(to)) = (self.from, self.to) else {
            return self.exhaust();
        };
        // Sub-millisecond steps cannot move the cursor.
        if to < from || self.step_ms() <= 0 {
            return self.exhaust();
        }

        let tim = match self.tim {
            None => from,
            Some(tim) if tim + self.step_ms() <= to => tim + self.step_ms(),
            Some(_) => return self.exhaust(),
        };
        self.tim = Some(tim);

        self.pos = match self.latest {
            Some(latest) if tim <= latest && tim > latest - self.span_ms() => {
                Some(slot_index(tim, self.step, self.size))
            }
            // Outside the live range: no value, but still a sample.
            _ => None,
        };
        true
    }

    fn exhaust(&mut self) -> bool {
        self.exhausted = true;
        self.tim = None;
        self.pos = None;
        false
    }

    fn cur_val(&self) -> f64 {
        self.pos
            .and_then(|pos| self.rra.dp(pos))
            .unwrap_or(f64::NAN)
    }
}

impl<A: RoundRobinArchiver> Series for RraSeries<A> {
    fn next(&mut self) -> bool {
        if self.from.is_none()
            && self.to.is_none()
            && let Some(latest) = self.latest
        {
            self.from = Some(latest - self.span_ms());
            self.to = Some(latest);
        }

        if self.group_by.is_none()
            && self.derived_group_by.is_none()
            && let (Some(from), Some(to)) = (self.from, self.to)
        {
            self.derived_group_by = self.derive_group_by(from, to, false);
        }

        let moves = self.moves(self.group_by());

        let (mut sum, mut cnt) = (0.0, 0usize);
        for _ in 0..moves {
            if !self.advance() {
                self.grp_val = f64::NAN;
                return false;
            }
            let val = self.cur_val();
            if val.is_finite() {
                sum += val;
                cnt += 1;
            }
        }
        self.grp_val = if cnt == 0 { f64::NAN } else { sum / cnt as f64 };
        true
    }

    fn current_value(&self) -> f64 {
        if self.group_by().is_some() || self.max_points > 0 {
            return self.grp_val;
        }
        self.cur_val()
    }

    fn current_time(&self) -> Option<i64> {
        self.tim
    }

    fn close(&mut self) -> Result<()> {
        self.pos = None;
        Ok(())
    }

    fn step(&self) -> Duration {
        self.step
    }

    fn group_by(&self) -> Option<Duration> {
        self.group_by.or(self.derived_group_by)
    }

    fn set_group_by(&mut self, group_by: Duration) {
        self.group_by = (!group_by.is_zero()).then_some(group_by);
    }

    fn time_range(&self) -> (Option<i64>, Option<i64>) {
        (self.from, self.to)
    }

    fn set_time_range(&mut self, from: i64, to: Option<i64>) {
        let to = to.or(self.latest);
        self.from = Some(from);
        self.to = to;
        self.derived_group_by = to.and_then(|to| self.derive_group_by(from, to, true));
    }

    fn latest(&self) -> Option<i64> {
        self.to.or(self.latest)
    }

    fn max_points(&self) -> i64 {
        self.max_points
    }

    fn set_max_points(&mut self, max_points: i64) {
        self.max_points = max_points;
        self.derived_group_by = match (self.from, self.to) {
            (Some(from), Some(to)) => self.derive_group_by(from, to, true),
            _ => None,
        };
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn set_alias(&mut self, alias: String) {
        self.alias = alias;
    }
}
