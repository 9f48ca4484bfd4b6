//! Query-time views over stored data.
//!
//! A [`Series`] is a forward-only cursor over `(time, value)` samples. It is
//! not restartable: once [`Series::next`] returns `false` it keeps returning
//! `false`, and a fresh series must be fetched to scan again.

mod rra;

use std::time::Duration;

pub use rra::RraSeries;

use crate::error::Result;

/// A forward-only, optionally down-sampled sequence of values.
///
/// Values may be NaN, meaning "no data" for that sample. Consumers must treat
/// NaN as missing, never as zero.
pub trait Series: Send {
    /// Advances to the next sample. Returns `false` once the window is
    /// exhausted.
    fn next(&mut self) -> bool;

    /// Value of the current sample; the group mean when grouping.
    fn current_value(&self) -> f64;

    /// Time of the current sample in ms, `None` before the first advance.
    fn current_time(&self) -> Option<i64>;

    fn close(&mut self) -> Result<()>;

    /// Sampling interval of the underlying data.
    fn step(&self) -> Duration;

    /// Effective grouping duration: the one set explicitly, else the one
    /// derived from the point budget.
    fn group_by(&self) -> Option<Duration>;

    /// Sets an explicit grouping duration; it takes precedence over any
    /// point budget. A zero duration clears it.
    fn set_group_by(&mut self, group_by: Duration);

    /// The query window `(from, to)` in ms.
    fn time_range(&self) -> (Option<i64>, Option<i64>);

    /// Sets the query window. A missing `to` means "up to the latest data".
    fn set_time_range(&mut self, from: i64, to: Option<i64>);

    /// End of the query window if set, else the latest data time.
    fn latest(&self) -> Option<i64>;

    fn max_points(&self) -> i64;

    /// Sets the point budget. Non-positive values disable it.
    fn set_max_points(&mut self, max_points: i64);

    fn alias(&self) -> &str;

    fn set_alias(&mut self, alias: String);

    /// Iterates the remaining samples as `(time_ms, value)` pairs.
    fn samples(&mut self) -> Samples<'_>
    where
        Self: Sized,
    {
        Samples::new(self)
    }
}

/// Iterator adapter over a [`Series`].
pub struct Samples<'a> {
    series: &'a mut (dyn Series + 'a),
}

impl<'a> Samples<'a> {
    pub fn new(series: &'a mut (dyn Series + 'a)) -> Self {
        Self { series }
    }
}

impl Iterator for Samples<'_> {
    type Item = (i64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if !Series::next(&mut *self.series) {
            return None;
        }
        let time = self.series.current_time()?;
        Some((time, self.series.current_value()))
    }
}
