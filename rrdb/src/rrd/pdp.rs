use std::sync::Arc;
use std::time::Duration;

use common::Clock;

/// A primary data point: a value averaged over the time it was accumulated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pdp {
    value: f64,
    duration: Duration,
}

impl Default for Pdp {
    fn default() -> Self {
        Self {
            value: f64::NAN,
            duration: Duration::ZERO,
        }
    }
}

impl Pdp {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Folds `value`, observed over `duration`, into the running average.
    pub fn add_value(&mut self, value: f64, duration: Duration) {
        let total = self.duration + duration;
        if self.value.is_nan() || total.is_zero() {
            self.value = value;
        } else {
            let old = self.duration.as_secs_f64() / total.as_secs_f64();
            let new = duration.as_secs_f64() / total.as_secs_f64();
            self.value = self.value * old + value * new;
        }
        self.duration = total;
    }

    /// Returns the accumulated value and starts a new, empty interval.
    pub fn reset(&mut self) -> f64 {
        let value = self.value;
        *self = Self::default();
        value
    }
}

/// A [`Pdp`] that weights each value by the wall-clock time elapsed since the
/// previous one.
pub struct ClockPdp {
    pdp: Pdp,
    end: Option<i64>,
    clock: Arc<dyn Clock>,
}

impl ClockPdp {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            pdp: Pdp::default(),
            end: None,
            clock,
        }
    }

    pub fn add_value(&mut self, value: f64) {
        let now = self.clock.now_ms();
        let elapsed = match self.end {
            Some(end) if now > end => Duration::from_millis((now - end) as u64),
            _ => Duration::ZERO,
        };
        self.pdp.add_value(value, elapsed);
        self.end = Some(now);
    }

    /// Returns the averaged value (NaN if nothing was added since the last
    /// reset) and clears it. The end timestamp is kept.
    pub fn reset(&mut self) -> f64 {
        self.pdp.reset()
    }

    pub fn value(&self) -> f64 {
        self.pdp.value()
    }

    /// Time of the most recent value, in ms.
    pub fn end_ms(&self) -> Option<i64> {
        self.end
    }
}

impl std::fmt::Debug for ClockPdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockPdp")
            .field("pdp", &self.pdp)
            .field("end", &self.end)
            .finish()
    }
}
