pub mod clock;
pub mod util;

pub use clock::{Clock, MockClock, SystemClock};
pub use util::{DurationParseError, parse_duration, to_millis};
