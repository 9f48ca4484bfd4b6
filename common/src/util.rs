use std::time::{Duration, SystemTime};

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration '{input}': {reason}")]
pub struct DurationParseError {
    pub input: String,
    pub reason: String,
}

impl DurationParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a duration string such as "10s", "1m", "2h", "1d", "500ms" or a bare
/// number of seconds ("30", "1.5").
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let input = s;
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationParseError::new(input, "empty duration string"));
    }

    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());

    if num_end == 0 {
        return Err(DurationParseError::new(
            input,
            "duration must start with a number",
        ));
    }

    let value: f64 = s[..num_end]
        .parse()
        .map_err(|_| DurationParseError::new(input, "invalid duration number"))?;
    let unit = &s[num_end..];

    let multiplier = match unit {
        "ms" => 0.001,
        "s" | "" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        "d" => 86400.0,
        _ => {
            return Err(DurationParseError::new(
                input,
                format!("unknown duration unit '{}'", unit),
            ));
        }
    };

    Duration::try_from_secs_f64(value * multiplier)
        .map_err(|e| DurationParseError::new(input, e.to_string()))
}

/// Milliseconds since the UNIX epoch; times before the epoch are negative.
pub fn to_millis(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}
