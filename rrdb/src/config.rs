//! Configuration for the ingestion data path.

use std::path::Path;
use std::time::Duration;

use common::parse_duration;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::receiver::PacedMetricConfig;
use crate::rrd::{DsSpec, RraSpec};
use crate::serde::DEFAULT_SEGMENT_WIDTH;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between paced metric flushes.
    #[serde(default = "default_pace_interval_secs")]
    pub pace_interval_secs: u64,
    /// Updates a paced worker queues before producers wait.
    #[serde(default = "default_pace_queue_capacity")]
    pub pace_queue_capacity: usize,
    /// Datasources per storage segment.
    #[serde(default = "default_segment_width")]
    pub segment_width: i64,
    /// Shape of newly created datasources.
    #[serde(default)]
    pub ds_spec: DsSpecConfig,
}

fn default_pace_interval_secs() -> u64 {
    1
}

fn default_pace_queue_capacity() -> usize {
    10_000
}

fn default_segment_width() -> i64 {
    DEFAULT_SEGMENT_WIDTH
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pace_interval_secs: default_pace_interval_secs(),
            pace_queue_capacity: default_pace_queue_capacity(),
            segment_width: default_segment_width(),
            ds_spec: DsSpecConfig::default(),
        }
    }
}

impl Config {
    pub fn ds_spec(&self) -> Result<DsSpec> {
        self.ds_spec.to_spec()
    }

    pub fn paced_config(&self) -> PacedMetricConfig {
        PacedMetricConfig {
            flush_interval: Duration::from_secs(self.pace_interval_secs),
            queue_capacity: self.pace_queue_capacity,
        }
    }
}

/// Datasource spec with human-readable durations.
#[derive(Debug, Clone, Deserialize)]
pub struct DsSpecConfig {
    #[serde(default = "default_step")]
    pub step: String,
    #[serde(default = "default_heartbeat")]
    pub heartbeat: String,
    #[serde(default = "default_rras")]
    pub rras: Vec<RraConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RraConfig {
    pub step: String,
    pub size: i64,
}

fn default_step() -> String {
    "10s".to_string()
}

fn default_heartbeat() -> String {
    "2h".to_string()
}

fn default_rras() -> Vec<RraConfig> {
    [("10s", 8640), ("1m", 10080), ("1h", 8760)]
        .into_iter()
        .map(|(step, size)| RraConfig {
            step: step.to_string(),
            size,
        })
        .collect()
}

impl Default for DsSpecConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            heartbeat: default_heartbeat(),
            rras: default_rras(),
        }
    }
}

impl DsSpecConfig {
    pub fn to_spec(&self) -> Result<DsSpec> {
        let rras = self
            .rras
            .iter()
            .map(|rra| {
                if rra.size <= 0 {
                    return Err(Error::InvalidInput(format!(
                        "archive size must be positive, got {}",
                        rra.size
                    )));
                }
                Ok(RraSpec::new(parse_step(&rra.step)?, rra.size))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DsSpec {
            step: parse_step(&self.step)?,
            heartbeat: parse_duration(&self.heartbeat)?,
            rras,
        })
    }
}

/// Parses a step duration; steps are counted in whole milliseconds.
fn parse_step(s: &str) -> Result<Duration> {
    let step = parse_duration(s)?;
    if step < Duration::from_millis(1) {
        return Err(Error::InvalidInput(format!(
            "step must be at least 1ms, got '{}'",
            s
        )));
    }
    Ok(step)
}

/// Loads configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    serde_yaml::from_str(&contents)
        .map_err(|e| Error::InvalidInput(format!("Failed to parse config file: {}", e)))
}
