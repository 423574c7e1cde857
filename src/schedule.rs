use std::time::Duration;

use serde::de::{Deserializer, Visitor};
use serde::Deserialize;

use crate::error::{AppError, Result};

/// A time-boxed segment of the load schedule with a target virtual-user count.
#[derive(Debug, Clone, Deserialize)]
pub struct Stage {
    /// How long this stage lasts.
    #[serde(deserialize_with = "de_duration")]
    pub duration: Duration,
    /// Virtual-user count to converge on by the end of the stage.
    pub target: u32,
}

/// Ordered stages describing how many virtual users should be active over
/// time. Within a stage the count ramps linearly from the previous stage's
/// target (0 before the first stage) to the stage's own target.
#[derive(Debug, Clone)]
pub struct Schedule {
    stages: Vec<Stage>,
}

impl Schedule {
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(AppError::Config(
                "load.stages must contain at least one stage".to_string(),
            ));
        }
        Ok(Self { stages })
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Desired virtual-user count at `elapsed` time into the run.
    /// Past the end of the last stage, 0.
    pub fn vus_at(&self, elapsed: Duration) -> u32 {
        let mut start = Duration::ZERO;
        let mut prev = 0u32;

        for stage in &self.stages {
            let end = start + stage.duration;
            if elapsed < end {
                if stage.duration.is_zero() {
                    return stage.target;
                }
                let fraction =
                    (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                let vus =
                    prev as f64 + (stage.target as f64 - prev as f64) * fraction;
                return vus.round() as u32;
            }
            prev = stage.target;
            start = end;
        }

        0
    }
}

/// Parse a human-readable duration: `"300ms"`, `"30s"`, `"1m"`, `"2h"`,
/// or a bare integer meaning seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AppError::Config("duration must not be empty".to_string()));
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let idx = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(idx);
    let value: u64 = value
        .parse()
        .map_err(|_| AppError::Config(format!("invalid duration '{s}'")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(AppError::Config(format!(
            "unknown duration unit '{unit}' in '{s}'"
        ))),
    }
}

/// Serde deserializer for duration fields, accepting either a duration
/// string or a number of seconds.
pub(crate) fn de_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a duration like \"30s\" or \"1m\", or a number of seconds")
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Duration, E> {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<Duration, E> {
            if v < 0 {
                return Err(E::custom("duration must not be negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
