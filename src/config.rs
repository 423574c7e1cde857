use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::schedule::{de_duration, Stage};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub load: LoadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Status code the per-iteration check asserts against.
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Opaque JSON payload sent with every request.
    #[serde(default = "default_body")]
    pub body: serde_json::Value,
    #[serde(default = "default_timeout", deserialize_with = "de_duration")]
    pub timeout: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            expected_status: default_expected_status(),
            body: default_body(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadConfig {
    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,
    /// How often the supervisor reconciles the active virtual-user count.
    #[serde(default = "default_tick", deserialize_with = "de_duration")]
    pub tick: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            tick: default_tick(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:8000/debug/pprof/".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_body() -> serde_json::Value {
    serde_json::json!({})
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_stages() -> Vec<Stage> {
    vec![
        Stage {
            duration: Duration::from_secs(60),
            target: 100,
        },
        Stage {
            duration: Duration::from_secs(180),
            target: 100,
        },
        Stage {
            duration: Duration::from_secs(60),
            target: 0,
        },
    ]
}

fn default_tick() -> Duration {
    Duration::from_millis(250)
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            // Try default paths
            builder = builder.add_source(
                config::File::with_name("rampart")
                    .required(false),
            );
        }

        // Environment variable overrides with RAMPART_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("RAMPART")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_schedule_and_target() {
        let config = LoadConfig::default();
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.stages[0].duration, Duration::from_secs(60));
        assert_eq!(config.stages[0].target, 100);
        assert_eq!(config.stages[1].duration, Duration::from_secs(180));
        assert_eq!(config.stages[1].target, 100);
        assert_eq!(config.stages[2].duration, Duration::from_secs(60));
        assert_eq!(config.stages[2].target, 0);

        let target = TargetConfig::default();
        assert_eq!(target.url, "http://localhost:8000/debug/pprof/");
        assert_eq!(target.expected_status, 200);
        assert_eq!(target.body, serde_json::json!({}));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[target]
url = "http://127.0.0.1:9999/x"
expected_status = 204
timeout = "5s"

[load]
tick = "100ms"
stages = [
  {{ duration = "30s", target = 10 }},
  {{ duration = "1m", target = 0 }},
]
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.target.url, "http://127.0.0.1:9999/x");
        assert_eq!(config.target.expected_status, 204);
        assert_eq!(config.target.timeout, Duration::from_secs(5));
        assert_eq!(config.load.tick, Duration::from_millis(100));
        assert_eq!(config.load.stages.len(), 2);
        assert_eq!(config.load.stages[0].duration, Duration::from_secs(30));
        assert_eq!(config.load.stages[1].target, 0);
    }

    #[test]
    fn test_invalid_duration_is_a_config_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[load]
stages = [{{ duration = "fast", target = 1 }}]
"#
        )
        .unwrap();

        assert!(AppConfig::load(Some(file.path().to_str().unwrap())).is_err());
    }
}
