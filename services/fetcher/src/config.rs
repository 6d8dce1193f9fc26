//! Configuration for the observation fetcher.
//!
//! Loaded from a YAML file when present, with embedded defaults that
//! point at the public ERDDAP mirrors and the Indian Ocean study region.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

/// Root fetcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Dataset identifier, also the checkpoint key.
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,

    /// ERDDAP servers in failover order.
    #[serde(default = "default_servers")]
    pub servers: Vec<ServerConfig>,

    /// Geographic constraints sent with every query.
    #[serde(default)]
    pub region: RegionConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    /// Baseline timestamp for the initial backfill, RFC 3339.
    #[serde(default = "default_start_date")]
    pub default_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    /// Full tabledap endpoint including the `.json` suffix.
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegionConfig {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        // Indian Ocean (50°E-100°E, 20°S-25°N)
        Self {
            min_lat: -20.0,
            max_lat: 25.0,
            min_lon: 50.0,
            max_lon: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between fetch cycles in continuous mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Days per request window when backfilling a large range.
    #[serde(default = "default_chunk_days")]
    pub chunk_days: i64,

    /// Hours of overlap re-fetched before the checkpoint to catch
    /// late-arriving observations.
    #[serde(default = "default_overlap_hours")]
    pub overlap_hours: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            chunk_days: default_chunk_days(),
            overlap_hours: default_overlap_hours(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_secs: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            initial_retry_delay_secs: default_initial_retry_delay(),
            max_retry_delay_secs: default_max_retry_delay(),
        }
    }
}

fn default_dataset_id() -> String {
    "argo-floats".to_string()
}

fn default_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            name: "Ifremer".to_string(),
            base_url: "https://erddap.ifremer.fr/erddap/tabledap/ArgoFloats.json".to_string(),
        },
        ServerConfig {
            name: "NOAA PMEL".to_string(),
            base_url: "https://data.pmel.noaa.gov/pmel/erddap/tabledap/ARGO.json".to_string(),
        },
    ]
}

fn default_start_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn default_poll_interval() -> u64 {
    3600
}

fn default_chunk_days() -> i64 {
    7
}

fn default_overlap_hours() -> i64 {
    24
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_retry_delay() -> u64 {
    2
}

fn default_max_retry_delay() -> u64 {
    60
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            dataset_id: default_dataset_id(),
            servers: default_servers(),
            region: RegionConfig::default(),
            schedule: ScheduleConfig::default(),
            network: NetworkConfig::default(),
            default_start: default_start_date(),
        }
    }
}

impl FetcherConfig {
    /// Load configuration from a YAML file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Fetcher config not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FetcherConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(
            dataset = %config.dataset_id,
            servers = config.servers.len(),
            "Loaded fetcher configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_the_study_region() {
        let config = FetcherConfig::default();
        assert_eq!(config.region.min_lon, 50.0);
        assert_eq!(config.region.max_lat, 25.0);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.schedule.chunk_days, 7);
    }

    #[test]
    fn test_parse_yaml_overrides() {
        let yaml = r#"
dataset_id: argo-bgc
servers:
  - name: Local
    base_url: "http://localhost:8123/erddap/tabledap/Test.json"
region:
  min_lat: -5.0
  max_lat: 5.0
  min_lon: 60.0
  max_lon: 70.0
schedule:
  poll_interval_secs: 600
  chunk_days: 3
  overlap_hours: 12
"#;

        let config: FetcherConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.dataset_id, "argo-bgc");
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.schedule.chunk_days, 3);
        assert_eq!(config.schedule.overlap_hours, 12);
        // Unspecified sections keep defaults.
        assert_eq!(config.network.max_retries, 3);
        assert_eq!(config.default_start.format("%Y").to_string(), "2020");
    }
}
