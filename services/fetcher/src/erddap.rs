//! ERDDAP tabledap client with server failover and retry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use argo_common::{ArgoError, ArgoResult, FloatObservation};

use crate::config::{NetworkConfig, RegionConfig, ServerConfig};

/// Source of observations for the fetch pipeline.
///
/// The pipeline only sees this trait, so tests can drive it with canned
/// data instead of a live ERDDAP endpoint.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ArgoResult<Vec<FloatObservation>>;
}

/// HTTP client for ERDDAP tabledap JSON endpoints.
pub struct ErddapClient {
    client: Client,
    servers: Vec<ServerConfig>,
    region: RegionConfig,
    network: NetworkConfig,
}

impl ErddapClient {
    pub fn new(
        servers: Vec<ServerConfig>,
        region: RegionConfig,
        network: NetworkConfig,
    ) -> ArgoResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(network.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ArgoError::InternalError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            servers,
            region,
            network,
        })
    }

    /// Build the tabledap query string for one window.
    fn build_url(&self, base_url: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let start_str = start.format("%Y-%m-%dT%H:%M:%SZ");
        let end_str = end.format("%Y-%m-%dT%H:%M:%SZ");
        format!(
            "{base_url}?platform_number,time,latitude,longitude,pres,temp,psal\
             &time>={start_str}&time<={end_str}\
             &latitude>={min_lat}&latitude<={max_lat}\
             &longitude>={min_lon}&longitude<={max_lon}\
             &orderBy(%22time%22)",
            min_lat = self.region.min_lat,
            max_lat = self.region.max_lat,
            min_lon = self.region.min_lon,
            max_lon = self.region.max_lon,
        )
    }

    async fn fetch_from_server(
        &self,
        server: &ServerConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ArgoResult<Vec<FloatObservation>> {
        let url = self.build_url(&server.base_url, start, end);
        let mut delay = Duration::from_secs(self.network.initial_retry_delay_secs);
        let max_delay = Duration::from_secs(self.network.max_retry_delay_secs);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = self.client.get(&url).send().await;
            match result {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    // ERDDAP answers 404 for an empty selection.
                    debug!(server = %server.name, "No data in window");
                    return Ok(Vec::new());
                }
                Ok(response) if response.status().is_success() => {
                    let payload: ErddapResponse = response.json().await.map_err(|e| {
                        ArgoError::SourceParseError(format!(
                            "{}: invalid JSON payload: {}",
                            server.name, e
                        ))
                    })?;
                    return parse_table(&payload.table);
                }
                Ok(response) if response.status().is_server_error() => {
                    warn!(
                        server = %server.name,
                        status = %response.status(),
                        attempt = attempt,
                        "Server error from ERDDAP"
                    );
                }
                Ok(response) => {
                    return Err(ArgoError::SourceError(format!(
                        "{}: HTTP {}",
                        server.name,
                        response.status()
                    )));
                }
                Err(e) => {
                    warn!(
                        server = %server.name,
                        error = %e,
                        attempt = attempt,
                        "Request to ERDDAP failed"
                    );
                }
            }

            if attempt > self.network.max_retries {
                return Err(ArgoError::SourceError(format!(
                    "{}: gave up after {} attempts",
                    server.name, attempt
                )));
            }

            tokio::time::sleep(delay).await;
            delay = std::cmp::min(delay * 2, max_delay);
        }
    }
}

#[async_trait]
impl ObservationSource for ErddapClient {
    async fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ArgoResult<Vec<FloatObservation>> {
        let mut last_error = None;

        for server in &self.servers {
            info!(server = %server.name, start = %start, end = %end, "Requesting window");

            match self.fetch_from_server(server, start, end).await {
                Ok(observations) => {
                    info!(
                        server = %server.name,
                        rows = observations.len(),
                        "Window fetched"
                    );
                    return Ok(observations);
                }
                Err(e) => {
                    warn!(server = %server.name, error = %e, "Server failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ArgoError::SourceError("No ERDDAP servers configured".into())))
    }
}

/// Wire format of a tabledap `.json` response.
#[derive(Debug, Deserialize)]
struct ErddapResponse {
    table: ErddapTable,
}

#[derive(Debug, Deserialize)]
struct ErddapTable {
    #[serde(rename = "columnNames")]
    column_names: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Parse a tabledap table into observations.
///
/// Rows with no usable key (missing platform, time, position or
/// pressure) and rows carrying neither temperature nor salinity are
/// dropped.
fn parse_table(table: &ErddapTable) -> ArgoResult<Vec<FloatObservation>> {
    let index = |name: &str| table.column_names.iter().position(|c| c == name);

    let platform_idx = index("platform_number")
        .ok_or_else(|| ArgoError::SourceParseError("missing platform_number column".into()))?;
    let time_idx =
        index("time").ok_or_else(|| ArgoError::SourceParseError("missing time column".into()))?;
    let lat_idx = index("latitude")
        .ok_or_else(|| ArgoError::SourceParseError("missing latitude column".into()))?;
    let lon_idx = index("longitude")
        .ok_or_else(|| ArgoError::SourceParseError("missing longitude column".into()))?;
    let pres_idx =
        index("pres").ok_or_else(|| ArgoError::SourceParseError("missing pres column".into()))?;
    let temp_idx = index("temp");
    let psal_idx = index("psal");

    let mut observations = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for row in &table.rows {
        let float_id = match row.get(platform_idx).and_then(value_to_i32) {
            Some(id) => id,
            None => {
                dropped += 1;
                continue;
            }
        };
        let timestamp = match row.get(time_idx).and_then(value_to_timestamp) {
            Some(ts) => ts,
            None => {
                dropped += 1;
                continue;
            }
        };
        let (latitude, longitude, pressure) = match (
            row.get(lat_idx).and_then(value_to_f64),
            row.get(lon_idx).and_then(value_to_f64),
            row.get(pres_idx).and_then(value_to_f64),
        ) {
            (Some(lat), Some(lon), Some(pres)) => (lat, lon, pres),
            _ => {
                dropped += 1;
                continue;
            }
        };

        let observation = FloatObservation {
            float_id,
            timestamp,
            latitude,
            longitude,
            pressure,
            temperature: temp_idx.and_then(|i| row.get(i)).and_then(value_to_f64),
            salinity: psal_idx.and_then(|i| row.get(i)).and_then(value_to_f64),
            dissolved_oxygen: None,
            chlorophyll: None,
        };

        if observation.has_core_sensors() {
            observations.push(observation);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        debug!(dropped = dropped, kept = observations.len(), "Dropped unusable rows");
    }

    Ok(observations)
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn value_to_i32(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn value_to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_table(rows: Vec<Vec<Value>>) -> ErddapTable {
        ErddapTable {
            column_names: vec![
                "platform_number".to_string(),
                "time".to_string(),
                "latitude".to_string(),
                "longitude".to_string(),
                "pres".to_string(),
                "temp".to_string(),
                "psal".to_string(),
            ],
            rows,
        }
    }

    #[test]
    fn test_parse_numeric_and_string_platforms() {
        let table = sample_table(vec![
            vec![
                Value::from(2902115),
                Value::from("2024-03-01T06:00:00Z"),
                Value::from(12.5),
                Value::from(88.0),
                Value::from(10.0),
                Value::from(28.4),
                Value::from(34.9),
            ],
            vec![
                Value::from(" 2902116 "),
                Value::from("2024-03-01T07:00:00Z"),
                Value::from(13.0),
                Value::from(87.5),
                Value::from(20.0),
                Value::from(27.9),
                Value::Null,
            ],
        ]);

        let observations = parse_table(&table).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].float_id, 2902115);
        assert_eq!(observations[1].float_id, 2902116);
        assert_eq!(
            observations[0].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap()
        );
        assert_eq!(observations[1].salinity, None);
    }

    #[test]
    fn test_rows_without_core_sensors_are_dropped() {
        let table = sample_table(vec![vec![
            Value::from(2902115),
            Value::from("2024-03-01T06:00:00Z"),
            Value::from(12.5),
            Value::from(88.0),
            Value::from(10.0),
            Value::Null,
            Value::Null,
        ]]);

        assert!(parse_table(&table).unwrap().is_empty());
    }

    #[test]
    fn test_rows_without_key_fields_are_dropped() {
        let table = sample_table(vec![vec![
            Value::from(2902115),
            Value::from("2024-03-01T06:00:00Z"),
            Value::from(12.5),
            Value::from(88.0),
            Value::Null, // no pressure, no key
            Value::from(28.4),
            Value::from(34.9),
        ]]);

        assert!(parse_table(&table).unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let table = ErddapTable {
            column_names: vec!["time".to_string()],
            rows: vec![],
        };
        assert!(parse_table(&table).is_err());
    }

    #[test]
    fn test_build_url_carries_window_and_region() {
        let client = ErddapClient::new(
            vec![ServerConfig {
                name: "Test".to_string(),
                base_url: "http://example.com/erddap/tabledap/Argo.json".to_string(),
            }],
            RegionConfig::default(),
            NetworkConfig::default(),
        )
        .unwrap();

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let url = client.build_url("http://example.com/erddap/tabledap/Argo.json", start, end);

        assert!(url.contains("time>=2024-03-01T00:00:00Z"));
        assert!(url.contains("time<=2024-03-08T00:00:00Z"));
        assert!(url.contains("latitude>=-20"));
        assert!(url.contains("longitude<=100"));
        assert!(url.contains("orderBy(%22time%22)"));
    }
}
