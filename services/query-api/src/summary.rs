//! Derived result summaries.
//!
//! One short paragraph computed from the result rows themselves:
//! counts, value ranges, distances and time spans. Deterministic, so
//! the same question over the same data always reads the same.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use nl_query::{Aggregate, IntentCategory, Metric, QueryIntent};

type JsonRow = Map<String, Value>;

/// Summarize the rows produced for an intent.
pub fn summarize(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    if rows.is_empty() {
        return empty_summary(intent);
    }

    match intent.category {
        IntentCategory::Statistics => statistics_summary(intent, rows),
        IntentCategory::Proximity => proximity_summary(intent, rows),
        IntentCategory::Trajectory => trajectory_summary(intent, rows),
        IntentCategory::Profile => profile_summary(intent, rows),
        IntentCategory::TimeSeries => timeseries_summary(intent, rows),
        _ => listing_summary(intent, rows),
    }
}

fn empty_summary(intent: &QueryIntent) -> String {
    let mut scope = String::new();
    if let Some(region) = intent.region {
        scope.push_str(&format!(" in the {}", region.name));
    }
    if let Some(window) = &intent.window {
        scope.push_str(&format!(
            " between {} and {}",
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        ));
    }
    format!(
        "No observations matched your query{}. Try a wider region or time range.",
        scope
    )
}

fn statistics_summary(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let row = &rows[0];

    if intent.aggregate == Aggregate::Count {
        let count = row
            .get("float_count")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        return format!(
            "{} distinct floats reported observations{}.",
            count,
            scope_suffix(intent)
        );
    }

    let verb = match intent.aggregate {
        Aggregate::Avg => "Average",
        Aggregate::Min => "Minimum",
        Aggregate::Max => "Maximum",
        Aggregate::Count => unreachable!(),
    };

    let parts: Vec<String> = intent
        .effective_metrics()
        .iter()
        .filter_map(|metric| {
            row.get(metric.column())
                .and_then(Value::as_f64)
                .map(|v| format!("{} {}: {:.2} {}", verb, metric_label(metric), v, unit(metric)))
        })
        .collect();

    if parts.is_empty() {
        return format!("No measurements available{}.", scope_suffix(intent));
    }
    format!("{}{}.", parts.join(", "), scope_suffix(intent))
}

fn proximity_summary(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let distances = column_f64(rows, "distance_km");

    // One row per float: the CTE keeps only the latest sample of each.
    let mut text = format!("Found {} floats", rows.len());
    if let Some(radius) = intent.radius_km {
        text.push_str(&format!(" within {:.0} km", radius));
    }
    if let Some((lat, lon)) = intent.coordinates {
        text.push_str(&format!(" of ({:.2}, {:.2})", lat, lon));
    }
    if let (Some(min), Some(max)) = (min_of(&distances), max_of(&distances)) {
        text.push_str(&format!(
            "; the nearest is {:.1} km away, the farthest {:.1} km",
            min, max
        ));
    }
    text.push('.');
    text
}

fn trajectory_summary(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let lats = column_f64(rows, "latitude");
    let lons = column_f64(rows, "longitude");
    let id = intent
        .float_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut text = format!("Float {} reported {} positions", id, rows.len());
    if let Some((start, end)) = time_span(rows, "timestamp") {
        text.push_str(&format!(
            " between {} and {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }
    if let (Some(lat_min), Some(lat_max), Some(lon_min), Some(lon_max)) =
        (min_of(&lats), max_of(&lats), min_of(&lons), max_of(&lons))
    {
        text.push_str(&format!(
            ", drifting across {:.1} degrees of latitude and {:.1} degrees of longitude",
            lat_max - lat_min,
            lon_max - lon_min
        ));
    }
    text.push('.');
    text
}

fn profile_summary(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let pressures = column_f64(rows, "pressure");
    let temps = column_f64(rows, "temperature");
    let id = intent
        .float_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut text = format!("Latest profile of float {}: {} depth levels", id, rows.len());
    if let Some(max_pres) = max_of(&pressures) {
        text.push_str(&format!(" down to {:.0} dbar", max_pres));
    }
    if let Some((start, _)) = time_span(rows, "timestamp") {
        text.push_str(&format!(", measured {}", start.format("%Y-%m-%d %H:%M UTC")));
    }
    if let (Some(min), Some(max)) = (min_of(&temps), max_of(&temps)) {
        text.push_str(&format!(
            "; temperature ranges from {:.2} to {:.2} deg C",
            min, max
        ));
    }
    text.push('.');
    text
}

fn timeseries_summary(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let mut text = format!("{} daily averages", rows.len());
    if let Some((start, end)) = time_span(rows, "day") {
        text.push_str(&format!(
            " from {} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }
    text.push_str(&metric_ranges(intent, rows));
    text.push('.');
    text
}

fn listing_summary(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let floats = unique_floats(rows);

    let mut text = format!("{} observations from {} floats", rows.len(), floats);
    if let Some(region) = intent.region {
        text.push_str(&format!(" in the {}", region.name));
    }
    if let Some((start, end)) = time_span(rows, "timestamp") {
        text.push_str(&format!(
            " between {} and {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ));
    }
    text.push_str(&metric_ranges(intent, rows));
    text.push('.');
    text
}

/// "; temperature averages 28.43 deg C (27.10 to 29.60)" per selected
/// metric that actually has values.
fn metric_ranges(intent: &QueryIntent, rows: &[JsonRow]) -> String {
    let mut text = String::new();
    for metric in intent.effective_metrics() {
        let values = column_f64(rows, metric.column());
        if let (Some(min), Some(max), Some(avg)) =
            (min_of(&values), max_of(&values), avg_of(&values))
        {
            text.push_str(&format!(
                "; {} averages {:.2} {} ({:.2} to {:.2})",
                metric_label(&metric),
                avg,
                unit(&metric),
                min,
                max
            ));
        }
    }
    text
}

fn scope_suffix(intent: &QueryIntent) -> String {
    let mut scope = String::new();
    if let Some(region) = intent.region {
        scope.push_str(&format!(" in the {}", region.name));
    }
    if let Some(window) = &intent.window {
        scope.push_str(&format!(
            " between {} and {}",
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        ));
    }
    scope
}

fn metric_label(metric: &Metric) -> &'static str {
    match metric {
        Metric::Temperature => "temperature",
        Metric::Salinity => "salinity",
        Metric::DissolvedOxygen => "dissolved oxygen",
        Metric::Chlorophyll => "chlorophyll",
        Metric::Pressure => "pressure",
    }
}

fn unit(metric: &Metric) -> &'static str {
    match metric {
        Metric::Temperature => "deg C",
        Metric::Salinity => "PSU",
        Metric::DissolvedOxygen => "umol/kg",
        Metric::Chlorophyll => "mg/m3",
        Metric::Pressure => "dbar",
    }
}

fn column_f64(rows: &[JsonRow], name: &str) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| row.get(name).and_then(Value::as_f64))
        .filter(|v| v.is_finite())
        .collect()
}

fn unique_floats(rows: &[JsonRow]) -> usize {
    let mut ids: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.get("float_id").and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

fn time_span(rows: &[JsonRow], column: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut timestamps: Vec<DateTime<Utc>> = rows
        .iter()
        .filter_map(|row| row.get(column).and_then(Value::as_str))
        .filter_map(|s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
        .collect();
    timestamps.sort_unstable();
    Some((*timestamps.first()?, *timestamps.last()?))
}

fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn avg_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nl_query::classify;
    use serde_json::json;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
    }

    fn row(pairs: Value) -> JsonRow {
        pairs.as_object().unwrap().clone()
    }

    #[test]
    fn test_empty_result_mentions_scope() {
        let intent = classify("temperature in the bay of bengal in 2024", anchor());
        let text = summarize(&intent, &[]);
        assert!(text.contains("No observations matched"));
        assert!(text.contains("bay of bengal"));
        assert!(text.contains("2024-01-01"));
    }

    #[test]
    fn test_statistics_average() {
        let intent = classify("average temperature in the arabian sea", anchor());
        let rows = vec![row(json!({ "temperature": 27.834 }))];
        let text = summarize(&intent, &rows);
        assert!(text.contains("Average temperature: 27.83 deg C"));
        assert!(text.contains("arabian sea"));
    }

    #[test]
    fn test_statistics_count() {
        let intent = classify("how many floats in the red sea", anchor());
        let rows = vec![row(json!({ "float_count": 17 }))];
        let text = summarize(&intent, &rows);
        assert!(text.contains("17 distinct floats"));
    }

    #[test]
    fn test_proximity_reports_distance_range() {
        let intent = classify("nearest 3 floats to chennai", anchor());
        let rows = vec![
            row(json!({ "float_id": 2902115, "distance_km": 42.5 })),
            row(json!({ "float_id": 2902116, "distance_km": 180.0 })),
        ];
        let text = summarize(&intent, &rows);
        assert!(text.contains("2 floats"));
        assert!(text.contains("42.5 km"));
        assert!(text.contains("180.0 km"));
    }

    #[test]
    fn test_trajectory_reports_span() {
        let intent = classify("trajectory of float 2902115", anchor());
        let rows = vec![
            row(json!({
                "float_id": 2902115,
                "latitude": 10.0,
                "longitude": 85.0,
                "timestamp": "2024-03-01T06:00:00+00:00"
            })),
            row(json!({
                "float_id": 2902115,
                "latitude": 12.5,
                "longitude": 88.0,
                "timestamp": "2024-05-20T06:00:00+00:00"
            })),
        ];
        let text = summarize(&intent, &rows);
        assert!(text.contains("Float 2902115 reported 2 positions"));
        assert!(text.contains("2024-03-01"));
        assert!(text.contains("2024-05-20"));
    }

    #[test]
    fn test_profile_reports_depth() {
        let intent = classify("depth profile of float 2902115", anchor());
        let rows = vec![
            row(json!({
                "pressure": 10.0,
                "temperature": 28.9,
                "timestamp": "2024-05-20T06:00:00+00:00"
            })),
            row(json!({
                "pressure": 1500.0,
                "temperature": 4.2,
                "timestamp": "2024-05-20T06:00:00+00:00"
            })),
        ];
        let text = summarize(&intent, &rows);
        assert!(text.contains("2 depth levels"));
        assert!(text.contains("1500 dbar"));
        assert!(text.contains("4.20 to 28.90"));
    }

    #[test]
    fn test_listing_counts_floats_and_values() {
        let intent = classify("salinity near singapore", anchor());
        let rows = vec![
            row(json!({
                "float_id": 2902115,
                "salinity": 34.5,
                "timestamp": "2024-03-01T06:00:00+00:00"
            })),
            row(json!({
                "float_id": 2902116,
                "salinity": 35.1,
                "timestamp": "2024-03-02T06:00:00+00:00"
            })),
        ];
        let text = summarize(&intent, &rows);
        assert!(text.contains("2 observations from 2 floats"));
        assert!(text.contains("salinity averages 34.80 PSU"));
    }

    #[test]
    fn test_nan_values_are_ignored() {
        let intent = classify("temperature near tokyo", anchor());
        // NaN can't appear in JSON; nulls stand in for it and are skipped.
        let rows = vec![
            row(json!({ "float_id": 1, "temperature": null })),
            row(json!({ "float_id": 2, "temperature": 18.0 })),
        ];
        let text = summarize(&intent, &rows);
        assert!(text.contains("temperature averages 18.00"));
    }
}
