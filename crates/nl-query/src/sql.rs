//! SQL generation from a classified intent.
//!
//! Every statement targets the `argo_data` table and carries its values
//! as `$n` bind parameters, never interpolated literals.

use argo_common::{Region, TimeWindow};
use chrono::{DateTime, Utc};

use crate::intent::{Aggregate, IntentCategory, Metric, QueryIntent};

/// A typed bind parameter for a generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// A generated statement plus its bind values, in `$n` order.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// Accumulates WHERE conditions and their bind parameters.
#[derive(Debug, Default)]
struct Filters {
    clauses: Vec<String>,
    binds: Vec<BindValue>,
}

impl Filters {
    fn bind(&mut self, value: BindValue) -> usize {
        self.binds.push(value);
        self.binds.len()
    }

    fn region(&mut self, region: &Region) {
        let min_lat = self.bind(BindValue::Float(region.bbox.min_lat));
        let max_lat = self.bind(BindValue::Float(region.bbox.max_lat));
        let min_lon = self.bind(BindValue::Float(region.bbox.min_lon));
        let max_lon = self.bind(BindValue::Float(region.bbox.max_lon));
        self.clauses.push(format!(
            "latitude BETWEEN ${min_lat} AND ${max_lat} AND longitude BETWEEN ${min_lon} AND ${max_lon}"
        ));
    }

    fn window(&mut self, window: &TimeWindow) {
        let start = self.bind(BindValue::Timestamp(window.start));
        let end = self.bind(BindValue::Timestamp(window.end));
        self.clauses
            .push(format!("timestamp >= ${start} AND timestamp < ${end}"));
    }

    fn and_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" AND {}", self.clauses.join(" AND "))
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

const BASE_COLUMNS: &str = "float_id, timestamp, latitude, longitude";
const ALL_COLUMNS: &str = "float_id, timestamp, latitude, longitude, pressure, \
                           temperature, salinity, dissolved_oxygen, chlorophyll";

/// Build the SQL statement for an intent.
///
/// Callers are expected to have routed intents that cannot produce SQL
/// (trajectory without a float id, proximity without coordinates)
/// elsewhere; those fall through to the general listing here rather
/// than panic.
pub fn build_sql(intent: &QueryIntent) -> SqlQuery {
    match intent.category {
        IntentCategory::Trajectory if intent.float_id.is_some() => build_trajectory(intent),
        IntentCategory::Profile if intent.float_id.is_some() => build_profile(intent),
        IntentCategory::Proximity if intent.coordinates.is_some() => build_proximity(intent),
        IntentCategory::TimeSeries => build_timeseries(intent),
        IntentCategory::Statistics => build_statistics(intent),
        IntentCategory::Temperature | IntentCategory::Salinity | IntentCategory::Comparison => {
            build_metric_listing(intent)
        }
        _ => build_general(intent),
    }
}

fn sensor_columns(intent: &QueryIntent) -> Vec<&'static str> {
    let metrics = if intent.metrics.is_empty() {
        Metric::all().to_vec()
    } else {
        intent.metrics.clone()
    };
    metrics.iter().map(Metric::column).collect()
}

fn build_trajectory(intent: &QueryIntent) -> SqlQuery {
    let mut filters = Filters::default();
    let id = filters.bind(BindValue::Int(intent.float_id.unwrap_or_default() as i64));
    if let Some(window) = &intent.window {
        filters.window(window);
    }

    let sensors = sensor_columns(intent).join(", ");
    let sql = format!(
        "SELECT {BASE_COLUMNS}, {sensors} FROM argo_data \
         WHERE float_id = ${id}{} ORDER BY timestamp ASC",
        filters.and_sql()
    );

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}

fn build_profile(intent: &QueryIntent) -> SqlQuery {
    let mut filters = Filters::default();
    let id = filters.bind(BindValue::Int(intent.float_id.unwrap_or_default() as i64));
    if let Some(window) = &intent.window {
        filters.window(window);
    }
    let extra = filters.and_sql();

    // Latest cycle only: the newest timestamp for the float within the
    // same filters, then the full vertical column ordered by pressure.
    let sql = format!(
        "SELECT {ALL_COLUMNS} FROM argo_data \
         WHERE float_id = ${id}{extra} \
         AND timestamp = (SELECT MAX(timestamp) FROM argo_data WHERE float_id = ${id}{extra}) \
         ORDER BY pressure ASC"
    );

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}

fn build_proximity(intent: &QueryIntent) -> SqlQuery {
    let (lat, lon) = intent.coordinates.unwrap_or_default();

    let mut filters = Filters::default();
    if let Some(window) = &intent.window {
        filters.window(window);
    }
    let cte_where = filters.where_sql();

    let metrics: Vec<&str> = intent
        .effective_metrics()
        .iter()
        .map(Metric::column)
        .collect();
    let projection = format!("{BASE_COLUMNS}, {}", metrics.join(", "));

    let lat_bind = filters.bind(BindValue::Float(lat));
    let lon_bind = filters.bind(BindValue::Float(lon));
    let radius_bind = filters.bind(BindValue::Float(
        intent.radius_km.unwrap_or(crate::classify::DEFAULT_RADIUS_KM),
    ));
    let limit_bind = filters.bind(BindValue::Int(
        intent.limit.unwrap_or(crate::classify::DEFAULT_PROXIMITY_LIMIT),
    ));

    // Great-circle distance in km from the anchor to each float's most
    // recent position.
    let distance = format!(
        "(6371 * acos(cos(radians(${lat_bind})) * cos(radians(latitude)) * \
         cos(radians(longitude) - radians(${lon_bind})) + \
         sin(radians(${lat_bind})) * sin(radians(latitude))))"
    );

    let sql = format!(
        "WITH ranked_samples AS (\
           SELECT {projection}, \
                  ROW_NUMBER() OVER (PARTITION BY float_id ORDER BY timestamp DESC) AS ts_rank \
           FROM argo_data{cte_where}\
         ), latest_samples AS (\
           SELECT {projection} FROM ranked_samples WHERE ts_rank = 1\
         ), distances AS (\
           SELECT {projection}, {distance} AS distance_km FROM latest_samples\
         ) \
         SELECT {projection}, distance_km FROM distances \
         WHERE distance_km <= ${radius_bind} \
         ORDER BY distance_km ASC LIMIT ${limit_bind}"
    );

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}

fn build_timeseries(intent: &QueryIntent) -> SqlQuery {
    let mut filters = Filters::default();
    if let Some(region) = intent.region {
        filters.region(region);
    }
    if let Some(window) = &intent.window {
        filters.window(window);
    }

    let aggregates: Vec<String> = intent
        .effective_metrics()
        .iter()
        .map(|m| {
            let col = m.column();
            format!("AVG(NULLIF({col}, 'NaN')) AS {col}")
        })
        .collect();

    let sql = format!(
        "SELECT DATE_TRUNC('day', timestamp) AS day, \
         AVG(latitude) AS latitude, AVG(longitude) AS longitude, {} \
         FROM argo_data{} GROUP BY day ORDER BY day ASC",
        aggregates.join(", "),
        filters.where_sql()
    );

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}

fn build_statistics(intent: &QueryIntent) -> SqlQuery {
    let mut filters = Filters::default();
    if let Some(region) = intent.region {
        filters.region(region);
    }
    if let Some(window) = &intent.window {
        filters.window(window);
    }

    let sql = if intent.aggregate == Aggregate::Count {
        format!(
            "SELECT COUNT(DISTINCT float_id) AS float_count FROM argo_data{}",
            filters.where_sql()
        )
    } else {
        let agg = intent.aggregate.sql_fn();
        let exprs: Vec<String> = intent
            .effective_metrics()
            .iter()
            .map(|m| {
                let col = m.column();
                format!("{agg}(NULLIF({col}, 'NaN')) AS {col}")
            })
            .collect();
        format!(
            "SELECT {} FROM argo_data{}",
            exprs.join(", "),
            filters.where_sql()
        )
    };

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}

fn build_metric_listing(intent: &QueryIntent) -> SqlQuery {
    let mut filters = Filters::default();
    if let Some(region) = intent.region {
        filters.region(region);
    }
    if let Some(window) = &intent.window {
        filters.window(window);
    }

    let metrics: Vec<&str> = intent
        .effective_metrics()
        .iter()
        .map(Metric::column)
        .collect();
    for col in &metrics {
        filters.clauses.push(format!("{col} IS NOT NULL"));
    }

    let sql = format!(
        "SELECT {BASE_COLUMNS}, pressure, {} FROM argo_data{} \
         ORDER BY timestamp DESC LIMIT 500",
        metrics.join(", "),
        filters.where_sql()
    );

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}

fn build_general(intent: &QueryIntent) -> SqlQuery {
    let mut filters = Filters::default();
    if let Some(region) = intent.region {
        filters.region(region);
    }
    if let Some(window) = &intent.window {
        filters.window(window);
    }

    let sql = format!(
        "SELECT {ALL_COLUMNS} FROM argo_data{} ORDER BY timestamp DESC LIMIT 500",
        filters.where_sql()
    );

    SqlQuery {
        sql,
        binds: filters.binds,
    }
}
