//! Observation store backed by PostgreSQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::collections::BTreeMap;

use argo_common::{ArgoError, ArgoResult, Region, TimeWindow};
use nl_query::{BindValue, SqlQuery};

use crate::rows::row_to_json;

/// Database connection pool and canned observation queries.
pub struct ObservationStore {
    pool: PgPool,
}

impl ObservationStore {
    /// Create a new store connection from a database URL.
    pub async fn connect(database_url: &str) -> ArgoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests and the fetcher).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> ArgoResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| ArgoError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Cheap connectivity check.
    pub async fn ping(&self) -> ArgoResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    /// Min/max observation timestamps, or None for an empty table.
    pub async fn data_extent(&self) -> ArgoResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row: (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT MIN(timestamp), MAX(timestamp) FROM argo_data")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(match row {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    /// Distinct year → months present in the dataset, newest year first
    /// in iteration order reversed by the caller if needed.
    pub async fn available_periods(&self) -> ArgoResult<BTreeMap<i32, Vec<u32>>> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT DISTINCT EXTRACT(YEAR FROM timestamp)::INT AS yr, \
                             EXTRACT(MONTH FROM timestamp)::INT AS mo \
             FROM argo_data ORDER BY yr DESC, mo DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))?;

        let mut periods: BTreeMap<i32, Vec<u32>> = BTreeMap::new();
        for (year, month) in rows {
            periods.entry(year).or_default().push(month as u32);
        }
        for months in periods.values_mut() {
            months.sort_unstable();
            months.dedup();
        }

        Ok(periods)
    }

    /// Latest position per float ranked by great-circle distance from a
    /// point, optionally restricted to one calendar month.
    pub async fn nearest_floats(
        &self,
        lat: f64,
        lon: f64,
        limit: i64,
        period: Option<(i32, u32)>,
    ) -> ArgoResult<Vec<NearestFloat>> {
        let time_filter = match period {
            Some(_) => {
                "WHERE EXTRACT(YEAR FROM timestamp)::INT = $4 \
                 AND EXTRACT(MONTH FROM timestamp)::INT = $5"
            }
            None => "",
        };

        let sql = format!(
            "WITH base AS (\
               SELECT float_id, latitude, longitude, timestamp FROM argo_data {time_filter}\
             ), ranked_floats AS (\
               SELECT float_id, latitude, longitude, timestamp, \
                      (6371 * acos(cos(radians($1)) * cos(radians(latitude)) * \
                       cos(radians(longitude) - radians($2)) + \
                       sin(radians($1)) * sin(radians(latitude)))) AS distance_km, \
                      ROW_NUMBER() OVER (PARTITION BY float_id ORDER BY timestamp DESC) AS rn \
               FROM base\
             ) \
             SELECT float_id, latitude, longitude, timestamp, distance_km \
             FROM ranked_floats WHERE rn = 1 ORDER BY distance_km ASC LIMIT $3"
        );

        let mut query = sqlx::query_as::<_, NearestFloat>(&sql)
            .bind(lat)
            .bind(lon)
            .bind(limit);
        if let Some((year, month)) = period {
            query = query.bind(year).bind(month as i32);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))
    }

    /// The most recent vertical profile of one float, shallowest level
    /// first. Empty when the float has no data in the selected period.
    pub async fn float_profile(
        &self,
        float_id: i32,
        period: Option<(i32, u32)>,
    ) -> ArgoResult<Vec<ProfileLevel>> {
        let time_filter = match period {
            Some(_) => {
                "AND EXTRACT(YEAR FROM timestamp)::INT = $2 \
                 AND EXTRACT(MONTH FROM timestamp)::INT = $3"
            }
            None => "",
        };

        let sql = format!(
            "SELECT timestamp, pressure, temperature, salinity, chlorophyll, dissolved_oxygen \
             FROM argo_data WHERE float_id = $1 {time_filter} AND timestamp = (\
               SELECT MAX(timestamp) FROM argo_data WHERE float_id = $1 {time_filter}\
             ) ORDER BY pressure ASC"
        );

        let mut query = sqlx::query_as::<_, ProfileLevel>(&sql).bind(float_id);
        if let Some((year, month)) = period {
            query = query.bind(year).bind(month as i32);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))
    }

    /// A float's surfacing positions in time order.
    pub async fn float_trajectory(
        &self,
        float_id: i32,
        period: Option<(i32, u32)>,
    ) -> ArgoResult<Vec<TrajectoryPoint>> {
        let time_filter = match period {
            Some(_) => {
                "AND EXTRACT(YEAR FROM timestamp)::INT = $2 \
                 AND EXTRACT(MONTH FROM timestamp)::INT = $3"
            }
            None => "",
        };

        let sql = format!(
            "SELECT DISTINCT ON (timestamp) latitude, longitude, timestamp \
             FROM argo_data WHERE float_id = $1 {time_filter} ORDER BY timestamp ASC"
        );

        let mut query = sqlx::query_as::<_, TrajectoryPoint>(&sql).bind(float_id);
        if let Some((year, month)) = period {
            query = query.bind(year).bind(month as i32);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))
    }

    /// Floats (with a last-known position) matching optional region and
    /// time filters. Used to suggest ids when a question omits one.
    pub async fn distinct_floats(
        &self,
        region: Option<&Region>,
        window: Option<&TimeWindow>,
        limit: i64,
    ) -> ArgoResult<Vec<FloatSummary>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<BindValue> = Vec::new();

        if let Some(region) = region {
            binds.push(BindValue::Float(region.bbox.min_lat));
            binds.push(BindValue::Float(region.bbox.max_lat));
            binds.push(BindValue::Float(region.bbox.min_lon));
            binds.push(BindValue::Float(region.bbox.max_lon));
            clauses.push(format!(
                "latitude BETWEEN ${} AND ${} AND longitude BETWEEN ${} AND ${}",
                binds.len() - 3,
                binds.len() - 2,
                binds.len() - 1,
                binds.len()
            ));
        }
        if let Some(window) = window {
            binds.push(BindValue::Timestamp(window.start));
            binds.push(BindValue::Timestamp(window.end));
            clauses.push(format!(
                "timestamp >= ${} AND timestamp < ${}",
                binds.len() - 1,
                binds.len()
            ));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {} ", clauses.join(" AND "))
        };
        binds.push(BindValue::Int(limit));

        let sql = format!(
            "SELECT float_id, MAX(latitude) AS latitude, MAX(longitude) AS longitude, \
             MAX(timestamp) AS timestamp FROM argo_data {where_sql}\
             GROUP BY float_id ORDER BY float_id ASC LIMIT ${}",
            binds.len()
        );

        let mut query = sqlx::query_as::<_, FloatSummary>(&sql);
        for bind in &binds {
            query = match bind {
                BindValue::Int(v) => query.bind(*v),
                BindValue::Float(v) => query.bind(*v),
                BindValue::Text(v) => query.bind(v.clone()),
                BindValue::Timestamp(v) => query.bind(*v),
            };
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))
    }

    /// Execute a translator-generated statement and return rows as JSON
    /// objects keyed by column name.
    pub async fn run_query(
        &self,
        query: &SqlQuery,
    ) -> ArgoResult<Vec<serde_json::Map<String, serde_json::Value>>> {
        let mut q = sqlx::query(&query.sql);
        for bind in &query.binds {
            q = match bind {
                BindValue::Int(v) => q.bind(*v),
                BindValue::Float(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.clone()),
                BindValue::Timestamp(v) => q.bind(*v),
            };
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(rows.iter().map(row_to_json).collect())
    }
}

/// A float's latest position with distance from a query point.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NearestFloat {
    pub float_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub distance_km: f64,
}

/// One depth level of a vertical profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileLevel {
    pub timestamp: DateTime<Utc>,
    pub pressure: f64,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    pub chlorophyll: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
}

/// One position along a float's trajectory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrajectoryPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Last-known position of a float, for id suggestions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FloatSummary {
    pub float_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Database schema SQL.
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS argo_data (
    float_id INTEGER NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    pressure DOUBLE PRECISION NOT NULL,
    temperature DOUBLE PRECISION,
    salinity DOUBLE PRECISION,
    dissolved_oxygen DOUBLE PRECISION,
    chlorophyll DOUBLE PRECISION,
    ingested_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    UNIQUE (float_id, timestamp, pressure)
);

CREATE INDEX IF NOT EXISTS idx_argo_data_timestamp ON argo_data(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_argo_data_float_time ON argo_data(float_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_argo_data_position ON argo_data(latitude, longitude)
"#;
