//! Batch insertion of observations with duplicate filtering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use argo_common::{ArgoError, ArgoResult, FloatObservation};

use crate::store::ObservationStore;

/// Counts for one committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    /// Rows handed to the sink.
    pub received: usize,
    /// Rows actually written (duplicates filtered out).
    pub inserted: u64,
}

impl InsertSummary {
    pub fn merge(&mut self, other: InsertSummary) {
        self.received += other.received;
        self.inserted += other.inserted;
    }
}

/// Destination for fetched observations.
///
/// The fetch pipeline only depends on this trait, so its commit and
/// checkpoint behavior can be tested against an in-memory sink.
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Insert a batch, skipping rows whose `(float_id, timestamp,
    /// pressure)` key already exists. Must be atomic: either the whole
    /// batch commits or none of it does.
    async fn insert_batch(&self, observations: &[FloatObservation]) -> ArgoResult<InsertSummary>;
}

#[async_trait]
impl ObservationSink for ObservationStore {
    async fn insert_batch(&self, observations: &[FloatObservation]) -> ArgoResult<InsertSummary> {
        if observations.is_empty() {
            return Ok(InsertSummary::default());
        }

        let mut float_ids: Vec<i32> = Vec::with_capacity(observations.len());
        let mut timestamps: Vec<DateTime<Utc>> = Vec::with_capacity(observations.len());
        let mut latitudes: Vec<f64> = Vec::with_capacity(observations.len());
        let mut longitudes: Vec<f64> = Vec::with_capacity(observations.len());
        let mut pressures: Vec<f64> = Vec::with_capacity(observations.len());
        let mut temperatures: Vec<Option<f64>> = Vec::with_capacity(observations.len());
        let mut salinities: Vec<Option<f64>> = Vec::with_capacity(observations.len());
        let mut oxygens: Vec<Option<f64>> = Vec::with_capacity(observations.len());
        let mut chlorophylls: Vec<Option<f64>> = Vec::with_capacity(observations.len());

        for obs in observations {
            float_ids.push(obs.float_id);
            timestamps.push(obs.timestamp);
            latitudes.push(obs.latitude);
            longitudes.push(obs.longitude);
            pressures.push(obs.pressure);
            temperatures.push(obs.temperature);
            salinities.push(obs.salinity);
            oxygens.push(obs.dissolved_oxygen);
            chlorophylls.push(obs.chlorophyll);
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Begin failed: {}", e)))?;

        // Stage the batch, then insert only keys the table does not
        // already have. The temp table disappears with the transaction.
        sqlx::query(
            "CREATE TEMP TABLE argo_staging \
             (LIKE argo_data INCLUDING DEFAULTS) ON COMMIT DROP",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| ArgoError::DatabaseError(format!("Staging table failed: {}", e)))?;

        sqlx::query(
            "INSERT INTO argo_staging \
             (float_id, timestamp, latitude, longitude, pressure, \
              temperature, salinity, dissolved_oxygen, chlorophyll) \
             SELECT * FROM UNNEST(\
               $1::integer[], $2::timestamptz[], $3::double precision[], \
               $4::double precision[], $5::double precision[], $6::double precision[], \
               $7::double precision[], $8::double precision[], $9::double precision[])",
        )
        .bind(&float_ids)
        .bind(&timestamps)
        .bind(&latitudes)
        .bind(&longitudes)
        .bind(&pressures)
        .bind(&temperatures)
        .bind(&salinities)
        .bind(&oxygens)
        .bind(&chlorophylls)
        .execute(&mut *tx)
        .await
        .map_err(|e| ArgoError::DatabaseError(format!("Staging insert failed: {}", e)))?;

        let result = sqlx::query(
            "INSERT INTO argo_data \
             (float_id, timestamp, latitude, longitude, pressure, \
              temperature, salinity, dissolved_oxygen, chlorophyll) \
             SELECT DISTINCT ON (t.float_id, t.timestamp, t.pressure) \
                    t.float_id, t.timestamp, t.latitude, t.longitude, t.pressure, \
                    t.temperature, t.salinity, t.dissolved_oxygen, t.chlorophyll \
             FROM argo_staging t \
             WHERE NOT EXISTS (\
               SELECT 1 FROM argo_data a \
               WHERE a.float_id = t.float_id \
                 AND a.timestamp = t.timestamp \
                 AND a.pressure = t.pressure)",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| ArgoError::DatabaseError(format!("Insert failed: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| ArgoError::DatabaseError(format!("Commit failed: {}", e)))?;

        let summary = InsertSummary {
            received: observations.len(),
            inserted: result.rows_affected(),
        };

        debug!(
            received = summary.received,
            inserted = summary.inserted,
            "Committed observation batch"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_merge() {
        let mut total = InsertSummary::default();
        total.merge(InsertSummary {
            received: 100,
            inserted: 80,
        });
        total.merge(InsertSummary {
            received: 50,
            inserted: 0,
        });

        assert_eq!(total.received, 150);
        assert_eq!(total.inserted, 80);
    }
}
