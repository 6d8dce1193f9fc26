//! The fetch cycle: Fetching → Parsing → Staging → Committing.
//!
//! One cycle covers the span from the checkpoint (minus a configured
//! overlap) to "now", split into chunk-sized request windows. The
//! checkpoint advances to a chunk's end only after that chunk's batch
//! has committed, so a crash mid-cycle re-fetches the interrupted
//! window on the next run. The sink filters duplicate keys, which makes
//! the re-fetch harmless.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use argo_common::{ArgoError, FloatObservation, ObservationKey};
use storage::ObservationSink;

use crate::config::FetcherConfig;
use crate::erddap::ObservationSource;
use crate::state::{CycleOutcome, CycleRecord, IngestState};

/// Where the pipeline currently is, for the status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    Idle,
    Fetching,
    Parsing,
    Staging,
    Committing,
}

impl FetchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Staging => "staging",
            Self::Committing => "committing",
        }
    }
}

/// Totals for one completed pipeline run.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub fetched_rows: u64,
    pub inserted_rows: u64,
    pub unique_floats: u64,
}

/// Incremental, checkpointed loader from an observation source into the
/// observation store.
pub struct FetchPipeline {
    config: FetcherConfig,
    source: Arc<dyn ObservationSource>,
    sink: Arc<dyn ObservationSink>,
    state: Arc<IngestState>,
    phase_tx: watch::Sender<FetchPhase>,
}

impl FetchPipeline {
    pub fn new(
        config: FetcherConfig,
        source: Arc<dyn ObservationSource>,
        sink: Arc<dyn ObservationSink>,
        state: Arc<IngestState>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(FetchPhase::Idle);
        Self {
            config,
            source,
            sink,
            state,
            phase_tx,
        }
    }

    /// Subscribe to phase changes (used by the status server).
    pub fn phase(&self) -> watch::Receiver<FetchPhase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, phase: FetchPhase) {
        self.phase_tx.send_replace(phase);
    }

    /// Run one fetch cycle ending at `now`.
    ///
    /// The cycle's overall outcome is recorded in the state database;
    /// the checkpoint is advanced per committed chunk, never on
    /// failure.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let dataset = self.config.dataset_id.clone();
        let started_at = now;

        let checkpoint = self.state.checkpoint(&dataset).await?;
        let window_start = checkpoint
            .map(|c| c - Duration::hours(self.config.schedule.overlap_hours))
            .unwrap_or(self.config.default_start);
        let window_end = now;

        if window_start >= window_end {
            debug!(dataset = %dataset, "Checkpoint already at window end, nothing to fetch");
            return Ok(CycleReport {
                outcome: CycleOutcome::Empty,
                window_start,
                window_end,
                fetched_rows: 0,
                inserted_rows: 0,
                unique_floats: 0,
            });
        }

        info!(
            dataset = %dataset,
            start = %window_start,
            end = %window_end,
            "Starting fetch cycle"
        );

        let chunk = Duration::days(self.config.schedule.chunk_days);
        let mut fetched_rows = 0u64;
        let mut inserted_rows = 0u64;
        let mut floats: HashSet<i32> = HashSet::new();

        let mut chunk_start = window_start;
        while chunk_start < window_end {
            let chunk_end = std::cmp::min(chunk_start + chunk, window_end);

            self.set_phase(FetchPhase::Fetching);
            let raw = match self.source.fetch_window(chunk_start, chunk_end).await {
                Ok(rows) => rows,
                Err(e) => {
                    let outcome = failure_outcome(&e);
                    warn!(
                        dataset = %dataset,
                        start = %chunk_start,
                        end = %chunk_end,
                        error = %e,
                        outcome = ?outcome,
                        "Fetch failed, checkpoint not advanced"
                    );
                    let report = CycleReport {
                        outcome,
                        window_start,
                        window_end: chunk_end,
                        fetched_rows,
                        inserted_rows,
                        unique_floats: floats.len() as u64,
                    };
                    self.finish(&dataset, &report, started_at, Some(e.to_string()))
                        .await?;
                    return Ok(report);
                }
            };

            self.set_phase(FetchPhase::Parsing);
            fetched_rows += raw.len() as u64;
            let batch = dedup_batch(raw);
            for obs in &batch {
                floats.insert(obs.float_id);
            }

            self.set_phase(FetchPhase::Staging);
            // insert_batch stages and commits in one transaction; a
            // failure here leaves the checkpoint where it was.
            self.set_phase(FetchPhase::Committing);
            match self.sink.insert_batch(&batch).await {
                Ok(summary) => {
                    inserted_rows += summary.inserted;
                    self.state.advance_checkpoint(&dataset, chunk_end).await?;
                    debug!(
                        dataset = %dataset,
                        end = %chunk_end,
                        fetched = batch.len(),
                        inserted = summary.inserted,
                        "Chunk committed"
                    );
                }
                Err(e) => {
                    warn!(
                        dataset = %dataset,
                        start = %chunk_start,
                        end = %chunk_end,
                        error = %e,
                        "Commit failed, checkpoint not advanced"
                    );
                    let report = CycleReport {
                        outcome: CycleOutcome::Failed,
                        window_start,
                        window_end: chunk_end,
                        fetched_rows,
                        inserted_rows,
                        unique_floats: floats.len() as u64,
                    };
                    self.finish(&dataset, &report, started_at, Some(e.to_string()))
                        .await?;
                    return Ok(report);
                }
            }

            chunk_start = chunk_end;
        }

        let outcome = if inserted_rows > 0 {
            CycleOutcome::Committed
        } else {
            CycleOutcome::Empty
        };
        let report = CycleReport {
            outcome,
            window_start,
            window_end,
            fetched_rows,
            inserted_rows,
            unique_floats: floats.len() as u64,
        };

        info!(
            dataset = %dataset,
            fetched = report.fetched_rows,
            inserted = report.inserted_rows,
            floats = report.unique_floats,
            outcome = ?report.outcome,
            "Fetch cycle finished"
        );

        self.finish(&dataset, &report, started_at, None).await?;
        Ok(report)
    }

    async fn finish(
        &self,
        dataset: &str,
        report: &CycleReport,
        started_at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Result<()> {
        self.set_phase(FetchPhase::Idle);
        self.state
            .record_cycle(&CycleRecord {
                id: Uuid::new_v4(),
                dataset: dataset.to_string(),
                window_start: report.window_start,
                window_end: report.window_end,
                fetched_rows: report.fetched_rows,
                inserted_rows: report.inserted_rows,
                unique_floats: report.unique_floats,
                outcome: report.outcome,
                error_message,
                started_at,
                finished_at: Utc::now(),
            })
            .await
    }
}

/// Drop rows whose unique key already appeared earlier in the batch.
/// ERDDAP responses can repeat a level when a profile spans pages.
fn dedup_batch(rows: Vec<FloatObservation>) -> Vec<FloatObservation> {
    let mut seen: HashSet<ObservationKey> = HashSet::with_capacity(rows.len());
    let before = rows.len();
    let batch: Vec<FloatObservation> = rows
        .into_iter()
        .filter(|obs| seen.insert(obs.key()))
        .collect();
    if batch.len() < before {
        debug!(
            dropped = before - batch.len(),
            kept = batch.len(),
            "Dropped in-batch duplicates"
        );
    }
    batch
}

/// Network trouble is worth retrying on the next poll; anything else
/// (bad payload, broken config) is a hard failure.
fn failure_outcome(error: &ArgoError) -> CycleOutcome {
    match error {
        ArgoError::SourceError(_) | ArgoError::ServiceUnavailable(_) => CycleOutcome::RetryLater,
        _ => CycleOutcome::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use argo_common::ArgoResult;
    use storage::InsertSummary;

    use crate::config::{FetcherConfig, ScheduleConfig};

    fn obs(float_id: i32, day: u32, pressure: f64) -> FloatObservation {
        FloatObservation {
            float_id,
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 6, 0, 0).unwrap(),
            latitude: 12.5,
            longitude: 88.0,
            pressure,
            temperature: Some(28.4),
            salinity: Some(34.9),
            dissolved_oxygen: None,
            chlorophyll: None,
        }
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    /// Serves canned observations filtered by the requested window and
    /// records every window it was asked for.
    struct MockSource {
        data: Vec<FloatObservation>,
        requested: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
        fail_next: AtomicU32,
    }

    impl MockSource {
        fn new(data: Vec<FloatObservation>) -> Self {
            Self {
                data,
                requested: Mutex::new(Vec::new()),
                fail_next: AtomicU32::new(0),
            }
        }

        fn windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObservationSource for MockSource {
        async fn fetch_window(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> ArgoResult<Vec<FloatObservation>> {
            self.requested.lock().unwrap().push((start, end));
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(ArgoError::SourceError("connection reset".into()));
            }
            Ok(self
                .data
                .iter()
                .filter(|o| o.timestamp >= start && o.timestamp <= end)
                .cloned()
                .collect())
        }
    }

    /// In-memory sink keyed on the observation's unique key.
    struct MockSink {
        keys: Mutex<HashSet<ObservationKey>>,
        fail: AtomicBool,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                keys: Mutex::new(HashSet::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn len(&self) -> usize {
            self.keys.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObservationSink for MockSink {
        async fn insert_batch(
            &self,
            observations: &[FloatObservation],
        ) -> ArgoResult<InsertSummary> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ArgoError::DatabaseError("commit refused".into()));
            }
            let mut keys = self.keys.lock().unwrap();
            let mut inserted = 0u64;
            for obs in observations {
                if keys.insert(obs.key()) {
                    inserted += 1;
                }
            }
            Ok(InsertSummary {
                received: observations.len(),
                inserted,
            })
        }
    }

    fn test_config(start_day: u32) -> FetcherConfig {
        FetcherConfig {
            default_start: ts(start_day),
            schedule: ScheduleConfig {
                poll_interval_secs: 3600,
                chunk_days: 7,
                overlap_hours: 24,
            },
            ..FetcherConfig::default()
        }
    }

    async fn pipeline_with(
        config: FetcherConfig,
        source: Arc<MockSource>,
        sink: Arc<MockSink>,
    ) -> (FetchPipeline, Arc<IngestState>) {
        let state = Arc::new(IngestState::open_memory().await.unwrap());
        let pipeline = FetchPipeline::new(config, source, sink, state.clone());
        (pipeline, state)
    }

    #[tokio::test]
    async fn test_first_run_inserts_and_advances_checkpoint() {
        let source = Arc::new(MockSource::new(vec![
            obs(2902115, 2, 10.0),
            obs(2902115, 2, 20.0),
            obs(2902116, 3, 10.0),
        ]));
        let sink = Arc::new(MockSink::new());
        let (pipeline, state) = pipeline_with(test_config(1), source, sink.clone()).await;

        let report = pipeline.run_cycle(ts(5)).await.unwrap();

        assert_eq!(report.outcome, CycleOutcome::Committed);
        assert_eq!(report.fetched_rows, 3);
        assert_eq!(report.inserted_rows, 3);
        assert_eq!(report.unique_floats, 2);
        assert_eq!(sink.len(), 3);
        assert_eq!(
            state.checkpoint("argo-floats").await.unwrap(),
            Some(ts(5))
        );
    }

    #[tokio::test]
    async fn test_reingesting_committed_window_inserts_zero_rows() {
        let source = Arc::new(MockSource::new(vec![
            obs(2902115, 4, 10.0),
            obs(2902116, 4, 20.0),
        ]));
        let sink = Arc::new(MockSink::new());
        let (pipeline, _state) = pipeline_with(test_config(1), source, sink.clone()).await;

        let first = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(first.inserted_rows, 2);

        // The next cycle's overlap re-covers the committed rows; the
        // sink's key check filters every one of them.
        let second = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(second.fetched_rows, 2);
        assert_eq!(second.inserted_rows, 0);
        assert_eq!(second.outcome, CycleOutcome::Empty);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_checkpoint_for_refetch() {
        let source = Arc::new(MockSource::new(vec![obs(2902115, 2, 10.0)]));
        let sink = Arc::new(MockSink::new());
        sink.fail.store(true, Ordering::SeqCst);
        let (pipeline, state) = pipeline_with(test_config(1), source.clone(), sink.clone()).await;

        let report = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(report.outcome, CycleOutcome::Failed);
        assert!(state.checkpoint("argo-floats").await.unwrap().is_none());

        // Next run starts over from the same window.
        sink.fail.store(false, Ordering::SeqCst);
        let report = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(report.outcome, CycleOutcome::Committed);
        assert_eq!(report.inserted_rows, 1);

        let windows = source.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], windows[1]);
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_is_retry_later() {
        let source = Arc::new(MockSource::new(vec![obs(2902115, 2, 10.0)]));
        source.fail_next.store(1, Ordering::SeqCst);
        let sink = Arc::new(MockSink::new());
        let (pipeline, state) = pipeline_with(test_config(1), source, sink.clone()).await;

        let report = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(report.outcome, CycleOutcome::RetryLater);
        assert_eq!(sink.len(), 0);
        assert!(state.checkpoint("argo-floats").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_batch_duplicates_are_dropped_before_staging() {
        let source = Arc::new(MockSource::new(vec![
            obs(2902115, 2, 10.0),
            obs(2902115, 2, 10.0),
            obs(2902115, 2, 20.0),
        ]));
        let sink = Arc::new(MockSink::new());
        let (pipeline, _state) = pipeline_with(test_config(1), source, sink.clone()).await;

        let report = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(report.fetched_rows, 3);
        assert_eq!(report.inserted_rows, 2);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_window_still_advances_checkpoint() {
        let source = Arc::new(MockSource::new(Vec::new()));
        let sink = Arc::new(MockSink::new());
        let (pipeline, state) = pipeline_with(test_config(1), source, sink).await;

        let report = pipeline.run_cycle(ts(5)).await.unwrap();
        assert_eq!(report.outcome, CycleOutcome::Empty);
        // A verified zero-insert commit is still a commit; the next
        // cycle's overlap covers late arrivals.
        assert_eq!(
            state.checkpoint("argo-floats").await.unwrap(),
            Some(ts(5))
        );
    }

    #[tokio::test]
    async fn test_backfill_is_chunked() {
        let source = Arc::new(MockSource::new(vec![
            obs(2902115, 2, 10.0),
            obs(2902115, 20, 10.0),
        ]));
        let sink = Arc::new(MockSink::new());
        let (pipeline, _state) = pipeline_with(test_config(1), source.clone(), sink.clone()).await;

        // 21 days at 7-day chunks = 3 requests.
        let report = pipeline.run_cycle(ts(22)).await.unwrap();
        assert_eq!(source.windows().len(), 3);
        assert_eq!(report.inserted_rows, 2);
    }

    #[tokio::test]
    async fn test_cycles_are_recorded() {
        let source = Arc::new(MockSource::new(vec![obs(2902115, 2, 10.0)]));
        let sink = Arc::new(MockSink::new());
        let (pipeline, state) = pipeline_with(test_config(1), source, sink).await;

        pipeline.run_cycle(ts(5)).await.unwrap();

        let cycles = state.recent_cycles(10).await.unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].fetched_rows, 1);
        assert_eq!(cycles[0].outcome, CycleOutcome::Committed);
    }
}
