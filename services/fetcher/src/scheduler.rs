//! Polling scheduler driving the fetch pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::pipeline::{CycleReport, FetchPipeline};

/// Runs the pipeline once or on a fixed interval.
pub struct Scheduler {
    pipeline: Arc<FetchPipeline>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Arc<FetchPipeline>, poll_interval_secs: u64) -> Self {
        Self {
            pipeline,
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }

    /// Run a single fetch cycle.
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.pipeline.run_cycle(Utc::now()).await
    }

    /// Run continuously until a shutdown signal arrives.
    ///
    /// A failed cycle is logged and retried on the next tick; the
    /// checkpoint logic makes the retry safe.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        loop {
            match self.run_once().await {
                Ok(report) => {
                    info!(
                        outcome = ?report.outcome,
                        fetched = report.fetched_rows,
                        inserted = report.inserted_rows,
                        "Cycle complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Fetch cycle failed");
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        Ok(())
    }
}
