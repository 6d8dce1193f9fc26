//! Structured query intent extracted from a question.

use argo_common::{Region, TimeWindow};
use serde::Serialize;

/// Sensor columns a question can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Salinity,
    DissolvedOxygen,
    Chlorophyll,
    Pressure,
}

impl Metric {
    /// Column name in the observations table.
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Salinity => "salinity",
            Metric::DissolvedOxygen => "dissolved_oxygen",
            Metric::Chlorophyll => "chlorophyll",
            Metric::Pressure => "pressure",
        }
    }

    pub fn all() -> &'static [Metric] {
        &[
            Metric::Temperature,
            Metric::Salinity,
            Metric::DissolvedOxygen,
            Metric::Chlorophyll,
            Metric::Pressure,
        ]
    }
}

/// Aggregation function for statistic questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Avg,
    Min,
    Max,
    Count,
}

impl Aggregate {
    pub fn sql_fn(&self) -> &'static str {
        match self {
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Count => "COUNT",
        }
    }
}

/// The category a question resolved to. One of these per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntentCategory {
    /// Temperature-only measurement listing.
    Temperature,
    /// Salinity-only measurement listing.
    Salinity,
    /// Temperature and salinity side by side.
    Comparison,
    /// Movement of one float over time.
    Trajectory,
    /// One float's latest vertical profile.
    Profile,
    /// Floats nearest a point, by latest position.
    Proximity,
    /// Daily-bucketed averages over a period.
    TimeSeries,
    /// A single aggregate number.
    Statistics,
    /// Catch-all listing of matching observations.
    General,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::Temperature => "Temperature",
            IntentCategory::Salinity => "Salinity",
            IntentCategory::Comparison => "Comparison",
            IntentCategory::Trajectory => "Trajectory",
            IntentCategory::Profile => "Profile",
            IntentCategory::Proximity => "Proximity",
            IntentCategory::TimeSeries => "Time-Series",
            IntentCategory::Statistics => "Statistic",
            IntentCategory::General => "General",
        }
    }
}

/// Everything the classifier extracted from one question.
#[derive(Debug, Clone)]
pub struct QueryIntent {
    pub category: IntentCategory,
    pub metrics: Vec<Metric>,
    pub region: Option<&'static Region>,
    pub window: Option<TimeWindow>,
    pub float_id: Option<i32>,
    pub aggregate: Aggregate,
    pub limit: Option<i64>,
    pub radius_km: Option<f64>,
    /// Search anchor as (lat, lon) for proximity questions.
    pub coordinates: Option<(f64, f64)>,
    /// Both temperature and salinity were asked for.
    pub comparison: bool,
    /// A place was named but is not in the region table.
    pub unknown_region: Option<String>,
    /// A four-digit year appeared in the question (for range checks).
    pub mentioned_year: Option<i32>,
}

impl QueryIntent {
    /// True when the question carried no recognizable signal at all.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
            && self.region.is_none()
            && self.window.is_none()
            && self.float_id.is_none()
            && self.coordinates.is_none()
    }

    /// Metrics to select, defaulting to temperature and salinity when
    /// the question named none.
    pub fn effective_metrics(&self) -> Vec<Metric> {
        if self.metrics.is_empty() {
            vec![Metric::Temperature, Metric::Salinity]
        } else {
            self.metrics.clone()
        }
    }
}
