//! Question-to-SQL translation for the ARGO observation database.
//!
//! Translation happens in two stages:
//!
//! 1. [`classify`] scans the question once for facts (float ids, region
//!    names, time phrases, sensor keywords, distances, coordinates) and
//!    runs them through an ordered rule table to pick one
//!    [`IntentCategory`]. First match wins, so priority between
//!    categories is a property of the table, not of scattered
//!    conditionals.
//! 2. [`build_sql`] maps the intent to a parameterized SQL statement
//!    with typed bind values.
//!
//! [`translate`] runs both stages and applies the guard rails: missing
//! float ids, unknown region names and out-of-range years come back as
//! structured outcomes rather than errors, and input the rules cannot
//! place yields a help outcome with example questions. Nothing in this
//! crate returns `Err` for unsupported input.

pub mod classify;
pub mod intent;
pub mod sql;

pub use classify::{classify, QuestionFacts};
pub use intent::{Aggregate, IntentCategory, Metric, QueryIntent};
pub use sql::{build_sql, BindValue, SqlQuery};

use chrono::{DateTime, Datelike, Utc};

/// Example questions offered when a question cannot be placed.
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "Show the trajectory of float 2902115",
    "Average temperature in the bay of bengal in 2024",
    "Nearest 5 floats to chennai",
    "Salinity trend in the arabian sea over the last 6 months",
    "Show the latest profile of float 2902115",
    "Compare temperature and salinity near the equator",
];

/// Context the translator resolves relative dates against.
#[derive(Debug, Clone, Copy)]
pub struct TranslationContext {
    /// "Now" for phrases like "this month".
    pub reference_time: DateTime<Utc>,
    /// Most recent observation in the store, when known. Used as the
    /// anchor for "last 6 months" so the window tracks the data rather
    /// than the wall clock.
    pub max_timestamp: Option<DateTime<Utc>>,
}

impl TranslationContext {
    pub fn new(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time,
            max_timestamp: None,
        }
    }

    pub fn with_max_timestamp(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.max_timestamp = ts;
        self
    }

    fn anchor(&self) -> DateTime<Utc> {
        self.max_timestamp.unwrap_or(self.reference_time)
    }
}

/// Outcome of translating one question.
#[derive(Debug, Clone)]
pub enum Translation {
    /// A runnable query.
    Query {
        intent: QueryIntent,
        query: SqlQuery,
    },
    /// Trajectory/Profile question without a float id. The caller is
    /// expected to suggest candidate floats for the intent's filters.
    NeedsFloatId { intent: QueryIntent },
    /// Proximity question without coordinates or a known location.
    NeedsLocation { message: String },
    /// The question names a place the region table does not know.
    UnknownRegion {
        name: String,
        supported: Vec<&'static str>,
    },
    /// The question pins a year outside the supported range.
    OutOfRange { message: String },
    /// Nothing recognizable; answer with guidance instead of SQL.
    Help {
        message: String,
        examples: Vec<&'static str>,
    },
}

/// Translate a free-text question into SQL or a structured fallback.
pub fn translate(question: &str, ctx: &TranslationContext) -> Translation {
    let intent = classify(question, ctx.anchor());

    if let Some(name) = &intent.unknown_region {
        return Translation::UnknownRegion {
            name: name.clone(),
            supported: argo_common::Region::names(),
        };
    }

    if let Some(year) = intent.mentioned_year {
        let max_year = ctx.reference_time.year() + 1;
        if year < 2000 || year > max_year {
            return Translation::OutOfRange {
                message: format!(
                    "Year {} is out of supported range (2000-{}). Please specify a valid year.",
                    year, max_year
                ),
            };
        }
    }

    match intent.category {
        IntentCategory::General if intent.is_empty() => Translation::Help {
            message: "I couldn't match that question to the observation data. \
                      Try asking about temperature, salinity, float trajectories, \
                      profiles, or nearby floats."
                .to_string(),
            examples: EXAMPLE_QUESTIONS.to_vec(),
        },
        IntentCategory::Trajectory | IntentCategory::Profile if intent.float_id.is_none() => {
            Translation::NeedsFloatId { intent }
        }
        IntentCategory::Proximity if intent.coordinates.is_none() => Translation::NeedsLocation {
            message: "Proximity query requires coordinates or a known location. \
                      Please specify a location or coordinates."
                .to_string(),
        },
        _ => {
            let query = build_sql(&intent);
            Translation::Query { intent, query }
        }
    }
}
