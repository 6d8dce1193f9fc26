//! Keyword-driven intent classification.
//!
//! A single scan extracts [`QuestionFacts`]; an ordered rule table then
//! picks the category. Rules are checked top to bottom and the first
//! match wins, which makes the priority between categories (float-id
//! questions before statistics, proximity before plain metric listings)
//! explicit and auditable.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use argo_common::{Region, TimeWindow};

use crate::intent::{Aggregate, IntentCategory, Metric, QueryIntent};

/// Default search radius for proximity questions, in km.
pub const DEFAULT_RADIUS_KM: f64 = 500.0;
/// Default result count for proximity questions.
pub const DEFAULT_PROXIMITY_LIMIT: i64 = 5;

/// Raw facts extracted from one question before category selection.
#[derive(Debug, Clone)]
pub struct QuestionFacts {
    pub text: String,
    pub float_id: Option<i32>,
    pub region: Option<&'static Region>,
    pub unknown_region: Option<String>,
    pub window: Option<TimeWindow>,
    pub mentioned_year: Option<i32>,
    pub metrics: Vec<Metric>,
    pub aggregate: Option<Aggregate>,
    pub limit: Option<i64>,
    pub radius_km: Option<f64>,
    pub coordinates: Option<(f64, f64)>,
    pub wants_trajectory: bool,
    pub wants_profile: bool,
    pub wants_proximity: bool,
    pub wants_timeseries: bool,
}

impl QuestionFacts {
    /// Extract facts from a question. `anchor` resolves relative time
    /// phrases ("last 6 months") against the data rather than the wall
    /// clock when the caller knows the store's extent.
    pub fn extract(question: &str, anchor: DateTime<Utc>) -> Self {
        let text = question.to_lowercase();

        let float_id = extract_float_id(&text);
        let region = Region::find_in(&text);
        let unknown_region = if region.is_none() {
            extract_place_phrase(&text)
        } else {
            None
        };

        let window = TimeWindow::from_phrase(&text, anchor);
        let mentioned_year = year_pattern()
            .captures(&text)
            .and_then(|c| c[1].parse::<i32>().ok());

        let metrics = extract_metrics(&text);
        let aggregate = extract_aggregate(&text);
        let limit = count_pattern()
            .captures(&text)
            .and_then(|c| c[1].parse::<i64>().ok());
        let radius_km = radius_pattern()
            .captures(&text)
            .and_then(|c| c[1].parse::<f64>().ok());
        let coordinates = extract_coordinates(&text);

        let wants_trajectory = contains_any(
            &text,
            &[
                "trajectory", "path", "travel", "drift", "moved", "movement", "route", "went",
            ],
        );
        let wants_profile = contains_any(
            &text,
            &["profile", "depth", "vertical", "vs pressure", "by pressure"],
        );
        let wants_proximity = contains_any(&text, &["nearest", "closest", "how far"])
            || radius_km.is_some()
            || coordinates.is_some();
        let wants_timeseries = contains_any(
            &text,
            &["trend", "over time", "time series", "timeseries", "monthly", "evolution"],
        );

        Self {
            text,
            float_id,
            region,
            unknown_region,
            window,
            mentioned_year,
            metrics,
            aggregate,
            limit,
            radius_km,
            coordinates,
            wants_trajectory,
            wants_profile,
            wants_proximity,
            wants_timeseries,
        }
    }

    fn has_temperature(&self) -> bool {
        self.metrics.contains(&Metric::Temperature)
    }

    fn has_salinity(&self) -> bool {
        self.metrics.contains(&Metric::Salinity)
    }
}

/// One classification rule: a predicate over the extracted facts and
/// the category it assigns.
struct Rule {
    name: &'static str,
    applies: fn(&QuestionFacts) -> bool,
    category: IntentCategory,
}

/// Ordered dispatch table. Order is the priority policy:
/// float-id questions outrank everything (so an id never degrades into
/// a generic statistic), proximity outranks metric listings, and the
/// comparison tie-break only applies once the specific shapes have had
/// their chance.
const RULES: &[Rule] = &[
    Rule {
        name: "float-profile",
        applies: |f| f.float_id.is_some() && f.wants_profile,
        category: IntentCategory::Profile,
    },
    Rule {
        name: "float-trajectory",
        applies: |f| f.float_id.is_some(),
        category: IntentCategory::Trajectory,
    },
    Rule {
        name: "proximity",
        applies: |f| f.wants_proximity,
        category: IntentCategory::Proximity,
    },
    Rule {
        name: "profile",
        applies: |f| f.wants_profile,
        category: IntentCategory::Profile,
    },
    Rule {
        name: "trajectory",
        applies: |f| f.wants_trajectory,
        category: IntentCategory::Trajectory,
    },
    Rule {
        name: "timeseries",
        applies: |f| f.wants_timeseries,
        category: IntentCategory::TimeSeries,
    },
    Rule {
        name: "statistics",
        applies: |f| f.aggregate.is_some(),
        category: IntentCategory::Statistics,
    },
    Rule {
        name: "comparison",
        applies: |f| f.has_temperature() && f.has_salinity(),
        category: IntentCategory::Comparison,
    },
    Rule {
        name: "temperature",
        applies: |f| f.has_temperature(),
        category: IntentCategory::Temperature,
    },
    Rule {
        name: "salinity",
        applies: |f| f.has_salinity(),
        category: IntentCategory::Salinity,
    },
    Rule {
        name: "general",
        applies: |_| true,
        category: IntentCategory::General,
    },
];

/// Classify a question into a [`QueryIntent`]. Total: every input maps
/// to some category, never an error.
pub fn classify(question: &str, anchor: DateTime<Utc>) -> QueryIntent {
    let facts = QuestionFacts::extract(question, anchor);

    let rule = RULES
        .iter()
        .find(|r| (r.applies)(&facts))
        .unwrap_or(&RULES[RULES.len() - 1]);
    let category = rule.category;

    let comparison = facts.has_temperature() && facts.has_salinity();

    // A proximity question anchored on a named place searches from the
    // region's representative point.
    let coordinates = match category {
        IntentCategory::Proximity => facts
            .coordinates
            .or_else(|| facts.region.map(|r| r.center)),
        _ => facts.coordinates,
    };

    let (limit, radius_km) = match category {
        IntentCategory::Proximity => (
            Some(facts.limit.unwrap_or(DEFAULT_PROXIMITY_LIMIT)),
            Some(facts.radius_km.unwrap_or(DEFAULT_RADIUS_KM)),
        ),
        _ => (facts.limit, facts.radius_km),
    };

    QueryIntent {
        category,
        metrics: facts.metrics.clone(),
        region: facts.region,
        window: facts.window,
        float_id: facts.float_id,
        aggregate: facts.aggregate.unwrap_or_default(),
        limit,
        radius_km,
        coordinates,
        comparison,
        unknown_region: facts.unknown_region.clone(),
        mentioned_year: facts.mentioned_year,
    }
}

/// Rule names in priority order, for inspection and tests.
pub fn rule_order() -> Vec<&'static str> {
    RULES.iter().map(|r| r.name).collect()
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn extract_float_id(text: &str) -> Option<i32> {
    if let Some(caps) = float_word_pattern().captures(text) {
        if let Ok(id) = caps[1].parse::<i32>() {
            return Some(id);
        }
    }
    bare_id_pattern()
        .captures(text)
        .and_then(|c| c[1].parse::<i32>().ok())
}

fn extract_metrics(text: &str) -> Vec<Metric> {
    let mut metrics = Vec::new();
    if contains_any(text, &["temperature", "temp ", " temp", "warmest", "coldest"]) {
        metrics.push(Metric::Temperature);
    }
    if contains_any(text, &["salinity", "salt", "psu"]) {
        metrics.push(Metric::Salinity);
    }
    if contains_any(text, &["oxygen", "doxy"]) {
        metrics.push(Metric::DissolvedOxygen);
    }
    if contains_any(text, &["chlorophyll", "chl-a", "chla"]) {
        metrics.push(Metric::Chlorophyll);
    }
    if text.contains("pressure") {
        metrics.push(Metric::Pressure);
    }
    metrics
}

fn extract_aggregate(text: &str) -> Option<Aggregate> {
    if contains_any(text, &["how many", "count", "number of"]) {
        Some(Aggregate::Count)
    } else if contains_any(text, &["average", "avg", "mean"]) {
        Some(Aggregate::Avg)
    } else if contains_any(text, &["maximum", "max ", "highest", "warmest", "deepest"]) {
        Some(Aggregate::Max)
    } else if contains_any(text, &["minimum", "min ", "lowest", "coldest"]) {
        Some(Aggregate::Min)
    } else {
        None
    }
}

fn extract_coordinates(text: &str) -> Option<(f64, f64)> {
    if let (Some(lat), Some(lon)) = (
        latitude_pattern()
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok()),
        longitude_pattern()
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok()),
    ) {
        return valid_point(lat, lon);
    }

    let caps = pair_pattern().captures(text)?;
    let lat = caps[1].parse::<f64>().ok()?;
    let lon = caps[2].parse::<f64>().ok()?;
    valid_point(lat, lon)
}

fn valid_point(lat: f64, lon: f64) -> Option<(f64, f64)> {
    (lat.abs() <= 90.0 && lon.abs() <= 180.0).then_some((lat, lon))
}

/// A "in/near the <something> sea|ocean|..." phrase that did not match
/// the region table.
fn extract_place_phrase(text: &str) -> Option<String> {
    place_pattern()
        .captures(text)
        .map(|c| c[1].trim().to_string())
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

static_regex!(float_word_pattern, r"float\s*#?\s*(\d+)");
static_regex!(bare_id_pattern, r"\b(\d{5,8})\b");
static_regex!(year_pattern, r"\b(1[89]\d{2}|2\d{3})\b");
static_regex!(count_pattern, r"(?:nearest|closest|top|first)\s+(\d{1,3})\b");
static_regex!(radius_pattern, r"within\s+(\d+(?:\.\d+)?)\s*km");
static_regex!(latitude_pattern, r"lat(?:itude)?\s+(-?\d+(?:\.\d+)?)");
static_regex!(longitude_pattern, r"lon(?:gitude)?\s+(-?\d+(?:\.\d+)?)");
static_regex!(
    pair_pattern,
    r"\b(-?\d{1,2}(?:\.\d+)?)\s*,\s*(-?\d{1,3}(?:\.\d+)?)\b"
);
static_regex!(
    place_pattern,
    r"\b(?:in|near|at|around|off)\s+(?:the\s+)?([a-z][a-z ]*?(?:sea|ocean|gulf|bay|channel))\b"
);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_float_id_with_keyword() {
        let intent = classify("where did float 2902115 go?", anchor());
        assert_eq!(intent.category, IntentCategory::Trajectory);
        assert_eq!(intent.float_id, Some(2902115));
    }

    #[test]
    fn test_bare_float_id() {
        let intent = classify("trajectory of 2903100 in 2024", anchor());
        assert_eq!(intent.float_id, Some(2903100));
        assert_eq!(intent.category, IntentCategory::Trajectory);
        assert!(intent.window.is_some());
    }

    #[test]
    fn test_float_id_outranks_statistics() {
        // Priority policy: the id wins even with an aggregate word present.
        let intent = classify("average temperature along float 2902115", anchor());
        assert_eq!(intent.category, IntentCategory::Trajectory);
        assert_eq!(intent.float_id, Some(2902115));
    }

    #[test]
    fn test_profile_words_with_id() {
        let intent = classify("show the depth profile of float 2902115", anchor());
        assert_eq!(intent.category, IntentCategory::Profile);
    }

    #[test]
    fn test_proximity_with_named_place_uses_region_center() {
        let intent = classify("nearest 3 floats to chennai", anchor());
        assert_eq!(intent.category, IntentCategory::Proximity);
        assert_eq!(intent.limit, Some(3));
        let (lat, lon) = intent.coordinates.unwrap();
        assert!((lat - 13.08).abs() < 1e-9);
        assert!((lon - 80.27).abs() < 1e-9);
        assert_eq!(intent.radius_km, Some(DEFAULT_RADIUS_KM));
    }

    #[test]
    fn test_proximity_with_coordinates() {
        let intent = classify("floats near 13, 80.25 within 700 km", anchor());
        assert_eq!(intent.category, IntentCategory::Proximity);
        assert_eq!(intent.coordinates, Some((13.0, 80.25)));
        assert_eq!(intent.radius_km, Some(700.0));
        assert_eq!(intent.limit, Some(DEFAULT_PROXIMITY_LIMIT));
    }

    #[test]
    fn test_explicit_lat_lon_words() {
        let intent = classify("nearest floats to latitude 13 longitude 80.25", anchor());
        assert_eq!(intent.coordinates, Some((13.0, 80.25)));
    }

    #[test]
    fn test_statistics_with_aggregate() {
        let intent = classify("average salinity in the arabian sea in 2024", anchor());
        assert_eq!(intent.category, IntentCategory::Statistics);
        assert_eq!(intent.aggregate, Aggregate::Avg);
        assert_eq!(intent.metrics, vec![Metric::Salinity]);
        assert_eq!(intent.region.unwrap().name, "arabian sea");
    }

    #[test]
    fn test_count_aggregate() {
        let intent = classify("how many floats are in the bay of bengal", anchor());
        assert_eq!(intent.category, IntentCategory::Statistics);
        assert_eq!(intent.aggregate, Aggregate::Count);
    }

    #[test]
    fn test_timeseries_beats_statistics() {
        let intent = classify("average temperature trend over time in 2024", anchor());
        assert_eq!(intent.category, IntentCategory::TimeSeries);
    }

    #[test]
    fn test_comparison_tie_break() {
        let intent = classify("temperature and salinity in the bay of bengal", anchor());
        assert_eq!(intent.category, IntentCategory::Comparison);
        assert!(intent.comparison);
        assert!(intent.metrics.contains(&Metric::Temperature));
        assert!(intent.metrics.contains(&Metric::Salinity));
    }

    #[test]
    fn test_single_metric_categories() {
        assert_eq!(
            classify("temperature in the red sea", anchor()).category,
            IntentCategory::Temperature
        );
        assert_eq!(
            classify("salinity near singapore", anchor()).category,
            IntentCategory::Salinity
        );
    }

    #[test]
    fn test_region_beats_global_default() {
        let intent = classify("show data for the coral sea", anchor());
        assert_eq!(intent.region.unwrap().name, "coral sea");
    }

    #[test]
    fn test_unknown_place_is_flagged_not_dropped() {
        let intent = classify("temperature in the okhotsk sea", anchor());
        assert_eq!(intent.unknown_region.as_deref(), Some("okhotsk sea"));
    }

    #[test]
    fn test_unrecognized_input_is_general_and_empty() {
        let intent = classify("tell me a story", anchor());
        assert_eq!(intent.category, IntentCategory::General);
        assert!(intent.is_empty());
    }

    #[test]
    fn test_rule_priority_is_stable() {
        // The table order IS the tie-break policy; a reorder is a
        // behavior change and should show up here.
        assert_eq!(
            rule_order(),
            vec![
                "float-profile",
                "float-trajectory",
                "proximity",
                "profile",
                "trajectory",
                "timeseries",
                "statistics",
                "comparison",
                "temperature",
                "salinity",
                "general",
            ]
        );
    }

    #[test]
    fn test_year_is_not_mistaken_for_float_id() {
        let intent = classify("temperature in 2024", anchor());
        assert_eq!(intent.float_id, None);
        assert_eq!(intent.mentioned_year, Some(2024));
    }
}
