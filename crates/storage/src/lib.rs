//! PostgreSQL persistence for ARGO float observations.

pub mod rows;
pub mod sink;
pub mod store;

pub use rows::row_to_json;
pub use sink::{InsertSummary, ObservationSink};
pub use store::{FloatSummary, NearestFloat, ObservationStore, ProfileLevel, TrajectoryPoint};
