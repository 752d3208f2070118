//! Activity scoring for hierarchy entities (groups, companies, locations and
//! business units): weighted order frequency, recency and value scores,
//! activity tiers, peer rankings, portfolio summaries and analytics.

pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;
pub mod ranking;
pub mod report;
pub mod scoring;
pub mod service;
pub mod source;
pub mod telemetry;
pub mod trend;

pub use error::ScoringError;
pub use models::{ActivityLevel, ActivityMetrics, EntityRef, EntityType, OrderSignal};
pub use service::{BatchOutcome, ScoringService};
