//! Weekly activity, rating trend, and matchup insights for Street Fighter 6
//! player reports.

pub mod activity;
pub mod builder;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod insights;
pub mod loader;
pub mod matchups;
pub mod models;
pub mod rating;
pub mod report;
pub mod sessions;
pub mod stats;
pub mod week;

pub use config::InsightsConfig;
pub use error::InsightsError;
pub use ingest::ReportInputs;
pub use insights::{derive_insights, Insights};
pub use loader::{LoadTicket, ReportLoader};
pub use week::{WeekAligner, WeekStart};
