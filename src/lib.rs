//! Intervention data reconciliation for the MTSS dashboard.

pub mod assignments;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod interventions;
pub mod labels;
pub mod models;
pub mod report;
pub mod roster;
pub mod segments;
pub mod sources;
pub mod tiers;

pub use assignments::map_assignments;
pub use config::ReconcileConfig;
pub use dashboard::{reconcile, Dashboard};
pub use error::{Result, SourceError};
pub use interventions::{ensure_student_interventions, select_most_critical};
pub use labels::{normalize_class, normalize_grade};
pub use roster::merge_roster;
pub use segments::derive_segments;
