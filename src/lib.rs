//! Daily AWS resource delta report.
//!
//! Inventory from AWS Config is normalized, diffed against the prior day's
//! snapshot, attributed through CloudTrail and rendered as a color-coded
//! workbook that is stored, linked and mailed.

pub mod config;
pub mod diff;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod out;
pub mod publish;
pub mod render;
pub mod retry;
pub mod run;
pub mod sources;
pub mod store;

pub use error::ReportError;
pub use model::{ChangeRecord, Classification, ResourceRecord, Snapshot, Summary};
pub use run::{Pipeline, RunOutcome};
