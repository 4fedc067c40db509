//! Core of the ifeed active-learning labeling tool.
//!
//! Users label points of a dataset as inliers or outliers while a
//! classification oracle suggests the next point and shows its scores over
//! two-dimensional subspaces. This crate holds the session iteration logic,
//! setup validation, grid generation, progress calculations, labeler
//! agreement statistics and a local SQLite-backed store.

#[macro_use]
mod utils;

pub mod backend;
pub mod calc;
pub mod db;
pub mod grid;
pub mod iteration;
pub mod models;
pub mod ocal;
pub mod plot;
pub mod settings;
pub mod setup;
pub mod statistics;

#[cfg(test)]
mod fixtures;

pub use backend::{LabelingBackend, LocalBackend};
pub use db::Database;
pub use iteration::{IterationController, IterationEvent, IterationSnapshot, IterationState};
pub use ocal::{HttpOracle, OcalOutput, OcalReply, OcalRequest, Oracle, OracleError};
pub use plot::{HeatmapRenderer, JsonHeatmapRenderer};
pub use settings::{ClientSettings, SettingsStore};
pub use utils::logging::{debug_enabled, init_logging};
