//! Descriptive reports over census immigration and accessibility tables.
//!
//! Pipeline stages, in order: [`model`] and [`geometry`] load inputs,
//! [`filter`] excludes regions and derives labels, [`aggregation`] groups and
//! normalises, [`tiers`] selects and classifies, and [`visualization`],
//! [`plots`] and [`map`] render. [`reports`] wires the stages together.

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod map;
pub mod model;
pub mod palette;
pub mod plots;
pub mod reports;
pub mod schema;
pub mod tiers;
pub mod visualization;

pub use config::ReportConfig;
pub use error::{ReportError, Result};
pub use model::CensusModel;
pub use reports::{ReportContext, ReportOutput};
