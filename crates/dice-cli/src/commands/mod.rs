//! CLI command implementations

pub mod experiments;
pub mod generate_dataset;
pub mod reporting;
pub mod train;
pub mod validate;
