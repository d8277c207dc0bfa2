//! Transformation module.
//!
//! - Cleaner: deduplication and mean imputation
//! - Selector: column projection
//! - Pipeline: per-file request handler and batch loop

pub mod cleaner;
pub mod pipeline;
pub mod selector;

pub use cleaner::{fill_missing_numeric, remove_duplicates, CleaningReport};
pub use pipeline::*;
pub use selector::select_columns;
