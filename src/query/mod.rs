//! Query Module
//!
//! Filtering and response shaping over normalized volumes.

pub mod filter;
pub mod projector;

pub use filter::{filter_volumes, matches, FilterField, FilterPredicate};
pub use projector::{project_distinct, project_table, TableColumn, TableResponse, TABLE_COLUMNS};
