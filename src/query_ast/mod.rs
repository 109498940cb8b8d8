//! Statement parsing and SELECT execution-order simulation.
//!
//! `visualize` is the entry point: it parses a SELECT into its logical steps,
//! replays them over rows fetched from a [`DataSource`], and attaches the
//! engine's authoritative result.

pub mod catalog;
pub mod condition;
pub mod create_table;
pub mod errors;
pub mod executor;
pub mod executors;
pub(crate) mod lexer;
pub mod parser;
pub mod simulator;
pub(crate) mod values;
pub mod visualize;

pub use catalog::{execution_catalog, CatalogEntry};
pub use condition::evaluate;
pub use create_table::parse_create_table;
pub use errors::*;
pub use executor::{open_source, DataSource};
pub use parser::{parse_execution_order, parse_select_query, parse_select_statement};
pub use simulator::{simulate, SourceRows};
pub use visualize::visualize;
