#![forbid(unsafe_code)]
//! rowpipe-core: field metadata, row/record values, and field maps.
//!
//! Everything downstream is parameterized by a `FieldList`: operators resolve
//! names to positions against it once, then work positionally on rows.
//! No operators, no execution, no IO here.

pub mod config;
pub mod error;
pub mod field;
pub mod field_list;
pub mod field_map;
pub mod id;
pub mod prelude;
pub mod record;
pub mod types;

pub use error::{Error, Result};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
