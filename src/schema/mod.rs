//! Column type inference
//!
//! [`lattice`] holds the pure widening rules for a single value; [`scanner`] runs
//! them over every cell of a file to produce the table schema.

pub mod lattice;
pub mod scanner;

pub use lattice::determine_type;
pub use scanner::{scan_types, TypeScanner};
