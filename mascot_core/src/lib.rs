// mascot_core/src/lib.rs

// This file defines the public modules of the library.
pub mod belief;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod grid;
pub mod interfaces;
pub mod pipeline;
pub mod planning;
pub mod prelude;
pub mod types;
pub mod vehicle;
