// mascot_sim/src/lib.rs

// This prelude is for convenience for other files WITHIN the mascot_sim crate.
pub mod prelude;

// This module contains all the simulation-specific logic.
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod ground_truth;
pub mod logging;
pub mod prng;
pub mod runner;
