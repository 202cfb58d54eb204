//! DICE CLI library.
//!
//! Command implementations for the `dice` binary: dataset generation,
//! model training, and preset/pattern validation.

pub mod commands;
