//! Utilities for testing
#![doc(hidden)]

pub mod set;

pub use rand::RandGen;
