//! Utility functions shared across the crate.
//!
//! - [`key_generator`] - Short key generation

pub mod key_generator;
