//! Utility functions shared across layers.
//!
//! - [`base62`] - Short code encoding for allocated identifiers

pub mod base62;
