//! # Formcoach-Core
//!
//! Core types and geometric feature extraction for the exercise form-analysis
//! engine: pose snapshots and landmarks, violation vocabulary, and the
//! crate-wide error type.

pub mod error;
pub mod geometry;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
