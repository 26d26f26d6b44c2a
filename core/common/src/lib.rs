//! Common utilities and types shared across the CourseSync crates.
//!
//! This module provides the error taxonomy used by the course model, the
//! remote gateways and the sync orchestrator, so that every layer reports
//! failures in the same terms.

pub mod error;

pub use error::{Error, Result};
