//! Stepik gateway for CourseSync.
//!
//! This module provides a remote backend for Stepik-compatible platforms:
//! - Bearer-token authentication
//! - Wrapped JSON bodies per REST collection
//! - Course attachments uploaded as multipart forms
//! - Full RemoteGateway trait implementation

pub mod client;
pub mod gateway;

pub use client::{StepikClient, ADDITIONAL_FILES_NAME, STEPIK_API_URL};
pub use gateway::{create_stepik_gateway, StepikConfig, StepikGateway};
