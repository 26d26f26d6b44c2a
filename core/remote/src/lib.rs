//! Remote gateway abstraction for CourseSync.
//!
//! This module provides the contract the sync orchestrator drives
//! ([`RemoteGateway`] and [`AuthOracle`]) together with its backends:
//! an in-memory platform for tests and dry runs, and a REST client for a
//! Stepik-compatible learning platform. A registry resolves backends by
//! name from JSON configuration.
//!
//! # Design Principles
//! - Stateless calls: every operation is a single request/response
//! - Explicit results: remote identities come back as values, never by
//!   mutating the local tree
//! - Distinct failures: not-found, forbidden and transient errors stay
//!   separate because callers branch on them

pub mod gateway;
pub mod memory;
pub mod registry;
pub mod stepik;

pub use gateway::{
    AuthOracle, RemoteCourse, RemoteGateway, RemoteLesson, RemoteSection, RemoteTask, RemoteUnit,
    UnitPlacement,
};
pub use memory::{Failure, GatewayCall, MemoryGateway, Op};
pub use registry::{create_default_registry, GatewayFactory, GatewayRegistry, ResolvedGateway};
pub use stepik::{StepikClient, StepikConfig, StepikGateway};
