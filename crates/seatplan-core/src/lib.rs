//! Core types and trait definitions for the Seatplan allocation system.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod model;
pub mod plan;
pub mod store;

pub use error::{Error, Result};
