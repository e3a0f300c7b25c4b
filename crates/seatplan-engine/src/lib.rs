//! The seat allocation engine.
//!
//! Layers, leaves first:
//!
//! - [`topology`]: a hall's logical seat grid and adjacency relation;
//! - [`index`]: the working set of a run and the frozen, query-optimised
//!   index of a committed plan;
//! - [`engine`]: the greedy per-slot assignment;
//! - [`snapshot`]: the immutable published plan;
//! - [`service`]: run orchestration, publication and queries over any
//!   [`seatplan_core::store::RosterStore`].

pub mod engine;
pub mod error;
pub mod index;
pub mod service;
pub mod snapshot;
pub mod topology;

pub use error::{Error, Result, RunFailure};
pub use service::{AllotmentService, RunOutcome, ServiceConfig};
