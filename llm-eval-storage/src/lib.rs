//! In-memory implementations of the engine's collaborator traits.
//!
//! These back tests and embedded use; a deployment would put its own
//! database-backed implementations behind the same traits.

pub mod memory;

pub use memory::*;
