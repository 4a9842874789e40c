//! Deterministic evaluation metrics and the factory that builds them from
//! stored type tags and JSON configuration.

pub mod factory;
pub mod metric;
pub mod metrics;

pub use factory::*;
pub use metric::*;
pub use metrics::*;
