//! Evaluation run orchestration: metric resolution, sequential and
//! bounded-parallel execution, progress tracking, and result persistence.

pub mod engine;
pub mod progress;

pub use engine::*;
pub use progress::*;
