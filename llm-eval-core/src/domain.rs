pub mod context;
pub mod dataset;
pub mod metric;
pub mod run;

pub use context::*;
pub use dataset::*;
pub use metric::*;
pub use run::*;
