pub mod dataset;
pub mod evaluation;
pub mod metric;
pub mod run;

pub use dataset::*;
pub use evaluation::*;
pub use metric::*;
pub use run::*;
