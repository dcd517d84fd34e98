//! CLI command implementations

mod context;
mod deadline;
mod serve;
mod style;
mod sweep;

pub use deadline::run_deadline;
pub use serve::{ServeOptions, run_serve};
pub use sweep::run_sweep;
