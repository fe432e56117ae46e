//! Download execution: per-highlight tasks, the worker pool and remuxing

pub mod pool;
pub mod remux;
pub mod task;

pub use pool::*;
pub use remux::*;
pub use task::*;
