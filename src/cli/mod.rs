//! Command line interface for hlget

pub mod args;
pub mod interrupt;
pub mod output;

pub use args::*;
pub use interrupt::*;
pub use output::*;
