//! Utility functions for hlget

pub mod filename;
pub mod url;

pub use self::filename::*;
pub use self::url::*;
