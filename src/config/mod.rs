//! Configuration constants and core type aliases.

mod constants;

pub use constants::*;
