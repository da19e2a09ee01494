//! Configuration module
//!
//! Loads the optional TOML configuration file and merges it with CLI flags.

mod file;

pub use file::*;
