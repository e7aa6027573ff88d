//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, platform directories and the
//! external compiler process.

pub mod dirs;
pub mod filesystem;
pub mod toolchain;
