//! # domains
//!
//! Models, ports and errors for the threaded-reply subsystem.
//! Nothing in this crate performs I/O.

pub mod errors;
pub mod models;
pub mod ports;
pub mod validation;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
pub use validation::*;
