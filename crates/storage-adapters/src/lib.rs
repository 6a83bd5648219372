//! # storage-adapters
//!
//! Implementations of the `domains` ports.
//!
//! - [`memory`] is always compiled and backs the test suites.
//! - [`postgres`] is enabled by the `db-postgres` feature.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryDatabase;
