//! File management module for Nimbus.
//!
//! Holds the physical storage layer that destination files live in.

mod storage;

pub use storage::FileStorage;
