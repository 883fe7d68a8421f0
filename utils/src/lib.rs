//! Shared infrastructure utilities for Lectern.
//!
//! - **`atomic_write`**: crash-safe file persistence (temp + rename) used by
//!   the on-disk local state store

pub mod atomic_write;

pub use atomic_write::{atomic_write, recover_bak_file};
