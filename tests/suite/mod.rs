//! Integration test suite
//!
//! Each module drives a [`lectern_engine::Client`] against a mock backend.

mod chat;
mod persistence;
mod sync;
