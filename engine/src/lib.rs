//! Client core for Lectern.
//!
//! This crate owns the client's state and the logic that keeps it in step
//! with the backend. It has no terminal dependencies; rendering goes through
//! the [`View`] trait.
//!
//! - [`store`]: durable key-value storage for the persisted sets and session id
//! - [`state`]: the shared [`ClientState`] aggregate
//! - [`progress`]: per-category progress reconciliation
//! - [`providers`]: the backend's provider list and the failover cursor
//! - [`chat`]: the chat send protocol, history, and clear
//! - [`client`]: the [`Client`] facade tying it together with the push channel

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Mutex poisoning is recovered, not propagated

pub mod chat;
pub mod client;
pub mod progress;
pub mod providers;
pub mod state;
pub mod store;
pub mod view;

pub use chat::{ChatSession, FailureKind, RejectReason, SendOutcome};
pub use client::{Client, ClientError};
pub use progress::{ProgressReconciler, ProgressUpdate};
pub use providers::ProviderDirectory;
pub use state::{ClientState, IdSet};
pub use store::{FileStore, LocalStore, MemoryStore, StoreError};
pub use view::{NoticeLevel, View};
#[cfg(any(test, feature = "test-util"))]
pub use view::{RecordingView, ViewCall};

pub use lectern_api::{ApiClient, ApiError};
pub use lectern_config::ClientSettings;
pub use lectern_sync::{StreamKind, StreamState, SyncChannel, SyncEvent};
