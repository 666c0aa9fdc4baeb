//! Sync event distribution
//!
//! The sync engine and orchestrator publish [`SyncEvent`]s to an [`EventBus`];
//! presentation layers and the orchestrator itself subscribe with an
//! [`EventFilter`] and receive events on an unbounded tokio channel.

pub mod error;
pub mod event;
pub mod manager;

pub use error::NotificationError;
pub use event::{EventFilter, SyncEvent, SyncEventKind, WarningKey};
pub use manager::EventBus;
