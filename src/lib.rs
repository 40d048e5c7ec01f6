//! # Taskboard Core
//!
//! Core board engine for kanban task management.
//!
//! Boards are immutable snapshots: [`BoardStore`] turns one snapshot and one
//! [`Command`] into a new snapshot or a typed [`BoardError`]. Around that engine
//! the crate provides short external hashes for cards and columns, pluggable
//! [`Storage`] backends, an [`AuthGate`], event sinks, a debounced interactive
//! [`BoardSession`] and a transport-agnostic [`CommandSurface`].

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod surface;

// Re-export commonly used types
pub use auth::{AllowAll, AuthGate, CredentialTable};
pub use config::{Config, SessionConfig, StorageBackend};
pub use domain::{
    Applied, Board, BoardConfig, BoardId, BoardStore, Card, CardId, CardPatch, Column, ColumnId,
    Command, DeleteStrategy, Effect, ExternalHash, Namespace,
};
pub use error::{BoardError, ErrorKind, Result};
pub use events::{BoardEvent, EventKind, EventSink};
pub use runtime::Services;
pub use session::BoardSession;
pub use storage::Storage;
pub use surface::{CommandSurface, Method, Request, Response};
