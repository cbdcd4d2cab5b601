//! tgeraser library
//!
//! This library provides tools to:
//! - Load or interactively create Telegram API credentials and sessions
//! - Resolve target conversations by peer, by type, or interactively
//! - Collect the operator's own messages, optionally older than a cutoff
//! - Delete them for everyone in paced batches, once or on a schedule

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod eraser;
pub mod metrics;
pub mod period;
pub mod platform;
pub mod prompt;
pub mod session;

// Re-export common types
pub use config::{CredentialSource, CredentialStore, Credentials};
pub use context::RunContext;
pub use error::{Error, Result};
pub use eraser::{Criteria, EntityType, Eraser};
pub use period::TimePeriod;
pub use platform::{Conversation, EntityKind, PeerRef, Platform};
pub use session::TelegramClient;

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
