//! Palaver - multi-turn dialog orchestration for chat bots.
//!
//! Bots ask questions; users answer late, twice, out of order, or not at
//! all. Palaver keeps each user's place in a persisted session, classifies
//! every inbound event against the question currently pending, and drives
//! the dialog forward exactly once per accepted response. Delivery may be
//! at-least-once and the process may restart mid-conversation; neither is
//! visible to a dialog.
//!
//! # Architecture
//!
//! The library is organized around these core components:
//!
//! - **Engine** ([`engine`]) - Event classification, fault barrier, session lifecycle
//! - **Sessions** ([`session`]) - Per-user-per-chat dialog state, serialized to a store
//! - **Stores** ([`store`]) - Flat TTL key/value backends (in-memory, file)
//! - **Dialogs** ([`handler`], [`builder`]) - The handler trait and the declarative step sequencer
//! - **Commands** ([`command`]) - Slash command registration and dispatch
//! - **Transports** ([`transport`], [`telegram`]) - Message delivery, Telegram behind the `telegram` feature
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use palaver::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let survey = DialogBuilder::new()
//!         .ask_multi_choice("Pick your favorite fruits", ["Apple", "Orange", "Banana"])
//!         .ask_text("Why?")
//!         .finalize(|turn, _responses| {
//!             turn.notify("thanks!");
//!             Ok(())
//!         })
//!         .build();
//!
//!     Bot::builder(std::env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN"))
//!         .dialog("survey", survey)
//!         .command(
//!             "survey",
//!             CommandFn::new(|ctx, _args| {
//!                 Box::pin(async move { Ok(ctx.start_dialog("survey").await?) })
//!             }),
//!         )
//!         .build()
//!         .run()
//!         .await;
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` (default) - Telegram front end via teloxide

// Core modules
pub mod builder;
pub mod classify;
pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod handler;
pub mod media;
pub mod query;
pub mod session;
pub mod store;
pub mod transport;

// Platform front ends
#[cfg(feature = "telegram")]
pub mod telegram;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error types (centralized)
    pub use crate::error::{
        BotError, CommandError, CommandResult, EngineError, EngineResult, ErrorContext, Result,
        StoreError, StoreResult, TransportError, TransportResult, ValidationError,
    };

    // Engine
    pub use crate::engine::{
        DEFAULT_SESSION_TTL, DialogEngine, EngineBuilder, EngineConfig, Handling,
    };

    // Dialogs
    pub use crate::builder::{
        BuiltDialog, DialogBuilder, Finalize, IndexNamer, StepNamer, StepResponse,
    };
    pub use crate::handler::{Attachment, DialogHandler, DialogTurn, HandlerRegistry, Step};

    // Queries, sessions, events
    pub use crate::event::{ChatEvent, EventPayload, FileRef};
    pub use crate::query::{Button, Keyboard, Press, Query, QueryKind};
    pub use crate::session::{DialogSession, QueryRecord, session_key};

    // Commands
    pub use crate::command::{
        Command, CommandFn, CommandRegistry, ParsedCommand, expect_args, parse_arg, parse_command,
    };
    pub use crate::context::Context;

    // Media and transport
    pub use crate::media::{Media, MediaKind, MediaSource};
    pub use crate::transport::{ByteStream, Transport};

    // Stores
    pub use crate::store::{FileStore, MemoryStore, ScopedStore, SessionStore};

    // Telegram front end
    #[cfg(feature = "telegram")]
    pub use crate::telegram::{Bot, BotBuilder, TelegramTransport};
}
