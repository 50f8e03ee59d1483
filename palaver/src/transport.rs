//! Message delivery abstraction.
//!
//! The engine drives a chat platform exclusively through [`Transport`]:
//! sending and editing prompts, sending plain text and media, and opening
//! uploaded files as byte streams. Swapping the transport swaps the
//! platform; the engine and all dialog code stay unchanged.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::TransportResult;
use crate::event::FileRef;
use crate::media::Media;
use crate::query::Keyboard;

/// A lazily opened stream of file bytes.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Outbound side of a chat platform.
///
/// Message ids returned by the send operations feed back into reply
/// correlation and prompt editing, so they must be the platform's real ids.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send plain text, optionally as a reply. Returns the new message's id.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> TransportResult<i32>;

    /// Deliver a query prompt with its keyboard. Returns the new message's id.
    async fn send_prompt(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> TransportResult<i32>;

    /// Rewrite a previously sent prompt in place.
    async fn edit_prompt(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> TransportResult<()>;

    /// Send one or more media items, optionally as a reply. More than one
    /// item is delivered as an album where the platform supports it.
    async fn send_media(
        &self,
        chat_id: i64,
        media: &[Media],
        reply_to: Option<i32>,
    ) -> TransportResult<()>;

    /// Open an uploaded file as a byte stream.
    async fn download(&self, file: &FileRef) -> TransportResult<ByteStream>;
}
