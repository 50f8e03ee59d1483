//! Per-update context handed to command handlers.
//!
//! A [`Context`] pins one inbound message to its user and chat and exposes
//! the things a command usually wants: sending text and media back,
//! starting a dialog, and the scoped scratch stores. It is cheap to clone;
//! everything heavy sits behind the engine's `Arc`s.

use std::sync::Arc;

use crate::engine::DialogEngine;
use crate::error::Result;
use crate::media::Media;
use crate::store::ScopedStore;

/// Where an inbound message came from, bound to the engine serving it.
#[derive(Debug, Clone)]
pub struct Context {
    engine: Arc<DialogEngine>,
    user_id: i64,
    chat_id: i64,
    message_id: i32,
    is_private: bool,
}

impl Context {
    /// Build a context for one inbound message.
    #[must_use]
    pub fn new(
        engine: Arc<DialogEngine>,
        user_id: i64,
        chat_id: i64,
        message_id: i32,
        is_private: bool,
    ) -> Self {
        Self {
            engine,
            user_id,
            chat_id,
            message_id,
            is_private,
        }
    }

    /// The sending user.
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.user_id
    }

    /// The chat the message arrived in.
    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// The inbound message id.
    #[must_use]
    pub const fn message_id(&self) -> i32 {
        self.message_id
    }

    /// Whether this is a one-on-one chat with the bot.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.is_private
    }

    /// The engine serving this chat.
    #[must_use]
    pub const fn engine(&self) -> &Arc<DialogEngine> {
        &self.engine
    }

    /// Send `text` to the chat.
    ///
    /// # Errors
    ///
    /// Fails when the transport cannot deliver the message.
    pub async fn say(&self, text: &str) -> Result<i32> {
        let id = self
            .engine
            .transport()
            .send_text(self.chat_id, text, None)
            .await?;
        Ok(id)
    }

    /// Send `text` as a reply to the inbound message.
    ///
    /// # Errors
    ///
    /// Fails when the transport cannot deliver the message.
    pub async fn reply(&self, text: &str) -> Result<i32> {
        let id = self
            .engine
            .transport()
            .send_text(self.chat_id, text, Some(self.message_id))
            .await?;
        Ok(id)
    }

    /// Send media to the chat. More than one item forms an album.
    ///
    /// # Errors
    ///
    /// Fails when the transport cannot deliver the media.
    pub async fn send_media(&self, media: &[Media]) -> Result<()> {
        self.engine
            .transport()
            .send_media(self.chat_id, media, None)
            .await?;
        Ok(())
    }

    /// Send media as a reply to the inbound message.
    ///
    /// # Errors
    ///
    /// Fails when the transport cannot deliver the media.
    pub async fn reply_media(&self, media: &[Media]) -> Result<()> {
        self.engine
            .transport()
            .send_media(self.chat_id, media, Some(self.message_id))
            .await?;
        Ok(())
    }

    /// Start the named dialog for this user in this chat.
    ///
    /// # Errors
    ///
    /// Fails when the dialog is unknown, refuses to start, or its session
    /// cannot be stored.
    pub async fn start_dialog(&self, dialog: &str) -> Result<()> {
        self.engine
            .start_dialog(self.user_id, self.chat_id, self.is_private, dialog)
            .await?;
        Ok(())
    }

    /// Scratch store scoped to this user in this chat.
    ///
    /// Keys land under `userdata:<user>:<chat>:` in the session backend.
    #[must_use]
    pub fn user_store(&self) -> ScopedStore {
        ScopedStore::new(
            Arc::clone(self.engine.store()),
            format!("userdata:{}:{}:", self.user_id, self.chat_id),
        )
    }

    /// Scratch store shared by everyone in this chat.
    ///
    /// Keys land under `chatdata:<chat>:` in the session backend.
    #[must_use]
    pub fn chat_store(&self) -> ScopedStore {
        ScopedStore::new(
            Arc::clone(self.engine.store()),
            format!("chatdata:{}:", self.chat_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result as BotResult, TransportResult};
    use crate::event::FileRef;
    use crate::handler::{DialogHandler, DialogTurn, Step};
    use crate::query::{Keyboard, Query};
    use crate::session::session_key;
    use crate::store::{MemoryStore, SessionStore};
    use crate::transport::{ByteStream, Transport};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Outbox {
        texts: Mutex<Vec<(i64, String, Option<i32>)>>,
        albums: Mutex<Vec<(usize, Option<i32>)>>,
    }

    #[async_trait]
    impl Transport for Outbox {
        async fn send_text(
            &self,
            chat_id: i64,
            text: &str,
            reply_to: Option<i32>,
        ) -> TransportResult<i32> {
            self.texts
                .lock()
                .unwrap()
                .push((chat_id, text.to_owned(), reply_to));
            Ok(42)
        }

        async fn send_prompt(
            &self,
            _chat_id: i64,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> TransportResult<i32> {
            Ok(100)
        }

        async fn edit_prompt(
            &self,
            _chat_id: i64,
            _message_id: i32,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn send_media(
            &self,
            _chat_id: i64,
            media: &[Media],
            reply_to: Option<i32>,
        ) -> TransportResult<()> {
            self.albums.lock().unwrap().push((media.len(), reply_to));
            Ok(())
        }

        async fn download(&self, _file: &FileRef) -> TransportResult<ByteStream> {
            Ok(Box::pin(std::io::Cursor::new(Vec::new())))
        }
    }

    struct Greeter;

    #[async_trait]
    impl DialogHandler for Greeter {
        async fn advance(&self, turn: &mut DialogTurn<'_>) -> BotResult<Step> {
            match turn.session().pending_name() {
                None => Ok(Step::Ask(Query::text("Q0", "Name?"))),
                Some(_) => Ok(Step::Done),
            }
        }
    }

    fn context() -> (Context, Arc<Outbox>, Arc<MemoryStore>) {
        let outbox = Arc::new(Outbox::default());
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(
            DialogEngine::builder()
                .store(Arc::clone(&store) as Arc<dyn SessionStore>)
                .transport(Arc::clone(&outbox) as Arc<dyn Transport>)
                .dialog("greeter", Greeter)
                .build(),
        );
        (Context::new(engine, 7, 70, 5, false), outbox, store)
    }

    #[tokio::test]
    async fn test_say_and_reply() {
        let (ctx, outbox, _store) = context();

        let id = ctx.say("hi").await.unwrap();
        assert_eq!(id, 42);
        ctx.reply("you said?").await.unwrap();

        assert_eq!(
            *outbox.texts.lock().unwrap(),
            vec![
                (70, "hi".to_owned(), None),
                (70, "you said?".to_owned(), Some(5)),
            ]
        );
    }

    #[tokio::test]
    async fn test_media_goes_to_the_chat() {
        let (ctx, outbox, _store) = context();

        let album = vec![
            Media::photo(crate::media::MediaSource::url("https://example.com/a.png")),
            Media::photo(crate::media::MediaSource::url("https://example.com/b.png")),
        ];
        ctx.send_media(&album).await.unwrap();
        ctx.reply_media(&album[..1]).await.unwrap();

        assert_eq!(*outbox.albums.lock().unwrap(), vec![(2, None), (1, Some(5))]);
    }

    #[tokio::test]
    async fn test_start_dialog_uses_the_context_chat() {
        let (ctx, _outbox, store) = context();

        ctx.start_dialog("greeter").await.unwrap();
        assert!(store.exists(&session_key(7, 70)).await.unwrap());

        let err = ctx.start_dialog("ghost").await.unwrap_err();
        assert!(err.to_string().contains("unknown dialog"));
    }

    #[tokio::test]
    async fn test_scratch_stores_are_scoped() {
        let (ctx, _outbox, store) = context();

        ctx.user_store()
            .set("lang", b"en", Duration::ZERO)
            .await
            .unwrap();
        ctx.chat_store()
            .set("topic", b"tea", Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(
            store.get("userdata:7:70:lang").await.unwrap(),
            Some(b"en".to_vec())
        );
        assert_eq!(
            store.get("chatdata:70:topic").await.unwrap(),
            Some(b"tea".to_vec())
        );
    }
}
