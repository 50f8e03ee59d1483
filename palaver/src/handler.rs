//! Dialog handlers and the turn context they run in.
//!
//! A [`DialogHandler`] is the brain of one dialog: the engine records the
//! user's response into the session, then asks the handler what comes next.
//! Handlers are pure over the session state they are shown; all delivery is
//! done by the engine from the returned [`Step`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, TransportResult};
use crate::event::FileRef;
use crate::query::Query;
use crate::session::DialogSession;
use crate::transport::{ByteStream, Transport};

/// What a handler wants to happen next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Deliver this query and wait for its response.
    Ask(Query),
    /// Keep the pending query pending and wait for a new response.
    ///
    /// The response already recorded stays in the session.
    Retry,
    /// The dialog is finished; drop the session.
    Done,
}

/// Drives one dialog from query to query.
///
/// `advance` runs right after a response was recorded into the session,
/// and once with a fresh session when the dialog starts. Returning an
/// error abandons the dialog: the engine deletes the session and reports
/// the event handled. Panics are contained the same way.
#[async_trait]
pub trait DialogHandler: Send + Sync {
    /// Decide the next step from the session state in `turn`.
    async fn advance(&self, turn: &mut DialogTurn<'_>) -> Result<Step>;
}

/// Context handed to a handler for one advance.
///
/// Exposes the session read-only plus a queue of notices: short texts the
/// engine sends to the chat after the handler returns, in order, before
/// delivering the next query. Validation failure messages travel this way.
pub struct DialogTurn<'a> {
    session: &'a DialogSession,
    transport: Arc<dyn Transport>,
    notices: Vec<String>,
}

impl<'a> DialogTurn<'a> {
    pub(crate) fn new(session: &'a DialogSession, transport: Arc<dyn Transport>) -> Self {
        Self {
            session,
            transport,
            notices: Vec::new(),
        }
    }

    /// The session being advanced.
    #[must_use]
    pub const fn session(&self) -> &DialogSession {
        self.session
    }

    /// Queue a text for the user, delivered after the handler returns.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
    }

    /// The file uploaded in response to query `name`, if any.
    #[must_use]
    pub fn attachment(&self, name: &str) -> Option<Attachment> {
        let query = self.session.query(name)?;
        if !matches!(query.kind, crate::query::QueryKind::FileInput) {
            return None;
        }
        let id = self.session.response_for(name)?;
        Some(Attachment {
            file: FileRef::new(id),
            transport: Arc::clone(&self.transport),
        })
    }

    pub(crate) fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

impl fmt::Debug for DialogTurn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogTurn")
            .field("session", &self.session)
            .field("notices", &self.notices)
            .finish_non_exhaustive()
    }
}

/// A file response, openable as a byte stream on demand.
///
/// Holding an `Attachment` costs nothing; bytes start flowing only when
/// [`open`](Self::open) is called and its stream is read.
#[derive(Clone)]
pub struct Attachment {
    file: FileRef,
    transport: Arc<dyn Transport>,
}

impl Attachment {
    /// Platform file id of the upload.
    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file.id
    }

    /// Open the upload for reading.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the file cannot be resolved.
    pub async fn open(&self) -> TransportResult<ByteStream> {
        self.transport.download(&self.file).await
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Named dialog handlers, looked up when sessions are loaded.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn DialogHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: impl DialogHandler + 'static) {
        let name = name.into();
        debug!(dialog = %name, "dialog registered");
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Look up a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DialogHandler>> {
        self.handlers.get(name).map(Arc::clone)
    }

    /// Names of all registered dialogs.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Number of registered dialogs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no dialogs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("dialogs", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportResult;
    use crate::media::Media;
    use crate::query::Keyboard;
    use tokio::io::AsyncReadExt;

    struct StaticTransport;

    #[async_trait]
    impl Transport for StaticTransport {
        async fn send_text(
            &self,
            _chat_id: i64,
            _text: &str,
            _reply_to: Option<i32>,
        ) -> TransportResult<i32> {
            Ok(1)
        }

        async fn send_prompt(
            &self,
            _chat_id: i64,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> TransportResult<i32> {
            Ok(1)
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
            _media: &[Media],
            _reply_to: Option<i32>,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn download(&self, file: &FileRef) -> TransportResult<ByteStream> {
            Ok(Box::pin(std::io::Cursor::new(file.id.clone().into_bytes())))
        }
    }

    struct NoopDialog;

    #[async_trait]
    impl DialogHandler for NoopDialog {
        async fn advance(&self, _turn: &mut DialogTurn<'_>) -> Result<Step> {
            Ok(Step::Done)
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        registry.register("survey", NoopDialog);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("survey").is_some());
        assert!(registry.get("other").is_none());
    }

    #[tokio::test]
    async fn test_turn_notices_are_taken_in_order() {
        let session = DialogSession::new(1, 1, "survey", true);
        let mut turn = DialogTurn::new(&session, Arc::new(StaticTransport));
        turn.notify("first");
        turn.notify("second");
        assert_eq!(turn.take_notices(), vec!["first", "second"]);
        assert!(turn.take_notices().is_empty());
    }

    #[tokio::test]
    async fn test_attachment_opens_file_response() {
        let mut session = DialogSession::new(1, 1, "upload", true);
        session.advance_to(Query::file("Q0", "Upload a file"));
        session.record_text_response("file-123");

        let turn = DialogTurn::new(&session, Arc::new(StaticTransport));
        let attachment = turn.attachment("Q0").expect("attachment");
        assert_eq!(attachment.file_id(), "file-123");

        let mut stream = attachment.open().await.unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, b"file-123");
    }

    #[tokio::test]
    async fn test_attachment_requires_file_kind() {
        let mut session = DialogSession::new(1, 1, "survey", true);
        session.advance_to(Query::text("Q0", "Why?"));
        session.record_text_response("not a file");

        let turn = DialogTurn::new(&session, Arc::new(StaticTransport));
        assert!(turn.attachment("Q0").is_none());
    }
}
