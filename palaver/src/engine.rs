//! The dialog engine.
//!
//! One engine serves every user and chat. For each inbound event it loads
//! the session from the store, classifies the event against the pending
//! query, records the response, runs the dialog handler, delivers whatever
//! the handler asked for, and persists or deletes the session. There is no
//! other dialog state anywhere: a crashed process resumes mid-dialog from
//! the store alone.
//!
//! Handler failures and panics are contained here. A failing handler
//! abandons its dialog: the session is deleted and the event reported
//! handled, so one broken dialog cannot wedge a chat. Transport failures
//! are logged and never roll back session state; the state machine always
//! advances on classified input.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::classify::{Classification, ResponseInput, classify};
use crate::error::{EngineError, EngineResult};
use crate::event::ChatEvent;
use crate::handler::{DialogHandler, DialogTurn, HandlerRegistry, Step};
use crate::query::Query;
use crate::session::{DialogSession, session_key};
use crate::store::{MemoryStore, SessionStore};
use crate::transport::Transport;

/// Sessions idle longer than this are forgotten by the store.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// TTL applied on every session write. Each handled event refreshes it.
    pub session_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

/// Outcome of feeding an event to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    /// The event belonged to an active dialog and was consumed.
    Handled,
    /// No active dialog claimed the event; the caller may fall back to
    /// its default handling.
    NotHandled,
}

impl Handling {
    /// Whether the event was consumed.
    #[must_use]
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Orchestrates dialogs over a session store and a transport.
pub struct DialogEngine {
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn Transport>,
    registry: HandlerRegistry,
    config: EngineConfig,
}

impl DialogEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The session store backing this engine.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The transport this engine delivers through.
    #[must_use]
    pub const fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// TTL applied to session writes.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        self.config.session_ttl
    }

    /// Feed one inbound event to the engine.
    ///
    /// Returns [`Handling::NotHandled`] when no active dialog claims the
    /// event, so the caller can route it elsewhere. All engine-side
    /// failures are absorbed and logged; a handler failure abandons the
    /// dialog but still reports the event handled.
    pub async fn handle_event(&self, event: &ChatEvent) -> Handling {
        let key = session_key(event.user_id, event.chat_id);
        let Some(mut session) = self.load(&key).await else {
            return Handling::NotHandled;
        };
        let Some(handler) = self.registry.get(&session.dialog) else {
            error!(key = %key, dialog = %session.dialog, "session names an unregistered dialog, dropping it");
            self.remove(&key).await;
            return Handling::NotHandled;
        };
        if session.pending_query().is_none() {
            error!(key = %key, "session has no pending query, dropping it");
            self.remove(&key).await;
            return Handling::NotHandled;
        }

        match classify(&session, event) {
            Classification::Reject => Handling::NotHandled,
            Classification::Stale => {
                debug!(key = %key, "stale button press consumed");
                self.persist(&session).await;
                Handling::Handled
            }
            Classification::ToggleRedraw { index } => {
                session.toggle_choice(index);
                self.redraw(&session).await;
                self.persist(&session).await;
                Handling::Handled
            }
            Classification::Advance(input) => {
                match input {
                    ResponseInput::Text(text) => {
                        session.record_text_response(text);
                        session.record_correlation(event.message_id);
                    }
                    ResponseInput::File(file) => {
                        session.record_text_response(file.id);
                        session.record_correlation(event.message_id);
                    }
                    ResponseInput::Submit { toggle } => {
                        if let Some(index) = toggle {
                            session.toggle_choice(index);
                        }
                    }
                }

                let Some((step, notices)) = self.run_guarded(&session, &handler).await else {
                    self.remove(&key).await;
                    return Handling::Handled;
                };
                self.flush_notices(session.chat_id, notices).await;

                match step {
                    Step::Retry => self.persist(&session).await,
                    Step::Ask(query) => {
                        self.deliver(&mut session, query).await;
                        self.persist(&session).await;
                    }
                    Step::Done => {
                        info!(key = %key, dialog = %session.dialog, "dialog finished");
                        self.remove(&key).await;
                    }
                }
                Handling::Handled
            }
        }
    }

    /// Start the named dialog for a user in a chat.
    ///
    /// The handler runs once with a fresh session; if it asks a query the
    /// session is persisted, if it finishes immediately nothing is stored.
    /// Any session previously active for this user and chat is replaced.
    ///
    /// # Errors
    ///
    /// Fails when no dialog is registered under `dialog`, when the handler
    /// fails or breaks its contract, or when the session cannot be stored.
    pub async fn start_dialog(
        &self,
        user_id: i64,
        chat_id: i64,
        is_private: bool,
        dialog: &str,
    ) -> EngineResult<()> {
        let handler = self
            .registry
            .get(dialog)
            .ok_or_else(|| EngineError::unknown_dialog(dialog))?;
        let mut session = DialogSession::new(user_id, chat_id, dialog, is_private);
        info!(user_id, chat_id, dialog = %dialog, "starting dialog");

        let Some((step, notices)) = self.run_guarded(&session, &handler).await else {
            return Err(EngineError::Handler(format!("dialog {dialog} failed to start")));
        };
        self.flush_notices(chat_id, notices).await;

        match step {
            Step::Retry => Err(EngineError::contract(format!(
                "dialog {dialog} returned retry with no pending query"
            ))),
            Step::Done => Ok(()),
            Step::Ask(query) => {
                self.deliver(&mut session, query).await;
                let bytes = serde_json::to_vec(&session)?;
                self.store
                    .set(&session.key(), &bytes, self.config.session_ttl)
                    .await?;
                Ok(())
            }
        }
    }

    async fn load(&self, key: &str) -> Option<DialogSession> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to load session");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                error!(key = %key, error = %e, "corrupt session, dropping it");
                self.remove(key).await;
                None
            }
        }
    }

    async fn persist(&self, session: &DialogSession) {
        let key = session.key();
        let bytes = match serde_json::to_vec(session) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(key = %key, error = %e, "failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.store.set(&key, &bytes, self.config.session_ttl).await {
            error!(key = %key, error = %e, "failed to save session");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.store.del(key).await {
            error!(key = %key, error = %e, "failed to delete session");
        }
    }

    /// Run the handler behind the fault barrier.
    ///
    /// `None` means the handler failed or panicked; the caller abandons
    /// the dialog.
    async fn run_guarded(
        &self,
        session: &DialogSession,
        handler: &Arc<dyn DialogHandler>,
    ) -> Option<(Step, Vec<String>)> {
        let mut turn = DialogTurn::new(session, Arc::clone(&self.transport));
        let outcome = AssertUnwindSafe(handler.advance(&mut turn))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(step)) => Some((step, turn.take_notices())),
            Ok(Err(e)) => {
                error!(dialog = %session.dialog, error = %e, "dialog handler failed, abandoning dialog");
                None
            }
            Err(payload) => {
                error!(
                    dialog = %session.dialog,
                    panic = %panic_message(payload.as_ref()),
                    "dialog handler panicked, abandoning dialog"
                );
                None
            }
        }
    }

    async fn flush_notices(&self, chat_id: i64, notices: Vec<String>) {
        for text in notices {
            if let Err(e) = self.transport.send_text(chat_id, &text, None).await {
                error!(chat_id, error = %e, "failed to send notice");
            }
        }
    }

    /// Send a freshly asked query and record it as pending.
    ///
    /// A failed send is logged and the state still advances; the prompt
    /// keeps no delivered message id, so in group chats nothing can reply
    /// to it until the dialog is restarted.
    async fn deliver(&self, session: &mut DialogSession, query: Query) {
        let mut query = query;
        let keyboard = query.keyboard(&BTreeSet::new());
        match self
            .transport
            .send_prompt(session.chat_id, &query.prompt, keyboard.as_ref())
            .await
        {
            Ok(message_id) => query.delivered_message_id = Some(message_id),
            Err(e) => {
                error!(chat_id = session.chat_id, query = %query.name, error = %e, "failed to deliver query");
            }
        }
        session.advance_to(query);
    }

    async fn redraw(&self, session: &DialogSession) {
        let Some(pending) = session.pending_query() else {
            return;
        };
        let Some(message_id) = pending.delivered_message_id else {
            debug!(query = %pending.name, "pending query was never delivered, skipping redraw");
            return;
        };
        let keyboard = session.keyboard_for(&pending.name);
        if let Err(e) = self
            .transport
            .edit_prompt(session.chat_id, message_id, &pending.prompt, keyboard.as_ref())
            .await
        {
            error!(chat_id = session.chat_id, message_id, error = %e, "failed to redraw keyboard");
        }
    }
}

impl fmt::Debug for DialogEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogEngine")
            .field("dialogs", &self.registry.names())
            .field("session_ttl", &self.config.session_ttl)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Builder for [`DialogEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn SessionStore>>,
    transport: Option<Arc<dyn Transport>>,
    registry: HandlerRegistry,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Create a builder with defaults: in-memory store, 24h session TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session store. Defaults to [`MemoryStore`].
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the transport. Required.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register a dialog handler under `name`.
    #[must_use]
    pub fn dialog(mut self, name: impl Into<String>, handler: impl DialogHandler + 'static) -> Self {
        self.registry.register(name, handler);
        self
    }

    /// Set the session TTL.
    #[must_use]
    pub const fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    /// Build the engine.
    ///
    /// # Panics
    ///
    /// Panics if no transport was set.
    #[must_use]
    pub fn build(self) -> DialogEngine {
        DialogEngine {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            transport: self.transport.expect("transport is required"),
            registry: self.registry,
            config: self.config,
        }
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("dialogs", &self.registry.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
