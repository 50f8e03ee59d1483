//! Telegram front end.
//!
//! [`Bot`] glues the pieces together for a Telegram deployment: the API
//! handle, a [`DialogEngine`] wired to a [`TelegramTransport`], and the
//! command registry. [`Bot::run`] starts a long-polling dispatcher that
//! routes every update:
//!
//! - slash commands always win, even mid-dialog
//! - everything else is offered to the engine first
//! - unclaimed text goes to the default handler, unclaimed files are
//!   dropped, unclaimed button presses are answered with a notice
//!
//! Updates are applied strictly one at a time across the whole process,
//! so a redelivered update always sees the session state its original
//! left behind.

mod download;
mod transport;

pub use transport::TelegramTransport;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use teloxide::dptree;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandRegistry, parse_command};
use crate::context::Context;
use crate::engine::{DialogEngine, EngineBuilder};
use crate::error::Result;
use crate::event::{ChatEvent, FileRef};
use crate::handler::DialogHandler;
use crate::store::SessionStore;
use crate::transport::Transport;

type DefaultHandler = Box<dyn Fn(Context, String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct BotState {
    engine: Arc<DialogEngine>,
    commands: CommandRegistry,
    bot_name: Option<String>,
    default_handler: Option<DefaultHandler>,
    /// Serializes update handling; dialog state transitions are
    /// sequential per process.
    dispatch_lock: Mutex<()>,
}

/// A Telegram bot serving dialogs and commands.
pub struct Bot {
    api: teloxide::Bot,
    state: BotState,
}

impl Bot {
    /// Start building a bot around an API token.
    pub fn builder(token: impl Into<String>) -> BotBuilder {
        BotBuilder::new(token)
    }

    /// The dialog engine behind this bot.
    #[must_use]
    pub const fn engine(&self) -> &Arc<DialogEngine> {
        &self.state.engine
    }

    /// The raw API handle.
    #[must_use]
    pub const fn api(&self) -> &teloxide::Bot {
        &self.api
    }

    /// Run the long-polling dispatcher until shutdown.
    ///
    /// If no bot name was configured, the authorized username is fetched
    /// and used for `/command@name` addressing in group chats.
    pub async fn run(self) {
        let Self { api, mut state } = self;

        match api.get_me().await {
            Ok(me) => {
                info!(username = me.username(), "bot authorized");
                if state.bot_name.is_none() {
                    state.bot_name = Some(me.username().to_owned());
                }
            }
            Err(e) => warn!(error = %e, "could not fetch bot identity"),
        }

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handle_message))
            .branch(Update::filter_callback_query().endpoint(handle_callback));

        Dispatcher::builder(api, handler)
            .dependencies(dptree::deps![Arc::new(state)])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("bot_name", &self.state.bot_name)
            .field("commands", &self.state.commands.names())
            .finish_non_exhaustive()
    }
}

async fn handle_message(state: Arc<BotState>, msg: Message) -> ResponseResult<()> {
    let Some(user) = &msg.from else {
        return Ok(());
    };
    let user_id = i64::try_from(user.id.0).unwrap_or_default();
    let chat_id = msg.chat.id.0;
    let message_id = msg.id.0;
    let is_private = msg.chat.is_private();
    let reply_to = msg.reply_to_message().map(|replied| replied.id.0);

    let _turn = state.dispatch_lock.lock().await;

    if let Some(text) = msg.text() {
        if let Some(command) = parse_command(text, state.bot_name.as_deref()) {
            let ctx = Context::new(
                Arc::clone(&state.engine),
                user_id,
                chat_id,
                message_id,
                is_private,
            );
            debug!(command = %command.name, user_id, chat_id, "dispatching command");
            if let Err(e) = state.commands.dispatch(&command.name, &ctx, &command.args).await {
                warn!(command = %command.name, error = %e, "command failed");
                if let Err(e) = ctx.reply(&e.to_string()).await {
                    warn!(error = %e, "could not report command failure");
                }
            }
            return Ok(());
        }

        let mut event = ChatEvent::text(user_id, chat_id, message_id, text);
        if let Some(reply_to) = reply_to {
            event = event.with_reply_to(reply_to);
        }
        if state.engine.handle_event(&event).await.is_handled() {
            return Ok(());
        }
        if let Some(fallback) = &state.default_handler {
            let ctx = Context::new(
                Arc::clone(&state.engine),
                user_id,
                chat_id,
                message_id,
                is_private,
            );
            if let Err(e) = fallback(ctx, text.to_owned()).await {
                warn!(error = %e, "default handler failed");
            }
        }
        return Ok(());
    }

    if let Some(file_id) = harvest_file_id(&msg) {
        let mut event = ChatEvent::file(user_id, chat_id, message_id, FileRef::new(file_id));
        if let Some(reply_to) = reply_to {
            event = event.with_reply_to(reply_to);
        }
        if !state.engine.handle_event(&event).await.is_handled() {
            debug!(user_id, chat_id, "file outside any dialog, ignoring");
        }
        return Ok(());
    }

    debug!(chat_id, "unsupported message kind, ignoring");
    Ok(())
}

async fn handle_callback(
    bot: teloxide::Bot,
    state: Arc<BotState>,
    q: CallbackQuery,
) -> ResponseResult<()> {
    let (Some(data), Some(message)) = (&q.data, &q.message) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let user_id = i64::try_from(q.from.id.0).unwrap_or_default();
    let chat_id = message.chat().id.0;
    let message_id = message.id().0;

    let _turn = state.dispatch_lock.lock().await;

    let event = ChatEvent::button(user_id, chat_id, message_id, data.clone());
    let handling = state.engine.handle_event(&event).await;

    let answer = bot.answer_callback_query(q.id.clone());
    if handling.is_handled() {
        answer.await?;
    } else {
        answer.text("Input not handled").await?;
    }
    Ok(())
}

/// The file id carried by a message, if any.
///
/// Photos arrive in several resolutions; the largest one wins.
fn harvest_file_id(msg: &Message) -> Option<String> {
    if let Some(document) = msg.document() {
        return Some(document.file.id.clone());
    }
    if let Some(sizes) = msg.photo() {
        return sizes.last().map(|size| size.file.id.clone());
    }
    if let Some(video) = msg.video() {
        return Some(video.file.id.clone());
    }
    if let Some(audio) = msg.audio() {
        return Some(audio.file.id.clone());
    }
    if let Some(voice) = msg.voice() {
        return Some(voice.file.id.clone());
    }
    if let Some(video_note) = msg.video_note() {
        return Some(video_note.file.id.clone());
    }
    if let Some(sticker) = msg.sticker() {
        return Some(sticker.file.id.clone());
    }
    None
}

/// Builder for [`Bot`].
#[must_use]
pub struct BotBuilder {
    token: String,
    bot_name: Option<String>,
    engine: EngineBuilder,
    commands: CommandRegistry,
    default_handler: Option<DefaultHandler>,
}

impl BotBuilder {
    fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            bot_name: None,
            engine: DialogEngine::builder(),
            commands: CommandRegistry::new(),
            default_handler: None,
        }
    }

    /// Set the bot's username for `/command@name` addressing. When unset,
    /// [`Bot::run`] fills it in from the API.
    pub fn bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = Some(name.into());
        self
    }

    /// Set the session store. Defaults to the in-memory store.
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.engine = self.engine.store(store);
        self
    }

    /// Set the dialog session TTL.
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.engine = self.engine.session_ttl(ttl);
        self
    }

    /// Register a dialog handler under `name`.
    pub fn dialog(mut self, name: impl Into<String>, handler: impl DialogHandler + 'static) -> Self {
        self.engine = self.engine.dialog(name, handler);
        self
    }

    /// Register a slash command under `name`, without the leading slash.
    pub fn command(mut self, name: impl Into<String>, command: impl Command + 'static) -> Self {
        self.commands.register(name, command);
        self
    }

    /// Handle text that neither a command nor a dialog claimed.
    pub fn default_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Context, String) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.default_handler = Some(Box::new(handler));
        self
    }

    /// Build the bot.
    #[must_use]
    pub fn build(self) -> Bot {
        let api = teloxide::Bot::new(self.token);
        let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(api.clone()));
        let engine = Arc::new(self.engine.transport(transport).build());
        Bot {
            api,
            state: BotState {
                engine,
                commands: self.commands,
                bot_name: self.bot_name,
                default_handler: self.default_handler,
                dispatch_lock: Mutex::new(()),
            },
        }
    }
}

impl fmt::Debug for BotBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotBuilder")
            .field("bot_name", &self.bot_name)
            .field("commands", &self.commands.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandFn;

    #[test]
    fn test_builder_assembles_state() {
        let bot = Bot::builder("123:fake-token")
            .bot_name("palaver_bot")
            .command(
                "ping",
                CommandFn::new(|ctx, _args| {
                    Box::pin(async move {
                        ctx.say("pong").await?;
                        Ok(())
                    })
                }),
            )
            .default_handler(|ctx, text| {
                Box::pin(async move {
                    ctx.reply(&text).await?;
                    Ok(())
                })
            })
            .build();

        assert_eq!(bot.state.commands.names(), vec!["ping"]);
        assert_eq!(bot.state.bot_name.as_deref(), Some("palaver_bot"));
        assert!(bot.state.default_handler.is_some());
        assert_eq!(bot.engine().session_ttl(), crate::engine::DEFAULT_SESSION_TTL);
    }
}
