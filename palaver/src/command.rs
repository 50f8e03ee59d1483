//! Slash command registration and dispatch.
//!
//! Commands are the usual entry points into dialogs: a [`Command`] gets a
//! [`Context`] for the chat it was typed in plus the whitespace-split
//! arguments after the command name. [`parse_command`] understands the
//! `/name@botname` addressing used in group chats, so commands aimed at
//! another bot are ignored.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::context::Context;
use crate::error::{CommandError, CommandResult};

/// A slash command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Run the command.
    ///
    /// `args` holds the whitespace-split tokens after the command name.
    ///
    /// # Errors
    ///
    /// Command errors are reported back to the chat by the caller.
    async fn run(&self, ctx: &Context, args: &[String]) -> CommandResult<()>;

    /// One-line description for help output.
    fn description(&self) -> &str {
        ""
    }
}

/// Adapts an async closure into a [`Command`].
///
/// The closure receives an owned [`Context`] and argument vector, so the
/// returned future borrows nothing:
///
/// ```ignore
/// CommandFn::new(|ctx, _args| {
///     Box::pin(async move { Ok(ctx.say("hello").await?) })
/// })
/// ```
pub struct CommandFn<F> {
    run: F,
    description: String,
}

impl<F> CommandFn<F>
where
    F: Fn(Context, Vec<String>) -> BoxFuture<'static, CommandResult<()>> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(run: F) -> Self {
        Self {
            run,
            description: String::new(),
        }
    }

    /// Attach a help description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl<F> Command for CommandFn<F>
where
    F: Fn(Context, Vec<String>) -> BoxFuture<'static, CommandResult<()>> + Send + Sync,
{
    async fn run(&self, ctx: &Context, args: &[String]) -> CommandResult<()> {
        (self.run)(ctx.clone(), args.to_vec()).await
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> fmt::Debug for CommandFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFn")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Commands known to a bot, looked up by name without the leading slash.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command under `name`, lowercased. A later registration
    /// under the same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, command: impl Command + 'static) {
        let name = name.into().to_lowercase();
        debug!(command = %name, "command registered");
        self.commands.insert(name, Arc::new(command));
    }

    /// Look up a command. Names match case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_lowercase()).cloned()
    }

    /// Registered command names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run the named command.
    ///
    /// # Errors
    ///
    /// Fails with [`CommandError::Unknown`] for an unregistered name, or
    /// with whatever the command itself returns.
    pub async fn dispatch(
        &self,
        name: &str,
        ctx: &Context,
        args: &[String],
    ) -> CommandResult<()> {
        let command = self
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.to_owned()))?;
        command.run(ctx, args).await
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish_non_exhaustive()
    }
}

/// A message recognized as a slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name without the leading slash or bot suffix.
    pub name: String,
    /// Whitespace-split tokens after the name.
    pub args: Vec<String>,
}

/// Parse `/name arg ...` out of a message text.
///
/// Returns `None` when the text is not a command, or when it is addressed
/// to a different bot via the `/name@botname` form. `bot_name` is compared
/// case-insensitively, as usernames are.
#[must_use]
pub fn parse_command(text: &str, bot_name: Option<&str>) -> Option<ParsedCommand> {
    let mut tokens = text.split_whitespace();
    let head = tokens.next()?.strip_prefix('/')?;
    if head.is_empty() {
        return None;
    }

    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    if let (Some(target), Some(own)) = (target, bot_name) {
        if !target.eq_ignore_ascii_case(own) {
            return None;
        }
    }

    Some(ParsedCommand {
        name: name.to_owned(),
        args: tokens.map(ToOwned::to_owned).collect(),
    })
}

/// Require an exact argument count, failing with the usage string.
///
/// # Errors
///
/// Fails with [`CommandError::Usage`] on a count mismatch.
pub fn expect_args(usage: &str, args: &[String], count: usize) -> CommandResult<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(CommandError::usage(usage))
    }
}

/// Parse the argument at `index` into `T`.
///
/// # Errors
///
/// Fails with [`CommandError::BadArgument`] carrying the zero-based index
/// when the argument is missing or fails to parse.
pub fn parse_arg<T>(args: &[String], index: usize) -> CommandResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = args.get(index).ok_or_else(|| CommandError::BadArgument {
        index,
        message: "missing argument".to_owned(),
    })?;
    raw.parse().map_err(|e: T::Err| CommandError::BadArgument {
        index,
        message: e.to_string(),
    })
}
