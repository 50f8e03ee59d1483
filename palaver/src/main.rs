//! Palaver demo bot - fruit surveys and file uploads over Telegram.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use palaver::prelude::*;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const FRUITS: [&str; 5] = ["Apple", "Orange", "Banana", "Grapes", "Melon"];

/// Palaver demo bot - dialogs over Telegram
#[derive(Parser, Debug)]
#[command(name = "palaver")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Telegram bot API token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Bot username for /command@name addressing (fetched from the API if omitted)
    #[arg(long)]
    bot_name: Option<String>,

    /// Persist sessions under this directory instead of in memory
    #[arg(long)]
    sessions_dir: Option<PathBuf>,

    /// Hours an unanswered dialog survives
    #[arg(long, default_value_t = 24)]
    session_ttl_hours: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("palaver=debug")
    } else {
        EnvFilter::new("palaver=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

/// Asks which fruits and why, then echoes the answers back.
fn survey_dialog() -> BuiltDialog {
    DialogBuilder::new()
        .ask_multi_choice_validated("Pick your favorite fruits", FRUITS, |choices: &[usize]| {
            if choices.is_empty() {
                return Err(ValidationError::new("pick at least one"));
            }
            Ok(())
        })
        .ask_text_validated("Why?", |text: &str| {
            if text.trim().len() < 2 {
                return Err(ValidationError::new("please write a longer response"));
            }
            Ok(())
        })
        .finalize(|turn, responses| {
            let picked: Vec<&str> = responses
                .first()
                .and_then(StepResponse::as_choices)
                .unwrap_or(&[])
                .iter()
                .filter_map(|&index| FRUITS.get(index).copied())
                .collect();
            let why = responses
                .get(1)
                .and_then(StepResponse::as_text)
                .unwrap_or("");
            turn.notify(format!(
                "You picked {} because: {why}",
                picked.join(", ")
            ));
            Ok(())
        })
        .build()
}

/// Accepts any file and replies with its first bytes in hex.
fn upload_dialog() -> BuiltDialog {
    DialogBuilder::new()
        .ask_file("Send me any file")
        .finalize_with(HeadDump)
        .build()
}

struct HeadDump;

#[async_trait]
impl Finalize for HeadDump {
    async fn finish(&self, turn: &mut DialogTurn<'_>, responses: Vec<StepResponse>) -> Result<()> {
        let Some(attachment) = responses.first().and_then(StepResponse::as_file) else {
            return Ok(());
        };
        let mut stream = attachment.open().await?;
        let mut head = [0_u8; 4];
        let n = stream.read(&mut head).await?;
        let hex: String = head[..n].iter().map(|b| format!("{b:02x}")).collect();
        turn.notify(format!("Your file starts with 0x{hex}"));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let store: Arc<dyn SessionStore> = match args.sessions_dir {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };

    let mut builder = Bot::builder(args.token)
        .store(store)
        .session_ttl(Duration::from_secs(args.session_ttl_hours * 60 * 60))
        .dialog("survey", survey_dialog())
        .dialog("upload", upload_dialog())
        .command(
            "hello",
            CommandFn::new(|ctx, _args| {
                Box::pin(async move {
                    ctx.reply("Hello!").await?;
                    Ok(())
                })
            })
            .describe("say hello"),
        )
        .command(
            "survey",
            CommandFn::new(|ctx, _args| {
                Box::pin(async move {
                    ctx.start_dialog("survey").await?;
                    Ok(())
                })
            })
            .describe("run the fruit survey"),
        )
        .command(
            "upload",
            CommandFn::new(|ctx, _args| {
                Box::pin(async move {
                    ctx.start_dialog("upload").await?;
                    Ok(())
                })
            })
            .describe("inspect an uploaded file"),
        )
        .default_handler(|ctx, _text| {
            Box::pin(async move {
                ctx.reply("I only understand /hello, /survey and /upload.")
                    .await?;
                Ok(())
            })
        });
    if let Some(name) = args.bot_name {
        builder = builder.bot_name(name);
    }

    builder.build().run().await;
    Ok(())
}
