//! Ping Bot Example
//!
//! Reads newline-delimited gateway payloads from stdin and dispatches them:
//!
//! ```bash
//! echo '{"type":"MESSAGE_CREATE","data":{"id":"1","channel_id":"2","author":{"id":"3","username":"alice"},"content":"!ping"}}' \
//!     | cargo run --package ping-bot
//! ```
//!
//! Replies are logged, since sending messages is up to whatever sits behind
//! the gateway proxy.
//!
//! ```bash
//! # Print the structured command schema and exit
//! cargo run --package ping-bot -- --export-schema
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gantry::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to gantry.toml in the current directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Print the structured command schema as JSON and exit.
    #[arg(long)]
    export_schema: bool,
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn ping(ctx: CommandContext) -> HandlerResult {
    let who = ctx.author().map(|u| u.display_name().to_string());
    info!(to = ?who, "Pong!");
    Ok(())
}

async fn echo(ctx: CommandContext) -> HandlerResult {
    info!(reply = %ctx.args().get("text")?.as_str()?, "Echo");
    Ok(())
}

async fn roll(ctx: CommandContext) -> HandlerResult {
    let sides = match ctx.args().get_opt("sides") {
        Some(arg) => *arg.as_int()?,
        None => 6,
    };
    if sides < 1 {
        return Err(format!("a die needs at least one side, got {sides}").into());
    }
    let seed = ctx.message().map_or(0, |m| m.id.0);
    info!(sides, result = seed % sides as u64 + 1, "Rolled");
    Ok(())
}

async fn user_info(ctx: CommandContext) -> HandlerResult {
    let target = ctx.args().get("target")?.as_user()?;
    info!(id = %target.id, name = %target.username, bot = target.bot, "User info");
    Ok(())
}

async fn slash_ping(ctx: InteractionContext) -> HandlerResult {
    info!(to = ?ctx.invoker().map(|u| u.username.clone()), "Pong!");
    Ok(())
}

async fn show_tag(ctx: InteractionContext) -> HandlerResult {
    let name = ctx.args().get("name")?.as_str()?;
    let channel = ctx.args().get_opt("channel").map(|c| c.unwrap_channel().id);
    info!(tag = %name, channel = ?channel, "Showing tag");
    Ok(())
}

// ============================================================================
// Command trees
// ============================================================================

fn text_commands(runtime: &GantryRuntime) -> Result<CommandTree> {
    let mut tree = runtime.command_tree();

    tree.add(Command::new("ping").describe("Replies with pong").handler(ping))?;
    tree.add(
        Command::new("echo")
            .alias("say")
            .describe("Repeats the rest of the message")
            .param(Parameter::required("text", ArgumentType::Fill))
            .handler(echo),
    )?;
    tree.add(
        Command::new("roll")
            .describe("Rolls a die")
            .param(Parameter::optional("sides", ArgumentType::Int))
            .handler(roll),
    )?;

    let user = tree.add(Command::new("user").describe("User utilities"))?;
    tree.add_under(
        user,
        Command::new("info")
            .param(Parameter::required("target", ArgumentType::User))
            .handler(user_info),
    )?;

    Ok(tree)
}

fn interactions() -> Result<InteractionTree> {
    let mut tree = InteractionTree::new();

    tree.add(
        InteractionCommand::new("ping")
            .describe("Replies with pong")
            .handler(slash_ping),
    )?;

    let tag = tree.add(InteractionCommand::new("tag").describe("Saved snippets"))?;
    tree.add_under(
        tag,
        InteractionCommand::new("show")
            .describe("Show a tag")
            .param(Parameter::required("name", ArgumentType::String).describe("Tag name"))
            .param(Parameter::optional("channel", ArgumentType::TextChannel).describe("Where"))
            .handler(show_tag),
    )?;

    Ok(tree)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = GantryRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let interactions = interactions()?;
    if cli.export_schema {
        println!("{}", serde_json::to_string_pretty(&interactions.export_schema())?);
        return Ok(());
    }

    runtime.attach_commands(text_commands(&runtime)?)?;
    runtime.attach_interactions(interactions)?;

    let dispatcher = runtime.dispatcher();
    dispatcher.on::<events::Ready, _, _>(|ctx, ready| async move {
        info!(
            identifier = %ctx.identifier(),
            user = %ready.user.username,
            guilds = ready.guilds.len(),
            "Logged in"
        );
        Ok(())
    })?;
    dispatcher.on::<events::Error, _, _>(|ctx, err| async move {
        warn!(origin = %err.origin, guild = ?ctx.guild_id(), "{}", err.failure);
        Ok(())
    })?;

    let (tx, rx) = runtime.channel();
    tokio::spawn(read_stdin(tx));

    runtime.run_until_ctrl_c(rx).await?;
    Ok(())
}

/// Forwards each stdin line as one raw payload.
async fn read_stdin(tx: mpsc::Sender<Vec<u8>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                if tx.send(line.into_bytes()).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }
}
