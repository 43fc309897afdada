//! Runtime orchestration: payload ingestion and command wiring.
//!
//! ```rust,ignore
//! use gantry_runtime::GantryRuntime;
//!
//! let runtime = GantryRuntime::builder()
//!     .config_file("gantry.toml")
//!     .build()?;
//!
//! runtime.attach_commands(commands)?;
//! runtime.attach_interactions(interactions)?;
//!
//! let (tx, rx) = runtime.channel();
//! // hand `tx` to whatever reads the gateway proxy
//! runtime.run_until_ctrl_c(rx).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, ConfigResult, GantryConfig};
use crate::error::RuntimeResult;
use crate::logging;
use gantry_core::Payload;
use gantry_core::model::{Interaction, InteractionType, Message};
use gantry_framework::{
    CommandContext, CommandTree, Dispatcher, EventContext, HandlerOutcome, HandlerResult,
    InteractionTree, PrefixMatcher, events,
};

// =============================================================================
// Payload sources
// =============================================================================

/// Where raw payload bytes come from.
///
/// `None` means the source is exhausted and ingestion should stop.
#[async_trait]
pub trait PayloadSource: Send {
    async fn recv(&mut self) -> Option<Vec<u8>>;
}

#[async_trait]
impl PayloadSource for mpsc::Receiver<Vec<u8>> {
    async fn recv(&mut self) -> Option<Vec<u8>> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait]
impl PayloadSource for mpsc::UnboundedReceiver<Vec<u8>> {
    async fn recv(&mut self) -> Option<Vec<u8>> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

// =============================================================================
// GantryRuntime
// =============================================================================

/// Ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Payloads read from the source.
    pub received: u64,
    /// Payloads whose envelope failed to parse.
    pub malformed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    malformed: AtomicU64,
}

/// Reads payloads from a [`PayloadSource`] and dispatches each on its own
/// task.
///
/// Dispatch is fire-and-forget: nothing orders or awaits the spawned tasks,
/// and stopping ingestion abandons whatever is still in flight.
pub struct GantryRuntime {
    config: GantryConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    counters: Counters,
}

impl GantryRuntime {
    /// Loads configuration from the current directory, falling back to
    /// defaults if that fails, and initialises logging.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: failed to load config ({e}), using defaults");
                GantryConfig::default()
            });
        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Initialises logging from `config` and creates a runtime around a
    /// fresh [`Dispatcher`].
    pub fn from_config(config: &GantryConfig) -> Self {
        logging::init_from_config(&config.logging);
        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );
        Self::with_dispatcher(config, Dispatcher::new())
    }

    /// Creates a runtime around an already configured dispatcher, e.g. one
    /// carrying an entity fetcher or custom event entries. Logging is left
    /// alone.
    pub fn with_dispatcher(config: &GantryConfig, dispatcher: Dispatcher) -> Self {
        let dispatcher = dispatcher.log_unknown_events(config.dispatch.log_unknown_events);
        Self {
            config: config.clone(),
            dispatcher: Arc::new(dispatcher),
            shutdown: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &GantryConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// A bounded channel sized by `dispatch.channel_capacity`, whose
    /// receiver can be passed to [`run`](Self::run).
    pub fn channel(&self) -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
        mpsc::channel(self.config.dispatch.channel_capacity.max(1))
    }

    /// The prefix matcher described by the `commands` section.
    pub fn prefix_matcher(&self) -> PrefixMatcher {
        let commands = &self.config.commands;
        PrefixMatcher::new(commands.prefixes.iter().cloned())
            .with_mention(commands.mention_prefix)
            .case_insensitive(commands.case_insensitive)
    }

    /// An empty command tree honouring `commands.case_insensitive`.
    pub fn command_tree(&self) -> CommandTree {
        CommandTree::new().case_insensitive(self.config.commands.case_insensitive)
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            received: self.counters.received.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops ingestion. Tasks already spawned keep running.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // -------------------------------------------------------------------------
    // Command wiring
    // -------------------------------------------------------------------------

    /// Runs `tree` for every `MESSAGE_CREATE` that starts with a configured
    /// prefix.
    ///
    /// Command errors and handler failures are returned from the callback,
    /// so they reach `ERROR` callbacks like any other callback failure.
    pub fn attach_commands(&self, tree: CommandTree) -> RuntimeResult<()> {
        self.attach_commands_with(tree, self.prefix_matcher())
    }

    /// Like [`attach_commands`](Self::attach_commands) with an explicit
    /// prefix matcher.
    pub fn attach_commands_with(
        &self,
        tree: CommandTree,
        matcher: PrefixMatcher,
    ) -> RuntimeResult<()> {
        let tree = Arc::new(tree);
        let matcher = Arc::new(matcher);
        debug!(commands = tree.len(), prefixes = ?matcher.prefixes(), "Attaching text commands");

        self.dispatcher
            .on::<events::MessageCreate, _, _>(move |ctx, message| {
                let tree = Arc::clone(&tree);
                let matcher = Arc::clone(&matcher);
                async move { run_text_command(&tree, &matcher, ctx, message).await }
            })?;
        Ok(())
    }

    /// Runs `tree` for every application-command `INTERACTION_CREATE`.
    pub fn attach_interactions(&self, tree: InteractionTree) -> RuntimeResult<()> {
        let tree = Arc::new(tree);
        debug!(commands = tree.len(), "Attaching structured commands");

        self.dispatcher
            .on::<events::InteractionCreate, _, _>(move |ctx, interaction| {
                let tree = Arc::clone(&tree);
                async move { run_interaction(&tree, ctx, interaction).await }
            })?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Ingestion
    // -------------------------------------------------------------------------

    /// Parses one raw payload and spawns its dispatch.
    ///
    /// Returns `None` when the envelope is malformed; that payload is
    /// dropped with a warning.
    pub fn ingest(&self, bytes: &[u8]) -> Option<JoinHandle<()>> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        match Payload::from_slice(bytes) {
            Ok(payload) => Some(self.dispatcher.spawn_dispatch(payload)),
            Err(err) => {
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, len = bytes.len(), "Dropping malformed payload");
                None
            }
        }
    }

    /// Ingests from `source` until it is exhausted or shutdown is requested.
    pub async fn run<S: PayloadSource>(&self, mut source: S) -> RuntimeResult<()> {
        info!(
            events = self.dispatcher.event_names().len(),
            "Gantry runtime is now running"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping ingestion");
                    break;
                }
                bytes = source.recv() => match bytes {
                    Some(bytes) => {
                        self.ingest(&bytes);
                    }
                    None => {
                        info!("Payload source closed");
                        break;
                    }
                },
            }
        }

        let stats = self.stats();
        info!(
            received = stats.received,
            malformed = stats.malformed,
            "Gantry runtime stopped"
        );
        Ok(())
    }

    /// Ingests until `source` is exhausted or `shutdown` completes.
    pub async fn run_until<S, F>(&self, source: S, shutdown: F) -> RuntimeResult<()>
    where
        S: PayloadSource,
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run(source) => result,
            _ = shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    /// Ingests until `source` is exhausted or Ctrl+C is received.
    pub async fn run_until_ctrl_c<S: PayloadSource>(&self, source: S) -> RuntimeResult<()> {
        tokio::select! {
            result = self.run(source) => result,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Received Ctrl+C, shutting down");
                self.shutdown();
                Ok(())
            }
        }
    }
}

impl Default for GantryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GantryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GantryRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("stats", &self.stats())
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}

fn outcome_into_result(outcome: HandlerOutcome) -> HandlerResult {
    match outcome {
        HandlerOutcome::Completed => Ok(()),
        HandlerOutcome::Failed(err) => Err(err),
        HandlerOutcome::Aborted(fault) => Err(fault.into()),
    }
}

async fn run_text_command(
    tree: &CommandTree,
    matcher: &PrefixMatcher,
    ctx: EventContext,
    message: Arc<Message>,
) -> HandlerResult {
    if message.author.bot {
        return Ok(());
    }
    let bot_id = ctx.identity().map(|user| user.id);
    let Some((prefix, view)) = matcher.strip(&message.content, bot_id) else {
        return Ok(());
    };

    let base = CommandContext::from_message(ctx, message).with_prefix(prefix);
    outcome_into_result(tree.invoke(base, view).await?)
}

async fn run_interaction(
    tree: &InteractionTree,
    ctx: EventContext,
    interaction: Arc<Interaction>,
) -> HandlerResult {
    if interaction.kind != InteractionType::ApplicationCommand {
        return Ok(());
    }
    outcome_into_result(tree.invoke(ctx, interaction).await?)
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builds a [`GantryRuntime`] from layered configuration.
///
/// ```rust,ignore
/// let runtime = GantryRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .dispatcher(Dispatcher::new().with_fetcher(fetcher))
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    dispatcher: Option<Dispatcher>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            dispatcher: None,
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: GantryConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses this dispatcher instead of a fresh one.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Loads configuration, initialises logging and builds the runtime.
    pub fn build(self) -> ConfigResult<GantryRuntime> {
        let config = self.config_loader.load()?;
        logging::init_from_config(&config.logging);
        let dispatcher = self.dispatcher.unwrap_or_default();
        Ok(GantryRuntime::with_dispatcher(&config, dispatcher))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_framework::dispatcher::names;
    use gantry_framework::{ArgumentType, Command, InteractionCommand, Parameter};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn runtime(config: GantryConfig) -> GantryRuntime {
        GantryRuntime::with_dispatcher(&config, Dispatcher::new())
    }

    fn message(content: &str, bot: bool) -> Value {
        json!({
            "id": "10",
            "channel_id": "20",
            "guild_id": "30",
            "author": { "id": "7", "username": "alice", "bot": bot },
            "content": content
        })
    }

    fn payload(kind: &str, data: &Value) -> Payload {
        Payload::new(kind, data).unwrap().with_metadata("app", "app-0")
    }

    fn recording_errors(runtime: &GantryRuntime) -> Arc<Mutex<Vec<String>>> {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        runtime
            .dispatcher()
            .on::<events::Error, _, _>(move |_, error| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(format!("{}: {}", error.origin, error.failure));
                    Ok(())
                }
            })
            .unwrap();
        errors
    }

    fn echo_tree(runtime: &GantryRuntime, seen: Arc<Mutex<Vec<String>>>) -> CommandTree {
        let mut tree = runtime.command_tree();
        tree.add(
            Command::new("echo")
                .param(Parameter::required("text", ArgumentType::Fill))
                .handler(move |ctx| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let text = ctx.args().get("text").unwrap().unwrap_str().to_string();
                        seen.lock().push(format!("{}{}", ctx.prefix(), text));
                        Ok(())
                    }
                }),
        )
        .unwrap();
        tree
    }

    #[tokio::test]
    async fn test_prefixed_message_runs_command() {
        let runtime = runtime(GantryConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        runtime
            .attach_commands(echo_tree(&runtime, Arc::clone(&seen)))
            .unwrap();

        let dispatcher = runtime.dispatcher();
        dispatcher
            .dispatch(&payload(names::MESSAGE_CREATE, &message("!echo hi there", false)))
            .await
            .unwrap();
        dispatcher
            .dispatch(&payload(names::MESSAGE_CREATE, &message("echo ignored", false)))
            .await
            .unwrap();
        dispatcher
            .dispatch(&payload(names::MESSAGE_CREATE, &message("!echo from a bot", true)))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["!hi there"]);
    }

    #[tokio::test]
    async fn test_command_errors_surface_as_error_events() {
        let runtime = runtime(GantryConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        runtime.attach_commands(echo_tree(&runtime, seen)).unwrap();
        let errors = recording_errors(&runtime);

        let report = runtime
            .dispatcher()
            .dispatch(&payload(names::MESSAGE_CREATE, &message("!nope", false)))
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(
            *errors.lock(),
            vec!["MESSAGE_CREATE: command 'nope' not found"]
        );
    }

    #[tokio::test]
    async fn test_mention_prefix_uses_ready_identity() {
        let mut config = GantryConfig::default();
        config.commands.mention_prefix = true;
        config.commands.case_insensitive = true;
        let runtime = runtime(config);
        let seen = Arc::new(Mutex::new(Vec::new()));
        runtime
            .attach_commands(echo_tree(&runtime, Arc::clone(&seen)))
            .unwrap();
        let dispatcher = runtime.dispatcher();

        // Unknown identity: the mention is not a prefix yet.
        dispatcher
            .dispatch(&payload(names::MESSAGE_CREATE, &message("<@42> echo early", false)))
            .await
            .unwrap();

        let ready = json!({ "v": 10, "user": { "id": "42", "username": "gantry", "bot": true } });
        dispatcher.dispatch(&payload(names::READY, &ready)).await.unwrap();
        dispatcher
            .dispatch(&payload(names::MESSAGE_CREATE, &message("<@!42> ECHO late", false)))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["<@!42>late"]);
    }

    #[tokio::test]
    async fn test_interactions_are_routed() {
        let runtime = runtime(GantryConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut tree = InteractionTree::new();
        tree.add(
            InteractionCommand::new("ping")
                .describe("Replies with pong")
                .handler(move |ctx| {
                    let sink = Arc::clone(&sink);
                    async move {
                        sink.lock().push(ctx.command().to_string());
                        Ok(())
                    }
                }),
        )
        .unwrap();
        runtime.attach_interactions(tree).unwrap();
        let errors = recording_errors(&runtime);

        let interaction = |kind: u8, name: &str| {
            json!({
                "id": "1",
                "application_id": "2",
                "type": kind,
                "token": "t",
                "data": { "id": "3", "name": name }
            })
        };
        let dispatcher = runtime.dispatcher();
        dispatcher
            .dispatch(&payload(names::INTERACTION_CREATE, &interaction(2, "ping")))
            .await
            .unwrap();
        // Component interactions are not commands.
        dispatcher
            .dispatch(&payload(names::INTERACTION_CREATE, &interaction(3, "ping")))
            .await
            .unwrap();
        dispatcher
            .dispatch(&payload(names::INTERACTION_CREATE, &interaction(2, "pong")))
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec!["ping"]);
        assert_eq!(
            *errors.lock(),
            vec!["INTERACTION_CREATE: command 'pong' not found"]
        );
    }

    #[tokio::test]
    async fn test_ingest_counts_malformed_payloads() {
        let runtime = runtime(GantryConfig::default());
        assert!(runtime.ingest(b"not json").is_none());

        let bytes = serde_json::to_vec(&json!({ "type": "RESUMED", "data": {} })).unwrap();
        let handle = runtime.ingest(&bytes).unwrap();
        handle.await.unwrap();

        assert_eq!(
            runtime.stats(),
            RuntimeStats {
                received: 2,
                malformed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_run_dispatches_until_source_closes() {
        let runtime = runtime(GantryConfig::default());
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        runtime
            .dispatcher()
            .on::<events::Resumed, _, _>(move |_, ()| {
                let done_tx = done_tx.clone();
                async move {
                    let _ = done_tx.send(());
                    Ok(())
                }
            })
            .unwrap();

        let (tx, rx) = runtime.channel();
        let body = serde_json::to_vec(&json!({ "type": "RESUMED", "data": {} })).unwrap();
        tx.send(body.clone()).await.unwrap();
        tx.send(body).await.unwrap();
        drop(tx);

        runtime.run(rx).await.unwrap();
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        assert_eq!(runtime.stats().received, 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_ingestion() {
        let runtime = runtime(GantryConfig::default());
        let (_tx, rx) = runtime.channel();

        runtime.shutdown();
        tokio::time::timeout(Duration::from_secs(5), runtime.run(rx))
            .await
            .unwrap()
            .unwrap();

        let runtime = GantryRuntime::with_dispatcher(&GantryConfig::default(), Dispatcher::new());
        let (_tx, rx) = runtime.channel();
        tokio::time::timeout(Duration::from_secs(5), runtime.run_until(rx, async {}))
            .await
            .unwrap()
            .unwrap();
        assert!(runtime.shutdown_token().is_cancelled());
    }

    #[test]
    fn test_prefix_matcher_from_config() {
        let mut config = GantryConfig::default();
        config.commands.prefixes = vec!["?".into(), "??".into()];
        let matcher = runtime(config).prefix_matcher();
        assert_eq!(matcher.prefixes(), ["??", "?"]);
    }
}
