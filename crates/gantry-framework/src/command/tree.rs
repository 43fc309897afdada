//! The text command tree.
//!
//! Nodes live in an arena and refer to their parent by [`NodeId`]. Each node
//! owns a name → child map in which every alias is an extra key pointing at
//! the same child. A node with at least one child is a group.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{Instrument, Level, debug, span};

use super::view::StringView;
use crate::arena::{Arena, NodeId};
use crate::argument::{ArgumentType, Arguments, Parameter, validate_parameters};
use crate::context::{CommandContext, TextInvocation};
use crate::converter::ConverterRegistry;
use crate::error::{CommandError, CommandResult};
use crate::handler::{
    CommandCheck, CommandHandler, HandlerOutcome, HandlerResult, command_check, command_handler,
    isolate,
};
use gantry_core::{BoxError, BoxedReporter, LogPanicReporter};

// ============================================================================
// Command definition
// ============================================================================

/// A command definition, consumed by [`CommandTree::add`].
#[derive(Clone, Default)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: String,
    checks: Vec<CommandCheck>,
    parameters: Vec<Parameter>,
    handler: Option<CommandHandler>,
    invoke_without_child: bool,
}

impl Command {
    /// Starts a definition for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an alternative name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a check. Checks run in the order they were added.
    pub fn check<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        self.checks.push(command_check(f));
        self
    }

    /// Declares the next positional parameter.
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the handler.
    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(command_handler(f));
        self
    }

    /// For groups: run this node's own checks and handler before looking for
    /// a subcommand, and accept the invocation when no subcommand matches.
    ///
    /// When unset (the default) a group only dispatches to its children.
    pub fn invoke_without_child(mut self, enabled: bool) -> Self {
        self.invoke_without_child = enabled;
        self
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("checks", &self.checks.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

// ============================================================================
// Node
// ============================================================================

/// A registered command.
pub struct CommandNode {
    name: String,
    aliases: Vec<String>,
    description: String,
    checks: Vec<CommandCheck>,
    parameters: Vec<Parameter>,
    handler: Option<CommandHandler>,
    invoke_without_child: bool,
    children: HashMap<String, NodeId>,
    parent: Option<NodeId>,
}

impl CommandNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether the node has at least one child.
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn invokes_without_child(&self) -> bool {
        self.invoke_without_child
    }

    /// Distinct children, in no particular order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.children.values().copied().collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

impl std::fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Registry of text commands.
///
/// Built during setup, then shared read-only: [`invoke`](Self::invoke) takes
/// `&self`, so any number of invocations may traverse the tree concurrently.
pub struct CommandTree {
    nodes: Arena<CommandNode>,
    roots: HashMap<String, NodeId>,
    converters: Arc<ConverterRegistry>,
    reporter: BoxedReporter,
    case_insensitive: bool,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTree {
    /// Creates an empty tree using the built-in converters.
    pub fn new() -> Self {
        Self {
            nodes: Arena::default(),
            roots: HashMap::new(),
            converters: Arc::new(ConverterRegistry::with_builtins()),
            reporter: Arc::new(LogPanicReporter),
            case_insensitive: false,
        }
    }

    /// Uses `converters` for parameter resolution.
    pub fn with_converters(mut self, converters: Arc<ConverterRegistry>) -> Self {
        self.converters = converters;
        self
    }

    /// Reports handler panics to `reporter`.
    pub fn with_reporter(mut self, reporter: BoxedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Match names and aliases ignoring case. Set before adding commands.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn converters(&self) -> &Arc<ConverterRegistry> {
        &self.converters
    }

    fn key(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Number of registered commands, groups included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Returns a registered command.
    pub fn get(&self, id: NodeId) -> Option<&CommandNode> {
        self.nodes.get(id)
    }

    fn node(&self, id: NodeId) -> CommandResult<&CommandNode> {
        self.nodes.get(id).ok_or(CommandError::UnknownNode(id.index()))
    }

    /// Distinct top-level commands.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.roots.values().copied().collect();
        ids.sort();
        ids.dedup();
        ids
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Registers a top-level command.
    pub fn add(&mut self, command: Command) -> CommandResult<NodeId> {
        self.insert(None, command)
    }

    /// Registers `command` as a child of `parent`, turning `parent` into a group.
    pub fn add_under(&mut self, parent: NodeId, command: Command) -> CommandResult<NodeId> {
        self.node(parent)?;
        self.insert(Some(parent), command)
    }

    fn insert(&mut self, parent: Option<NodeId>, command: Command) -> CommandResult<NodeId> {
        if command.name.trim().is_empty() || command.name.contains(char::is_whitespace) {
            return Err(CommandError::invalid_definition(format!(
                "command name '{}' must be a single non-empty word",
                command.name
            )));
        }
        validate_parameters(&command.parameters)?;

        let keys: Vec<String> = std::iter::once(&command.name)
            .chain(&command.aliases)
            .map(|k| self.key(k))
            .collect();
        let siblings = match parent {
            Some(id) => &self.node(id)?.children,
            None => &self.roots,
        };
        for (i, key) in keys.iter().enumerate() {
            if siblings.contains_key(key) || keys[..i].contains(key) {
                return Err(CommandError::DuplicateRegistration { name: key.clone() });
            }
        }

        let id = self.nodes.insert(CommandNode {
            name: command.name,
            aliases: command.aliases,
            description: command.description,
            checks: command.checks,
            parameters: command.parameters,
            handler: command.handler,
            invoke_without_child: command.invoke_without_child,
            children: HashMap::new(),
            parent,
        });
        let siblings = match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        };
        for key in keys {
            siblings.insert(key, id);
        }
        debug!(command = %self.qualified_name(id).unwrap_or_default(), "Registered command");
        Ok(id)
    }

    /// Removes the command at `path` and everything below it.
    ///
    /// Alias entries are only removed when they still point at the removed
    /// node. Returns `false` if nothing matched.
    pub fn remove(&mut self, path: &str) -> bool {
        let Ok(id) = self.lookup(path) else {
            return false;
        };
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let keys: Vec<String> = node.keys().map(|k| self.key(k)).collect();
        let siblings = match node.parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        for key in keys {
            if siblings.get(&key) == Some(&id) {
                siblings.remove(&key);
            }
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(current) {
                stack.extend(removed.children.into_values());
            }
        }
        debug!(command = %path, "Removed command");
        true
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Resolves a space-separated qualified path such as `"mod ban"`.
    pub fn lookup(&self, path: &str) -> CommandResult<NodeId> {
        let not_found = || CommandError::CommandNotFound {
            name: path.to_string(),
        };
        let mut segments = path.split_whitespace();
        let first = segments.next().ok_or_else(not_found)?;
        let mut current = *self.roots.get(&self.key(first)).ok_or_else(not_found)?;
        for segment in segments {
            let node = self.node(current)?;
            current = *node.children.get(&self.key(segment)).ok_or_else(not_found)?;
        }
        Ok(current)
    }

    /// The space-separated names from the root down to `id`.
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(node_id)?;
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        Some(names.join(" "))
    }

    // ------------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------------

    /// Resolves and runs the command named at the start of `view`.
    ///
    /// Resolution failures (unknown command, failed checks, bad arguments)
    /// are returned as errors. Once a handler runs, its result, including a
    /// panic, is reported through the returned [`HandlerOutcome`].
    pub async fn invoke(
        &self,
        base: CommandContext,
        view: StringView,
    ) -> CommandResult<HandlerOutcome> {
        let mut invocation = TextInvocation::new(base, view);
        invocation.view.skip_ws();
        let name = invocation.view.get_word();
        let root = self
            .roots
            .get(&self.key(&name))
            .copied()
            .ok_or_else(|| CommandError::CommandNotFound { name: name.clone() })?;

        let span = span!(Level::DEBUG, "command", command = %name);
        self.traverse(&mut invocation, root, name)
            .instrument(span)
            .await
    }

    /// Convenience wrapper over [`invoke`](Self::invoke) for raw text.
    pub async fn invoke_str(
        &self,
        base: CommandContext,
        text: &str,
    ) -> CommandResult<HandlerOutcome> {
        self.invoke(base, StringView::new(text)).await
    }

    async fn traverse(
        &self,
        invocation: &mut TextInvocation,
        root: NodeId,
        root_name: String,
    ) -> CommandResult<HandlerOutcome> {
        let mut current = root;
        let mut invoked_with = root_name;

        loop {
            invocation.path.push(current);
            let node = self.node(current)?;
            let qualified = self.qualified_name(current).unwrap_or_default();

            if !node.is_group() {
                let ctx = invocation
                    .base
                    .targeting(qualified.clone(), &invoked_with, Arguments::new());
                self.run_checks(node, &ctx).await?;
                let args = self.resolve_parameters(node, &mut invocation.view, &ctx).await?;
                let ctx = invocation.base.targeting(qualified, &invoked_with, args);
                return Ok(self.run_handler(node, ctx).await);
            }

            let mut group_outcome = None;
            if node.invoke_without_child {
                let ctx = invocation
                    .base
                    .targeting(qualified.clone(), &invoked_with, Arguments::new());
                self.run_checks(node, &ctx).await?;
                let outcome = self.run_handler(node, ctx).await;
                if outcome.is_failure() {
                    return Ok(outcome);
                }
                group_outcome = Some(outcome);
            }

            let saved = invocation.view.index();
            invocation.view.skip_ws();
            let word = invocation.view.get_word();
            let child = if word.is_empty() {
                None
            } else {
                node.children.get(&self.key(&word)).copied()
            };

            match child {
                Some(child) => {
                    debug!(group = %qualified, child = %word, "Descending into subcommand");
                    current = child;
                    invoked_with = word;
                }
                None => {
                    invocation.view.restore(saved);
                    return match group_outcome {
                        Some(outcome) => Ok(outcome),
                        None => Err(CommandError::CommandNotFound {
                            name: if word.is_empty() {
                                qualified
                            } else {
                                format!("{qualified} {word}")
                            },
                        }),
                    };
                }
            }
        }
    }

    async fn run_checks(&self, node: &CommandNode, ctx: &CommandContext) -> CommandResult<()> {
        for check in &node.checks {
            match check(ctx.clone()).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(command = %ctx.command(), "Check vetoed command");
                    return Err(CommandError::CheckFailure {
                        command: ctx.command().to_string(),
                    });
                }
                Err(source) => {
                    return Err(CommandError::Check {
                        command: ctx.command().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    async fn resolve_parameters(
        &self,
        node: &CommandNode,
        view: &mut StringView,
        ctx: &CommandContext,
    ) -> CommandResult<Arguments> {
        let mut args = Arguments::new();
        for param in &node.parameters {
            let converter = self.converters.get(param.kind)?;

            view.skip_ws();
            let token = if param.kind == ArgumentType::Fill {
                let rest = view.read_rest();
                (!rest.is_empty()).then_some(rest)
            } else {
                view.get_quoted_word()?
            };

            match token {
                Some(token) => {
                    let request = self.converters.request(param.kind, token, ctx);
                    let argument = converter.convert(request).await?;
                    args.insert(param.name.clone(), argument);
                }
                None if param.required => return Err(CommandError::missing(&param.name)),
                None => {
                    if let Some(default) = converter.default_value() {
                        args.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(args)
    }

    async fn run_handler(&self, node: &CommandNode, ctx: CommandContext) -> HandlerOutcome {
        let Some(handler) = &node.handler else {
            debug!(command = %ctx.command(), "Command has no handler");
            return HandlerOutcome::Completed;
        };
        let command = ctx.command().to_string();
        let outcome = isolate(handler(ctx)).await;
        if let HandlerOutcome::Aborted(fault) = &outcome {
            self.reporter.report(&command, fault);
        }
        outcome
    }
}

impl std::fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTree")
            .field("commands", &self.nodes.len())
            .field("case_insensitive", &self.case_insensitive)
            .finish_non_exhaustive()
    }
}
