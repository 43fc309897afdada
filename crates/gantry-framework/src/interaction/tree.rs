//! The structured command tree.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{Instrument, Level, debug, span};

use super::options::{command_path, flatten_options};
use super::schema::parameter_options;
use crate::arena::{Arena, NodeId};
use crate::argument::{Arguments, Parameter, validate_parameters};
use crate::context::{EventContext, InteractionContext, StructuredInvocation};
use crate::converter::StructuredConverterRegistry;
use crate::error::{CommandError, CommandResult};
use crate::handler::{
    HandlerOutcome, HandlerResult, InteractionHandler, interaction_handler, isolate,
};
use gantry_core::model::{
    ApplicationCommand, ApplicationCommandOption, ApplicationCommandOptionType,
    ApplicationCommandType, Interaction, ResolvedData,
};
use gantry_core::{BoxedReporter, LogPanicReporter};

/// Nodes below this depth cannot receive children.
const MAX_DEPTH: usize = 2;

/// Where a node sits in the platform's command hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// A top-level command without children.
    Command,
    /// A node with at least one child.
    SubcommandGroup,
    /// A leaf below a top-level command or group.
    Subcommand,
}

// ============================================================================
// Command definition
// ============================================================================

/// A structured command definition, consumed by [`InteractionTree::add`].
#[derive(Clone)]
pub struct InteractionCommand {
    name: String,
    description: String,
    kind: ApplicationCommandType,
    parameters: Vec<Parameter>,
    handler: Option<InteractionHandler>,
    default_member_permissions: Option<String>,
    dm_permission: Option<bool>,
}

impl InteractionCommand {
    /// Starts a chat-input command definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind: ApplicationCommandType::ChatInput,
            parameters: Vec::new(),
            handler: None,
            default_member_permissions: None,
            dm_permission: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the command kind. Only meaningful for top-level commands;
    /// user and message commands take no options.
    pub fn kind(mut self, kind: ApplicationCommandType) -> Self {
        self.kind = kind;
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(InteractionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(interaction_handler(f));
        self
    }

    /// Permission bit set required by default, exported for top-level commands.
    pub fn default_member_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.default_member_permissions = Some(permissions.into());
        self
    }

    pub fn dm_permission(mut self, allowed: bool) -> Self {
        self.dm_permission = Some(allowed);
        self
    }
}

impl std::fmt::Debug for InteractionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionCommand")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

// ============================================================================
// Node
// ============================================================================

/// A registered structured command.
pub struct InteractionNode {
    name: String,
    description: String,
    kind: ApplicationCommandType,
    classification: Classification,
    parameters: Vec<Parameter>,
    handler: Option<InteractionHandler>,
    default_member_permissions: Option<String>,
    dm_permission: Option<bool>,
    children: BTreeMap<String, NodeId>,
    parent: Option<NodeId>,
}

impl InteractionNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ApplicationCommandType {
        self.kind
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children ordered by name.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

impl std::fmt::Debug for InteractionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionNode")
            .field("name", &self.name)
            .field("classification", &self.classification)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Registry of structured commands.
pub struct InteractionTree {
    nodes: Arena<InteractionNode>,
    roots: BTreeMap<String, NodeId>,
    converters: Arc<StructuredConverterRegistry>,
    reporter: BoxedReporter,
}

impl Default for InteractionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionTree {
    /// Creates an empty tree using the built-in structured converters.
    pub fn new() -> Self {
        Self {
            nodes: Arena::default(),
            roots: BTreeMap::new(),
            converters: Arc::new(StructuredConverterRegistry::with_builtins()),
            reporter: Arc::new(LogPanicReporter),
        }
    }

    pub fn with_converters(mut self, converters: Arc<StructuredConverterRegistry>) -> Self {
        self.converters = converters;
        self
    }

    /// Reports handler panics to `reporter`.
    pub fn with_reporter(mut self, reporter: BoxedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn converters(&self) -> &Arc<StructuredConverterRegistry> {
        &self.converters
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&InteractionNode> {
        self.nodes.get(id)
    }

    fn node(&self, id: NodeId) -> CommandResult<&InteractionNode> {
        self.nodes.get(id).ok_or(CommandError::UnknownNode(id.index()))
    }

    /// Top-level commands ordered by name.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.values().copied()
    }

    fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes.get(parent).and_then(|n| n.parent);
        }
        depth
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Registers a top-level command.
    pub fn add(&mut self, command: InteractionCommand) -> CommandResult<NodeId> {
        Self::validate(&command)?;
        if self.roots.contains_key(&command.name) {
            return Err(CommandError::DuplicateRegistration { name: command.name });
        }
        let name = command.name.clone();
        let id = self.nodes.insert(Self::node_from(command, None, Classification::Command));
        self.roots.insert(name.clone(), id);
        debug!(command = %name, "Registered structured command");
        Ok(id)
    }

    /// Registers `command` as a subcommand of `parent`.
    ///
    /// `parent` becomes a subcommand group. Fails with
    /// [`CommandError::NestingTooDeep`] if `parent` is already a second-level
    /// node, and with [`CommandError::InvalidDefinition`] if the top-level
    /// command is a user or message command or if `parent` declares
    /// parameters of its own. A group cannot carry options on the platform.
    pub fn add_under(
        &mut self,
        parent: NodeId,
        command: InteractionCommand,
    ) -> CommandResult<NodeId> {
        Self::validate(&command)?;
        let parent_node = self.node(parent)?;
        if self.depth(parent) >= MAX_DEPTH {
            return Err(CommandError::NestingTooDeep { name: command.name });
        }
        if parent_node.parent.is_none() && parent_node.kind != ApplicationCommandType::ChatInput {
            return Err(CommandError::invalid_definition(format!(
                "'{}' is not a chat-input command and cannot have subcommands",
                parent_node.name
            )));
        }
        if !parent_node.parameters.is_empty() {
            return Err(CommandError::invalid_definition(format!(
                "'{}' declares parameters and cannot have subcommands",
                parent_node.name
            )));
        }
        if parent_node.children.contains_key(&command.name) {
            return Err(CommandError::DuplicateRegistration { name: command.name });
        }

        let name = command.name.clone();
        let id = self.nodes.insert(Self::node_from(
            InteractionCommand {
                kind: ApplicationCommandType::ChatInput,
                ..command
            },
            Some(parent),
            Classification::Subcommand,
        ));
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.classification = Classification::SubcommandGroup;
            parent_node.children.insert(name, id);
        }
        debug!(
            command = %self.qualified_name(id).unwrap_or_default(),
            "Registered structured subcommand"
        );
        Ok(id)
    }

    fn validate(command: &InteractionCommand) -> CommandResult<()> {
        if command.name.trim().is_empty() || command.name.contains(char::is_whitespace) {
            return Err(CommandError::invalid_definition(format!(
                "command name '{}' must be a single non-empty word",
                command.name
            )));
        }
        validate_parameters(&command.parameters)?;
        if command.kind != ApplicationCommandType::ChatInput && !command.parameters.is_empty() {
            return Err(CommandError::invalid_definition(format!(
                "'{}' is not a chat-input command and cannot take parameters",
                command.name
            )));
        }
        Ok(())
    }

    fn node_from(
        command: InteractionCommand,
        parent: Option<NodeId>,
        classification: Classification,
    ) -> InteractionNode {
        InteractionNode {
            name: command.name,
            description: command.description,
            kind: command.kind,
            classification,
            parameters: command.parameters,
            handler: command.handler,
            default_member_permissions: command.default_member_permissions,
            dm_permission: command.dm_permission,
            children: BTreeMap::new(),
            parent,
        }
    }

    /// Removes the command at `path` and everything below it.
    ///
    /// A parent left without children falls back to a plain command (at the
    /// top level) or subcommand.
    pub fn remove(&mut self, path: &str) -> bool {
        let Ok(id) = self.lookup(path) else {
            return false;
        };
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let name = node.name.clone();
        match node.parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.remove(&name);
                    if parent.children.is_empty() {
                        parent.classification = if parent.parent.is_some() {
                            Classification::Subcommand
                        } else {
                            Classification::Command
                        };
                    }
                }
            }
            None => {
                self.roots.remove(&name);
            }
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(current) {
                stack.extend(removed.children.into_values());
            }
        }
        debug!(command = %path, "Removed structured command");
        true
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Resolves a space-separated qualified path such as `"tag admin edit"`.
    pub fn lookup(&self, path: &str) -> CommandResult<NodeId> {
        let segments: Vec<&str> = path.split_whitespace().collect();
        self.resolve(&segments)
    }

    fn resolve<S: AsRef<str>>(&self, path: &[S]) -> CommandResult<NodeId> {
        let not_found = || CommandError::CommandNotFound {
            name: path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" "),
        };
        let (first, rest) = path.split_first().ok_or_else(not_found)?;
        let mut current = *self.roots.get(first.as_ref()).ok_or_else(not_found)?;
        for segment in rest {
            let node = self.node(current)?;
            current = *node.children.get(segment.as_ref()).ok_or_else(not_found)?;
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
    // Schema export
    // ------------------------------------------------------------------------

    /// Describes every registered command in the platform's bulk-registration
    /// format.
    pub fn export_schema(&self) -> Vec<ApplicationCommand> {
        self.roots()
            .filter_map(|id| self.nodes.get(id))
            .map(|root| ApplicationCommand {
                name: root.name.clone(),
                description: root.description.clone(),
                kind: root.kind,
                options: match root.kind {
                    ApplicationCommandType::ChatInput => self.export_options(root),
                    _ => Vec::new(),
                },
                default_member_permissions: root.default_member_permissions.clone(),
                dm_permission: root.dm_permission,
            })
            .collect()
    }

    fn export_options(&self, node: &InteractionNode) -> Vec<ApplicationCommandOption> {
        if !node.is_group() {
            return parameter_options(&node.parameters);
        }
        node.children()
            .filter_map(|id| self.nodes.get(id))
            .map(|child| ApplicationCommandOption {
                kind: match child.classification {
                    Classification::SubcommandGroup => ApplicationCommandOptionType::SubCommandGroup,
                    Classification::Subcommand | Classification::Command => {
                        ApplicationCommandOptionType::SubCommand
                    }
                },
                name: child.name.clone(),
                description: child.description.clone(),
                required: false,
                options: self.export_options(child),
                channel_types: Vec::new(),
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------------

    /// Resolves and runs the command an interaction targets.
    pub async fn invoke(
        &self,
        event: EventContext,
        interaction: Arc<Interaction>,
    ) -> CommandResult<HandlerOutcome> {
        let Some(data) = interaction.data.as_ref() else {
            return Err(CommandError::CommandNotFound {
                name: String::new(),
            });
        };
        let path = command_path(data);
        let options = flatten_options(&data.options);
        let resolved = Arc::new(data.resolved.clone().unwrap_or_default());

        let ctx = InteractionContext::new(event, Arc::clone(&interaction));
        self.invoke_path(ctx, &path, options, resolved).await
    }

    /// Runs the command at `path` with already-flattened options.
    pub async fn invoke_path(
        &self,
        base: InteractionContext,
        path: &[String],
        options: HashMap<String, Value>,
        resolved: Arc<ResolvedData>,
    ) -> CommandResult<HandlerOutcome> {
        let span = span!(Level::DEBUG, "command", command = %path.join(" "));
        let mut invocation = StructuredInvocation::new(base, options, resolved);
        self.traverse(&mut invocation, path).instrument(span).await
    }

    async fn traverse(
        &self,
        invocation: &mut StructuredInvocation,
        path: &[String],
    ) -> CommandResult<HandlerOutcome> {
        let not_found = |consumed: usize| CommandError::CommandNotFound {
            name: path[..consumed].join(" "),
        };
        let first = path.first().ok_or_else(|| not_found(0))?;
        let mut current = *self.roots.get(first).ok_or_else(|| not_found(1))?;
        let mut depth = 1;

        loop {
            invocation.path.push(current);
            let node = self.node(current)?;
            if node.is_group() {
                let Some(next) = path.get(depth) else {
                    return Err(not_found(depth));
                };
                current = *node.children.get(next).ok_or_else(|| not_found(depth + 1))?;
                depth += 1;
                continue;
            }
            if depth < path.len() {
                return Err(not_found(depth + 1));
            }

            let qualified = self.qualified_name(current).unwrap_or_default();
            let args = self.resolve_parameters(node, invocation).await?;
            let ctx = invocation.base.targeting(qualified, args);
            return Ok(self.run_handler(node, ctx).await);
        }
    }

    async fn resolve_parameters(
        &self,
        node: &InteractionNode,
        invocation: &StructuredInvocation,
    ) -> CommandResult<Arguments> {
        let mut args = Arguments::new();
        for param in &node.parameters {
            match invocation.options.get(&param.name) {
                Some(value) => {
                    let argument = self
                        .converters
                        .convert(
                            param.kind,
                            value.clone(),
                            Arc::clone(&invocation.resolved),
                            &invocation.base,
                        )
                        .await?;
                    args.insert(param.name.clone(), argument);
                }
                None if param.required => return Err(CommandError::missing(&param.name)),
                None => {}
            }
        }
        Ok(args)
    }

    async fn run_handler(&self, node: &InteractionNode, ctx: InteractionContext) -> HandlerOutcome {
        let Some(handler) = &node.handler else {
            debug!(command = %ctx.command(), "Structured command has no handler");
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

impl std::fmt::Debug for InteractionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionTree")
            .field("commands", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::{Argument, ArgumentType};
    use gantry_core::model::ChannelType;
    use parking_lot::Mutex;
    use serde_json::json;

    fn chain(tree: &mut InteractionTree) -> (NodeId, NodeId, NodeId) {
        let a = tree.add(InteractionCommand::new("a")).unwrap();
        let b = tree.add_under(a, InteractionCommand::new("b")).unwrap();
        let c = tree.add_under(b, InteractionCommand::new("c")).unwrap();
        (a, b, c)
    }

    fn class(tree: &InteractionTree, id: NodeId) -> Classification {
        tree.get(id).unwrap().classification()
    }

    #[test]
    fn test_classification_transitions() {
        let mut tree = InteractionTree::new();
        let a = tree.add(InteractionCommand::new("a")).unwrap();
        assert_eq!(class(&tree, a), Classification::Command);

        let b = tree.add_under(a, InteractionCommand::new("b")).unwrap();
        assert_eq!(class(&tree, a), Classification::SubcommandGroup);
        assert_eq!(class(&tree, b), Classification::Subcommand);

        let c = tree.add_under(b, InteractionCommand::new("c")).unwrap();
        assert_eq!(class(&tree, a), Classification::SubcommandGroup);
        assert_eq!(class(&tree, b), Classification::SubcommandGroup);
        assert_eq!(class(&tree, c), Classification::Subcommand);
    }

    #[test]
    fn test_third_level_is_rejected() {
        let mut tree = InteractionTree::new();
        let (_, _, c) = chain(&mut tree);
        let before = tree.len();
        let err = tree.add_under(c, InteractionCommand::new("d")).unwrap_err();
        assert!(matches!(err, CommandError::NestingTooDeep { ref name } if name == "d"));
        assert_eq!(tree.len(), before);
        assert_eq!(class(&tree, c), Classification::Subcommand);
    }

    #[test]
    fn test_export_never_nests_three_levels() {
        fn depth(option: &ApplicationCommandOption) -> usize {
            1 + option.options.iter().map(depth).max().unwrap_or(0)
        }

        let mut tree = InteractionTree::new();
        let (_, b, _) = chain(&mut tree);
        tree.add_under(
            b,
            InteractionCommand::new("e").param(Parameter::required("x", ArgumentType::Int)),
        )
        .unwrap();

        let schema = tree.export_schema();
        assert_eq!(schema.len(), 1);
        let group = &schema[0].options[0];
        assert_eq!(group.kind, ApplicationCommandOptionType::SubCommandGroup);
        let names: Vec<&str> = group.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["c", "e"]);
        assert!(group
            .options
            .iter()
            .all(|o| o.kind == ApplicationCommandOptionType::SubCommand));
        // group -> subcommand -> parameter
        assert_eq!(depth(group), 3);
        assert_eq!(group.options[1].options[0].kind, ApplicationCommandOptionType::Integer);
    }

    #[test]
    fn test_export_leaf_parameters_and_context_menus() {
        let mut tree = InteractionTree::new();
        tree.add(
            InteractionCommand::new("move")
                .describe("Move someone")
                .param(Parameter::optional("note", ArgumentType::String))
                .param(Parameter::required("to", ArgumentType::VoiceChannel))
                .default_member_permissions("16"),
        )
        .unwrap();
        tree.add(InteractionCommand::new("Inspect").kind(ApplicationCommandType::User))
            .unwrap();

        let schema = tree.export_schema();
        let inspect = &schema[0];
        assert_eq!(inspect.kind, ApplicationCommandType::User);
        assert!(inspect.options.is_empty());

        let moves = &schema[1];
        assert_eq!(moves.default_member_permissions.as_deref(), Some("16"));
        assert_eq!(moves.options[0].name, "to");
        assert!(moves.options[0].required);
        assert_eq!(moves.options[0].channel_types, vec![ChannelType::GuildVoice]);
        assert_eq!(moves.options[1].name, "note");
    }

    #[test]
    fn test_context_menu_commands_cannot_nest_or_take_parameters() {
        let mut tree = InteractionTree::new();
        let user = tree
            .add(InteractionCommand::new("Inspect").kind(ApplicationCommandType::User))
            .unwrap();
        assert!(matches!(
            tree.add_under(user, InteractionCommand::new("x")),
            Err(CommandError::InvalidDefinition(_))
        ));
        assert!(matches!(
            tree.add(
                InteractionCommand::new("Quote")
                    .kind(ApplicationCommandType::Message)
                    .param(Parameter::required("x", ArgumentType::Int))
            ),
            Err(CommandError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_parent_with_parameters_cannot_become_group() {
        let mut tree = InteractionTree::new();
        let tag = tree
            .add(
                InteractionCommand::new("tag")
                    .param(Parameter::required("name", ArgumentType::String)),
            )
            .unwrap();
        assert!(matches!(
            tree.add_under(tag, InteractionCommand::new("show")),
            Err(CommandError::InvalidDefinition(_))
        ));
        assert_eq!(class(&tree, tag), Classification::Command);
        assert_eq!(tree.export_schema()[0].options[0].name, "name");
    }

    #[test]
    fn test_duplicates_and_lookup() {
        let mut tree = InteractionTree::new();
        let (a, b, c) = chain(&mut tree);
        assert!(matches!(
            tree.add(InteractionCommand::new("a")),
            Err(CommandError::DuplicateRegistration { .. })
        ));
        assert!(matches!(
            tree.add_under(a, InteractionCommand::new("b")),
            Err(CommandError::DuplicateRegistration { .. })
        ));
        assert_eq!(tree.lookup("a b c").unwrap(), c);
        assert_eq!(tree.lookup("a b").unwrap(), b);
        assert!(tree.lookup("a x").is_err());
        assert_eq!(tree.qualified_name(c).unwrap(), "a b c");
    }

    #[test]
    fn test_remove_reclassifies_parent() {
        let mut tree = InteractionTree::new();
        let (a, b, _) = chain(&mut tree);
        assert!(tree.remove("a b c"));
        assert_eq!(class(&tree, b), Classification::Subcommand);
        assert!(tree.remove("a b"));
        assert_eq!(class(&tree, a), Classification::Command);
        assert_eq!(tree.len(), 1);
        assert!(!tree.remove("a b"));
    }

    fn interaction(data: Value) -> Arc<Interaction> {
        Arc::new(
            serde_json::from_value(json!({
                "id": "1",
                "application_id": "2",
                "type": 2,
                "guild_id": "100",
                "token": "t",
                "data": data
            }))
            .unwrap(),
        )
    }

    fn event() -> EventContext {
        EventContext::detached("INTERACTION_CREATE")
    }

    fn recording_tree(seen: &Arc<Mutex<Option<(String, Arguments)>>>) -> InteractionTree {
        let seen = Arc::clone(seen);
        let mut tree = InteractionTree::new();
        let tag = tree.add(InteractionCommand::new("tag")).unwrap();
        tree.add_under(
            tag,
            InteractionCommand::new("show")
                .param(Parameter::required("name", ArgumentType::String))
                .param(Parameter::optional("limit", ArgumentType::Int))
                .handler(move |ctx: InteractionContext| {
                    let seen = Arc::clone(&seen);
                    async move {
                        *seen.lock() = Some((ctx.command().to_string(), ctx.args().clone()));
                        Ok(())
                    }
                }),
        )
        .unwrap();
        tree
    }

    #[tokio::test]
    async fn test_invoke_resolves_named_options() {
        let seen = Arc::new(Mutex::new(None));
        let tree = recording_tree(&seen);
        let data = json!({
            "id": "9",
            "name": "tag",
            "options": [{
                "name": "show",
                "type": 1,
                "options": [{ "name": "name", "type": 3, "value": "faq" }]
            }]
        });

        let outcome = tree.invoke(event(), interaction(data)).await.unwrap();
        assert!(outcome.is_completed());
        let (command, args) = seen.lock().clone().unwrap();
        assert_eq!(command, "tag show");
        assert_eq!(args.get("name").unwrap(), &Argument::String("faq".into()));
        // Optional and absent: no entry, no default.
        assert!(!args.contains("limit"));
    }

    #[tokio::test]
    async fn test_invoke_missing_required_option() {
        let seen = Arc::new(Mutex::new(None));
        let tree = recording_tree(&seen);
        let data = json!({
            "id": "9",
            "name": "tag",
            "options": [{ "name": "show", "type": 1 }]
        });
        let err = tree.invoke(event(), interaction(data)).await.unwrap_err();
        assert!(matches!(err, CommandError::MissingRequiredArgument { ref name } if name == "name"));
        assert!(seen.lock().is_none());
    }

    #[tokio::test]
    async fn test_group_without_subcommand_is_not_found() {
        let seen = Arc::new(Mutex::new(None));
        let tree = recording_tree(&seen);
        let ctx = InteractionContext::new(event(), interaction(json!({ "id": "9", "name": "tag" })));

        let err = tree
            .invoke_path(ctx.clone(), &["tag".to_string()], HashMap::new(), Arc::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::CommandNotFound { ref name } if name == "tag"));

        let err = tree
            .invoke_path(
                ctx,
                &["tag".to_string(), "nope".to_string()],
                HashMap::new(),
                Arc::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::CommandNotFound { ref name } if name == "tag nope"));
    }

    async fn panicking(_ctx: InteractionContext) -> HandlerResult {
        panic!("structured boom");
    }

    #[tokio::test]
    async fn test_handler_panic_is_isolated() {
        let mut tree = InteractionTree::new();
        tree.add(InteractionCommand::new("boom").handler(panicking)).unwrap();
        let outcome = tree
            .invoke(event(), interaction(json!({ "id": "9", "name": "boom" })))
            .await
            .unwrap();
        match outcome {
            HandlerOutcome::Aborted(fault) => assert_eq!(fault.message(), "structured boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_interaction_without_data() {
        let tree = InteractionTree::new();
        let interaction: Interaction = serde_json::from_value(json!({
            "id": "1", "application_id": "2", "type": 1, "token": "t"
        }))
        .unwrap();
        assert!(matches!(
            tree.invoke(event(), Arc::new(interaction)).await,
            Err(CommandError::CommandNotFound { .. })
        ));
    }
}
