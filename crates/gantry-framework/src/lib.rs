//! # Gantry Framework
//!
//! The command and event dispatch engine of the Gantry bot framework.
//!
//! This layer provides:
//! - A quote-aware tokenizer ([`StringView`]) and prefix matching
//! - Argument conversion registries for text tokens and structured option values
//! - [`CommandTree`] for free-text commands with aliases, checks and groups
//! - [`InteractionTree`] for structured commands, including schema export
//! - [`Dispatcher`], routing named payloads to typed callbacks with failure
//!   isolation
//!
//! Wire models and collaborator traits come from `gantry-core`; wiring the
//! pieces to an ingestion loop is the job of `gantry-runtime`.

pub mod argument;
pub mod command;
pub mod context;
pub mod converter;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod interaction;

mod arena;

pub use arena::NodeId;
pub use argument::{Argument, ArgumentType, Arguments, Colour, Parameter};
pub use command::{Command, CommandNode, CommandTree, PrefixMatcher, StringView};
pub use context::{
    CommandContext, EventContext, InteractionContext, StructuredInvocation, TextInvocation,
};
pub use converter::{
    Converter, ConverterRegistry, DefaultRanker, NameRanker, StructuredConverterRegistry,
    StructuredRequest, TextRequest,
};
pub use dispatcher::{
    DispatchReport, DispatchService, Dispatcher, ErrorEvent, Event, EventHandlerEntry, EventKind,
    Failure, Updated, events,
};
pub use error::{
    CommandError, CommandResult, DispatchError, DispatchResult, TokenizeError,
};
pub use handler::{BoxFuture, HandlerOutcome, HandlerResult, isolate};
pub use interaction::{Classification, InteractionCommand, InteractionNode, InteractionTree};
