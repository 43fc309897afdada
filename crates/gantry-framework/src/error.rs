//! Error types for the Gantry framework.

use thiserror::Error;

use crate::argument::ArgumentType;
use gantry_core::{BoxError, FetchError};

// =============================================================================
// Tokenizer Errors
// =============================================================================

/// Errors raised while reading quote-aware words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenizeError {
    /// Input ended while a quoted word was still open.
    #[error("expected closing quote '{close}'")]
    UnterminatedQuote {
        /// The quote character that would have closed the word.
        close: char,
    },

    /// A quote character appeared inside an unquoted word.
    #[error("unexpected quote '{quote}' in non-quoted string")]
    UnexpectedQuote {
        /// The offending quote character.
        quote: char,
    },

    /// A closing quote was followed by something other than whitespace.
    #[error("expected space after closing quote, found '{found}'")]
    InvalidQuoteTrailing {
        /// The character found after the closing quote.
        found: char,
    },
}

// =============================================================================
// Command Errors
// =============================================================================

/// Errors raised while registering or invoking commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A name or alias collides with an existing sibling.
    #[error("command name '{name}' is already registered")]
    DuplicateRegistration {
        /// The colliding name or alias.
        name: String,
    },

    /// No command matched the requested name or path.
    #[error("command '{name}' not found")]
    CommandNotFound {
        /// The name (or qualified path) that failed to resolve.
        name: String,
    },

    /// A check returned `false`.
    #[error("checks failed for command '{command}'")]
    CheckFailure {
        /// Qualified name of the vetoed command.
        command: String,
    },

    /// A check returned an error.
    #[error("check for command '{command}' errored: {source}")]
    Check {
        /// Qualified name of the command.
        command: String,
        /// The error the check returned.
        #[source]
        source: BoxError,
    },

    /// A required parameter received no token or option.
    #[error("missing required argument '{name}'")]
    MissingRequiredArgument {
        /// Parameter name.
        name: String,
    },

    /// An argument was read as a type it does not hold.
    #[error("invalid argument type: expected {expected}, got {got}")]
    InvalidArgumentType {
        /// The requested tag.
        expected: ArgumentType,
        /// The tag actually stored.
        got: ArgumentType,
    },

    /// A parameter declares a tag nobody registered a converter for.
    #[error("no converter registered for {0}")]
    ConverterNotFound(ArgumentType),

    /// A lookup ran but matched nothing.
    #[error("{kind} '{query}' not found")]
    NotFound {
        /// What was being looked up.
        kind: ArgumentType,
        /// The text or id that was searched for.
        query: String,
    },

    /// Input text could not be parsed as the requested literal.
    #[error("'{input}' is not a valid {kind}")]
    BadLiteral {
        /// The literal kind.
        kind: ArgumentType,
        /// The rejected input.
        input: String,
    },

    /// The tokenizer rejected the input.
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    /// A remote lookup failed outright.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A command definition is malformed.
    #[error("invalid command definition: {0}")]
    InvalidDefinition(String),

    /// An insertion would nest structured commands beyond two levels.
    #[error("command '{name}' cannot be nested that deep")]
    NestingTooDeep {
        /// Name of the rejected command.
        name: String,
    },

    /// A node id does not belong to this tree.
    #[error("unknown command node {0}")]
    UnknownNode(usize),
}

impl CommandError {
    /// Creates a not-found error.
    pub fn not_found(kind: ArgumentType, query: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            query: query.into(),
        }
    }

    /// Creates a bad-literal error.
    pub fn bad_literal(kind: ArgumentType, input: impl Into<String>) -> Self {
        Self::BadLiteral {
            kind,
            input: input.into(),
        }
    }

    /// Creates a missing-argument error.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingRequiredArgument { name: name.into() }
    }

    /// Creates an invalid-definition error.
    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition(msg.into())
    }
}

/// Result type for command operations.
pub type CommandResult<T> = Result<T, CommandError>;

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors raised while dispatching a payload.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No entry is registered for the payload's event type.
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// The body or a side-channel value failed to decode.
    #[error("failed to decode '{event}': {reason}")]
    Decode {
        /// Event name being decoded.
        event: String,
        /// Decoder message.
        reason: String,
    },

    /// An entry for this event name already exists.
    #[error("an entry for event '{0}' is already registered")]
    DuplicateEntry(String),
}

impl DispatchError {
    /// Creates a decode error.
    pub fn decode(event: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            event: event.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
