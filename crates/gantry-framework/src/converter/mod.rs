//! Argument conversion pipeline.
//!
//! Two registries map an [`ArgumentType`] to a [`Converter`]:
//!
//! - [`ConverterRegistry`] converts raw tokens read from command text.
//!   Entity lookups go through the [`EntityFetcher`](gantry_core::EntityFetcher)
//!   collaborator, by id or by name.
//! - [`StructuredConverterRegistry`] converts pre-decoded option values of an
//!   interaction. Entity lookups read the interaction's resolved-entity table
//!   instead of calling out.
//!
//! Both registries are read-mostly: registration takes the write lock,
//! conversion only clones the converter out under the read lock.
//!
//! ```rust,ignore
//! let registry = ConverterRegistry::with_builtins();
//! registry.register(
//!     ArgumentType::String,
//!     Converter::new(|req: TextRequest| async move {
//!         Ok(Argument::String(req.token.to_uppercase()))
//!     }),
//! );
//! ```

mod mention;
mod ranker;
mod structured;
mod text;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::argument::{Argument, ArgumentType};
use crate::error::{CommandError, CommandResult};
use crate::handler::BoxFuture;

pub use mention::{MentionKind, extract_id};
pub use ranker::{DefaultRanker, NameRanker};
pub use structured::{StructuredConverter, StructuredConverterRegistry, StructuredRequest};
pub use text::{ConverterRegistry, TextConverter, TextRequest};

/// A type-erased conversion function.
pub type ConvertFn<R> =
    Arc<dyn Fn(R) -> BoxFuture<'static, CommandResult<Argument>> + Send + Sync>;

// ============================================================================
// Converter
// ============================================================================

/// A conversion function plus the value used when an optional parameter
/// receives no input.
pub struct Converter<R> {
    convert: ConvertFn<R>,
    default: Option<Argument>,
}

impl<R> Clone for Converter<R> {
    fn clone(&self) -> Self {
        Self {
            convert: Arc::clone(&self.convert),
            default: self.default.clone(),
        }
    }
}

impl<R: 'static> Converter<R> {
    /// Wraps an async conversion function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult<Argument>> + Send + 'static,
    {
        Self {
            convert: Arc::new(move |request: R| -> BoxFuture<'static, CommandResult<Argument>> {
                Box::pin(f(request))
            }),
            default: None,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: Argument) -> Self {
        self.default = Some(default);
        self
    }

    /// The default value, if any.
    pub fn default_value(&self) -> Option<&Argument> {
        self.default.as_ref()
    }

    /// Runs the conversion.
    pub fn convert(&self, request: R) -> BoxFuture<'static, CommandResult<Argument>> {
        (self.convert)(request)
    }
}

impl<R> std::fmt::Debug for Converter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConverterTable
// ============================================================================

/// Lock-guarded tag → converter map shared by both registries.
pub(crate) struct ConverterTable<R> {
    converters: RwLock<HashMap<ArgumentType, Converter<R>>>,
}

impl<R> Default for ConverterTable<R> {
    fn default() -> Self {
        Self {
            converters: RwLock::new(HashMap::new()),
        }
    }
}

impl<R: 'static> ConverterTable<R> {
    /// Inserts or replaces the converter for `kind`. Returns the previous one.
    pub(crate) fn register(
        &self,
        kind: ArgumentType,
        converter: Converter<R>,
    ) -> Option<Converter<R>> {
        self.converters.write().insert(kind, converter)
    }

    pub(crate) fn get(&self, kind: ArgumentType) -> CommandResult<Converter<R>> {
        self.converters
            .read()
            .get(&kind)
            .cloned()
            .ok_or(CommandError::ConverterNotFound(kind))
    }

    pub(crate) fn contains(&self, kind: ArgumentType) -> bool {
        self.converters.read().contains_key(&kind)
    }

    pub(crate) fn kinds(&self) -> Vec<ArgumentType> {
        self.converters.read().keys().copied().collect()
    }
}

/// Picks the best-ranked candidate by name.
pub(crate) fn pick<T>(
    ranker: &dyn NameRanker,
    query: &str,
    candidates: Vec<T>,
    name: impl Fn(&T) -> &str,
) -> Option<T> {
    let names: Vec<&str> = candidates.iter().map(|c| name(c)).collect();
    let index = ranker.best(query, &names)?;
    candidates.into_iter().nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_table_register_and_get() {
        let table: ConverterTable<String> = ConverterTable::default();
        assert!(matches!(
            table.get(ArgumentType::String),
            Err(CommandError::ConverterNotFound(ArgumentType::String))
        ));

        table.register(
            ArgumentType::String,
            Converter::new(|s: String| async move { Ok(Argument::String(s)) })
                .with_default(Argument::String("none".into())),
        );
        let converter = table.get(ArgumentType::String).unwrap();
        assert_eq!(
            converter.default_value(),
            Some(&Argument::String("none".into()))
        );
        let arg = converter.convert("hi".to_string()).await.unwrap();
        assert_eq!(arg, Argument::String("hi".into()));
        assert!(table.contains(ArgumentType::String));
        assert_eq!(table.kinds(), vec![ArgumentType::String]);
    }

    #[test]
    fn test_pick_uses_ranker() {
        let names = vec!["general".to_string(), "gen".to_string()];
        let best = pick(&DefaultRanker, "gen", names, |s| s.as_str());
        assert_eq!(best.as_deref(), Some("gen"));
    }
}
