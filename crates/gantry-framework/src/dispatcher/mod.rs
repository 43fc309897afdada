//! Event dispatcher for the Gantry framework.
//!
//! The [`Dispatcher`] maps event names to [`EventHandlerEntry`]s. Each entry
//! owns a decoder fixed at construction and an append-only list of
//! callbacks. Dispatching a payload:
//!
//! 1. Looks up the entry for the payload's declared type. A miss is reported
//!    as [`DispatchError::UnknownEvent`] and runs nothing.
//! 2. Decodes the body into an [`Event`]. Derived events (such as
//!    `GUILD_CREATE`) may instead ask to be dispatched again under another
//!    name.
//! 3. Builds an [`EventContext`] (guild, application metadata, bot identity).
//! 4. Runs every callback in registration order. A callback that returns an
//!    error or panics is diverted to the `ERROR` callbacks; the remaining
//!    callbacks still run.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new();
//!
//! dispatcher.on::<events::MessageCreate, _, _>(|ctx, message| async move {
//!     tracing::info!(content = %message.content, "Got a message");
//!     Ok(())
//! })?;
//!
//! dispatcher.on::<events::Error, _, _>(|_ctx, error| async move {
//!     tracing::warn!(origin = %error.origin, "Callback failed: {}", error.failure);
//!     Ok(())
//! })?;
//!
//! let report = dispatcher.dispatch(&payload).await?;
//! ```

mod entry;
mod event;
mod service;

pub use entry::{Decoded, DecodeFn, EventCallback, EventHandlerEntry, builtin_entries};
pub use event::{ErrorEvent, Event, EventKind, Failure, Updated, events, names};
pub use service::DispatchService;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::context::EventContext;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{BoxFuture, HandlerOutcome, HandlerResult, isolate};
use gantry_core::model::User;
use gantry_core::{BoxedFetcher, BoxedReporter, LogPanicReporter, NoopFetcher, Payload};

/// Upper bound on derived re-dispatches of one payload.
const MAX_REDISPATCH: usize = 4;

/// Summary of one dispatched payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// The event name callbacks ran under, after any re-dispatch.
    pub event: String,
    /// Callbacks invoked.
    pub invoked: usize,
    /// Callbacks that returned an error.
    pub failed: usize,
    /// Callbacks that panicked.
    pub aborted: usize,
}

impl DispatchReport {
    fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    /// Whether every invoked callback completed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }
}

/// The central event dispatcher.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc`. Registration
/// and dispatch may happen concurrently: the entry map and every entry's
/// callback list are guarded by their own reader/writer locks.
pub struct Dispatcher {
    entries: RwLock<HashMap<String, Arc<EventHandlerEntry>>>,
    identities: RwLock<HashMap<String, User>>,
    fetcher: BoxedFetcher,
    reporter: BoxedReporter,
    log_unknown_events: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the built-in event catalogue.
    pub fn new() -> Self {
        Self::with_entries(builtin_entries())
    }

    /// Creates a dispatcher with exactly the given entries.
    pub fn with_entries(entries: impl IntoIterator<Item = EventHandlerEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.name().to_string(), Arc::new(entry)))
            .collect();
        Self {
            entries: RwLock::new(entries),
            identities: RwLock::new(HashMap::new()),
            fetcher: Arc::new(NoopFetcher),
            reporter: Arc::new(LogPanicReporter),
            log_unknown_events: true,
        }
    }

    /// Sets the remote lookup collaborator handed to every context.
    pub fn with_fetcher(mut self, fetcher: BoxedFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Reports callback panics to `reporter`.
    pub fn with_reporter(mut self, reporter: BoxedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Log unknown events at `warn` (the default) rather than `debug`.
    pub fn log_unknown_events(mut self, enabled: bool) -> Self {
        self.log_unknown_events = enabled;
        self
    }

    pub fn fetcher(&self) -> &BoxedFetcher {
        &self.fetcher
    }

    /// Adds an entry for a new event name.
    pub fn register_entry(&self, entry: EventHandlerEntry) -> DispatchResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(entry.name()) {
            return Err(DispatchError::DuplicateEntry(entry.name().to_string()));
        }
        debug!(event_name = %entry.name(), "Registered event entry");
        entries.insert(entry.name().to_string(), Arc::new(entry));
        Ok(())
    }

    /// Returns the entry for `name`.
    pub fn entry(&self, name: &str) -> Option<Arc<EventHandlerEntry>> {
        self.entries.read().get(name).cloned()
    }

    /// Names of all registered entries.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Appends a callback for the event `E`.
    pub fn on<E, F, Fut>(&self, f: F) -> DispatchResult<()>
    where
        E: EventKind,
        F: Fn(EventContext, E::Data) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let entry = self
            .entry(E::NAME)
            .ok_or_else(|| DispatchError::UnknownEvent(E::NAME.to_string()))?;
        entry.push(Arc::new(
            move |ctx: EventContext, event: Event| -> BoxFuture<'static, HandlerResult> {
                match E::extract(&event) {
                    Some(data) => Box::pin(f(ctx, data)),
                    None => Box::pin(async { Ok(()) }),
                }
            },
        ));
        Ok(())
    }

    /// Appends a callback for an entry created with
    /// [`EventHandlerEntry::custom`].
    pub fn on_custom<F, Fut>(&self, name: &str, f: F) -> DispatchResult<()>
    where
        F: Fn(EventContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let entry = self
            .entry(name)
            .ok_or_else(|| DispatchError::UnknownEvent(name.to_string()))?;
        entry.push(Arc::new(
            move |ctx: EventContext, event: Event| -> BoxFuture<'static, HandlerResult> {
                match event {
                    Event::Custom(value) => Box::pin(f(ctx, value)),
                    _ => Box::pin(async { Ok(()) }),
                }
            },
        ));
        Ok(())
    }

    /// The bot user learned from `READY` for the given payload identifier.
    pub fn identity(&self, identifier: &str) -> Option<User> {
        self.identities.read().get(identifier).cloned()
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Dispatches one payload.
    ///
    /// Callback failures never surface here; they are counted in the
    /// returned [`DispatchReport`] and diverted to `ERROR`. Errors are
    /// reserved for payloads that could not be routed or decoded.
    pub async fn dispatch(&self, payload: &Payload) -> DispatchResult<DispatchReport> {
        let span = span!(Level::DEBUG, "dispatch", event_name = %payload.kind);
        self.dispatch_inner(payload).instrument(span).await
    }

    /// Dispatches `payload` on its own task.
    pub fn spawn_dispatch(self: &Arc<Self>, payload: Payload) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = dispatcher.dispatch(&payload).await {
                debug!(event_name = %payload.kind, error = %err, "Payload not dispatched");
            }
        })
    }

    async fn dispatch_inner(&self, payload: &Payload) -> DispatchResult<DispatchReport> {
        let mut name = payload.kind.clone();
        let mut hops = 0;

        let (entry, event) = loop {
            let Some(entry) = self.entry(&name) else {
                if self.log_unknown_events {
                    warn!(event_name = %name, "Unknown event");
                } else {
                    debug!(event_name = %name, "Unknown event");
                }
                return Err(DispatchError::UnknownEvent(name));
            };

            let decoded = entry.decode(payload).inspect_err(|err| {
                warn!(event_name = %name, error = %err, "Failed to decode payload");
            })?;
            match decoded {
                Decoded::Event(event) => break (entry, event),
                Decoded::Redispatch(next) => {
                    hops += 1;
                    if hops > MAX_REDISPATCH {
                        return Err(DispatchError::decode(name, "re-dispatch limit exceeded"));
                    }
                    debug!(from = %name, to = %next, "Re-dispatching payload");
                    name = next.to_string();
                }
                Decoded::Skip => {
                    debug!(event_name = %name, "Payload produced no event");
                    return Ok(DispatchReport::new(name));
                }
            }
        };

        if let Event::Ready(ready) = &event {
            info!(
                identifier = %payload.metadata.identifier,
                user = %ready.user.username,
                "Session ready"
            );
            self.identities
                .write()
                .insert(payload.metadata.identifier.clone(), ready.user.clone());
        }

        let ctx = EventContext::new(name, Arc::clone(&self.fetcher))
            .with_guild(event.guild_id())
            .with_metadata(payload.metadata.clone())
            .with_identity(self.identity(&payload.metadata.identifier))
            .with_trace(payload.trace.clone());

        Ok(self.run_callbacks(&entry, ctx, event).await)
    }

    async fn run_callbacks(
        &self,
        entry: &EventHandlerEntry,
        ctx: EventContext,
        event: Event,
    ) -> DispatchReport {
        let mut report = DispatchReport::new(entry.name());
        for callback in entry.callbacks() {
            report.invoked += 1;
            match isolate(callback(ctx.clone(), event.clone())).await {
                HandlerOutcome::Completed => {}
                HandlerOutcome::Failed(err) => {
                    report.failed += 1;
                    self.divert(&ctx, entry.name(), Failure::from(err)).await;
                }
                HandlerOutcome::Aborted(fault) => {
                    report.aborted += 1;
                    self.reporter.report(entry.name(), &fault);
                    self.divert(&ctx, entry.name(), Failure::Fault(fault)).await;
                }
            }
        }
        debug!(
            invoked = report.invoked,
            failed = report.failed,
            aborted = report.aborted,
            "Dispatch complete"
        );
        report
    }

    /// Hands a callback failure to the `ERROR` callbacks.
    async fn divert(&self, ctx: &EventContext, origin: &str, failure: Failure) {
        if origin == names::ERROR {
            warn!(error = %failure, "ERROR callback failed");
            return;
        }
        let callbacks = self
            .entry(names::ERROR)
            .map(|entry| entry.callbacks())
            .unwrap_or_default();
        if callbacks.is_empty() {
            warn!(origin = %origin, error = %failure, "Unhandled callback failure");
            return;
        }

        let event = Event::Error(ErrorEvent {
            origin: origin.to_string(),
            failure,
        });
        for callback in callbacks {
            match isolate(callback(ctx.clone(), event.clone())).await {
                HandlerOutcome::Completed => {}
                HandlerOutcome::Failed(err) => {
                    warn!(origin = %origin, error = %err, "ERROR callback failed");
                }
                HandlerOutcome::Aborted(fault) => self.reporter.report(names::ERROR, &fault),
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("entries", &self.entries.read().len())
            .field("identities", &self.identities.read().len())
            .finish_non_exhaustive()
    }
}
