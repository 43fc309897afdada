//! Handler plumbing and fault isolation.
//!
//! Every user callback (event callback, command handler, check) is stored
//! type-erased as an `Arc<dyn Fn(..) -> BoxFuture<..>>`. The helpers in this
//! module convert ordinary async closures into that shape, the same way the
//! dispatcher's registration methods accept plain closures:
//!
//! ```rust,ignore
//! let handler = command_handler(|ctx: CommandContext| async move {
//!     println!("invoked {}", ctx.command());
//!     Ok(())
//! });
//! ```
//!
//! # Isolation
//!
//! [`isolate`] runs a handler future and folds its result into a
//! [`HandlerOutcome`]. A panic raised while polling the future is caught,
//! paired with the backtrace captured at the panic site and returned as
//! [`HandlerOutcome::Aborted`] instead of unwinding into the caller.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Once};

use futures::FutureExt;
use futures::future::poll_fn;

use gantry_core::{BoxError, HandlerFault};

use crate::context::{CommandContext, InteractionContext};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What user handlers return.
pub type HandlerResult = Result<(), BoxError>;

// ============================================================================
// Outcome
// ============================================================================

/// How a handler invocation ended.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// The handler returned `Ok`.
    Completed,
    /// The handler returned an error.
    Failed(BoxError),
    /// The handler panicked.
    Aborted(HandlerFault),
}

impl HandlerOutcome {
    /// Whether the handler returned `Ok`.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the handler failed or panicked.
    pub fn is_failure(&self) -> bool {
        !self.is_completed()
    }
}

impl From<HandlerResult> for HandlerOutcome {
    fn from(result: HandlerResult) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(err) => Self::Failed(err),
        }
    }
}

// ============================================================================
// Isolation
// ============================================================================

thread_local! {
    static ISOLATION_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Installs the process panic hook that records backtraces for isolated
/// handlers. Panics outside [`isolate`] still reach the previous hook.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if ISOLATION_DEPTH.with(Cell::get) > 0 {
                let backtrace = Backtrace::force_capture();
                LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as polling an isolated future.
struct IsolationGuard;

impl IsolationGuard {
    fn enter() -> Self {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for IsolationGuard {
    fn drop(&mut self) {
        ISOLATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs a handler future, converting errors and panics into a [`HandlerOutcome`].
pub async fn isolate<F>(future: F) -> HandlerOutcome
where
    F: Future<Output = HandlerResult> + Send,
{
    install_hook();

    let mut future = Box::pin(future);
    let guarded = poll_fn(move |cx| {
        let _guard = IsolationGuard::enter();
        future.as_mut().poll(cx)
    });

    match AssertUnwindSafe(guarded).catch_unwind().await {
        Ok(result) => result.into(),
        Err(payload) => {
            let backtrace = LAST_BACKTRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(Backtrace::force_capture);
            HandlerOutcome::Aborted(HandlerFault::new(panic_message(&*payload), backtrace))
        }
    }
}

// ============================================================================
// Type-erased handlers
// ============================================================================

/// A type-erased text command handler.
pub type CommandHandler =
    Arc<dyn Fn(CommandContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A type-erased check. `Ok(false)` vetoes the command.
pub type CommandCheck =
    Arc<dyn Fn(CommandContext) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync>;

/// A type-erased structured command handler.
pub type InteractionHandler =
    Arc<dyn Fn(InteractionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Converts an async closure into a [`CommandHandler`].
pub fn command_handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: CommandContext| -> BoxFuture<'static, HandlerResult> {
        Box::pin(f(ctx))
    })
}

/// Converts an async predicate into a [`CommandCheck`].
pub fn command_check<F, Fut>(f: F) -> CommandCheck
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    Arc::new(move |ctx: CommandContext| -> BoxFuture<'static, Result<bool, BoxError>> {
        Box::pin(f(ctx))
    })
}

/// Converts an async closure into an [`InteractionHandler`].
pub fn interaction_handler<F, Fut>(f: F) -> InteractionHandler
where
    F: Fn(InteractionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: InteractionContext| -> BoxFuture<'static, HandlerResult> {
        Box::pin(f(ctx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_isolate_completed() {
        let outcome = isolate(async { Ok(()) }).await;
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn test_isolate_failed() {
        let outcome = isolate(async { Err::<(), BoxError>("boom".into()) }).await;
        match outcome {
            HandlerOutcome::Failed(err) => assert_eq!(err.to_string(), "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    async fn explode_after_yield() -> HandlerResult {
        tokio::task::yield_now().await;
        panic!("handler exploded");
    }

    async fn explode() -> HandlerResult {
        panic!("first");
    }

    #[tokio::test]
    async fn test_isolate_catches_panic() {
        let outcome = isolate(explode_after_yield()).await;
        match outcome {
            HandlerOutcome::Aborted(fault) => assert_eq!(fault.message(), "handler exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_isolation_depth_resets_after_panic() {
        let _ = isolate(explode()).await;
        assert_eq!(ISOLATION_DEPTH.with(Cell::get), 0);
    }
}
