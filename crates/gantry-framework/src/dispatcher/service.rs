//! Tower integration.
//!
//! [`DispatchService`] exposes a shared [`Dispatcher`] as a
//! `tower::Service<Payload>`, so middleware can be layered over dispatch:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tower::limit::ConcurrencyLimitLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(ConcurrencyLimitLayer::new(64))
//!     .service(DispatchService::new(dispatcher));
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use super::{DispatchReport, Dispatcher};
use crate::error::DispatchError;
use crate::handler::BoxFuture;
use gantry_core::Payload;

/// A cloneable service handle over a shared dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchService {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Service<Payload> for DispatchService {
    type Response = DispatchReport;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, payload: Payload) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move { dispatcher.dispatch(&payload).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{events, names};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_service_dispatches() {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher
            .on::<events::Resumed, _, _>(|_, ()| async { Ok(()) })
            .unwrap();
        let service = DispatchService::new(dispatcher);

        let payload = Payload::new(names::RESUMED, &json!({})).unwrap();
        let report = service.clone().oneshot(payload).await.unwrap();
        assert_eq!(report.invoked, 1);

        let payload = Payload::new("NOT_A_THING", &json!({})).unwrap();
        assert!(service.oneshot(payload).await.is_err());
    }
}
