//! Per-request execution context.
//!
//! A `RequestContext` is bound to the tokio task serving the request for the
//! duration of a scope future. `current()` outside such a scope fails with
//! `ContextError::NoActiveContext`. The binding is dropped when the scope
//! future completes, is cancelled, or unwinds, so it can never outlive the
//! request that created it.

mod client_ip;
pub mod params;
mod request;
mod storage;

use std::{future::Future, sync::Arc};

use thiserror::Error;

use crate::error::AppError;

pub use client_ip::{FORWARDED_FOR_HEADER, InvalidProxy, TrustedProxies};
pub use request::{PendingResponse, RequestContext, RequestInfo};
pub use storage::RequestStorage;

tokio::task_local! {
    static CURRENT: Arc<RequestContext>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("no active request context")]
    NoActiveContext,
}

impl From<ContextError> for AppError {
    fn from(e: ContextError) -> Self {
        tracing::error!(error = %e, "request context required but not bound");
        AppError::Internal
    }
}

/// Run `fut` with `ctx` bound as the current context.
pub async fn bind<F>(ctx: Arc<RequestContext>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// Synchronous variant of [`bind`].
pub fn bind_sync<R>(ctx: Arc<RequestContext>, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(ctx, f)
}

pub fn current() -> Result<Arc<RequestContext>, ContextError> {
    CURRENT
        .try_with(Arc::clone)
        .map_err(|_| ContextError::NoActiveContext)
}

pub fn is_bound() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}
