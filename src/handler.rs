//! Handler signatures and type erasure.
//!
//! # How handlers are stored
//!
//! Routes and middlewares hold handlers of *different* closure types in one
//! `Vec`, so each handler is wrapped once at registration and stored behind
//! an `Arc<dyn …>`:
//!
//! ```text
//! |req, res| Box::pin(async move { … })    ← user writes this
//!        ↓ router.get("/", handler)
//! Arc::new(FnHandler(handler))              ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler
//! handler.call(&mut req, &mut res)          ← one vtable dispatch per request
//! ```
//!
//! Handlers borrow the request and the response for the duration of the
//! returned future, so the future type carries the borrow's lifetime. That is
//! why handlers return a [`BoxFuture`] instead of being plain `async fn`s:
//!
//! ```rust
//! use junction::{BoxError, HandlerFuture, Request, Response};
//!
//! fn hello<'a>(_req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
//!     Box::pin(async move {
//!         res.append(b"hello");
//!         Ok::<(), BoxError>(())
//!     })
//! }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{BoxError, Error};
use crate::middleware::Flow;
use crate::request::Request;
use crate::response::Response;

/// Future returned by a route handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), BoxError>>;

/// Future returned by a middleware.
pub type MiddlewareFuture<'a> = BoxFuture<'a, Result<Flow, BoxError>>;

// ── Internal dispatch interface ───────────────────────────────────────────────

pub(crate) trait ErasedHandler: Send + Sync {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a>;
}

pub(crate) trait ErasedMiddleware: Send + Sync {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> MiddlewareFuture<'a>;
}

pub(crate) type BoxedHandler = Arc<dyn ErasedHandler>;
pub(crate) type BoxedMiddleware = Arc<dyn ErasedMiddleware>;

/// Newtype bridging a concrete closure to the trait-object world.
struct FnHandler<F>(F);

impl<F> ErasedHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
        (self.0)(req, res)
    }
}

impl<F> ErasedMiddleware for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> MiddlewareFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> MiddlewareFuture<'a> {
        (self.0)(req, res)
    }
}

pub(crate) fn boxed_handler<F>(handler: F) -> BoxedHandler
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnHandler(handler))
}

pub(crate) fn boxed_middleware<F>(handler: F) -> BoxedMiddleware
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> MiddlewareFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnHandler(handler))
}

// ── Fault interception ────────────────────────────────────────────────────────

/// Polls `fut` to completion, converting a panic into [`Error::HandlerFault`].
///
/// This is the only place a panic crosses back into the error taxonomy.
pub(crate) async fn guard<T, Fut>(fut: Fut) -> Result<T, Error>
where
    Fut: Future<Output = T>,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| Error::HandlerFault(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
