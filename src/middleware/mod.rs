//! Middleware layer.
//!
//! Middleware runs before the route handler and is the right place for
//! cross-cutting concerns: authentication-header inspection, request-id
//! injection, answering preflight requests. Each middleware is guarded by an
//! optional method set and an optional path set; a request must satisfy both
//! for the middleware to run.
//!
//! Eligible middlewares run strictly one after another in registration
//! order. Each returns a [`Flow`]:
//!
//! - `Ok(Flow::Continue)`: run the next middleware, then the route handler;
//! - `Ok(Flow::Skip)`: stop here, the route handler does not run, no error;
//! - `Err(e)`: stop here and fail the request with a 500.
//!
//! ```rust
//! use http::Method;
//! use junction::{BoxError, Flow, Middleware, MiddlewareChain};
//!
//! let chain = MiddlewareChain::new()
//!     .with(Middleware::new(|req, _res| Box::pin(async move {
//!         req.context_mut().set("request-id", String::from("r-1"));
//!         Ok(Flow::Continue)
//!     })))
//!     .with(
//!         Middleware::new(|req, _res| Box::pin(async move {
//!             if req.header("authorization").is_none() {
//!                 return Err(BoxError::from("missing credentials"));
//!             }
//!             Ok(Flow::Continue)
//!         }))
//!         .method(Method::POST)
//!         .path("/admin/:section")
//!         .parse_params(true),
//!     );
//! assert_eq!(chain.len(), 2);
//! ```

use std::fmt;

use http::Method;
use tracing::debug;

use crate::error::Error;
use crate::handler::{BoxedMiddleware, MiddlewareFuture, boxed_middleware, guard};
use crate::matcher::{MatchOptions, PathPattern};
use crate::request::Request;
use crate::response::Response;

/// What a middleware wants to happen next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Carry on down the chain.
    Continue,
    /// Stop the chain; the request is considered handled.
    Skip,
}

/// A guarded middleware handler, before registration.
pub struct Middleware {
    methods: Vec<Method>,
    paths: Vec<String>,
    options: MatchOptions,
    handler: BoxedMiddleware,
}

impl Middleware {
    /// Middleware that applies to every request until constrained.
    pub fn new<F>(handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> MiddlewareFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self {
            methods: Vec::new(),
            paths: Vec::new(),
            options: MatchOptions::default(),
            handler: boxed_middleware(handler),
        }
    }

    /// Restricts to `method`. May be called repeatedly to allow several.
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Restricts to requests whose path matches `path`. May be called
    /// repeatedly; any one matching path is enough.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Interpret configured paths as regular expressions.
    pub fn regex(mut self, enabled: bool) -> Self {
        self.options.is_regexp = enabled;
        self
    }

    /// Interpret `:name` tokens in configured paths as captures.
    pub fn parse_params(mut self, enabled: bool) -> Self {
        self.options.parse_params = enabled;
        self
    }
}

/// A middleware with its path guards compiled.
struct Registered {
    methods: Vec<Method>,
    paths: Vec<PathPattern>,
    handler: BoxedMiddleware,
}

impl Registered {
    fn compile(mw: Middleware) -> Result<Self, Error> {
        let paths = mw
            .paths
            .iter()
            .map(|p| PathPattern::compile(p, mw.options))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { methods: mw.methods, paths, handler: mw.handler })
    }

    /// Method guard AND path guard. An empty guard admits everything.
    ///
    /// The path guard also admits a request whose matched route was
    /// registered with exactly one of the configured paths.
    fn applies_to(&self, req: &Request) -> bool {
        if !self.methods.is_empty() && !self.methods.contains(req.method()) {
            return false;
        }
        if self.paths.is_empty() {
            return true;
        }
        if let Some(route) = req.route() {
            if self.paths.iter().any(|p| p.as_str() == route.path()) {
                return true;
            }
        }
        self.paths.iter().any(|p| p.execute(req.path()).matched)
    }
}

/// Ordered middleware list, built once at startup.
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Registered>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware`. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if one of the middleware's paths is not a valid pattern; use
    /// [`try_with`](Self::try_with) to handle that as an error.
    pub fn with(self, middleware: Middleware) -> Self {
        self.try_with(middleware)
            .unwrap_or_else(|e| panic!("invalid middleware: {e}"))
    }

    pub fn try_with(mut self, middleware: Middleware) -> Result<Self, Error> {
        self.middlewares.push(Registered::compile(middleware)?);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs every eligible middleware in order.
    ///
    /// Returns `Ok(Flow::Continue)` when the chain is exhausted and the route
    /// handler should run. Each middleware completes before the next starts.
    ///
    /// # Errors
    ///
    /// [`Error::Middleware`] for a returned error, [`Error::HandlerFault`]
    /// for a panic. Nothing after the failing middleware runs.
    pub async fn execute(&self, req: &mut Request, res: &mut Response) -> Result<Flow, Error> {
        for (index, mw) in self.middlewares.iter().enumerate() {
            if !mw.applies_to(req) {
                continue;
            }
            match guard(mw.handler.call(req, res)).await? {
                Ok(Flow::Continue) => {}
                Ok(Flow::Skip) => {
                    debug!(index, path = req.path(), "middleware skipped the rest of the chain");
                    return Ok(Flow::Skip);
                }
                Err(e) => return Err(Error::Middleware(e)),
            }
        }
        Ok(Flow::Continue)
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http_body_util::Empty;

    use super::*;
    use crate::error::BoxError;
    use crate::response::testing::RecordingSink;
    use crate::router::{Route, RouteOptions};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recording(log: &Log, name: &'static str, flow: Flow) -> Middleware {
        let log = Arc::clone(log);
        Middleware::new(move |_req, _res| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(name);
                Ok(flow)
            })
        })
    }

    async fn request(method: Method, path: &str) -> Request {
        let raw = http::Request::builder()
            .method(method)
            .uri(path)
            .body(Empty::<Bytes>::new())
            .unwrap();
        Request::read(raw, None).await.unwrap()
    }

    fn response() -> Response {
        Response::new(RecordingSink::default())
    }

    #[tokio::test]
    async fn runs_eligible_middlewares_in_order() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .with(recording(&log, "global", Flow::Continue))
            .with(recording(&log, "index", Flow::Continue).path("/index"))
            .with(recording(&log, "other", Flow::Continue).path("/other"));

        let mut req = request(Method::GET, "/index").await;
        let flow = chain.execute(&mut req, &mut response()).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(*log.lock().unwrap(), ["global", "index"]);
    }

    #[tokio::test]
    async fn skip_stops_the_chain() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .with(recording(&log, "first", Flow::Skip))
            .with(recording(&log, "second", Flow::Continue));

        let mut req = request(Method::GET, "/").await;
        let flow = chain.execute(&mut req, &mut response()).await.unwrap();
        assert_eq!(flow, Flow::Skip);
        assert_eq!(*log.lock().unwrap(), ["first"]);
    }

    #[tokio::test]
    async fn error_aborts_the_chain() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .with(Middleware::new(|_req, _res| Box::pin(async { Err(BoxError::from("denied")) })))
            .with(recording(&log, "after", Flow::Continue));

        let mut req = request(Method::GET, "/").await;
        let err = chain.execute(&mut req, &mut response()).await.unwrap_err();
        assert!(matches!(err, Error::Middleware(ref e) if e.to_string() == "denied"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panic_becomes_fault() {
        let chain = MiddlewareChain::new().with(Middleware::new(|req, _res| {
            Box::pin(async move {
                if req.path() == "/boom" {
                    panic!("middleware blew up");
                }
                Ok(Flow::Continue)
            })
        }));

        let mut req = request(Method::GET, "/boom").await;
        let err = chain.execute(&mut req, &mut response()).await.unwrap_err();
        assert!(matches!(err, Error::HandlerFault(_)));
    }

    #[tokio::test]
    async fn method_guard() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .with(recording(&log, "post-only", Flow::Continue).method(Method::POST))
            .with(recording(&log, "get-or-put", Flow::Continue).methods([Method::GET, Method::PUT]));

        let mut req = request(Method::PUT, "/anything").await;
        chain.execute(&mut req, &mut response()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["get-or-put"]);
    }

    #[tokio::test]
    async fn method_and_path_guards_must_both_hold() {
        let log = Log::default();
        let chain = MiddlewareChain::new().with(
            recording(&log, "admin-post", Flow::Continue)
                .method(Method::POST)
                .path("/admin/:section")
                .parse_params(true),
        );

        for (method, path) in [
            (Method::GET, "/admin/users"),
            (Method::POST, "/public/users"),
            (Method::POST, "/admin/users"),
        ] {
            let mut req = request(method, path).await;
            chain.execute(&mut req, &mut response()).await.unwrap();
        }
        assert_eq!(*log.lock().unwrap(), ["admin-post"]);
    }

    #[tokio::test]
    async fn path_guard_uses_own_flags() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .with(recording(&log, "params", Flow::Continue).path("/users/:id").parse_params(true))
            .with(recording(&log, "regex", Flow::Continue).path("^/users/[0-9]+$").regex(true))
            .with(recording(&log, "literal", Flow::Continue).path("/users/:id"));

        let mut req = request(Method::GET, "/users/42").await;
        chain.execute(&mut req, &mut response()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["params", "regex"]);
    }

    #[tokio::test]
    async fn path_guard_admits_matched_route_path_verbatim() {
        let log = Log::default();
        let chain = MiddlewareChain::new()
            .with(recording(&log, "by-route", Flow::Continue).path("/users/:id"));

        let route = Route::new(
            Method::GET,
            "/users/:id",
            crate::handler::boxed_handler(|_req, _res| Box::pin(async { Ok(()) })),
            RouteOptions::params(),
        )
        .unwrap();

        let mut req = request(Method::GET, "/users/42").await;
        req.route = Some(Arc::new(route));
        chain.execute(&mut req, &mut response()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["by-route"]);
    }

    #[tokio::test]
    async fn middleware_can_write_context_for_later_steps() {
        let chain = MiddlewareChain::new()
            .with(Middleware::new(|req, _res| {
                Box::pin(async move {
                    req.context_mut().set("user", String::from("alice"));
                    Ok(Flow::Continue)
                })
            }))
            .with(Middleware::new(|req, res| {
                Box::pin(async move {
                    let user: String = req.context().bind("user");
                    res.append(user);
                    Ok(Flow::Continue)
                })
            }));

        let mut req = request(Method::GET, "/").await;
        let mut res = response();
        chain.execute(&mut req, &mut res).await.unwrap();
        assert_eq!(res.body(), b"alice");
    }

    #[test]
    fn invalid_path_is_rejected() {
        let err = MiddlewareChain::new()
            .try_with(Middleware::new(|_req, _res| Box::pin(async { Ok(Flow::Continue) })).path("[").regex(true))
            .unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }
}
