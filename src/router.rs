//! Ordered route table.
//!
//! Routes are tried in registration order and the first one whose method and
//! pattern both fit wins. There is no tree and no specificity ranking:
//! register `/users/me` before `/users/:id`, or `/users/:id` will take it.

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::error::Error;
use crate::handler::{BoxedHandler, HandlerFuture, boxed_handler, guard};
use crate::matcher::{MatchMode, MatchOptions, Params, PathPattern};
use crate::request::Request;
use crate::response::Response;

/// How a route's pattern is interpreted, and the content type it answers with.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    pub is_regexp: bool,
    pub parse_params: bool,
    pub content_type: Option<String>,
}

impl RouteOptions {
    /// Exact path equality.
    pub fn literal() -> Self {
        Self::default()
    }

    /// `:name` tokens are captured.
    pub fn params() -> Self {
        Self { parse_params: true, ..Self::default() }
    }

    /// The pattern is a regular expression.
    pub fn regex() -> Self {
        Self { is_regexp: true, ..Self::default() }
    }

    /// Content type set before the handler runs, unless the response already has one.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn match_options(&self) -> MatchOptions {
        MatchOptions { parse_params: self.parse_params, is_regexp: self.is_regexp }
    }
}

/// A registered route. Immutable once in the table.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    content_type: Option<String>,
    handler: BoxedHandler,
}

impl Route {
    pub(crate) fn new(
        method: Method,
        path: &str,
        handler: BoxedHandler,
        options: RouteOptions,
    ) -> Result<Self, Error> {
        let pattern = PathPattern::compile(path, options.match_options())?;
        Ok(Self { method, pattern, content_type: options.content_type, handler })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path pattern as registered (group prefix included).
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn mode(&self) -> MatchMode {
        self.pattern.mode()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path())
            .field("mode", &self.mode())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A route waiting for its group prefix.
struct PendingRoute {
    method: Method,
    path: String,
    handler: BoxedHandler,
    options: RouteOptions,
}

/// Routes sharing a path prefix.
///
/// Only registration sugar: [`Router::group`] prepends the prefix to every
/// child path and the group itself is gone afterwards.
///
/// ```rust
/// use http::Method;
/// use junction::{RouteGroup, RouteOptions, Router};
///
/// let router = Router::new().group(
///     RouteGroup::new("/api")
///         .get("/users/:id", |_req, _res| Box::pin(async { Ok(()) }))
///         .route(Method::GET, "/v[0-9]+/health", |_req, _res| Box::pin(async { Ok(()) }), RouteOptions::regex()),
/// );
/// assert_eq!(router.routes().map(|r| r.path()).collect::<Vec<_>>(), ["/api/users/:id", "/api/v[0-9]+/health"]);
/// ```
pub struct RouteGroup {
    prefix: String,
    routes: Vec<PendingRoute>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), routes: Vec::new() }
    }

    pub fn route<F>(mut self, method: Method, path: &str, handler: F, options: RouteOptions) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.routes.push(PendingRoute {
            method,
            path: path.to_owned(),
            handler: boxed_handler(handler),
            options,
        });
        self
    }
}

/// The application route table.
///
/// Build it once at startup and hand it to a
/// [`Dispatcher`](crate::Dispatcher); it is read-only from then on.
/// Each registration returns `self` so calls chain naturally.
#[derive(Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a method + pattern pair.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern under `options`; use
    /// [`try_route`](Self::try_route) to handle that as an error.
    pub fn route<F>(self, method: Method, path: &str, handler: F, options: RouteOptions) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.try_route(method, path, handler, options)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"))
    }

    pub fn try_route<F>(
        self,
        method: Method,
        path: &str,
        handler: F,
        options: RouteOptions,
    ) -> Result<Self, Error>
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.add(method, path, boxed_handler(handler), options)
    }

    /// Registers every route of `group` with the group prefix prepended.
    ///
    /// # Panics
    ///
    /// Panics on the first invalid child pattern; see [`try_group`](Self::try_group).
    pub fn group(self, group: RouteGroup) -> Self {
        self.try_group(group)
            .unwrap_or_else(|e| panic!("invalid route group: {e}"))
    }

    pub fn try_group(mut self, group: RouteGroup) -> Result<Self, Error> {
        for pending in group.routes {
            let path = format!("{}{}", group.prefix, pending.path);
            self = self.add(pending.method, &path, pending.handler, pending.options)?;
        }
        Ok(self)
    }

    fn add(
        mut self,
        method: Method,
        path: &str,
        handler: BoxedHandler,
        options: RouteOptions,
    ) -> Result<Self, Error> {
        self.routes.push(Arc::new(Route::new(method, path, handler, options)?));
        Ok(self)
    }

    /// Registered routes in match order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The first route whose method equals `method` and whose pattern
    /// matches `path`, with the parameters it extracted.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<Route>, Params)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                let result = route.pattern.execute(path);
                result.matched.then(|| (Arc::clone(route), result.into_params()))
            })
    }

    /// Runs `route`'s handler.
    ///
    /// Applies the route's content type first if the response has none yet.
    ///
    /// # Errors
    ///
    /// [`Error::Handler`] for a returned error, [`Error::HandlerFault`] for a panic.
    pub async fn execute(&self, route: &Route, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        if let Some(content_type) = route.content_type() {
            res.default_content_type(content_type);
        }
        guard(route.handler.call(req, res)).await?.map_err(Error::Handler)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}

/// `get`, `post`, … shortcuts. They enable `:name` captures; a pattern
/// without tokens still matches by plain equality.
macro_rules! method_shortcuts {
    ($ty:ty => $($name:ident: $method:ident),+ $(,)?) => {
        impl $ty {
            $(
                #[doc = concat!("Registers a `", stringify!($method), "` route with `:name` captures enabled.")]
                pub fn $name<F>(self, path: &str, handler: F) -> Self
                where
                    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a>
                        + Send
                        + Sync
                        + 'static,
                {
                    self.route(Method::$method, path, handler, RouteOptions::params())
                }
            )+
        }
    };
}

method_shortcuts!(Router => get: GET, post: POST, put: PUT, patch: PATCH, delete: DELETE, head: HEAD, options: OPTIONS);
method_shortcuts!(RouteGroup => get: GET, post: POST, put: PUT, patch: PATCH, delete: DELETE, head: HEAD, options: OPTIONS);
