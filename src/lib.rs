//! # junction
//!
//! A minimal HTTP request-routing and middleware-dispatch engine.
//!
//! ## What it does
//!
//! - Matches method + path against an ordered route table: literal,
//!   regex, or `:name` parameter patterns. First match wins.
//! - Runs an ordered middleware chain before the handler. Any middleware can
//!   short-circuit (`Flow::Skip`) or fail the request.
//! - Buffers status, headers, and body in one [`Response`] that is flushed
//!   exactly once.
//! - Gives every request a typed scratch space ([`ContextStore`]) for
//!   passing data from middlewares to handlers.
//!
//! Every failure (no route, middleware error, handler error, handler panic,
//! unreadable body) is answered the same way: pending output is dropped and
//! the client gets a bare status and reason phrase.
//!
//! What it does not do: TLS, compression, static files, body-size limits.
//! Routes are evaluated linearly; keep tables small and order them from
//! specific to generic.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{Method, StatusCode};
//! use junction::{
//!     BoxError, ContentType, Dispatcher, Flow, HandlerFuture, Middleware, MiddlewareChain,
//!     Request, Response, RouteGroup, RouteOptions, Router, Server, ServerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), junction::Error> {
//!     let routes = Router::new()
//!         .get("/index", index)
//!         .group(
//!             RouteGroup::new("/users")
//!                 .route(Method::GET, "/:id", get_user, RouteOptions::params().content_type(ContentType::Json)),
//!         );
//!
//!     let middleware = MiddlewareChain::new().with(
//!         Middleware::new(|req, res| Box::pin(async move {
//!             if req.header("authorization").is_none() {
//!                 res.status(StatusCode::UNAUTHORIZED).send("")?;
//!                 return Ok(Flow::Skip);
//!             }
//!             Ok::<_, BoxError>(Flow::Continue)
//!         }))
//!         .path("/users/:id")
//!         .parse_params(true),
//!     );
//!
//!     let app = Dispatcher::new(routes).with_middleware(middleware);
//!     Server::new(ServerConfig::load("junction.toml")?).serve(app).await
//! }
//!
//! fn index<'a>(_req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
//!     Box::pin(async move {
//!         res.append("Test");
//!         Ok(())
//!     })
//! }
//!
//! fn get_user<'a>(req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
//!     Box::pin(async move {
//!         let id: u64 = req.param("id").unwrap_or_default().parse()?;
//!         res.append(format!(r#"{{"id":{id}}}"#));
//!         Ok::<(), BoxError>(())
//!     })
//! }
//! ```

mod config;
mod context;
mod dispatcher;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod sink;

pub mod matcher;
pub mod middleware;

pub use config::ServerConfig;
pub use context::ContextStore;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, Error};
pub use handler::{HandlerFuture, MiddlewareFuture};
pub use matcher::{MatchMode, MatchOptions, MatchResult, Params, PathPattern};
pub use middleware::{Flow, Middleware, MiddlewareChain};
pub use request::Request;
pub use response::{ContentType, Headers, Response};
pub use router::{Route, RouteGroup, RouteOptions, Router};
pub use server::{Server, serve_with_shutdown};
pub use sink::{ChannelSink, ResponseSink};
