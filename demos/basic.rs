//! Minimal junction example: a plain route, a parameter route group, and two
//! middlewares.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/index
//!   curl http://localhost:3000/api/users/42 -H 'authorization: Bearer t'
//!   curl -i http://localhost:3000/api/users/42

use http::{Method, StatusCode};
use junction::{
    BoxError, ContentType, Dispatcher, Flow, HandlerFuture, Middleware, MiddlewareChain, Request,
    Response, RouteGroup, RouteOptions, Router, Server, ServerConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), junction::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let routes = Router::new()
        .get("/index", index)
        .group(
            RouteGroup::new("/api")
                .route(Method::GET, "/users/:id", get_user, RouteOptions::params().content_type(ContentType::Json)),
        );

    let middleware = MiddlewareChain::new()
        .with(Middleware::new(request_id))
        .with(Middleware::new(require_auth).path("/api/users/:id"));

    let app = Dispatcher::new(routes).with_middleware(middleware);
    Server::new(config).serve(app).await
}

// GET /index
fn index<'a>(_req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        res.append("Test");
        Ok(())
    })
}

// GET /api/users/:id
fn get_user<'a>(req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        let id: u64 = req.param("id").unwrap_or_default().parse()?;
        let request_id: String = req.context().bind("request-id");
        res.headers_mut().add("x-request-id", request_id);
        res.append(format!(r#"{{"id":{id}}}"#));
        Ok::<(), BoxError>(())
    })
}

fn request_id<'a>(req: &'a mut Request, _res: &'a mut Response) -> junction::MiddlewareFuture<'a> {
    Box::pin(async move {
        let id = req.header("x-request-id").map(str::to_owned).unwrap_or_else(|| {
            format!("{}-{}", req.remote_addr().map(|a| a.port()).unwrap_or(0), req.path().len())
        });
        req.context_mut().set("request-id", id);
        Ok(Flow::Continue)
    })
}

fn require_auth<'a>(req: &'a mut Request, res: &'a mut Response) -> junction::MiddlewareFuture<'a> {
    Box::pin(async move {
        if req.header("authorization").is_none() {
            res.status(StatusCode::UNAUTHORIZED).send("missing authorization")?;
            return Ok(Flow::Skip);
        }
        Ok(Flow::Continue)
    })
}
