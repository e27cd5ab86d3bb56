//! One request in, one response out.
//!
//! [`Dispatcher::handle`] is the whole request lifecycle:
//!
//! 1. buffer the body into a [`Request`];
//! 2. pick the first matching route;
//! 3. run the middleware chain;
//! 4. run the route handler unless a middleware skipped;
//! 5. flush the [`Response`] if nobody has yet.
//!
//! Every failure along the way ends in the same place: pending output is
//! thrown away and the client gets a bare status with its reason phrase
//! (`404` when no route matched, `500` for everything else).

use std::net::SocketAddr;
use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{BoxError, Error};
use crate::middleware::{Flow, MiddlewareChain};
use crate::request::Request;
use crate::response::{Response, reason};
use crate::router::Router;
use crate::sink::ResponseSink;

/// Body bytes included in failure logs.
const BODY_PREVIEW: usize = 256;

/// Routes, middlewares, and response defaults, assembled once at startup.
#[derive(Debug, Default)]
pub struct Dispatcher {
    router: Router,
    middleware: MiddlewareChain,
    default_content_type: Option<String>,
}

impl Dispatcher {
    pub fn new(router: Router) -> Self {
        Self { router, ..Self::default() }
    }

    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    /// Content type used when neither the route nor the handler set one.
    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = Some(content_type.into());
        self
    }

    /// Applies the response defaults from `config`.
    pub fn configure(mut self, config: &ServerConfig) -> Self {
        if let Some(content_type) = &config.content_type {
            self.default_content_type = Some(content_type.clone());
        }
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// Handles one request, writing exactly one response to `sink`.
    ///
    /// Never fails: errors are logged and answered on `sink`. A sink that
    /// fails to accept the response is logged too.
    pub async fn handle<B>(
        &self,
        raw: http::Request<B>,
        remote_addr: Option<SocketAddr>,
        sink: impl ResponseSink + 'static,
    ) where
        B: hyper::body::Body,
        B::Error: Into<BoxError>,
    {
        let mut res = Response::new(sink);
        res.set_fallback_content_type(self.default_content_type.clone());
        let method = raw.method().clone();
        let path = raw.uri().path().to_owned();

        let mut req = match Request::read(raw, remote_addr).await {
            Ok(req) => req,
            Err(err) => return self.recover(&method, &path, &[], &mut res, err),
        };

        info!(
            method = %req.method(),
            url = req.url(),
            remote = ?req.remote_addr(),
            "incoming request"
        );
        debug!(body = %preview(req.content()), "request body");

        let outcome = match self.run(&mut req, &mut res).await {
            Ok(()) => finish(&mut res),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => {
                info!(method = %req.method(), path = req.path(), status = res.status_code().as_u16(), "response sent")
            }
            Err(err) => self.recover(req.method(), req.path(), req.content(), &mut res, err),
        }
    }

    /// Match, middleware, handler.
    async fn run(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        let Some((route, params)) = self.router.lookup(req.method(), req.path()) else {
            return Err(Error::NoRouteMatched {
                method: req.method().clone(),
                path: req.path().to_owned(),
            });
        };
        req.params = params;
        req.route = Some(Arc::clone(&route));

        if self.middleware.execute(req, res).await? == Flow::Skip {
            return Ok(());
        }
        self.router.execute(&route, req, res).await
    }

    /// The single catch path.
    fn recover(&self, method: &Method, path: &str, body: &[u8], res: &mut Response, err: Error) {
        let status = err.status();
        if status == StatusCode::NOT_FOUND {
            warn!(%method, path, "no route matched");
        } else {
            error!(%method, path, body = %preview(body), error = %err, "request failed");
        }

        if res.is_sent() {
            error!(%method, path, "response already sent, cannot report failure");
            return;
        }

        res.discard();
        res.status(status);
        if let Err(err) = res.send(reason(status)) {
            error!(%method, path, error = %err, "failed to flush error response");
        }
    }
}

/// Flushes the response unless a handler or middleware already did.
fn finish(res: &mut Response) -> Result<(), Error> {
    if !res.is_sent() {
        res.send("")?;
    }
    Ok(())
}

fn preview(body: &[u8]) -> String {
    let cut = body.len().min(BODY_PREVIEW);
    String::from_utf8_lossy(&body[..cut]).into_owned()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::Full;

    use super::*;
    use crate::handler::HandlerFuture;
    use crate::response::testing::RecordingSink;

    fn index<'a>(_req: &'a mut Request, res: &'a mut Response) -> HandlerFuture<'a> {
        Box::pin(async move {
            res.append("Test");
            Ok(())
        })
    }

    fn get(path: &str) -> http::Request<Full<Bytes>> {
        http::Request::get(path).body(Full::new(Bytes::new())).unwrap()
    }

    #[tokio::test]
    async fn applies_default_content_type_on_success_only() {
        let app = Dispatcher::new(Router::new().get("/index", index)).default_content_type("text/plain");

        let sink = RecordingSink::default();
        app.handle(get("/index"), None, sink.clone()).await;
        let written = sink.0.lock().unwrap();
        assert_eq!(written.headers, [("content-type".to_owned(), "text/plain".to_owned())]);
        assert_eq!(written.bodies, [Bytes::from_static(b"Test")]);
        drop(written);

        let sink = RecordingSink::default();
        app.handle(get("/missing"), None, sink.clone()).await;
        let written = sink.0.lock().unwrap();
        assert!(written.headers.is_empty());
        assert_eq!(written.statuses, [StatusCode::NOT_FOUND]);
        assert_eq!(written.bodies, [Bytes::from_static(b"Not Found")]);
    }

    #[tokio::test]
    async fn configure_reads_content_type() {
        let config = ServerConfig { content_type: Some("application/json".into()), ..ServerConfig::default() };
        let app = Dispatcher::new(Router::new()).configure(&config);
        assert_eq!(app.default_content_type.as_deref(), Some("application/json"));

        let app = Dispatcher::new(Router::new()).default_content_type("text/csv").configure(&ServerConfig::default());
        assert_eq!(app.default_content_type.as_deref(), Some("text/csv"));
    }

    #[test]
    fn preview_truncates_lossily() {
        assert_eq!(preview(b"short"), "short");
        assert_eq!(preview(&[b'a'; 1000]).len(), BODY_PREVIEW);
        assert_eq!(preview(&[0xff]), "\u{fffd}");
    }
}
