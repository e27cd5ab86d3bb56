//! HTTP listener and graceful shutdown.
//!
//! The server is thin glue: accept connections, let hyper parse requests,
//! hand each one to the [`Dispatcher`] with a [`ChannelSink`], and return
//! whatever the dispatcher flushed.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. stops calling `listener.accept()`, so no new connections are made;
//! 2. lets every in-flight connection task run to completion;
//! 3. returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::response::reason;
use crate::sink::ChannelSink;

/// The HTTP server.
#[derive(Debug, Default)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Binds the configured address and serves `app` until a shutdown signal.
    ///
    /// The config's response defaults are applied to `app` first.
    pub async fn serve(self, app: Dispatcher) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.socket_addr()?).await?;
        let app = app.configure(&self.config);
        serve_with_shutdown(listener, app, shutdown_signal()).await
    }
}

/// Serves `app` on an already-bound `listener` until `shutdown` resolves,
/// then waits for in-flight connections to finish.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    app: Dispatcher,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let addr = listener.local_addr()?;

    // Shared read-only across every connection task.
    let app = Arc::new(app);

    info!(%addr, routes = app.router().len(), middlewares = app.middleware().len(), "junction listening");

    let mut tasks = tokio::task::JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Check shutdown first so a SIGTERM stops accepting immediately,
            // even if more connections are queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let app = Arc::clone(&app);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { Ok::<_, Infallible>(respond(&app, req, remote_addr).await) }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("junction stopped");
    Ok(())
}

async fn respond(
    app: &Dispatcher,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> http::Response<Full<Bytes>> {
    let (sink, delivered) = ChannelSink::new();
    app.handle(req, Some(remote_addr), sink).await;

    // The dispatcher always flushes exactly once. A sender dropped without
    // a response would be an engine bug; answer 500 rather than hang up.
    delivered.await.unwrap_or_else(|_| {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let mut fallback = http::Response::new(Full::new(Bytes::from_static(reason(status).as_bytes())));
        *fallback.status_mut() = status;
        fallback
    })
}

/// Resolves on the first shutdown signal the process receives.
///
/// SIGTERM and SIGINT on Unix; Ctrl-C only elsewhere. If a handler cannot be
/// installed, that arm never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
