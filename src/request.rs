//! Incoming request envelope.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use http_body_util::BodyExt;

use crate::context::ContextStore;
use crate::error::{BoxError, Error};
use crate::matcher::Params;
use crate::router::Route;

/// Snapshot of one inbound request.
///
/// Built once, before routing, with the whole body already in memory.
/// Everything except the [`ContextStore`] is read-only from then on.
pub struct Request {
    method: Method,
    path: String,
    url: String,
    headers: HeaderMap,
    query: HashMap<String, Vec<String>>,
    content: Bytes,
    body: String,
    remote_addr: Option<SocketAddr>,
    pub(crate) params: Params,
    pub(crate) route: Option<Arc<Route>>,
    context: ContextStore,
}

impl Request {
    /// Reads `raw` into an envelope, buffering the entire body.
    ///
    /// The body is consumed here and released on every path out, including
    /// a failed read.
    ///
    /// # Errors
    ///
    /// [`Error::BodyRead`] if the body stream fails.
    pub async fn read<B>(raw: http::Request<B>, remote_addr: Option<SocketAddr>) -> Result<Self, Error>
    where
        B: hyper::body::Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = raw.into_parts();
        let content = body
            .collect()
            .await
            .map_err(|e| Error::BodyRead(e.into()))?
            .to_bytes();

        let query = parts.uri.query().map(parse_query).unwrap_or_default();

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            url: parts.uri.to_string(),
            headers: parts.headers,
            query,
            body: String::from_utf8_lossy(&content).into_owned(),
            content,
            remote_addr,
            params: Params::new(),
            route: None,
            context: ContextStore::new(),
        })
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    /// The request target as received, including the query string.
    pub fn url(&self) -> &str { &self.url }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    /// The raw body bytes.
    pub fn content(&self) -> &[u8] { &self.content }
    /// The body as text; invalid UTF-8 is replaced.
    pub fn body(&self) -> &str { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn params(&self) -> &Params { &self.params }
    pub fn query(&self) -> &HashMap<String, Vec<String>> { &self.query }

    /// First value of a header, if it is present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name)?.first().map(String::as_str)
    }

    /// The route this request was dispatched to, once routing has happened.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    pub fn context(&self) -> &ContextStore { &self.context }
    pub fn context_mut(&mut self) -> &mut ContextStore { &mut self.context }
}

fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        out.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    out
}
