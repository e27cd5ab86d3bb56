//! The per-request response accumulator.
//!
//! Handlers and middlewares mutate one [`Response`]: status, headers, body.
//! None of that touches the network. [`Response::send`] flushes everything to
//! the transport exactly once; the dispatcher sends it for you if a handler
//! returns without doing so.

use bytes::BytesMut;
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use tracing::warn;

use crate::error::Error;
use crate::sink::ResponseSink;

pub(crate) const CONTENT_TYPE: &str = "content-type";

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values, usable anywhere a content type string is accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> String {
        ct.as_str().to_owned()
    }
}

// ── Headers ───────────────────────────────────────────────────────────────────

/// Pending response headers: a multimap kept in insertion order.
///
/// Keys are stored as given. Lookups are exact unless `ignore_case` is set,
/// in which case both sides compare lower-cased.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Appends `value` under `key`, keeping any values already there.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Every value stored under `key`, in insertion order.
    pub fn get(&self, key: &str, ignore_case: bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| key_matches(k, key, ignore_case))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str, ignore_case: bool) -> bool {
        self.entries.iter().any(|(k, _)| key_matches(k, key, ignore_case))
    }

    /// Drops every value stored under `key`.
    pub fn remove(&mut self, key: &str, ignore_case: bool) {
        self.entries.retain(|(k, _)| !key_matches(k, key, ignore_case));
    }

    /// Drops all pending headers.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key_matches(stored: &str, wanted: &str, ignore_case: bool) -> bool {
    if ignore_case {
        stored.to_lowercase() == wanted.to_lowercase()
    } else {
        stored == wanted
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// Status, headers, and body for one request, flushed once to a [`ResponseSink`].
///
/// ```rust
/// # use junction::{Response, ResponseSink, Error};
/// # use bytes::Bytes;
/// # use http::StatusCode;
/// # struct Discard;
/// # impl ResponseSink for Discard {
/// #     fn write_header(&mut self, _: &str, _: &str) -> Result<(), Error> { Ok(()) }
/// #     fn write_status(&mut self, _: StatusCode) -> Result<(), Error> { Ok(()) }
/// #     fn write_body(&mut self, _: Bytes) -> Result<(), Error> { Ok(()) }
/// # }
/// let mut res = Response::new(Discard);
/// res.status(StatusCode::CREATED);
/// res.headers_mut().add("location", "/users/42");
/// res.append(br#"{"id":42"#);
/// res.send("}").unwrap();
/// assert!(res.is_sent());
/// ```
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: BytesMut,
    sink: Box<dyn ResponseSink>,
    fallback_content_type: Option<String>,
    sent: bool,
}

impl Response {
    /// Empty `200 OK` response that will flush to `sink`.
    pub fn new(sink: impl ResponseSink + 'static) -> Self {
        Self::with_sink(Box::new(sink))
    }

    pub fn with_sink(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::default(),
            body: BytesMut::new(),
            sink,
            fallback_content_type: None,
            sent: false,
        }
    }

    /// Sets the status. In-memory only.
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.status = code;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Appends to the pending body. In-memory only.
    pub fn append(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(bytes.as_ref());
        self
    }

    /// The body accumulated so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Whether [`send`](Self::send) has been called.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Appends `content` (if non-empty) and flushes the response.
    ///
    /// Writes every pending header, the status, then the body to the sink.
    /// The fallback content type, if any, is added when no `content-type` is
    /// pending. Returns the sink's write failure, if any.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadySent`] on a second call; nothing is written.
    /// - [`Error::InvalidHeader`] if a pending header is not valid HTTP;
    ///   nothing is written and the response stays unsent.
    pub fn send(&mut self, content: impl AsRef<[u8]>) -> Result<(), Error> {
        if self.sent {
            warn!(status = %self.status, "response already sent, ignoring second send");
            return Err(Error::AlreadySent);
        }
        if let Some(content_type) = self.fallback_content_type.take() {
            self.default_content_type(&content_type);
        }
        self.check_headers()?;
        self.sent = true;

        let content = content.as_ref();
        if !content.is_empty() {
            self.body.extend_from_slice(content);
        }

        for (name, value) in self.headers.iter() {
            self.sink.write_header(name, value)?;
        }
        self.sink.write_status(self.status)?;
        self.sink.write_body(self.body.split().freeze())
    }

    fn check_headers(&self) -> Result<(), Error> {
        for (name, value) in self.headers.iter() {
            if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                return Err(Error::InvalidHeader(name.to_owned()));
            }
        }
        Ok(())
    }

    /// Content type [`send`](Self::send) falls back to.
    pub(crate) fn set_fallback_content_type(&mut self, content_type: Option<String>) {
        self.fallback_content_type = content_type;
    }

    /// Sets `content-type` unless one is already pending.
    pub(crate) fn default_content_type(&mut self, content_type: &str) {
        if !self.headers.contains(CONTENT_TYPE, true) {
            self.headers.add(CONTENT_TYPE, content_type);
        }
    }

    /// Throws away everything pending: status back to 200, no headers, no body,
    /// no fallback content type.
    pub(crate) fn discard(&mut self) {
        self.status = StatusCode::OK;
        self.fallback_content_type = None;
        self.headers.clear();
        self.body.clear();
    }
}

/// The standard reason phrase for `status`, e.g. `"Internal Server Error"`.
pub(crate) fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}


#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::testing::RecordingSink;
    use super::*;

    fn response() -> (Response, RecordingSink) {
        let sink = RecordingSink::default();
        (Response::new(sink.clone()), sink)
    }

    #[test]
    fn header_values_keep_insertion_order() {
        let mut h = Headers::default();
        h.add("X", "a");
        h.add("X", "b");
        assert_eq!(h.get("X", false), ["a", "b"]);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn header_lookup_case_rules() {
        let mut h = Headers::default();
        h.add("X-Test", "1");
        assert_eq!(h.get("x-test", true), ["1"]);
        assert!(h.get("x-test", false).is_empty());
        assert!(h.contains("X-TEST", true));
        assert!(!h.contains("X-TEST", false));
    }

    #[test]
    fn header_remove_and_clear() {
        let mut h = Headers::default();
        h.add("X-Test", "1");
        h.add("x-test", "2");
        h.add("Other", "3");

        h.remove("x-test", false);
        assert_eq!(h.get("X-Test", false), ["1"]);

        h.remove("X-TEST", true);
        assert!(h.get("x-test", true).is_empty());
        assert_eq!(h.len(), 1);

        h.clear();
        assert!(h.is_empty());
    }

    #[test]
    fn mutation_does_not_write() {
        let (mut res, sink) = response();
        res.status(StatusCode::ACCEPTED).append("abc");
        res.headers_mut().add("k", "v");
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), b"abc");

        let written = sink.0.lock().unwrap();
        assert!(written.headers.is_empty() && written.statuses.is_empty() && written.bodies.is_empty());
    }

    #[test]
    fn send_flushes_headers_status_body() {
        let (mut res, sink) = response();
        res.status(StatusCode::CREATED).append("hello, ");
        res.headers_mut().add("X", "a");
        res.headers_mut().add("X", "b");
        res.send("world").unwrap();

        let written = sink.0.lock().unwrap();
        assert_eq!(
            written.headers,
            [("X".to_owned(), "a".to_owned()), ("X".to_owned(), "b".to_owned())]
        );
        assert_eq!(written.statuses, [StatusCode::CREATED]);
        assert_eq!(written.bodies, [Bytes::from_static(b"hello, world")]);
    }

    #[test]
    fn second_send_is_refused() {
        let (mut res, sink) = response();
        res.send("once").unwrap();
        assert!(matches!(res.send("twice"), Err(Error::AlreadySent)));
        assert_eq!(sink.0.lock().unwrap().statuses.len(), 1);
    }

    #[test]
    fn empty_send_keeps_buffered_body() {
        let (mut res, sink) = response();
        res.append("buffered");
        res.send("").unwrap();
        assert_eq!(sink.0.lock().unwrap().bodies, [Bytes::from_static(b"buffered")]);
    }

    #[test]
    fn default_content_type_respects_explicit_header() {
        let (mut res, _) = response();
        res.headers_mut().add("Content-Type", "text/csv");
        res.default_content_type(ContentType::Json.as_str());
        assert_eq!(res.headers().get(CONTENT_TYPE, true), ["text/csv"]);

        let (mut res, _) = response();
        res.default_content_type(ContentType::Json.as_str());
        assert_eq!(res.headers().get("content-type", false), ["application/json"]);
    }

    #[test]
    fn fallback_content_type_applies_on_send_unless_set() {
        let (mut res, sink) = response();
        res.set_fallback_content_type(Some("text/plain".to_owned()));
        res.send("hi").unwrap();
        assert_eq!(sink.0.lock().unwrap().headers, [("content-type".to_owned(), "text/plain".to_owned())]);

        let (mut res, sink) = response();
        res.set_fallback_content_type(Some("text/plain".to_owned()));
        res.headers_mut().add("Content-Type", "text/csv");
        res.send("a,b").unwrap();
        assert_eq!(sink.0.lock().unwrap().headers, [("Content-Type".to_owned(), "text/csv".to_owned())]);
    }

    #[test]
    fn invalid_header_is_refused_before_anything_is_written() {
        let (mut res, sink) = response();
        res.headers_mut().add("x-bad", "a\nb");
        assert!(matches!(res.send("body"), Err(Error::InvalidHeader(name)) if name == "x-bad"));
        assert!(!res.is_sent());

        let (mut res, sink2) = response();
        res.headers_mut().add("bad name", "v");
        assert!(matches!(res.send(""), Err(Error::InvalidHeader(_))));

        for sink in [sink, sink2] {
            let written = sink.0.lock().unwrap();
            assert!(written.headers.is_empty() && written.statuses.is_empty() && written.bodies.is_empty());
        }
    }

    #[test]
    fn discard_resets_pending_state() {
        let (mut res, _) = response();
        res.status(StatusCode::IM_A_TEAPOT).append("partial");
        res.headers_mut().add("k", "v");
        res.set_fallback_content_type(Some("text/plain".to_owned()));
        res.discard();
        assert!(res.fallback_content_type.is_none());
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert!(res.headers().is_empty());
        assert_eq!(reason(StatusCode::INTERNAL_SERVER_ERROR), "Internal Server Error");
    }
}
