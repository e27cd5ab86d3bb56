//! Where a flushed response goes.
//!
//! [`Response::send`](crate::Response::send) writes the pending headers, the
//! status, then the body to a [`ResponseSink`]. The sink is the only thing in
//! the engine that touches the transport.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tokio::sync::oneshot;

use crate::error::Error;

/// Transport-side receiver of one flushed response.
///
/// Calls arrive in order: every header, then the status, then the body.
/// The body write completes the response.
pub trait ResponseSink: Send {
    fn write_header(&mut self, name: &str, value: &str) -> Result<(), Error>;
    fn write_status(&mut self, status: StatusCode) -> Result<(), Error>;
    fn write_body(&mut self, body: Bytes) -> Result<(), Error>;
}

/// Sink that assembles an `http::Response` and hands it to the connection
/// task over a oneshot channel.
///
/// A dropped receiver is the transport failing, reported as [`Error::SinkClosed`].
pub struct ChannelSink {
    headers: HeaderMap,
    status: StatusCode,
    tx: Option<oneshot::Sender<http::Response<Full<Bytes>>>>,
}

impl ChannelSink {
    pub fn new() -> (Self, oneshot::Receiver<http::Response<Full<Bytes>>>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self { headers: HeaderMap::new(), status: StatusCode::OK, tx: Some(tx) };
        (sink, rx)
    }
}

impl ResponseSink for ChannelSink {
    fn write_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidHeader(name.to_owned()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidHeader(name.as_str().to_owned()))?;
        self.headers.append(name, value);
        Ok(())
    }

    fn write_status(&mut self, status: StatusCode) -> Result<(), Error> {
        self.status = status;
        Ok(())
    }

    fn write_body(&mut self, body: Bytes) -> Result<(), Error> {
        let tx = self.tx.take().ok_or(Error::AlreadySent)?;
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        tx.send(response).map_err(|_| Error::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[tokio::test]
    async fn assembles_and_delivers_response() {
        let (mut sink, rx) = ChannelSink::new();
        sink.write_header("x-test", "a").unwrap();
        sink.write_header("X-Test", "b").unwrap();
        sink.write_status(StatusCode::CREATED).unwrap();
        sink.write_body(Bytes::from_static(b"done")).unwrap();

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let values: Vec<_> = response.headers().get_all("x-test").iter().collect();
        assert_eq!(values, ["a", "b"]);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"done");
    }

    #[test]
    fn rejects_invalid_header_names() {
        let (mut sink, _rx) = ChannelSink::new();
        let err = sink.write_header("bad header", "v").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(name) if name == "bad header"));
    }

    #[test]
    fn dropped_receiver_is_a_write_failure() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(sink.write_body(Bytes::new()), Err(Error::SinkClosed)));
        assert!(matches!(sink.write_body(Bytes::new()), Err(Error::AlreadySent)));
    }
}
