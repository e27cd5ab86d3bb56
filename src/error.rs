//! Unified error type.

use http::StatusCode;

/// Error type user handlers and middlewares return.
///
/// Anything implementing `std::error::Error` converts into it with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by junction's fallible operations.
///
/// Request-time variants (`NoRouteMatched` through `BodyRead`) all end in the
/// dispatcher's single catch path. The rest surface at registration, flush,
/// or startup time.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no route matches {method} {path}")]
    NoRouteMatched { method: http::Method, path: String },

    #[error("middleware failed: {0}")]
    Middleware(#[source] BoxError),

    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("handler panicked: {0}")]
    HandlerFault(String),

    #[error("failed to read request body: {0}")]
    BodyRead(#[source] BoxError),

    #[error("invalid route pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("duplicate parameter `{name}` in pattern `{pattern}`")]
    DuplicateParam { pattern: String, name: String },

    #[error("invalid header `{0}`")]
    InvalidHeader(String),

    #[error("response already sent")]
    AlreadySent,

    #[error("response sink closed")]
    SinkClosed,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
}

impl Error {
    /// The status the dispatcher answers with when this error ends a request.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status() {
        let missing = Error::NoRouteMatched {
            method: http::Method::GET,
            path: "/nope".into(),
        };
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "no route matches GET /nope");

        let failed = Error::Handler("boom".into());
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.to_string(), "handler failed: boom");
        assert_eq!(Error::HandlerFault("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
