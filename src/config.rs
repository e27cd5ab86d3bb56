//! Server configuration.
//!
//! Loaded from TOML; every field is optional.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! content_type = "application/json"
//! ```

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Listener address and response defaults.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// IP address to bind. Hostnames are not resolved.
    pub host: String,
    pub port: u16,
    /// Default `content-type` for successful responses that set none.
    pub content_type: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_owned(), port: 3000, content_type: None }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// [`Error::Address`] if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
