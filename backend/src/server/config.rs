//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::path::Path;

use actix_web::cookie::{Key, SameSite};
use tracing::warn;
use zeroize::Zeroize;

/// Minimum key material accepted by [`Key::derive_from`].
const SESSION_KEY_MIN_LEN: usize = 32;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) dev_login: bool,
}

impl ServerConfig {
    /// Construct a server configuration.
    #[must_use]
    pub fn new(key: Key, cookie_secure: bool, same_site: SameSite, bind_addr: SocketAddr) -> Self {
        Self {
            key,
            cookie_secure,
            same_site,
            bind_addr,
            dev_login: false,
        }
    }

    /// Mount the development session routes.
    #[must_use]
    pub const fn with_dev_login(mut self, enabled: bool) -> Self {
        self.dev_login = enabled;
        self
    }
}

/// Load the session signing key from `path`, or generate a temporary one.
///
/// A temporary key invalidates every session on restart, so it is only used
/// when no key file is configured.
///
/// # Errors
///
/// Returns [`std::io::Error`] when a configured key file cannot be read or
/// holds fewer than 32 bytes.
pub fn load_session_key(path: Option<&Path>) -> std::io::Result<Key> {
    let Some(key_path) = path else {
        warn!("no session key file configured; using a temporary key");
        return Ok(Key::generate());
    };
    let mut bytes = std::fs::read(key_path).map_err(|err| {
        std::io::Error::other(format!(
            "failed to read session key at {}: {err}",
            key_path.display()
        ))
    })?;
    let length = bytes.len();
    if length < SESSION_KEY_MIN_LEN {
        bytes.zeroize();
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "session key at {} is {length} bytes; need at least {SESSION_KEY_MIN_LEN}",
                key_path.display()
            ),
        ));
    }
    let key = Key::derive_from(&bytes);
    bytes.zeroize();
    Ok(key)
}
