//! TCP transport helpers
//!
//! Provides:
//! - Outbound dials with an optional connect timeout
//! - An optional idle timeout for handshakes and relays
//!
//! Both timeouts default to "none", which waits indefinitely.

mod tcp;

pub use tcp::{connect, connect_address};

use std::future::Future;
use std::time::Duration;

/// Transport configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Limit on each outbound TCP connect
    pub connect_timeout: Option<Duration>,
    /// Limit on the whole handshake and on the connect-reply wait. A relay
    /// closes once neither direction has moved bytes for this long.
    pub idle_timeout: Option<Duration>,
}

impl TransportConfig {
    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Await `fut`, failing with [`crate::Error::Timeout`] if `limit` elapses
/// first. `None` never times out.
pub async fn with_timeout<F, T, E>(limit: Option<Duration>, fut: F) -> crate::Result<T>
where
    F: Future<Output = Result<T, E>>,
    crate::Error: From<E>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| crate::Error::Timeout)?
            .map_err(crate::Error::from),
        None => fut.await.map_err(crate::Error::from),
    }
}
