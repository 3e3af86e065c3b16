//! Request gateways: open a streaming completion and hand back its raw body

pub mod openai;

use crate::{ByteStream, Error, RequestConfig, Result};
use async_trait::async_trait;

/// A successfully opened completion stream
pub struct GatewayStream {
    /// HTTP status the upstream answered with (always 2xx)
    pub status: u16,
    /// Raw response body
    pub body: ByteStream,
}

impl std::fmt::Debug for GatewayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayStream")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issues the outbound streaming request.
///
/// Implementations fail with `Error::Configuration` when credentials are
/// missing, `Error::Gateway` on a non-2xx status and `Error::Connection` when
/// the connection cannot be opened.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn open_stream(&self, config: &RequestConfig) -> Result<GatewayStream>;
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("{} is not set", env_var)))
}
