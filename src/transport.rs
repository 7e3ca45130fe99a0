//! Transport seam between sessions and the remote chat endpoints.

use async_trait::async_trait;

use crate::error::TransportError;

/// Sends one message to a target endpoint and returns the reply text.
///
/// Implementations classify their own failures as retryable or fatal;
/// sessions never inspect error text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &str, message: &str) -> Result<String, TransportError>;
}
