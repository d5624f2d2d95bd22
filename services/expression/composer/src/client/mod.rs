use async_trait::async_trait;
use derive_more::Display;

use expression_client::{Expression, SubmitResponse};
use telemetry::IsErr;

pub use http::HttpGateway;
#[cfg(test)]
pub use memory::MemoryGateway;

mod http;
#[cfg(test)]
mod memory;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum TransportError {
    #[display(fmt = "Request Error: {}", _0)]
    Request(String),

    #[display(fmt = "Upstream responded with status {}", _0)]
    Status(u16),
}

impl std::error::Error for TransportError {}

impl IsErr for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => TransportError::Status(status.as_u16()),
            None => TransportError::Request(e.to_string()),
        }
    }
}

/// The remote service materialized expressions are submitted to
#[async_trait]
pub trait Gateway: Sync + Send {
    async fn submit(&self, expr: &Expression) -> Result<SubmitResponse, TransportError>;
}
