use async_trait::async_trait;
use tokio::sync::Mutex;

use expression_client::{Expression, SubmitResponse};

use super::{Gateway, TransportError};

/// Records submissions instead of sending them
pub struct MemoryGateway {
    submitted: Mutex<Vec<Expression>>,
    failures: Mutex<usize>,
}

impl MemoryGateway {
    pub fn new() -> MemoryGateway {
        MemoryGateway {
            submitted: Mutex::new(Default::default()),
            failures: Mutex::new(0),
        }
    }

    /// Makes the next `count` submissions fail with a 503
    pub async fn fail_next(&self, count: usize) {
        *self.failures.lock().await = count;
    }

    pub async fn submitted(&self) -> Vec<Expression> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn submit(&self, expr: &Expression) -> Result<SubmitResponse, TransportError> {
        let mut failures = self.failures.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(TransportError::Status(503));
        }

        self.submitted.lock().await.push(expr.clone());
        Ok(SubmitResponse {
            msg: format!("Received {}", expr),
        })
    }
}
