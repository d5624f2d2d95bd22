use async_trait::async_trait;
use log::debug;

use expression_client::{Expression, SubmitResponse};
use telemetry::Measure;

use super::{Gateway, TransportError};

lazy_static! {
    static ref SUBMIT_MEASURE: Measure = Measure::new("client", "submit");
}

pub struct HttpGateway {
    post_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(client: reqwest::Client, upstream: &str) -> HttpGateway {
        HttpGateway {
            post_url: format!("{}/exp", upstream.trim_end_matches('/')),
            client,
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn submit(&self, expr: &Expression) -> Result<SubmitResponse, TransportError> {
        SUBMIT_MEASURE
            .stats(async move {
                debug!("Submitting {} to {}", expr, self.post_url);
                self.client
                    .post(&self.post_url)
                    .json(expr)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<SubmitResponse>()
                    .await
                    .map_err(TransportError::from)
            })
            .await
    }
}
