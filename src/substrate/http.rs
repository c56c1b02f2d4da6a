use crate::coordination::delegation::{DispatchClient, DispatchRequest, DispatchResponse};
use crate::coordination::errors::DispatchError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Dispatch substrate reached over HTTP: `POST <endpoint>` with a
/// `DispatchRequest`, answered by a `DispatchResponse` acknowledgement.
#[derive(Debug, Clone)]
pub struct HttpDispatchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDispatchClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        debug!(assignee = %request.assignee_id, endpoint = %self.endpoint, "Dispatching task");
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<DispatchResponse>(&body) {
            Ok(ack) if status.is_success() => Ok(ack),
            // An explicit rejection is still an acknowledgement, whatever the status
            Ok(ack) if !ack.success => Ok(ack),
            Ok(_) => Err(DispatchError::Status { status: status.as_u16() }),
            Err(_) if !status.is_success() => Err(DispatchError::Status { status: status.as_u16() }),
            Err(err) => Err(DispatchError::Malformed {
                message: err.to_string(),
            }),
        }
    }
}
