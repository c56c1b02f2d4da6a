use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct TriggerBody<'a> {
    city: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<&'a str>,
}

/// Posts triggers to a running coordinator's `/generate`
pub struct TriggerClient {
    client: reqwest::Client,
    url: String,
}

impl TriggerClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    /// Send one trigger; returns the HTTP status and the JSON reply
    pub async fn send(&self, city: &str, date: Option<&str>) -> anyhow::Result<(u16, Value)> {
        let response = self
            .client
            .post(&self.url)
            .json(&TriggerBody { city, date })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    anyhow::anyhow!("Could not connect to {}: is the coordinator running?", self.url)
                } else if e.is_timeout() {
                    anyhow::anyhow!("Request to {} timed out", self.url)
                } else {
                    anyhow::anyhow!(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}
