//! HTTP client for the relay's `/wakeup` endpoint, used by `wolctl`.

use thiserror::Error;

use crate::request::{ValidationError, WakePayload};

/// Default relay address for the control-line client.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:7092";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally before anything was sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The request never got a response.
    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    /// The relay answered with something other than 200.
    #[error("server returned error (status {status}): {body}")]
    Server { status: u16, body: String },
}

/// Sends wake requests to a running relay.
#[derive(Debug, Clone)]
pub struct WakeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WakeClient {
    pub fn new(server_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/wakeup", server_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the payload as JSON. Only a 200 response counts as success.
    pub async fn wake(&self, payload: &WakePayload) -> Result<(), ClientError> {
        payload.validate()?;

        let response = self.http.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        assert_eq!(
            WakeClient::new("http://localhost:7092/").endpoint(),
            "http://localhost:7092/wakeup"
        );
        assert_eq!(
            WakeClient::new(DEFAULT_SERVER_URL).endpoint(),
            "http://localhost:7092/wakeup"
        );
    }

    #[tokio::test]
    async fn test_invalid_payload_rejected_locally() {
        let client = WakeClient::new("http://127.0.0.1:1");
        let err = client
            .wake(&WakePayload {
                mac: "00:11:22:33:44:55".into(),
                ..WakePayload::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Invalid(ValidationError::MissingTarget)));
    }

    #[test]
    fn test_server_error_message() {
        let err = ClientError::Server {
            status: 400,
            body: "Invalid JSON\n".into(),
        };
        assert_eq!(err.to_string(), "server returned error (status 400): Invalid JSON\n");
    }
}
