use crate::clients::PushProvider;
use crate::config::FcmConfig;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: PushNotification<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct PushNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

/// FCM HTTP v1 client authenticated by a bearer server token.
#[derive(Clone)]
pub struct FcmClient {
    client: Client,
    send_url: String,
    server_token: String,
}

impl FcmClient {
    pub fn new(config: &FcmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .context("Failed to build FCM HTTP client")?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                config.base_url.trim_end_matches('/'),
                config.project_id
            ),
            server_token: config.server_token.clone(),
        })
    }
}

#[async_trait]
impl PushProvider for FcmClient {
    async fn send_to_device(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: Option<&HashMap<String, String>>,
    ) -> Result<String> {
        let request = SendRequest {
            message: Message {
                token: device_token,
                notification: PushNotification { title, body },
                data,
            },
        };

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.server_token)
            .json(&request)
            .send()
            .await
            .context("FCM request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("FCM send error: {status} - {body}"));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .context("Failed to decode FCM response")?;
        debug!(response_id = %parsed.name, "Successfully sent message");
        Ok(parsed.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_matches_v1_shape() {
        let mut data = HashMap::new();
        data.insert("show_id".to_string(), "abc".to_string());

        let request = SendRequest {
            message: Message {
                token: "device-1",
                notification: PushNotification {
                    title: "New episode",
                    body: "Tonight",
                },
                data: Some(&data),
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"]["token"], "device-1");
        assert_eq!(json["message"]["notification"]["title"], "New episode");
        assert_eq!(json["message"]["data"]["show_id"], "abc");
    }

    #[test]
    fn send_url_includes_project() {
        let client = FcmClient::new(&FcmConfig {
            project_id: "demo".to_string(),
            server_token: "t".to_string(),
            ..FcmConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.send_url,
            "https://fcm.googleapis.com/v1/projects/demo/messages:send"
        );
    }
}
