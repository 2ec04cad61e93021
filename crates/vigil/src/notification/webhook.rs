//! Chat-bot webhook channel.
//!
//! Posts a markdown card and requires both a 2xx status and an
//! application-level `errcode` of zero in the response body.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use serde::Deserialize;
use tracing::debug;

use super::template::webhook_payload;
use super::{NotificationError, Notifier, WebhookChannel};
use crate::alert::AlertInfo;

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
pub const WEBHOOK_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the HTTP client used by webhook channels
pub fn create_client() -> Result<Client, NotificationError> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| NotificationError::Tls(e.to_string()))?
        .with_platform_verifier()
        .map_err(|e| NotificationError::Tls(e.to_string()))?
        .with_no_client_auth();

    Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(WEBHOOK_TIMEOUT)
        .connect_timeout(WEBHOOK_CONNECT_TIMEOUT)
        .build()
        .map_err(NotificationError::from)
}

#[derive(Debug, Deserialize)]
struct RobotResponse {
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(channel: WebhookChannel, client: Client) -> Self {
        Self {
            url: channel.url,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel_name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, alert: &AlertInfo) -> Result<(), NotificationError> {
        let payload = webhook_payload(alert);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Status {
                status: status.as_u16(),
            });
        }

        let body: RobotResponse = response.json().await?;
        match body.errcode {
            Some(0) => {
                debug!(url = %self.url, "Webhook alert delivered");
                Ok(())
            }
            Some(code) => Err(NotificationError::Rejected {
                code,
                message: body.errmsg,
            }),
            None => Err(NotificationError::MissingResultCode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertType;
    use chrono::Local;
    use mockito::Matcher;
    use serde_json::json;

    fn alert() -> AlertInfo {
        AlertInfo {
            alert_type: AlertType::Connection,
            message: "stream connection interrupted".into(),
            stream_url: "rtmp://origin/app/stream".into(),
            timestamp: Local::now(),
            error_count: 0,
            retry_count: 2,
        }
    }

    fn notifier(url: String) -> WebhookNotifier {
        WebhookNotifier::new(WebhookChannel { url }, create_client().unwrap())
    }

    #[tokio::test]
    async fn test_success_requires_errcode_zero() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/robot/send")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "msgtype": "markdown",
                "markdown": { "title": "Live stream alert - connection" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errcode":0,"errmsg":"ok"}"#)
            .create_async()
            .await;

        let result = notifier(format!("{}/robot/send", server.url()))
            .notify(&alert())
            .await;
        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_application_error_code() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"errcode":310000,"errmsg":"keywords not in content"}"#)
            .create_async()
            .await;

        let result = notifier(server.url()).notify(&alert()).await;
        match result {
            Err(NotificationError::Rejected { code, message }) => {
                assert_eq!(code, 310000);
                assert_eq!(message, "keywords not in content");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_errcode_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let result = notifier(server.url()).notify(&alert()).await;
        assert!(matches!(result, Err(NotificationError::MissingResultCode)));
    }

    #[tokio::test]
    async fn test_http_status_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let result = notifier(server.url()).notify(&alert()).await;
        assert!(matches!(
            result,
            Err(NotificationError::Status { status: 502 })
        ));
    }
}
