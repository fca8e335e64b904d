//! 応答生成エンドポイント経由のクライアント

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_http_client, AiClient, AiError, AiSettings, CompletionRequest};

/// エンドポイントへの送信本文
#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    message: &'a str,
    context: &'a str,
    page_key: &'a str,
}

/// エンドポイントの応答
#[derive(Debug, Deserialize)]
pub struct ProxyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProxyResponse {
    /// 応答をテキストに変換
    pub fn into_reply(self) -> Result<String, AiError> {
        if !self.success {
            return Err(AiError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let reply = self.reply.unwrap_or_default();
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AiError::EmptyReply);
        }
        Ok(reply.to_string())
    }
}

/// 応答生成エンドポイントクライアント
pub struct ProxyCompletionClient {
    endpoint: String,
    page_key: String,
    client: reqwest::Client,
}

impl ProxyCompletionClient {
    pub fn new(settings: &AiSettings) -> Result<Self, AiError> {
        if settings.endpoint.is_empty() {
            return Err(AiError::Config("AIエンドポイントが未設定です".to_string()));
        }
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            page_key: settings.page_key.clone(),
            client: build_http_client(settings.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AiClient for ProxyCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let body = ProxyRequest {
            message: &request.message,
            context: request.context.as_deref().unwrap_or("live room message"),
            page_key: request.page_key.as_deref().unwrap_or(&self.page_key),
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<ProxyResponse>(&text) {
            Ok(parsed) => parsed.into_reply(),
            Err(_) if !status.is_success() => {
                Err(AiError::RequestFailed(format!("ステータス {}", status)))
            }
            Err(e) => Err(AiError::RequestFailed(format!("応答の解析に失敗: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn settings(endpoint: String) -> AiSettings {
        AiSettings {
            endpoint,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_reply_is_trimmed() {
        let (url, server) = serve_once(
            200,
            "application/json",
            r#"{"success":true,"reply":"  Hi Alice!  "}"#,
        )
        .await;
        let client = ProxyCompletionClient::new(&settings(url)).unwrap();

        let request = CompletionRequest::new("hello")
            .with_context("user Alice said in the live room: hello");
        let reply = client.complete(&request).await.unwrap();
        assert_eq!(reply, "Hi Alice!");

        let captured = server.await.unwrap().json();
        assert_eq!(captured["message"], "hello");
        assert_eq!(captured["context"], "user Alice said in the live room: hello");
        assert_eq!(captured["page_key"], "live-chat-bot");
    }

    #[tokio::test]
    async fn test_rejected_reply() {
        let (url, _server) =
            serve_once(200, "application/json", r#"{"success":false,"error":"quota"}"#).await;
        let client = ProxyCompletionClient::new(&settings(url)).unwrap();

        let result = client.complete(&CompletionRequest::new("hello")).await;
        assert!(matches!(result, Err(AiError::Rejected(ref e)) if e == "quota"));
    }

    #[tokio::test]
    async fn test_error_status_with_json_body_is_rejected() {
        let (url, _server) = serve_once(
            500,
            "application/json",
            r#"{"success":false,"error":"AI service not configured"}"#,
        )
        .await;
        let client = ProxyCompletionClient::new(&settings(url)).unwrap();

        let result = client.complete(&CompletionRequest::new("hello")).await;
        assert!(matches!(result, Err(AiError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_error_status_without_json_is_request_failed() {
        let (url, _server) = serve_once(502, "text/html", "<h1>bad gateway</h1>").await;
        let client = ProxyCompletionClient::new(&settings(url)).unwrap();

        let result = client.complete(&CompletionRequest::new("hello")).await;
        assert!(matches!(result, Err(AiError::RequestFailed(_))));
    }

    #[test]
    fn test_empty_reply() {
        let response: ProxyResponse =
            serde_json::from_str(r#"{"success":true,"reply":"   "}"#).unwrap();
        assert!(matches!(response.into_reply(), Err(AiError::EmptyReply)));
    }

    #[test]
    fn test_missing_endpoint_is_config_error() {
        let result = ProxyCompletionClient::new(&settings(String::new()));
        assert!(matches!(result, Err(AiError::Config(_))));
    }
}
