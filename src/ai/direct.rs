//! OpenAI互換 chat completions API を直接呼ぶクライアント

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{build_http_client, AiClient, AiError, AiSettings, CompletionRequest, FALLBACK_REPLY};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

/// chat completions クライアント
pub struct DirectChatClient {
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: String,
    client: reqwest::Client,
}

impl DirectChatClient {
    pub fn new(settings: &AiSettings) -> Result<Self, AiError> {
        let api_key = settings.resolve_api_key().ok_or_else(|| {
            AiError::Config(format!(
                "APIキーが未設定です（設定ファイルまたは {}）",
                super::API_KEY_ENV
            ))
        })?;
        if settings.api_url.is_empty() {
            return Err(AiError::Config("API URLが未設定です".to_string()));
        }
        if settings.model.is_empty() {
            return Err(AiError::Config("モデルが未設定です".to_string()));
        }

        Ok(Self {
            api_url: settings.api_url.clone(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            system_prompt: settings.system_prompt.clone(),
            client: build_http_client(settings.timeout_secs)?,
        })
    }
}

/// 応答本文から返信テキストを取り出す
///
/// `choices[0].message.content` → `reply` → 定型文 の順。
pub fn extract_reply(data: &Value) -> String {
    let content = data
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let reply = data
        .get("reply")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    content
        .or(reply)
        .unwrap_or(FALLBACK_REPLY)
        .trim()
        .to_string()
}

#[async_trait]
impl AiClient for DirectChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        if request.message.trim().is_empty() {
            return Err(AiError::Config("メッセージが空です".to_string()));
        }

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.message,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let data: Value = response.json().await.unwrap_or(Value::Null);
            let message = data
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("ステータス {}", status));
            tracing::error!("❌ chat completions APIエラー: {}", message);
            return Err(AiError::RequestFailed(message));
        }

        let data: Value = response.json().await?;
        let reply = extract_reply(&data);
        if reply.is_empty() {
            return Err(AiError::EmptyReply);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;
    use serde_json::json;

    fn settings(api_url: String) -> AiSettings {
        AiSettings {
            api_url,
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_reply_fallbacks() {
        let data = json!({"choices":[{"message":{"content":" 你好 "}}]});
        assert_eq!(extract_reply(&data), "你好");

        let data = json!({"choices":[{"message":{"content":""}}], "reply": "alt"});
        assert_eq!(extract_reply(&data), "alt");

        assert_eq!(extract_reply(&json!({})), FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let (url, server) = serve_once(
            200,
            "application/json",
            r#"{"choices":[{"message":{"content":"Welcome!"}}]}"#,
        )
        .await;
        let client = DirectChatClient::new(&settings(url)).unwrap();

        let reply = client
            .complete(&CompletionRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(reply, "Welcome!");

        let captured = server.await.unwrap();
        assert_eq!(
            captured.header("authorization").as_deref(),
            Some("Bearer test-key")
        );
        let body = captured.json();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_error_message_from_api() {
        let (url, _server) = serve_once(
            401,
            "application/json",
            r#"{"error":{"message":"invalid key"}}"#,
        )
        .await;
        let client = DirectChatClient::new(&settings(url)).unwrap();

        let result = client.complete(&CompletionRequest::new("hello")).await;
        assert!(matches!(result, Err(AiError::RequestFailed(ref m)) if m == "invalid key"));
    }

    #[test]
    fn test_empty_url_is_config_error() {
        let result = DirectChatClient::new(&settings(String::new()));
        assert!(matches!(result, Err(AiError::Config(_))));
    }
}
