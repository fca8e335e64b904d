//! AI応答生成
//!
//! 2つのモードを持つ:
//! - `proxy`: 応答生成エンドポイント（`{message, context, page_key}` → `{success, reply, error}`）
//! - `direct`: OpenAI互換の chat completions API を直接呼ぶ

pub mod direct;
pub mod proxy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use direct::DirectChatClient;
pub use proxy::ProxyCompletionClient;

/// APIキーを読む環境変数
pub const API_KEY_ENV: &str = "DANMUBOT_AI_API_KEY";

/// 応答が取り出せなかった場合の定型文
pub const FALLBACK_REPLY: &str = "Sorry, I didn't understand your question.";

/// AI用エラー型
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AIリクエストに失敗しました: {0}")]
    RequestFailed(String),

    #[error("AIエンドポイントが拒否しました: {0}")]
    Rejected(String),

    #[error("AIの応答が空です")]
    EmptyReply,

    #[error("AI設定エラー: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::RequestFailed(e.to_string())
    }
}

/// 応答生成リクエスト
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    pub message: String,
    pub context: Option<String>,
    pub page_key: Option<String>,
}

impl CompletionRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_page_key(mut self, page_key: impl Into<String>) -> Self {
        self.page_key = Some(page_key.into());
        self
    }
}

/// 応答生成能力
#[async_trait]
pub trait AiClient: Send + Sync {
    /// 応答テキストを生成（前後の空白は除去済み）
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;
}

/// AIの接続モード
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    #[default]
    Proxy,
    Direct,
}

/// AI設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiSettings {
    pub mode: AiMode,
    /// proxyモードのエンドポイント
    pub endpoint: String,
    /// 送信するページキー
    pub page_key: String,
    /// directモードのURL
    pub api_url: String,
    /// directモードのAPIキー（未設定なら環境変数）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            mode: AiMode::Proxy,
            endpoint: "http://localhost:3000/api/doubao-ai".to_string(),
            page_key: "live-chat-bot".to_string(),
            api_url: "https://ark.cn-beijing.volces.com/api/v3/chat/completions".to_string(),
            api_key: None,
            model: "doubao-seed-1-6-251015".to_string(),
            temperature: 0.7,
            max_tokens: 200,
            system_prompt: "You are a live-stream room assistant answering viewers' questions. \
                            Keep replies short, friendly and fun, within 50 characters."
                .to_string(),
            timeout_secs: 30,
        }
    }
}

impl AiSettings {
    /// APIキーを解決（設定値 → 環境変数）
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

/// 設定に応じたクライアントを作成
pub fn build_client(settings: &AiSettings) -> Result<Arc<dyn AiClient>, AiError> {
    let client: Arc<dyn AiClient> = match settings.mode {
        AiMode::Proxy => Arc::new(ProxyCompletionClient::new(settings)?),
        AiMode::Direct => Arc::new(DirectChatClient::new(settings)?),
    };
    tracing::info!("🤖 AIクライアントを初期化: {:?}", settings.mode);
    Ok(client)
}

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, AiError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AiError::Config(format!("HTTPクライアントの作成に失敗: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AiSettings::default();
        assert_eq!(settings.mode, AiMode::Proxy);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 200);
        assert_eq!(settings.page_key, "live-chat-bot");
    }

    #[test]
    fn test_configured_api_key_wins() {
        let settings = AiSettings {
            api_key: Some("from-config".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_settings_toml_partial() {
        let settings: AiSettings = toml::from_str("mode = \"direct\"\nmodel = \"m1\"").unwrap();
        assert_eq!(settings.mode, AiMode::Direct);
        assert_eq!(settings.model, "m1");
        assert_eq!(settings.max_tokens, 200);
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("hi")
            .with_context("ctx")
            .with_page_key("chat");
        assert_eq!(request.message, "hi");
        assert_eq!(request.context.as_deref(), Some("ctx"));
        assert_eq!(request.page_key.as_deref(), Some("chat"));
    }
}
