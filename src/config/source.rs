//! ページ設定の取得元（HTTPエンドポイント / SQLite）

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::page::PageConfig;
use crate::database::ChatConfigStore;

/// ページ設定の取得元
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// 有効なページ設定を取得（存在しなければ None）
    async fn load_page(&self, page_key: &str) -> Result<Option<PageConfig>>;

    /// 表示用の名前
    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ConfigRow>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigRow {
    #[serde(default)]
    config_data: Value,
}

/// 文字列で返ってくる場合もある
fn decode_config_data(value: &Value) -> Result<PageConfig> {
    match value {
        Value::String(text) => {
            let parsed: Value =
                serde_json::from_str(text).context("config_data is not valid JSON")?;
            Ok(PageConfig::from_value(&parsed)?)
        }
        Value::Null => Ok(PageConfig::default()),
        other => Ok(PageConfig::from_value(other)?),
    }
}

/// HTTPの設定エンドポイント
pub struct HttpConfigSource {
    url: String,
    client: reqwest::Client,
}

impl HttpConfigSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn load_page(&self, page_key: &str) -> Result<Option<PageConfig>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("page_key", page_key)])
            .send()
            .await
            .with_context(|| format!("Failed to fetch page config from {}", self.url))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: ConfigEnvelope = response
            .json()
            .await
            .with_context(|| format!("Invalid config response (HTTP {})", status))?;

        if !envelope.success {
            anyhow::bail!(
                "Config endpoint rejected the request: {}",
                envelope.error.unwrap_or_else(|| status.to_string())
            );
        }

        match envelope.data {
            Some(row) => Ok(Some(decode_config_data(&row.config_data)?)),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// ローカルのSQLite設定ストア
pub struct SqliteConfigSource {
    store: Arc<Mutex<ChatConfigStore>>,
}

impl SqliteConfigSource {
    pub fn new(store: ChatConfigStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }
}

#[async_trait]
impl ConfigSource for SqliteConfigSource {
    async fn load_page(&self, page_key: &str) -> Result<Option<PageConfig>> {
        let store = Arc::clone(&self.store);
        let key = page_key.to_string();

        let row = tokio::task::spawn_blocking(move || store.lock().get_active_by_page_key(&key))
            .await
            .context("Config store task panicked")??;

        row.map(|config| decode_config_data(&config.config_data))
            .transpose()
    }

    fn describe(&self) -> String {
        "sqlite".to_string()
    }
}

/// 起動時に1回だけ読み込む。取得できなければ既定値
pub async fn resolve_page_config(source: &dyn ConfigSource, page_key: &str) -> PageConfig {
    match source.load_page(page_key).await {
        Ok(Some(config)) => {
            tracing::info!("📄 ページ設定を読み込みました: {} ({})", page_key, source.describe());
            config
        }
        Ok(None) => {
            tracing::warn!("⚠️ ページ設定がありません。既定値を使用: {}", page_key);
            PageConfig::default()
        }
        Err(e) => {
            tracing::warn!("❌ ページ設定の取得に失敗。既定値を使用: {:#}", e);
            PageConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewChatConfig;
    use crate::test_support::serve_once;
    use crate::tts::TtsBackendType;
    use serde_json::json;

    #[tokio::test]
    async fn test_http_source_object_config() {
        let body = json!({
            "success": true,
            "data": {"page_key": "live-chat-bot", "config_data": {"tts": {"type": "edge"}}}
        });
        let (url, request) = serve_once(200, "application/json", body.to_string()).await;

        let source = HttpConfigSource::new(format!("{}/api/chat-config", url)).unwrap();
        let config = source.load_page("live-chat-bot").await.unwrap().unwrap();
        assert_eq!(config.tts.backend, TtsBackendType::Edge);

        let captured = request.await.unwrap();
        assert!(captured.head.starts_with("GET /api/chat-config?page_key=live-chat-bot"));
    }

    #[tokio::test]
    async fn test_http_source_string_config() {
        let body = json!({
            "success": true,
            "data": {"config_data": "{\"ai\":{\"enabled\":false}}"}
        });
        let (url, _request) = serve_once(200, "application/json", body.to_string()).await;

        let source = HttpConfigSource::new(url).unwrap();
        let config = source.load_page("chat").await.unwrap().unwrap();
        assert!(!config.ai.enabled);
    }

    #[tokio::test]
    async fn test_http_source_not_found() {
        let body = json!({"success": false, "error": "not found"});
        let (url, _request) = serve_once(404, "application/json", body.to_string()).await;

        let source = HttpConfigSource::new(url).unwrap();
        assert!(source.load_page("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_source_failure_falls_back() {
        let body = json!({"success": false, "error": "database down"});
        let (url, _request) = serve_once(500, "application/json", body.to_string()).await;

        let source = HttpConfigSource::new(url).unwrap();
        assert!(source.load_page("chat").await.is_err());

        let (url, _request) = serve_once(500, "application/json", body.to_string()).await;
        let source = HttpConfigSource::new(url).unwrap();
        assert_eq!(resolve_page_config(&source, "chat").await, PageConfig::default());
    }

    #[tokio::test]
    async fn test_sqlite_source() {
        let mut store = ChatConfigStore::new_in_memory().unwrap();
        store.seed_defaults().unwrap();
        store
            .create(NewChatConfig::new(
                "edge-page",
                "Edge",
                json!({"tts": {"type": "edge"}}),
            ))
            .unwrap();

        let source = SqliteConfigSource::new(store);
        let config = source.load_page("edge-page").await.unwrap().unwrap();
        assert_eq!(config.tts.backend, TtsBackendType::Edge);

        let bot = source.load_page("live-chat-bot").await.unwrap().unwrap();
        assert!(bot.ai.enabled);
        assert!(source.load_page("nope").await.unwrap().is_none());
    }
}
