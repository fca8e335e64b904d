//! TTSバックエンド実装

pub mod edge;
pub mod local;
pub mod third_party;

use async_trait::async_trait;
use std::time::Duration;

use super::config::SpeakRequest;
use super::error::TtsError;

pub use edge::EdgeTtsBackend;
pub use local::LocalSynthBackend;
pub use third_party::ThirdPartyTtsBackend;

/// TTSバックエンドトレイト
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// テキストを読み上げ、再生完了まで待つ
    async fn speak(&self, text: &str, request: &SpeakRequest) -> Result<(), TtsError>;

    /// バックエンド名を取得
    fn name(&self) -> &'static str;

    /// 利用可能かどうか
    fn is_available(&self) -> bool {
        true
    }
}

/// HTTPクライアントを作成
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, TtsError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TtsError::Config(format!("HTTPクライアントの作成に失敗: {}", e)))
}

/// プロキシにJSONをPOSTし、音声バイト列を受け取る
pub(crate) async fn fetch_audio(
    client: &reqwest::Client,
    endpoint: &str,
    body: &serde_json::Value,
) -> Result<Vec<u8>, TtsError> {
    let response = client.post(endpoint).json(body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(TtsError::Request(error_message_from_body(&text, status)));
    }

    let audio = response.bytes().await?.to_vec();
    if audio.is_empty() {
        return Err(TtsError::Request("空の音声データを受信".to_string()));
    }
    Ok(audio)
}

/// エラーレスポンス本文 `{"error": "..."}` からメッセージを取り出す
pub(crate) fn error_message_from_body(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("ステータス {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_body() {
        let status = reqwest::StatusCode::BAD_GATEWAY;
        assert_eq!(
            error_message_from_body(r#"{"error":"voice not found"}"#, status),
            "voice not found"
        );
        assert_eq!(
            error_message_from_body("<html>oops</html>", status),
            "ステータス 502 Bad Gateway"
        );
        assert_eq!(
            error_message_from_body(r#"{"error":""}"#, status),
            "ステータス 502 Bad Gateway"
        );
    }
}
