//! Edge TTSバックエンド実装

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::{build_http_client, fetch_audio, TtsBackend};
use crate::tts::config::{EdgeOptions, SpeakRequest};
use crate::tts::error::TtsError;
use crate::tts::player::AudioPlayer;

/// Edge TTSバックエンド
pub struct EdgeTtsBackend {
    endpoint: String,
    client: reqwest::Client,
    player: Arc<AudioPlayer>,
}

impl EdgeTtsBackend {
    /// 新しいインスタンスを作成
    pub fn new(
        endpoint: impl Into<String>,
        timeout_secs: u64,
        player: Arc<AudioPlayer>,
    ) -> Result<Self, TtsError> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: build_http_client(timeout_secs)?,
            player,
        })
    }

    /// リクエスト本文を作成
    pub fn request_body(text: &str, options: &EdgeOptions) -> serde_json::Value {
        json!({
            "text": text,
            "voice": options.voice,
            "rate": options.rate,
            "pitch": options.pitch,
        })
    }
}

#[async_trait]
impl TtsBackend for EdgeTtsBackend {
    async fn speak(&self, text: &str, request: &SpeakRequest) -> Result<(), TtsError> {
        let body = Self::request_body(text, &request.edge);
        tracing::debug!("🌐 Edge TTS: voice={}", request.edge.voice);

        let audio = fetch_audio(&self.client, &self.endpoint, &body).await?;
        self.player.play(audio).await
    }

    fn name(&self) -> &'static str {
        "Edge TTS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_uses_defaults() {
        let body = EdgeTtsBackend::request_body("你好", &EdgeOptions::default());
        assert_eq!(body["text"], "你好");
        assert_eq!(body["voice"], "zh-CN-XiaoxiaoNeural");
        assert_eq!(body["rate"], "+0%");
        assert_eq!(body["pitch"], "+0Hz");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let backend = EdgeTtsBackend::new(
            "http://127.0.0.1:9/api/tts/edge",
            2,
            Arc::new(AudioPlayer::new()),
        )
        .unwrap();
        let result = backend.speak("你好", &SpeakRequest::default()).await;
        assert!(matches!(result, Err(TtsError::Http(_))));
    }
}
