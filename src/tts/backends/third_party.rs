//! 第三者クラウドTTSバックエンド実装

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::{build_http_client, fetch_audio, TtsBackend};
use crate::tts::config::{SpeakRequest, ThirdPartyOptions};
use crate::tts::error::TtsError;
use crate::tts::player::AudioPlayer;

/// 第三者TTSバックエンド（baidu / aliyun / tencent をプロキシ経由で利用）
pub struct ThirdPartyTtsBackend {
    endpoint: String,
    client: reqwest::Client,
    player: Arc<AudioPlayer>,
}

impl ThirdPartyTtsBackend {
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
    pub fn request_body(text: &str, options: &ThirdPartyOptions) -> serde_json::Value {
        json!({
            "text": text,
            "provider": options.provider.to_string(),
            "voice": options.voice,
            "speed": options.speed,
            "pitch": options.pitch,
        })
    }
}

#[async_trait]
impl TtsBackend for ThirdPartyTtsBackend {
    async fn speak(&self, text: &str, request: &SpeakRequest) -> Result<(), TtsError> {
        // 未設定なら既定プロバイダー（baidu）
        let options = request.third_party.clone().unwrap_or_default();

        let body = Self::request_body(text, &options);
        tracing::debug!("☁️ 第三者TTS: provider={}", options.provider);

        let audio = fetch_audio(&self.client, &self.endpoint, &body).await?;
        self.player.play(audio).await
    }

    fn name(&self) -> &'static str {
        "Third-party TTS"
    }
}
