//! ページ別設定（config_data JSON）の型付きビュー
//!
//! 知らないキーは `extra` に残し、書き戻しても失われないようにする。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ai::AiSettings;
use crate::reply::{AutoReplyRule, OrchestratorOptions, ReplySettings};
use crate::tts::{EdgeOptions, SpeakRequest, ThirdPartyOptions, TtsBackendType};

fn default_true() -> bool {
    true
}

/// `tts` ブロック
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageTtsConfig {
    #[serde(rename = "type", default)]
    pub backend: TtsBackendType,
    #[serde(default = "default_true")]
    pub auto_play: bool,
    #[serde(default = "default_true")]
    pub voice_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_options: Option<EdgeOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub third_party_options: Option<ThirdPartyOptions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PageTtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackendType::Browser,
            auto_play: true,
            voice_enabled: true,
            edge_options: None,
            third_party_options: None,
            extra: Map::new(),
        }
    }
}

/// `ai` ブロック
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageAiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PageAiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            extra: Map::new(),
        }
    }
}

/// `autoReply` ブロック
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageAutoReplyConfig {
    #[serde(default)]
    pub enabled: bool,
    /// カンマ区切りのキーワード
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub message: String,
}

/// ページ設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    #[serde(default)]
    pub tts: PageTtsConfig,
    #[serde(default)]
    pub ai: PageAiConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_reply: Option<PageAutoReplyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageConfig {
    /// config_data から読み込む
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// config_data へ書き戻す
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// 返信を読み上げるか
    pub fn voice_enabled(&self) -> bool {
        self.tts.auto_play && self.tts.voice_enabled
    }

    /// 読み上げ要求を組み立てる
    pub fn speak_request(&self) -> SpeakRequest {
        SpeakRequest {
            backend: self.tts.backend,
            edge: self.tts.edge_options.clone().unwrap_or_default(),
            third_party: self.tts.third_party_options.clone(),
            ..Default::default()
        }
    }

    /// 有効な自動返信ルール
    pub fn auto_reply_rule(&self) -> Option<AutoReplyRule> {
        let block = self.auto_reply.as_ref().filter(|b| b.enabled)?;
        AutoReplyRule::parse(&block.keywords, block.message.clone())
    }

    /// オーケストレーター設定を組み立てる
    pub fn orchestrator_options(
        &self,
        reply: &ReplySettings,
        page_key: &str,
    ) -> OrchestratorOptions {
        OrchestratorOptions {
            ai_enabled: self.ai.enabled,
            max_concurrent_requests: reply.max_concurrent_requests,
            stale_policy: reply.stale_policy,
            page_key: Some(page_key.to_string()),
            auto_reply: self.auto_reply_rule(),
        }
    }

    /// ページ側のAI設定でアプリ設定を上書き
    pub fn apply_ai(&self, settings: &mut AiSettings) {
        if let Some(model) = self.ai.model.as_ref().filter(|m| !m.is_empty()) {
            settings.model = model.clone();
        }
        if let Some(temperature) = self.ai.temperature {
            settings.temperature = temperature;
        }
        if let Some(max_tokens) = self.ai.max_tokens {
            settings.max_tokens = max_tokens;
        }
        if let Some(prompt) = self.ai.system_prompt.as_ref().filter(|p| !p.is_empty()) {
            settings.system_prompt = prompt.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::crud::default_configs;
    use crate::tts::ThirdPartyProvider;
    use serde_json::json;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = PageConfig::from_value(&json!({})).unwrap();
        assert_eq!(config.tts.backend, TtsBackendType::Browser);
        assert!(config.voice_enabled());
        assert!(config.ai.enabled);
        assert!(config.auto_reply_rule().is_none());
    }

    #[test]
    fn test_seeded_pages_parse() {
        for seed in default_configs() {
            let config = PageConfig::from_value(&seed.config_data).unwrap();
            assert_eq!(config.tts.backend, TtsBackendType::Browser, "{}", seed.page_key);
        }

        let chat = PageConfig::from_value(&default_configs()[0].config_data).unwrap();
        let request = chat.speak_request();
        assert_eq!(request.edge.voice, "zh-CN-XiaoxiaoNeural");
        assert_eq!(
            request.third_party.map(|o| o.provider),
            Some(ThirdPartyProvider::Baidu)
        );
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let value = json!({
            "tts": {"type": "edge", "volume": 0.5},
            "theme": {"color": "pink"}
        });
        let config = PageConfig::from_value(&value).unwrap();
        assert_eq!(config.tts.backend, TtsBackendType::Edge);

        let written = config.to_value().unwrap();
        assert_eq!(written["theme"]["color"], "pink");
        assert_eq!(written["tts"]["volume"], 0.5);
    }

    #[test]
    fn test_voice_disabled() {
        let config =
            PageConfig::from_value(&json!({"tts": {"autoPlay": true, "voiceEnabled": false}}))
                .unwrap();
        assert!(!config.voice_enabled());
    }

    #[test]
    fn test_auto_reply_and_options() {
        let config = PageConfig::from_value(&json!({
            "ai": {"enabled": false},
            "autoReply": {"enabled": true, "keywords": "hi, hello", "message": "Welcome!"}
        }))
        .unwrap();

        let options = config.orchestrator_options(&ReplySettings::default(), "live-chat-bot");
        assert!(!options.ai_enabled);
        assert_eq!(options.page_key.as_deref(), Some("live-chat-bot"));
        let rule = options.auto_reply.unwrap();
        assert!(rule.matches("hello there"));
        assert_eq!(rule.message, "Welcome!");
    }

    #[test]
    fn test_apply_ai_overrides() {
        let config = PageConfig::from_value(&json!({
            "ai": {"model": "other-model", "maxTokens": 64}
        }))
        .unwrap();
        let mut settings = AiSettings::default();
        config.apply_ai(&mut settings);
        assert_eq!(settings.model, "other-model");
        assert_eq!(settings.max_tokens, 64);
        assert_eq!(settings.temperature, 0.7);
    }
}
