//! TTS設定構造体

use serde::{Deserialize, Serialize};

/// TTSバックエンドの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TtsBackendType {
    /// ローカル音声合成エンジン
    #[default]
    #[serde(rename = "browser", alias = "local")]
    Browser,
    /// Edge TTSプロキシ
    #[serde(rename = "edge")]
    Edge,
    /// 第三者クラウドTTSプロキシ
    #[serde(rename = "third-party", alias = "thirdParty")]
    ThirdParty,
}

impl std::fmt::Display for TtsBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtsBackendType::Browser => write!(f, "browser"),
            TtsBackendType::Edge => write!(f, "edge"),
            TtsBackendType::ThirdParty => write!(f, "third-party"),
        }
    }
}

impl std::str::FromStr for TtsBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "browser" | "local" => Ok(TtsBackendType::Browser),
            "edge" => Ok(TtsBackendType::Edge),
            "third-party" | "thirdParty" | "third_party" => Ok(TtsBackendType::ThirdParty),
            other => Err(format!("unknown TTS backend: {}", other)),
        }
    }
}

/// Edge TTS固有設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgeOptions {
    /// 音声名
    #[serde(default = "default_edge_voice")]
    pub voice: String,
    /// 話速 (例: "+0%")
    #[serde(default = "default_edge_rate")]
    pub rate: String,
    /// 音高 (例: "+0Hz")
    #[serde(default = "default_edge_pitch")]
    pub pitch: String,
}

fn default_edge_voice() -> String {
    "zh-CN-XiaoxiaoNeural".to_string()
}

fn default_edge_rate() -> String {
    "+0%".to_string()
}

fn default_edge_pitch() -> String {
    "+0Hz".to_string()
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self {
            voice: default_edge_voice(),
            rate: default_edge_rate(),
            pitch: default_edge_pitch(),
        }
    }
}

/// 第三者TTSプロバイダー
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThirdPartyProvider {
    #[default]
    Baidu,
    Aliyun,
    Tencent,
}

impl std::fmt::Display for ThirdPartyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThirdPartyProvider::Baidu => write!(f, "baidu"),
            ThirdPartyProvider::Aliyun => write!(f, "aliyun"),
            ThirdPartyProvider::Tencent => write!(f, "tencent"),
        }
    }
}

/// 第三者TTS固有設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThirdPartyOptions {
    pub provider: ThirdPartyProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<i32>,
}

/// ローカル合成エンジン固有設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalOptions {
    /// 言語 (BCP 47)
    #[serde(default = "default_lang")]
    pub lang: String,
    /// 話速倍率 (0.1〜10.0)
    #[serde(default = "default_scale")]
    pub rate: f32,
    /// 音高倍率 (0.0〜2.0)
    #[serde(default = "default_scale")]
    pub pitch: f32,
    /// 音量 (0.0〜1.0)
    #[serde(default = "default_scale")]
    pub volume: f32,
    /// 明示的な音声名（Noneなら自動選択）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

fn default_lang() -> String {
    "zh-CN".to_string()
}

fn default_scale() -> f32 {
    1.0
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

/// 1回の読み上げ要求
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeakRequest {
    pub backend: TtsBackendType,
    pub edge: EdgeOptions,
    pub third_party: Option<ThirdPartyOptions>,
    pub local: LocalOptions,
}

impl SpeakRequest {
    pub fn new(backend: TtsBackendType) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }
}

/// TTS全体設定（エンドポイント等）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsSettings {
    /// Edge TTSプロキシのURL
    pub edge_endpoint: String,
    /// 第三者TTSプロキシのURL
    pub third_party_endpoint: String,
    /// ローカル合成エンジンの実行ファイル
    pub local_engine: String,
    /// 音声選択に使うロケール
    pub locale: String,
    /// 最大読み上げ文字数
    pub max_text_length: usize,
    /// HTTPタイムアウト（秒）
    pub request_timeout_secs: u64,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            edge_endpoint: "http://localhost:3000/api/tts/edge".to_string(),
            third_party_endpoint: "http://localhost:3000/api/tts/third-party".to_string(),
            local_engine: "espeak-ng".to_string(),
            locale: "zh-CN".to_string(),
            max_text_length: 200,
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_names() {
        let parsed: TtsBackendType = serde_json::from_str("\"thirdParty\"").unwrap();
        assert_eq!(parsed, TtsBackendType::ThirdParty);
        assert_eq!(
            serde_json::to_string(&TtsBackendType::ThirdParty).unwrap(),
            "\"third-party\""
        );
        assert_eq!("edge".parse::<TtsBackendType>(), Ok(TtsBackendType::Edge));
        assert!("robot".parse::<TtsBackendType>().is_err());
    }

    #[test]
    fn test_edge_defaults_fill_missing_fields() {
        let options: EdgeOptions =
            serde_json::from_str(r#"{"voice":"zh-CN-YunxiNeural"}"#).unwrap();
        assert_eq!(options.voice, "zh-CN-YunxiNeural");
        assert_eq!(options.rate, "+0%");
        assert_eq!(options.pitch, "+0Hz");
    }

    #[test]
    fn test_third_party_options() {
        let options: ThirdPartyOptions =
            serde_json::from_str(r#"{"provider":"tencent","speed":3}"#).unwrap();
        assert_eq!(options.provider, ThirdPartyProvider::Tencent);
        assert_eq!(options.speed, Some(3));
        assert_eq!(options.voice, None);
    }
}
