//! 音声読み上げ（TTS）
//!
//! - `browser`: ローカル音声合成エンジン
//! - `edge`: Edge TTSプロキシ
//! - `third-party`: 第三者クラウドTTSプロキシ

pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod player;
pub mod voices;

pub use backends::{EdgeTtsBackend, LocalSynthBackend, ThirdPartyTtsBackend, TtsBackend};
pub use config::{
    EdgeOptions, LocalOptions, SpeakRequest, ThirdPartyOptions, ThirdPartyProvider,
    TtsBackendType, TtsSettings,
};
pub use dispatcher::{
    sanitize_text, BoundSpeaker, EndReason, SpeechEvent, SpeechOutcome, Speaker, TtsDispatcher,
};
pub use error::TtsError;
pub use player::AudioPlayer;
pub use voices::{best_voice, LocalVoice};
