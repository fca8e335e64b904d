//! TTS用エラー型

use thiserror::Error;

/// TTSエラー型
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTSリクエストに失敗しました: {0}")]
    Request(String),

    #[error("HTTPリクエストに失敗しました: {0}")]
    Http(#[from] reqwest::Error),

    #[error("音声出力エラー: {0}")]
    AudioOutput(String),

    #[error("音声デコードエラー: {0}")]
    AudioDecode(String),

    #[error("音声合成エンジンエラー: {0}")]
    Synthesis(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("バックエンドが利用できません: {0}")]
    BackendUnavailable(String),

    #[error("プロセス実行エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    /// 再生段階の失敗かどうか
    pub fn is_playback(&self) -> bool {
        matches!(self, TtsError::AudioOutput(_) | TtsError::AudioDecode(_))
    }
}
