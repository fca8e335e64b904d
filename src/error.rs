//! アプリケーション層のエラー型

use thiserror::Error;

use crate::ai::AiError;
use crate::danmu::ParseError;
use crate::database::StoreError;
use crate::tts::TtsError;

/// danmubot全体のエラー型
#[derive(Debug, Error)]
pub enum BotError {
    #[error("メッセージ解析エラー: {0}")]
    Parse(#[from] ParseError),

    #[error("AI呼び出しエラー: {0}")]
    Ai(#[from] AiError),

    #[error("TTSエラー: {0}")]
    Tts(#[from] TtsError),

    #[error("設定ストアエラー: {0}")]
    Store(#[from] StoreError),

    #[error("WebSocketエラー: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error(transparent)]
    General(#[from] anyhow::Error),
}

/// danmubot全体のResult型
pub type BotResult<T> = Result<T, BotError>;
