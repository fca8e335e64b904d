//! 音声データの再生
//!
//! HTTPバックエンドが受け取った音声バイト列を `rodio` で再生する。
//! 再生はブロッキングのため `spawn_blocking` 上で行い、`stop()` で即時中断できる。

use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rodio::{Decoder, OutputStream, Sink};

use super::error::TtsError;

/// 再生中の1件
struct Playback {
    cancelled: Arc<AtomicBool>,
    sink: Option<Arc<Sink>>,
}

/// 音声プレイヤー
///
/// 同時に再生されるのは最大1件。新しい再生は開始前に前の再生を止める。
#[derive(Default)]
pub struct AudioPlayer {
    active: Arc<Mutex<Option<Playback>>>,
}

impl AudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 音声を再生し、終了まで待つ
    pub async fn play(&self, audio: Vec<u8>) -> Result<(), TtsError> {
        self.stop();

        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.active.lock();
            *active = Some(Playback {
                cancelled: Arc::clone(&cancelled),
                sink: None,
            });
        }

        let active = Arc::clone(&self.active);
        let result = tokio::task::spawn_blocking(move || {
            Self::play_blocking(audio, &active, &cancelled)
        })
        .await
        .map_err(|e| TtsError::AudioOutput(format!("再生タスクエラー: {}", e)))?;

        result
    }

    /// WAV/MP3データを再生（ブロッキング）
    fn play_blocking(
        audio: Vec<u8>,
        active: &Mutex<Option<Playback>>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<(), TtsError> {
        let (_stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| TtsError::AudioOutput(format!("音声出力の初期化に失敗: {}", e)))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| TtsError::AudioOutput(format!("音声シンクの作成に失敗: {}", e)))?;

        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| TtsError::AudioDecode(format!("音声デコードに失敗: {}", e)))?;

        let sink = Arc::new(sink);
        {
            let mut guard = active.lock();
            if cancelled.load(Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(playback) = guard.as_mut() {
                if Arc::ptr_eq(&playback.cancelled, cancelled) {
                    playback.sink = Some(Arc::clone(&sink));
                }
            }
        }

        sink.append(source);
        sink.sleep_until_end();

        let mut guard = active.lock();
        if guard
            .as_ref()
            .is_some_and(|playback| Arc::ptr_eq(&playback.cancelled, cancelled))
        {
            *guard = None;
        }

        Ok(())
    }

    /// 再生を停止
    pub fn stop(&self) {
        if let Some(playback) = self.active.lock().take() {
            playback.cancelled.store(true, Ordering::SeqCst);
            if let Some(sink) = playback.sink {
                sink.stop();
            }
            tracing::debug!("⏹️ 音声再生を停止");
        }
    }

    /// 再生中かどうか
    pub fn is_playing(&self) -> bool {
        self.active.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_playback_is_noop() {
        let player = AudioPlayer::new();
        assert!(!player.is_playing());
        player.stop();
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_invalid_audio_reports_error() {
        let player = AudioPlayer::new();
        let result = player.play(b"definitely not audio".to_vec()).await;
        // 出力デバイスがない環境では AudioOutput、ある環境では AudioDecode
        let err = result.unwrap_err();
        assert!(err.is_playback(), "{err}");
    }
}
