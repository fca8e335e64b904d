//! ローカル音声合成バックエンド実装
//!
//! `espeak-ng` 互換のエンジンを子プロセスとして起動する。
//! 読み上げのFutureがdropされると子プロセスもkillされる。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::TtsBackend;
use crate::tts::config::{LocalOptions, SpeakRequest};
use crate::tts::error::TtsError;
use crate::tts::voices::{best_voice, parse_espeak_voices, LocalVoice};

/// espeak-ng の標準話速（語/分）
const BASE_WORDS_PER_MINUTE: f32 = 175.0;
/// espeak-ng の標準音高
const BASE_PITCH: f32 = 50.0;

/// ローカル音声合成バックエンド
pub struct LocalSynthBackend {
    engine: String,
    locale: String,
    voices: OnceCell<Vec<LocalVoice>>,
}

impl LocalSynthBackend {
    /// 新しいインスタンスを作成
    pub fn new(engine: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            locale: locale.into(),
            voices: OnceCell::new(),
        }
    }

    /// エンジンの実行ファイルを探す
    fn resolve_engine(&self) -> Option<PathBuf> {
        let engine = Path::new(&self.engine);
        if engine.components().count() > 1 {
            return engine.is_file().then(|| engine.to_path_buf());
        }

        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(&self.engine))
            .find(|candidate| candidate.is_file())
    }

    /// インストール済み音声の一覧（初回のみエンジンに問い合わせる）
    async fn voices(&self) -> &[LocalVoice] {
        self.voices
            .get_or_init(|| async {
                match Command::new(&self.engine).arg("--voices").output().await {
                    Ok(output) if output.status.success() => {
                        let voices = parse_espeak_voices(&String::from_utf8_lossy(&output.stdout));
                        tracing::debug!("🗣️ ローカル音声を{}件検出", voices.len());
                        voices
                    }
                    Ok(output) => {
                        tracing::warn!("⚠️ 音声一覧の取得に失敗: {}", output.status);
                        Vec::new()
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ 音声一覧の取得に失敗: {}", e);
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// 使用する音声名を決定
    async fn select_voice(&self, options: &LocalOptions) -> Option<String> {
        if let Some(voice) = options.voice.as_ref().filter(|v| !v.is_empty()) {
            return Some(voice.clone());
        }

        let locale = if options.lang.is_empty() {
            self.locale.as_str()
        } else {
            options.lang.as_str()
        };

        best_voice(self.voices().await, locale).map(|v| v.lang.clone())
    }

    /// コマンドライン引数を組み立てる
    pub fn build_args(text: &str, voice: Option<&str>, options: &LocalOptions) -> Vec<String> {
        let speed = (BASE_WORDS_PER_MINUTE * options.rate.clamp(0.1, 10.0)).round() as i32;
        let pitch = (BASE_PITCH * options.pitch.clamp(0.0, 2.0)).round().clamp(0.0, 99.0) as i32;
        let amplitude = (100.0 * options.volume.clamp(0.0, 1.0)).round() as i32;

        let mut args = Vec::new();
        if let Some(voice) = voice {
            args.push("-v".to_string());
            args.push(voice.to_string());
        }
        args.extend([
            "-s".to_string(),
            speed.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            "--".to_string(),
            text.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl TtsBackend for LocalSynthBackend {
    async fn speak(&self, text: &str, request: &SpeakRequest) -> Result<(), TtsError> {
        let voice = self.select_voice(&request.local).await;
        let args = Self::build_args(text, voice.as_deref(), &request.local);

        tracing::debug!("🗣️ ローカル合成: engine={}, voice={:?}", self.engine, voice);

        let child = Command::new(&self.engine)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = child.wait_with_output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        Err(TtsError::Synthesis(if detail.is_empty() {
            format!("{} が異常終了しました: {}", self.engine, output.status)
        } else {
            format!(
                "{} が異常終了しました: {}: {}",
                self.engine, output.status, detail
            )
        }))
    }

    fn name(&self) -> &'static str {
        "Local Synth"
    }

    fn is_available(&self) -> bool {
        self.resolve_engine().is_some()
    }
}
