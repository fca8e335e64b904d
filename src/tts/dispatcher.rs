//! TTSディスパッチャー
//!
//! 読み上げ要求をバックエンドへ振り分ける。同時に鳴る発話は常に1件で、
//! 新しい `speak()` は前の発話を止め、その終了通知を待ってから開始する。

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::sync::{broadcast, oneshot};

use super::backends::{EdgeTtsBackend, LocalSynthBackend, ThirdPartyTtsBackend, TtsBackend};
use super::config::{SpeakRequest, TtsBackendType, TtsSettings};
use super::error::TtsError;
use super::player::AudioPlayer;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid URL regex"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// 1回の `speak()` の結果
#[derive(Debug)]
pub enum SpeechOutcome {
    /// 最後まで読み上げた
    Finished,
    /// `stop()` または次の `speak()` で中断された
    Stopped,
    /// 失敗した（リトライしない）
    Failed(TtsError),
}

impl SpeechOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, SpeechOutcome::Finished)
    }
}

/// 発話の終了理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Finished,
    Stopped,
    Failed(String),
}

impl From<&SpeechOutcome> for EndReason {
    fn from(outcome: &SpeechOutcome) -> Self {
        match outcome {
            SpeechOutcome::Finished => EndReason::Finished,
            SpeechOutcome::Stopped => EndReason::Stopped,
            SpeechOutcome::Failed(e) => EndReason::Failed(e.to_string()),
        }
    }
}

/// 発話イベント（観測用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started { id: u64, backend: TtsBackendType },
    Ended { id: u64, reason: EndReason },
}

/// 進行中の発話
struct ActiveUtterance {
    id: u64,
    cancel: oneshot::Sender<()>,
    done: oneshot::Receiver<()>,
}

/// TTSディスパッチャー
pub struct TtsDispatcher {
    backends: HashMap<TtsBackendType, Arc<dyn TtsBackend>>,
    player: Arc<AudioPlayer>,
    gate: tokio::sync::Mutex<()>,
    active: Mutex<Option<ActiveUtterance>>,
    events: broadcast::Sender<SpeechEvent>,
    next_id: AtomicU64,
    max_text_length: usize,
}

impl TtsDispatcher {
    /// 設定から3種類のバックエンドを構築
    pub fn new(settings: &TtsSettings) -> Result<Self, TtsError> {
        let player = Arc::new(AudioPlayer::new());

        let mut backends: HashMap<TtsBackendType, Arc<dyn TtsBackend>> = HashMap::new();
        backends.insert(
            TtsBackendType::Browser,
            Arc::new(LocalSynthBackend::new(
                settings.local_engine.clone(),
                settings.locale.clone(),
            )),
        );
        backends.insert(
            TtsBackendType::Edge,
            Arc::new(EdgeTtsBackend::new(
                settings.edge_endpoint.clone(),
                settings.request_timeout_secs,
                Arc::clone(&player),
            )?),
        );
        backends.insert(
            TtsBackendType::ThirdParty,
            Arc::new(ThirdPartyTtsBackend::new(
                settings.third_party_endpoint.clone(),
                settings.request_timeout_secs,
                Arc::clone(&player),
            )?),
        );

        tracing::info!("🔊 TTSディスパッチャーを初期化 (最大{}文字)", settings.max_text_length);
        Ok(Self::with_backends(backends, player, settings.max_text_length))
    }

    /// 任意のバックエンドで構築
    pub fn with_backends(
        backends: HashMap<TtsBackendType, Arc<dyn TtsBackend>>,
        player: Arc<AudioPlayer>,
        max_text_length: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            backends,
            player,
            gate: tokio::sync::Mutex::new(()),
            active: Mutex::new(None),
            events,
            next_id: AtomicU64::new(0),
            max_text_length,
        }
    }

    /// 発話イベントを購読
    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }

    /// バックエンドが利用可能かどうか
    pub fn is_available(&self, backend: TtsBackendType) -> bool {
        self.backends
            .get(&backend)
            .is_some_and(|b| b.is_available())
    }

    /// 読み上げ中かどうか
    pub fn is_speaking(&self) -> bool {
        self.active.lock().is_some()
    }

    /// テキストを読み上げ、終了まで待つ
    pub async fn speak(&self, text: &str, request: &SpeakRequest) -> SpeechOutcome {
        let text = sanitize_text(text, self.max_text_length);
        if text.is_empty() {
            // 読むものが無くても進行中の発話は止める
            let _gate = self.gate.lock().await;
            self.stop().await;
            return SpeechOutcome::Finished;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let (mut cancel_rx, done_tx, backend) = {
            let _gate = self.gate.lock().await;
            self.stop().await;

            let backend = match self.backends.get(&request.backend) {
                Some(backend) if backend.is_available() => Arc::clone(backend),
                Some(backend) => {
                    return self.fail_before_start(
                        id,
                        TtsError::BackendUnavailable(backend.name().to_string()),
                    );
                }
                None => {
                    return self.fail_before_start(
                        id,
                        TtsError::BackendUnavailable(request.backend.to_string()),
                    );
                }
            };

            let (cancel_tx, cancel_rx) = oneshot::channel();
            let (done_tx, done_rx) = oneshot::channel();
            *self.active.lock() = Some(ActiveUtterance {
                id,
                cancel: cancel_tx,
                done: done_rx,
            });
            (cancel_rx, done_tx, backend)
        };

        let _ = self.events.send(SpeechEvent::Started {
            id,
            backend: request.backend,
        });
        tracing::debug!("📢 読み上げ開始 #{} ({}): {}", id, backend.name(), text);

        let outcome = tokio::select! {
            result = backend.speak(&text, request) => match result {
                Ok(()) => SpeechOutcome::Finished,
                Err(e) => SpeechOutcome::Failed(e),
            },
            _ = &mut cancel_rx => {
                self.player.stop();
                SpeechOutcome::Stopped
            }
        };

        {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|a| a.id == id) {
                *active = None;
            }
        }

        match &outcome {
            SpeechOutcome::Finished => tracing::debug!("✅ 読み上げ完了 #{}", id),
            SpeechOutcome::Stopped => tracing::debug!("⏹️ 読み上げ中断 #{}", id),
            SpeechOutcome::Failed(e) => tracing::warn!("❌ 読み上げエラー #{}: {}", id, e),
        }

        let _ = self.events.send(SpeechEvent::Ended {
            id,
            reason: EndReason::from(&outcome),
        });
        let _ = done_tx.send(());

        outcome
    }

    /// 進行中の発話を止め、その終了を待つ
    pub async fn stop(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            let _ = active.cancel.send(());
            self.player.stop();
            let _ = active.done.await;
        }
    }

    fn fail_before_start(&self, id: u64, error: TtsError) -> SpeechOutcome {
        tracing::warn!("❌ 読み上げを開始できません #{}: {}", id, error);
        let outcome = SpeechOutcome::Failed(error);
        let _ = self.events.send(SpeechEvent::Ended {
            id,
            reason: EndReason::from(&outcome),
        });
        outcome
    }
}

/// 読み上げ前のテキスト整形（URL除去・空白の正規化・長さ制限）
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    let text = URL_PATTERN.replace_all(text, "");
    let text = WHITESPACE_PATTERN.replace_all(&text, " ");
    text.trim().chars().take(max_chars).collect()
}

/// 読み上げ能力（シーケンサーから利用）
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> SpeechOutcome;
    async fn stop(&self);
}

/// ディスパッチャーと読み上げ設定の組
pub struct BoundSpeaker {
    dispatcher: Arc<TtsDispatcher>,
    request: SpeakRequest,
}

impl BoundSpeaker {
    pub fn new(dispatcher: Arc<TtsDispatcher>, request: SpeakRequest) -> Self {
        Self {
            dispatcher,
            request,
        }
    }
}

#[async_trait]
impl Speaker for BoundSpeaker {
    async fn speak(&self, text: &str) -> SpeechOutcome {
        self.dispatcher.speak(text, &self.request).await
    }

    async fn stop(&self) {
        self.dispatcher.stop().await
    }
}
