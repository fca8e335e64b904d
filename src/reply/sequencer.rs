//! 返信の逐次表示
//!
//! キューから1件ずつ取り出し、タイプライター表示 → 読み上げ → クールダウン の順に進める。
//! 状態機械は1つのタスクだけが持つため、Typing/Speaking にある返信は常に最大1件。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::queue::{QueuedReply, ReplyQueue};
use crate::tts::{SpeechOutcome, Speaker};

/// シーケンサーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Typing,
    Speaking,
    Draining,
}

/// 表示イベント
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// 新しい返信の表示を開始
    Started(QueuedReply),
    /// 表示中のテキスト（先頭からの部分文字列）
    Reveal { id: Uuid, visible: String },
    /// 全文を表示し終えた
    Finished { id: Uuid },
    /// 表示枠をクリア
    Cleared,
}

/// タイミング設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerTiming {
    /// 1文字あたりの表示間隔
    pub typing_interval: Duration,
    /// キューが空になってから表示を消すまで
    pub display_hold: Duration,
    /// 音声なしの場合の表示後待機
    pub silent_hold: Duration,
    /// 読み上げ後の待機
    pub cooldown: Duration,
}

impl Default for SequencerTiming {
    fn default() -> Self {
        Self {
            typing_interval: Duration::from_millis(50),
            display_hold: Duration::from_secs(5),
            silent_hold: Duration::from_millis(1500),
            cooldown: Duration::from_millis(500),
        }
    }
}

/// 返信シーケンサー
pub struct ReplySequencer {
    queue: Arc<ReplyQueue>,
    speaker: Option<Arc<dyn Speaker>>,
    timing: SequencerTiming,
    state: watch::Sender<SequencerState>,
    events: broadcast::Sender<DisplayEvent>,
}

impl ReplySequencer {
    /// `speaker` が `None` なら音声なしで表示のみ行う
    pub fn new(
        queue: Arc<ReplyQueue>,
        speaker: Option<Arc<dyn Speaker>>,
        timing: SequencerTiming,
    ) -> Self {
        let (state, _) = watch::channel(SequencerState::Idle);
        let (events, _) = broadcast::channel(256);
        Self {
            queue,
            speaker,
            timing,
            state,
            events,
        }
    }

    /// 状態の購読
    pub fn state(&self) -> watch::Receiver<SequencerState> {
        self.state.subscribe()
    }

    /// 表示イベントの購読
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.events.subscribe()
    }

    pub fn voice_enabled(&self) -> bool {
        self.speaker.is_some()
    }

    /// 処理タスクを開始
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// シャットダウンまで返信を処理
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("💬 返信シーケンサーを開始");
        let mut showing = false;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let Some(reply) = self.queue.pop() else {
                self.set_state(SequencerState::Idle);
                if showing {
                    tokio::select! {
                        _ = self.queue.wait() => {}
                        _ = tokio::time::sleep(self.timing.display_hold) => {
                            showing = false;
                            self.emit(DisplayEvent::Cleared);
                        }
                        _ = shutdown.changed() => break,
                    }
                } else {
                    tokio::select! {
                        _ = self.queue.wait() => {}
                        _ = shutdown.changed() => break,
                    }
                }
                continue;
            };

            showing = true;
            if !self.present(reply, &mut shutdown).await {
                break;
            }
        }

        if let Some(speaker) = &self.speaker {
            speaker.stop().await;
        }
        self.set_state(SequencerState::Idle);
        tracing::info!("💬 返信シーケンサーを終了");
    }

    /// 1件を表示・読み上げする。シャットダウンされたら false
    async fn present(&self, reply: QueuedReply, shutdown: &mut watch::Receiver<bool>) -> bool {
        let id = reply.id;
        let text = reply.text.clone();
        tracing::debug!("⌨️ 返信表示開始 {} → {}", reply.username, text);

        self.set_state(SequencerState::Typing);
        self.emit(DisplayEvent::Started(reply));

        let mut visible = String::with_capacity(text.len());
        for c in text.chars() {
            tokio::select! {
                _ = tokio::time::sleep(self.timing.typing_interval) => {}
                _ = shutdown.changed() => return false,
            }
            visible.push(c);
            self.emit(DisplayEvent::Reveal {
                id,
                visible: visible.clone(),
            });
        }
        self.emit(DisplayEvent::Finished { id });

        let hold = match &self.speaker {
            Some(speaker) => {
                self.set_state(SequencerState::Speaking);
                tokio::select! {
                    outcome = speaker.speak(&text) => match outcome {
                        SpeechOutcome::Finished => tracing::debug!("✅ 返信の読み上げ完了"),
                        SpeechOutcome::Stopped => tracing::debug!("⏹️ 返信の読み上げが中断されました"),
                        SpeechOutcome::Failed(e) => tracing::warn!("⚠️ 返信の読み上げに失敗: {}", e),
                    },
                    _ = shutdown.changed() => return false,
                }
                self.timing.cooldown
            }
            None => self.timing.silent_hold,
        };

        self.set_state(SequencerState::Draining);
        tokio::select! {
            _ = tokio::time::sleep(hold) => true,
            _ = shutdown.changed() => false,
        }
    }

    fn set_state(&self, state: SequencerState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn emit(&self, event: DisplayEvent) {
        let _ = self.events.send(event);
    }
}
