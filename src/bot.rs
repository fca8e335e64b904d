//! ライブ返信ボット本体
//!
//! フィード受信 → イベント配信・返信オーケストレーター → キュー → シーケンサー
//! の各タスクを束ねる。

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

use crate::ai::{build_client, AiClient};
use crate::config::{AppConfig, PageConfig};
use crate::danmu::ClassifiedEvent;
use crate::error::{BotError, BotResult};
use crate::feed::{FeedClient, FeedSettings};
use crate::reply::{Disposition, ReplyOrchestrator, ReplyQueue, ReplySequencer};
use crate::tts::{BoundSpeaker, SpeakRequest, Speaker, TtsBackendType, TtsDispatcher};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 起動時の上書き（コマンドライン引数）
#[derive(Debug, Clone, Default)]
pub struct BotOverrides {
    pub ws_url: Option<String>,
    pub tts: Option<TtsBackendType>,
    pub no_voice: bool,
    pub no_ai: bool,
}

/// ライブ返信ボット
pub struct LiveBot {
    feed: Arc<FeedClient>,
    orchestrator: Arc<ReplyOrchestrator>,
    sequencer: Arc<ReplySequencer>,
    events: broadcast::Sender<ClassifiedEvent>,
}

impl LiveBot {
    pub fn new(
        feed: Arc<FeedClient>,
        orchestrator: Arc<ReplyOrchestrator>,
        sequencer: Arc<ReplySequencer>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            feed,
            orchestrator,
            sequencer,
            events,
        }
    }

    /// アプリ設定とページ設定からボットを組み立てる
    ///
    /// AIクライアントが作れない場合は返信なしで続行する。
    /// 読み上げバックエンドが使えない場合は表示のみで続行する。
    pub fn from_config(
        config: &AppConfig,
        page: &PageConfig,
        page_key: &str,
        overrides: &BotOverrides,
    ) -> BotResult<Self> {
        let feed_url = overrides
            .ws_url
            .clone()
            .or_else(|| page.ws_url.clone())
            .unwrap_or_else(|| config.feed.url.clone());
        if !(feed_url.starts_with("ws://") || feed_url.starts_with("wss://")) {
            return Err(BotError::Configuration(format!(
                "フィードURLは ws:// または wss:// で始まる必要があります: {:?}",
                feed_url
            )));
        }

        let mut ai_settings = config.ai.clone();
        ai_settings.page_key = page_key.to_string();
        page.apply_ai(&mut ai_settings);

        let ai: Option<Arc<dyn AiClient>> = if overrides.no_ai || !page.ai.enabled {
            tracing::info!("🤖 AI返信は無効です");
            None
        } else {
            match build_client(&ai_settings) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!("❌ AIクライアントを作成できません。返信なしで続行: {}", e);
                    None
                }
            }
        };

        let mut request = page.speak_request();
        if let Some(backend) = overrides.tts {
            request.backend = backend;
        }
        let speaker = if page.voice_enabled() && !overrides.no_voice {
            build_speaker(config, request)?
        } else {
            tracing::info!("🔇 読み上げは無効です");
            None
        };

        let queue = Arc::new(ReplyQueue::new(config.reply.queue_capacity));
        let mut options = page.orchestrator_options(&config.reply, page_key);
        options.ai_enabled = ai.is_some();
        let orchestrator = Arc::new(ReplyOrchestrator::new(ai, Arc::clone(&queue), options));
        let sequencer = Arc::new(ReplySequencer::new(queue, speaker, config.reply.timing()));

        let feed = Arc::new(FeedClient::new(FeedSettings {
            url: feed_url,
            ..config.feed.clone()
        }));

        Ok(Self::new(feed, orchestrator, sequencer))
    }

    pub fn orchestrator(&self) -> &Arc<ReplyOrchestrator> {
        &self.orchestrator
    }

    pub fn feed(&self) -> &Arc<FeedClient> {
        &self.feed
    }

    pub fn sequencer(&self) -> &Arc<ReplySequencer> {
        &self.sequencer
    }

    /// 分類済みイベントの購読（表示用）
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClassifiedEvent> {
        self.events.subscribe()
    }

    /// シャットダウンまで動かす
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let feed_handle = Arc::clone(&self.feed).spawn(events_tx, shutdown.clone());
        let sequencer_handle = Arc::clone(&self.sequencer).spawn(shutdown.clone());

        tracing::info!("🚀 ボットを開始: {}", self.feed.url());

        while !*shutdown.borrow() {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.route(event),
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        // 終了待ち（AI呼び出し中のタスクは待たない）
        if let Err(e) = feed_handle.await {
            tracing::warn!("⚠️ フィードタスクが異常終了: {}", e);
        }
        if let Err(e) = sequencer_handle.await {
            tracing::warn!("⚠️ シーケンサータスクが異常終了: {}", e);
        }

        tracing::info!("👋 ボットを終了");
    }

    fn route(&self, event: ClassifiedEvent) {
        match self.orchestrator.handle_event(&event) {
            Disposition::Busy => {
                tracing::debug!("⏭️ 返信を見送り: {}", event.display_name);
            }
            Disposition::Ignored | Disposition::AutoReplied | Disposition::Dispatched(_) => {}
        }
        // 購読者がいなくても問題ない
        let _ = self.events.send(event);
    }
}

fn build_speaker(config: &AppConfig, request: SpeakRequest) -> BotResult<Option<Arc<dyn Speaker>>> {
    let dispatcher = Arc::new(TtsDispatcher::new(&config.tts)?);
    if !dispatcher.is_available(request.backend) {
        tracing::warn!(
            "⚠️ TTSバックエンド {} が利用できません。表示のみで続行",
            request.backend
        );
        return Ok(None);
    }

    tracing::info!("🔊 読み上げ: {}", request.backend);
    Ok(Some(Arc::new(BoundSpeaker::new(dispatcher, request))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ReplySettings;

    fn quiet() -> BotOverrides {
        BotOverrides {
            no_voice: true,
            no_ai: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_feed_url_precedence() {
        let mut config = AppConfig::default();
        config.feed.url = "ws://config:1".to_string();
        let mut page = PageConfig::default();

        let bot = LiveBot::from_config(&config, &page, "live-chat-bot", &quiet()).unwrap();
        assert_eq!(bot.feed().url(), "ws://config:1");

        page.ws_url = Some("ws://page:2".to_string());
        let bot = LiveBot::from_config(&config, &page, "live-chat-bot", &quiet()).unwrap();
        assert_eq!(bot.feed().url(), "ws://page:2");

        let overrides = BotOverrides {
            ws_url: Some("wss://cli:3".to_string()),
            ..quiet()
        };
        let bot = LiveBot::from_config(&config, &page, "live-chat-bot", &overrides).unwrap();
        assert_eq!(bot.feed().url(), "wss://cli:3");
    }

    #[test]
    fn test_invalid_feed_url_is_configuration_error() {
        let overrides = BotOverrides {
            ws_url: Some("http://example.com".to_string()),
            ..quiet()
        };
        let result = LiveBot::from_config(
            &AppConfig::default(),
            &PageConfig::default(),
            "live-chat-bot",
            &overrides,
        );
        assert!(matches!(result, Err(BotError::Configuration(_))));
    }

    #[test]
    fn test_no_ai_disables_dispatch() {
        let mut config = AppConfig::default();
        config.reply = ReplySettings {
            queue_capacity: 4,
            ..ReplySettings::default()
        };
        let bot =
            LiveBot::from_config(&config, &PageConfig::default(), "live-chat-bot", &quiet())
                .unwrap();
        assert!(!bot.orchestrator().options().ai_enabled);
        assert_eq!(
            bot.orchestrator().options().page_key.as_deref(),
            Some("live-chat-bot")
        );
    }
}
