//! 返信オーケストレーター
//!
//! コメントイベントを受け取り、AI応答（または自動返信）を返信キューへ積む。
//! AI呼び出しは表示とは独立して並行に行い、同時実行数だけを制限する。

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::queue::{QueuedReply, ReplyQueue};
use crate::ai::{AiClient, CompletionRequest};
use crate::danmu::{speaker_name, ClassifiedEvent};

/// 古くなったAI応答の扱い
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StaleReplyPolicy {
    /// 完了した応答はすべてキューに積む
    #[default]
    Enqueue,
    /// より新しいコメントへの応答が既に積まれていれば捨てる
    Discard,
}

/// キーワード自動返信
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoReplyRule {
    pub keywords: Vec<String>,
    pub message: String,
}

impl AutoReplyRule {
    /// カンマ区切り（全角カンマも可）のキーワード列から作成
    pub fn parse(keywords: &str, message: impl Into<String>) -> Option<Self> {
        let keywords: Vec<String> = keywords
            .split([',', '，'])
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        let message = message.into();

        if keywords.is_empty() || message.trim().is_empty() {
            return None;
        }
        Some(Self { keywords, message })
    }

    pub fn matches(&self, content: &str) -> bool {
        self.keywords.iter().any(|k| content.contains(k.as_str()))
    }
}

/// オーケストレーター設定
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub ai_enabled: bool,
    pub max_concurrent_requests: usize,
    pub stale_policy: StaleReplyPolicy,
    pub page_key: Option<String>,
    pub auto_reply: Option<AutoReplyRule>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            max_concurrent_requests: 1,
            stale_policy: StaleReplyPolicy::Enqueue,
            page_key: None,
            auto_reply: None,
        }
    }
}

/// イベントの処理結果
#[derive(Debug)]
pub enum Disposition {
    /// 返信対象外
    Ignored,
    /// 自動返信を積んだ
    AutoReplied,
    /// AI呼び出し中のため見送った
    Busy,
    /// AIへ送信した
    Dispatched(JoinHandle<()>),
}

/// AI応答の受け渡し状態
struct Delivery {
    queue: Arc<ReplyQueue>,
    policy: StaleReplyPolicy,
    latest_enqueued: AtomicU64,
}

impl Delivery {
    fn deliver(&self, generation: u64, reply: QueuedReply) {
        match self.policy {
            StaleReplyPolicy::Enqueue => {
                self.latest_enqueued.fetch_max(generation, Ordering::SeqCst);
            }
            StaleReplyPolicy::Discard => {
                let accepted = self.latest_enqueued.fetch_update(
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                    |current| (generation > current).then_some(generation),
                );
                if accepted.is_err() {
                    tracing::debug!("🗑️ 古いAI応答を破棄: {} 宛て", reply.username);
                    return;
                }
            }
        }
        self.queue.push(reply);
    }
}

/// 返信オーケストレーター
pub struct ReplyOrchestrator {
    ai: Option<Arc<dyn AiClient>>,
    queue: Arc<ReplyQueue>,
    permits: Arc<Semaphore>,
    options: OrchestratorOptions,
    next_generation: AtomicU64,
    delivery: Arc<Delivery>,
}

impl ReplyOrchestrator {
    pub fn new(
        ai: Option<Arc<dyn AiClient>>,
        queue: Arc<ReplyQueue>,
        options: OrchestratorOptions,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_concurrent_requests.max(1)));
        let delivery = Arc::new(Delivery {
            queue: Arc::clone(&queue),
            policy: options.stale_policy,
            latest_enqueued: AtomicU64::new(0),
        });
        Self {
            ai,
            queue,
            permits,
            options,
            next_generation: AtomicU64::new(0),
            delivery,
        }
    }

    pub fn queue(&self) -> &Arc<ReplyQueue> {
        &self.queue
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// AIへ渡すコンテキスト文
    pub fn context_for(name: &str, content: &str) -> String {
        format!("user {} said in the live room: {}", name, content)
    }

    /// 1件のイベントを処理
    pub fn handle_event(&self, event: &ClassifiedEvent) -> Disposition {
        if !event.is_comment() {
            return Disposition::Ignored;
        }
        let content = event.formatted_text.trim();
        if content.is_empty() {
            return Disposition::Ignored;
        }
        let name = speaker_name(event);

        if let Some(rule) = &self.options.auto_reply {
            if rule.matches(content) {
                tracing::info!("🔁 自動返信: {} → {}", name, rule.message);
                self.queue.push(QueuedReply::new(rule.message.clone(), name));
                return Disposition::AutoReplied;
            }
        }

        let ai = match (&self.ai, self.options.ai_enabled) {
            (Some(ai), true) => Arc::clone(ai),
            _ => return Disposition::Ignored,
        };

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("⏳ AI応答待ちのためコメントを見送り: {}: {}", name, content);
                return Disposition::Busy;
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut request =
            CompletionRequest::new(content).with_context(Self::context_for(&name, content));
        if let Some(page_key) = &self.options.page_key {
            request = request.with_page_key(page_key.clone());
        }
        let delivery = Arc::clone(&self.delivery);

        tracing::debug!("🤖 AIへ送信 #{}: {}: {}", generation, name, content);
        let handle = tokio::spawn(async move {
            let result = ai.complete(&request).await;
            drop(permit);

            match result {
                Ok(reply) => {
                    tracing::info!("🤖 AI応答 → {}: {}", name, reply);
                    delivery.deliver(generation, QueuedReply::new(reply, name));
                }
                Err(e) => {
                    tracing::warn!("⚠️ AI応答の取得に失敗 ({}): {}", name, e);
                }
            }
        });

        Disposition::Dispatched(handle)
    }
}
