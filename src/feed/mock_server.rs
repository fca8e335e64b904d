//! モック弾幕フィードサーバー
//!
//! 接続したクライアントへ歓迎メッセージを送り、その後は一定間隔で
//! 重み付きランダムに選んだイベントを全クライアントへブロードキャストする。
//!
//! クライアントが `{"type":"ping"}` を送ると `{"type":"pong"}` を返す。

use futures_util::{SinkExt, StreamExt};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::danmu::RawEvent;

/// 既定ポート
pub const DEFAULT_MOCK_PORT: u16 = 8888;
/// 既定の送信間隔
pub const DEFAULT_MOCK_INTERVAL: Duration = Duration::from_secs(5);

const PRODUCER_NAME: &str = "mock-server";

const MOCK_USERS: &[(&str, &str)] = &[
    ("小明", "xiaoming123"),
    ("小红", "xiaohong456"),
    ("小李", "xiaoli789"),
    ("小王", "xiaowang012"),
    ("小张", "xiaozhang345"),
    ("小刘", "xiaoliu678"),
];

const MOCK_COMMENTS: &[&str] = &[
    "大家好！",
    "主播今天播什么？",
    "这个游戏好玩吗？",
    "666666",
    "太厉害了！",
    "支持主播",
    "这个怎么玩？",
    "主播能教教我吗？",
    "哈哈哈",
    "主播辛苦了",
];

const MOCK_GIFTS: &[(&str, i64)] = &[
    ("鲜花", 1),
    ("掌声", 2),
    ("爱心", 3),
    ("火箭", 4),
    ("跑车", 6),
];

/// 生成するイベントの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEventKind {
    Comment,
    Enter,
    Gift,
    Like,
}

impl MockEventKind {
    pub const ALL: [MockEventKind; 4] = [
        MockEventKind::Comment,
        MockEventKind::Enter,
        MockEventKind::Gift,
        MockEventKind::Like,
    ];

    pub fn weight(&self) -> u32 {
        match self {
            MockEventKind::Comment => 10,
            MockEventKind::Enter => 2,
            MockEventKind::Gift => 3,
            MockEventKind::Like => 5,
        }
    }
}

/// ランダムイベント生成器
pub struct MockEventGenerator {
    rng: StdRng,
    weights: WeightedIndex<u32>,
    next_msg_id: u64,
}

impl MockEventGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// 再現可能な生成器（テスト用）
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let weights = WeightedIndex::new(MockEventKind::ALL.iter().map(|k| k.weight()))
            .expect("static weights are valid");
        Self {
            rng,
            weights,
            next_msg_id: 1,
        }
    }

    /// 重みに従って種類を選ぶ
    pub fn pick_kind(&mut self) -> MockEventKind {
        MockEventKind::ALL[self.weights.sample(&mut self.rng)]
    }

    /// 次のイベントを生成
    pub fn next_event(&mut self) -> RawEvent {
        let kind = self.pick_kind();
        self.event_of(kind)
    }

    /// 指定した種類のイベントを生成
    pub fn event_of(&mut self, kind: MockEventKind) -> RawEvent {
        let (nickname, display_id) = MOCK_USERS[self.rng.gen_range(0..MOCK_USERS.len())];
        let msg_id = self.next_msg_id;
        self.next_msg_id += 1;

        let mut data = json!({
            "CurrentCount": self.rng.gen_range(100..1100),
            "EnterTipType": 0,
            "MsgId": msg_id,
            "User": {
                "Id": self.rng.gen_range(0..1_000_000),
                "DisplayId": display_id,
                "Nickname": nickname,
                "Level": self.rng.gen_range(1..=50),
            },
            "RoomId": "123456789",
            "WebRoomId": "987654321",
            "Appid": "douyin",
        });

        let code = match kind {
            MockEventKind::Comment => {
                let content = MOCK_COMMENTS[self.rng.gen_range(0..MOCK_COMMENTS.len())];
                data["Content"] = json!(content);
                1
            }
            MockEventKind::Enter => {
                let count = self.rng.gen_range(100..1100);
                data["Content"] = json!(format!("{}$来了直播间人数:{}", nickname, count));
                3
            }
            MockEventKind::Gift => {
                let (name, id) = MOCK_GIFTS[self.rng.gen_range(0..MOCK_GIFTS.len())];
                data["GiftName"] = json!(name);
                data["GiftId"] = json!(id);
                data["GiftCount"] = json!(self.rng.gen_range(1..=10));
                2
            }
            MockEventKind::Like => {
                data["Content"] = json!(format!("{} 点赞了", nickname));
                5
            }
        };

        RawEvent {
            kind_code: Some(code),
            producer_name: PRODUCER_NAME.to_string(),
            payload: data.to_string(),
        }
    }
}

impl Default for MockEventGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 接続時の歓迎メッセージ
pub fn welcome_event() -> RawEvent {
    RawEvent {
        kind_code: Some(8),
        producer_name: PRODUCER_NAME.to_string(),
        payload: json!({
            "Content": "Welcome to the mock live room!",
            "CurrentCount": 100,
        })
        .to_string(),
    }
}

/// 生のエンベロープ形式（`Type` / `ProcessName` / `Data`）でシリアライズ
pub fn to_wire(event: &RawEvent) -> String {
    json!({
        "Type": event.kind_code,
        "ProcessName": event.producer_name,
        "Data": event.payload,
    })
    .to_string()
}

/// モックフィードサーバー
pub struct MockFeedServer {
    listener: TcpListener,
    interval: Duration,
    message_tx: broadcast::Sender<String>,
    next_client_id: Arc<AtomicU64>,
}

impl MockFeedServer {
    /// ポートにバインド（0ならOSが選ぶ）
    pub async fn bind(port: u16, interval: Duration) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let (message_tx, _) = broadcast::channel(256);
        Ok(Self {
            listener,
            interval,
            message_tx,
            next_client_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// シャットダウンまで接続受付とブロードキャストを行う
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        tracing::info!("🚀 モックフィードサーバー起動: ws://{}", addr);
        tracing::info!("⏱️ 送信間隔: {}ms", self.interval.as_millis());

        let mut generator = MockEventGenerator::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
                        let message_rx = self.message_tx.subscribe();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            let result =
                                handle_connection(stream, peer, client_id, message_rx, shutdown)
                                    .await;
                            if let Err(e) = result {
                                tracing::warn!("クライアント {} の接続エラー: {}", client_id, e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("接続の受付に失敗: {}", e),
                },
                _ = ticker.tick() => {
                    let clients = self.message_tx.receiver_count();
                    if clients == 0 {
                        continue;
                    }
                    let event = generator.next_event();
                    tracing::info!("📤 イベント(Type {:?})を {} クライアントへ送信", event.kind_code, clients);
                    let _ = self.message_tx.send(to_wire(&event));
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("🛑 モックフィードサーバー停止");
        Ok(())
    }
}

/// WebSocket接続を処理
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    client_id: u64,
    mut message_rx: broadcast::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    write.send(Message::Text(to_wire(&welcome_event()))).await?;
    tracing::info!("✅ クライアント {} 接続 ({})", client_id, peer);

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let is_ping = serde_json::from_str::<serde_json::Value>(&text)
                        .ok()
                        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "ping"))
                        .unwrap_or(false);
                    if is_ping {
                        write.send(Message::Text(json!({"type": "pong"}).to_string())).await?;
                    } else {
                        tracing::debug!("📨 クライアント {} から: {}", client_id, text);
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("📤 クライアント {} 切断", client_id);
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("クライアント {} のWebSocketエラー: {}", client_id, e);
                    break;
                }
                _ => {}
            },
            msg = message_rx.recv() => match msg {
                Ok(text) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("クライアント {} が {} 件取りこぼし", client_id, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }

    Ok(())
}
