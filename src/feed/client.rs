//! 弾幕フィードのWebSocketクライアント
//!
//! 接続が閉じられる・エラーになるたびに固定間隔で再接続する（上限なし、バックオフなし）。
//! 接続ハンドルを持つのは再接続ループ1つだけ。

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::danmu::{parse_message, ClassifiedEvent};

/// フィード設定（設定ファイルの `[feed]`）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedSettings {
    pub url: String,
    pub reconnect_delay_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8888".to_string(),
            reconnect_delay_ms: 3000,
        }
    }
}

impl FeedSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// 接続状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// 受信ループの終了理由
enum ReadEnd {
    /// 切断・エラー（再接続する）
    Closed,
    /// シャットダウン要求
    Shutdown,
    /// イベントの受け手がいない
    ReceiverGone,
}

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 弾幕フィードクライアント
pub struct FeedClient {
    settings: FeedSettings,
    status: watch::Sender<ConnectionStatus>,
}

impl FeedClient {
    pub fn new(settings: FeedSettings) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { settings, status }
    }

    pub fn url(&self) -> &str {
        &self.settings.url
    }

    /// 接続状態の購読
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// 受信タスクを開始
    pub fn spawn(
        self: Arc<Self>,
        events: mpsc::Sender<ClassifiedEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(events, shutdown).await })
    }

    /// シャットダウンまで接続・受信・再接続を繰り返す
    pub async fn run(
        &self,
        events: mpsc::Sender<ClassifiedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let delay = self.settings.reconnect_delay();

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_status(ConnectionStatus::Connecting);
            tracing::info!("🔌 フィードに接続中: {}", self.settings.url);

            let connected = tokio::select! {
                result = connect_async(self.settings.url.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok((stream, _response)) => {
                    self.set_status(ConnectionStatus::Connected);
                    tracing::info!("✅ フィードに接続しました");

                    match Self::read_loop(stream, &events, &mut shutdown).await {
                        ReadEnd::Closed => {}
                        ReadEnd::Shutdown => break,
                        ReadEnd::ReceiverGone => {
                            tracing::info!("📭 イベントの受け手がいないため受信を終了");
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("❌ フィードへの接続に失敗: {}", e);
                }
            }

            self.set_status(ConnectionStatus::Disconnected);
            tracing::info!("🔄 {}ms後に再接続します", delay.as_millis());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_status(ConnectionStatus::Disconnected);
        tracing::info!("🛑 フィード受信を終了");
    }

    async fn read_loop(
        stream: FeedStream,
        events: &mpsc::Sender<ClassifiedEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReadEnd {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        match parse_message(&text) {
                            Ok(event) => {
                                tracing::trace!("📨 {}", event.summary_line());
                                if events.send(event).await.is_err() {
                                    return ReadEnd::ReceiverGone;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("メッセージを破棄: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            return ReadEnd::Closed;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("📤 フィードが切断されました: {:?}", frame);
                        return ReadEnd::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("⚠️ フィード受信エラー: {}", e);
                        return ReadEnd::Closed;
                    }
                    None => return ReadEnd::Closed,
                },
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return ReadEnd::Shutdown;
                }
            }
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = FeedSettings::default();
        assert_eq!(settings.url, "ws://localhost:8888");
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_shutdown_while_reconnecting() {
        let client = Arc::new(FeedClient::new(FeedSettings {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay_ms: 60_000,
        }));
        let status = client.status();
        let (events_tx, _events_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = Arc::clone(&client).spawn(events_tx, shutdown_rx);

        // 接続失敗後の再接続待ち（60秒）の最中に止める
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    }
}
