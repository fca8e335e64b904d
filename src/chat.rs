//! 対話モード（AIとの1対1チャット）

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::ai::{AiClient, CompletionRequest};

pub const GREETING: &str = "Hi! I'm the AI assistant. How can I help you?";
pub const CHAT_PAGE_KEY: &str = "chat";

/// チャットの1セッション
pub struct ChatSession {
    client: Arc<dyn AiClient>,
    page_key: String,
}

impl ChatSession {
    pub fn new(client: Arc<dyn AiClient>) -> Self {
        Self {
            client,
            page_key: CHAT_PAGE_KEY.to_string(),
        }
    }

    pub fn with_page_key(mut self, page_key: impl Into<String>) -> Self {
        self.page_key = page_key.into();
        self
    }

    /// 入力に返答する。失敗時はエラー内容付きのお詫び文
    pub async fn respond(&self, input: &str) -> String {
        let request = CompletionRequest::new(input).with_page_key(self.page_key.as_str());

        match self.client.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("❌ チャット応答に失敗: {}", e);
                format!("Sorry, I can't reply right now. Error: {}", e)
            }
        }
    }

    /// 入力が尽きるか `exit` / `quit` まで対話する
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(format!("AI: {}\n", GREETING).as_bytes())
            .await?;

        let mut lines = reader.lines();
        loop {
            writer.write_all(b"> ").await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if matches!(input, "exit" | "quit") {
                break;
            }

            let reply = self.respond(input).await;
            writer.write_all(format!("AI: {}\n", reply).as_bytes()).await?;
        }

        writer.flush().await
    }
}
