//! 開発用の模擬弾幕サーバー

use clap::Parser;
use danmubot::config::LogConfig;
use danmubot::feed::{MockFeedServer, DEFAULT_MOCK_PORT};
use danmubot::utils;
use std::time::Duration;
use tokio::sync::watch;

/// Mock danmu feed: broadcasts random live-room events over WebSocket.
#[derive(Parser)]
#[command(name = "mock-feed", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_MOCK_PORT)]
    port: u16,

    /// Milliseconds between broadcast events.
    #[arg(short, long, default_value_t = 5000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = utils::init_logging(&LogConfig::default())?;

    let interval = Duration::from_millis(cli.interval_ms.max(1));
    let server = MockFeedServer::bind(cli.port, interval).await?;
    println!("🎭 Mock danmu server on ws://{}", server.local_addr()?);
    println!("Press Ctrl+C to stop.");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 終了シグナルを受信しました");
            let _ = shutdown_tx.send(true);
        }
    });

    server.run(shutdown_rx).await
}
