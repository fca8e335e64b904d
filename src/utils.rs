// ログ初期化などのユーティリティ関数

use anyhow::Context;
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// ログ出力先ディレクトリ（未指定ならXDGデータディレクトリ/logs）
pub fn resolve_log_dir(config: &LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &config.log_dir {
        return Ok(dir.clone());
    }

    let project_dirs = ProjectDirs::from("dev", "danmubot", "danmubot")
        .context("Failed to get project directories")?;
    Ok(project_dirs.data_dir().join("logs"))
}

/// ログ初期化
///
/// `RUST_LOG` が設定されていればそちらを優先する。ファイル出力を有効にした場合は
/// 日次ローテーションのファイルにも書き出し、書き込みスレッドのガードを返す。
/// ガードはプロセス終了まで保持すること。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if !config.enable_file_logging {
        registry.try_init()?;
        return Ok(None);
    }

    let log_dir = resolve_log_dir(config)?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.log_file_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_log_files.max(1))
        .build(&log_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    registry
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()?;

    tracing::info!("📝 ログファイル出力先: {}", log_dir.display());

    Ok(Some(guard))
}

/// 時刻フォーマット
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Local>) -> String {
    timestamp.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_explicit_log_dir() {
        let config = LogConfig {
            log_dir: Some(PathBuf::from("/tmp/danmubot-logs")),
            ..LogConfig::default()
        };
        assert_eq!(
            resolve_log_dir(&config).unwrap(),
            PathBuf::from("/tmp/danmubot-logs")
        );
    }

    #[test]
    fn test_format_timestamp() {
        let timestamp = chrono::Local
            .with_ymd_and_hms(2024, 5, 1, 9, 3, 7)
            .unwrap();
        assert_eq!(format_timestamp(&timestamp), "09:03:07");
    }
}
