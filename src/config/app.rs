//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリを使用した設定ファイルの永続化と管理を提供します。

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ai::AiSettings;
use crate::feed::FeedSettings;
use crate::reply::ReplySettings;
use crate::tts::TtsSettings;

const CONFIG_FILE_NAME: &str = "config.toml";

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
    /// 保存するログファイル数上限
    pub max_log_files: usize,
    /// ログファイル名の接頭辞
    pub log_file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: false,
            max_log_files: 30,
            log_file_prefix: "danmubot".to_string(),
        }
    }
}

/// 設定ストアの場所
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLiteファイル（Noneの場合はXDGデータディレクトリ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// HTTPの設定エンドポイント（指定時はSQLiteより優先）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_url: Option<String>,
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    /// 弾幕フィード
    #[serde(default)]
    pub feed: FeedSettings,

    /// AI
    #[serde(default)]
    pub ai: AiSettings,

    /// 読み上げ
    #[serde(default)]
    pub tts: TtsSettings,

    /// 返信表示
    #[serde(default)]
    pub reply: ReplySettings,

    /// 設定ストア
    #[serde(default)]
    pub store: StoreSettings,

    /// ログ設定
    #[serde(default)]
    pub log: LogConfig,
}

/// 設定ファイル（TOML）の読み書き
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// XDG設定ディレクトリの `config.toml` を使う
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "danmubot", "danmubot")
            .context("Failed to resolve the danmubot config directory")?;
        let path = dirs.config_dir().join(CONFIG_FILE_NAME);
        debug!("Config file: {}", path.display());
        Ok(Self { path })
    }

    /// 任意のパスを使う（`--config` 指定時）
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 読み込む。ファイルが無ければ既定値
    pub fn load_config(&self) -> Result<AppConfig> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file at {}, using defaults", self.path.display());
                return Ok(AppConfig::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let config = toml::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", self.path.display()))?;
        info!("✅ Config loaded: {}", self.path.display());
        Ok(config)
    }

    /// 保存する（親ディレクトリも作成）
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!("💾 Config saved: {}", self.path.display());
        Ok(())
    }
}
