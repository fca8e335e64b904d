//! 設定（アプリ設定ファイル・ページ別設定・取得元）

pub mod app;
pub mod page;
pub mod source;

pub use app::{AppConfig, ConfigManager, LogConfig, StoreSettings};
pub use page::{PageAiConfig, PageAutoReplyConfig, PageConfig, PageTtsConfig};
pub use source::{resolve_page_config, ConfigSource, HttpConfigSource, SqliteConfigSource};
