//! ページ別チャット設定ストア（SQLite）

pub mod crud;
pub mod models;

pub use models::*;

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 設定ストアのエラー
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("page_key '{0}' は既に使われています")]
    Duplicate(String),

    #[error("設定が見つかりません: {0}")]
    NotFound(String),

    #[error("更新する項目がありません")]
    NothingToUpdate,

    #[error("必須項目がありません: {0}")]
    MissingField(&'static str),

    #[error("データベースエラー: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("config_data のJSONが不正です: {0}")]
    Json(#[from] serde_json::Error),

    #[error("データベースの場所を決定できません: {0}")]
    Location(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// チャット設定ストア
pub struct ChatConfigStore {
    pub connection: rusqlite::Connection,
}

impl ChatConfigStore {
    /// データベースファイルを開く
    pub fn new<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let connection = rusqlite::Connection::open(db_path.as_ref())?;
        let store = Self { connection };
        store.initialize_schema()?;
        tracing::debug!("Database opened: {}", db_path.as_ref().display());
        Ok(store)
    }

    /// インメモリデータベースを作成（テスト用）
    pub fn new_in_memory() -> StoreResult<Self> {
        let connection = rusqlite::Connection::open_in_memory()?;
        let store = Self { connection };
        store.initialize_schema()?;
        Ok(store)
    }

    /// スキーマを初期化（既存なら何もしない）
    pub fn initialize_schema(&self) -> StoreResult<()> {
        self.connection.execute_batch(include_str!("schema.sql"))?;
        tracing::debug!("Database schema initialized");
        Ok(())
    }
}

/// XDGデータディレクトリのデータベースパス
pub fn get_database_path() -> StoreResult<PathBuf> {
    let project_dirs = ProjectDirs::from("dev", "danmubot", "danmubot")
        .ok_or_else(|| StoreError::Location("project directories unavailable".to_string()))?;

    let data_dir = project_dirs.data_dir();
    std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Location(e.to_string()))?;

    Ok(data_dir.join("danmubot.db"))
}
