use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde_json::json;

use super::{ChatConfig, ChatConfigStore, ChatConfigUpdate, NewChatConfig, StoreError, StoreResult};

const SELECT_COLUMNS: &str = "SELECT id, page_key, page_name, config_data, is_active, description, created_at, updated_at FROM chat_config";

/// 行をそのまま読んだもの（config_data は未パース）
struct ChatConfigRow {
    id: i64,
    page_key: String,
    page_name: String,
    config_data: String,
    is_active: bool,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChatConfigRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            page_key: row.get(1)?,
            page_name: row.get(2)?,
            config_data: row.get(3)?,
            is_active: row.get::<_, i64>(4)? != 0,
            description: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_config(self) -> StoreResult<ChatConfig> {
        Ok(ChatConfig {
            id: self.id,
            page_key: self.page_key,
            page_name: self.page_name,
            config_data: serde_json::from_str(&self.config_data)?,
            is_active: self.is_active,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 初回起動時に投入する既定ページ
pub fn default_configs() -> Vec<NewChatConfig> {
    vec![
        NewChatConfig::new(
            "chat",
            "Bot chat page",
            json!({
                "tts": {
                    "type": "browser",
                    "autoPlay": true,
                    "edgeOptions": {
                        "voice": "zh-CN-XiaoxiaoNeural",
                        "rate": "+0%",
                        "pitch": "+0Hz"
                    },
                    "thirdPartyOptions": { "provider": "baidu" }
                },
                "ai": {
                    "model": "doubao-seed-1-6-251015",
                    "temperature": 0.7,
                    "maxTokens": 200,
                    "systemPrompt": "You are a live-stream room assistant answering viewers' questions. Keep replies short, friendly and fun, within 50 characters."
                }
            }),
        )
        .with_description("Default chat page configuration"),
        NewChatConfig::new(
            "live-chat-bot",
            "Live room chat bot",
            json!({
                "tts": {
                    "type": "browser",
                    "autoPlay": true,
                    "voiceEnabled": true
                },
                "ai": {
                    "enabled": true,
                    "model": "doubao-seed-1-6-251015",
                    "temperature": 0.7,
                    "maxTokens": 200
                },
                "autoReply": {
                    "enabled": false,
                    "keywords": "",
                    "message": "Thanks for your support!"
                }
            }),
        )
        .with_description("Live room chat bot configuration"),
    ]
}

impl ChatConfigStore {
    /// テーブルが空なら既定ページを投入。投入したら true
    pub fn seed_defaults(&mut self) -> StoreResult<bool> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM chat_config", [], |row| row.get(0))?;
        if count > 0 {
            tracing::info!("ℹ️ 設定が既に{}件あるため既定値の投入をスキップ", count);
            return Ok(false);
        }

        let tx = self.connection.transaction()?;
        let now = Utc::now().to_rfc3339();
        for config in default_configs() {
            tx.execute(
                "INSERT INTO chat_config (page_key, page_name, config_data, is_active, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    config.page_key,
                    config.page_name,
                    serde_json::to_string(&config.config_data)?,
                    config.is_active,
                    config.description,
                    now,
                ],
            )?;
        }
        tx.commit()?;

        tracing::info!("✅ 既定の設定を投入しました");
        Ok(true)
    }

    /// 全件（新しい順）
    pub fn list(&self) -> StoreResult<Vec<ChatConfig>> {
        let mut stmt = self
            .connection
            .prepare(&format!("{} ORDER BY created_at DESC, id DESC", SELECT_COLUMNS))?;
        let rows = stmt
            .query_map([], ChatConfigRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ChatConfigRow::into_config).collect()
    }

    /// IDで取得
    pub fn get(&self, id: i64) -> StoreResult<Option<ChatConfig>> {
        self.connection
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                ChatConfigRow::from_row,
            )
            .optional()?
            .map(ChatConfigRow::into_config)
            .transpose()
    }

    /// 有効なページ設定を取得
    pub fn get_active_by_page_key(&self, page_key: &str) -> StoreResult<Option<ChatConfig>> {
        self.connection
            .query_row(
                &format!("{} WHERE page_key = ?1 AND is_active = 1", SELECT_COLUMNS),
                params![page_key],
                ChatConfigRow::from_row,
            )
            .optional()?
            .map(ChatConfigRow::into_config)
            .transpose()
    }

    /// 新規作成し、IDを返す
    pub fn create(&mut self, config: NewChatConfig) -> StoreResult<i64> {
        if config.page_key.trim().is_empty() {
            return Err(StoreError::MissingField("page_key"));
        }
        if config.page_name.trim().is_empty() {
            return Err(StoreError::MissingField("page_name"));
        }
        if config.config_data.is_null() {
            return Err(StoreError::MissingField("config_data"));
        }

        if self.page_key_taken(&config.page_key, None)? {
            return Err(StoreError::Duplicate(config.page_key));
        }

        let now = Utc::now().to_rfc3339();
        self.connection.execute(
            "INSERT INTO chat_config (page_key, page_name, config_data, is_active, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                config.page_key,
                config.page_name,
                serde_json::to_string(&config.config_data)?,
                config.is_active,
                config.description,
                now,
            ],
        )?;

        let id = self.connection.last_insert_rowid();
        tracing::info!("📝 設定を作成: #{} {}", id, config.page_key);
        Ok(id)
    }

    /// 部分更新
    pub fn update(&mut self, id: i64, update: ChatConfigUpdate) -> StoreResult<()> {
        if update.is_empty() {
            return Err(StoreError::NothingToUpdate);
        }

        let mut columns: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(page_name) = update.page_name {
            columns.push("page_name");
            values.push(SqlValue::Text(page_name));
        }
        if let Some(config_data) = update.config_data {
            columns.push("config_data");
            values.push(SqlValue::Text(serde_json::to_string(&config_data)?));
        }
        if let Some(description) = update.description {
            columns.push("description");
            values.push(SqlValue::Text(description));
        }
        if let Some(is_active) = update.is_active {
            columns.push("is_active");
            values.push(SqlValue::Integer(i64::from(is_active)));
        }
        if let Some(page_key) = update.page_key {
            if self.page_key_taken(&page_key, Some(id))? {
                return Err(StoreError::Duplicate(page_key));
            }
            columns.push("page_key");
            values.push(SqlValue::Text(page_key));
        }

        columns.push("updated_at");
        values.push(SqlValue::Text(Utc::now().to_rfc3339()));
        values.push(SqlValue::Integer(id));

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE chat_config SET {} WHERE id = ?{}",
            assignments,
            columns.len() + 1
        );

        let affected = self.connection.execute(&sql, params_from_iter(values))?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("id {}", id)));
        }

        tracing::info!("✏️ 設定を更新: #{}", id);
        Ok(())
    }

    /// 削除
    pub fn delete(&mut self, id: i64) -> StoreResult<()> {
        let affected = self
            .connection
            .execute("DELETE FROM chat_config WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("id {}", id)));
        }

        tracing::info!("🗑️ 設定を削除: #{}", id);
        Ok(())
    }

    fn page_key_taken(&self, page_key: &str, except_id: Option<i64>) -> StoreResult<bool> {
        let exists = match except_id {
            Some(id) => self
                .connection
                .prepare("SELECT 1 FROM chat_config WHERE page_key = ?1 AND id != ?2")?
                .exists(params![page_key, id])?,
            None => self
                .connection
                .prepare("SELECT 1 FROM chat_config WHERE page_key = ?1")?
                .exists(params![page_key])?,
        };
        Ok(exists)
    }
}
