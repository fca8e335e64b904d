use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ページ別チャット設定（1行）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    pub id: i64,
    /// ページ識別子（一意）
    pub page_key: String,
    pub page_name: String,
    /// 設定本体（JSON）
    pub config_data: Value,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 新規作成用
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewChatConfig {
    pub page_key: String,
    pub page_name: String,
    pub config_data: Value,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

impl NewChatConfig {
    pub fn new(
        page_key: impl Into<String>,
        page_name: impl Into<String>,
        config_data: Value,
    ) -> Self {
        Self {
            page_key: page_key.into(),
            page_name: page_name.into(),
            config_data,
            is_active: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 部分更新（Noneの項目は変更しない）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatConfigUpdate {
    pub page_key: Option<String>,
    pub page_name: Option<String>,
    pub config_data: Option<Value>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

impl ChatConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.page_key.is_none()
            && self.page_name.is_none()
            && self.config_data.is_none()
            && self.is_active.is_none()
            && self.description.is_none()
    }
}
