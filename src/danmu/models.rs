//! 直播间（ライブルーム）イベントのデータ構造
//!
//! 外側のエンベロープ（`RawEvent`）と、その `Data` フィールドに文字列として
//! 埋め込まれた内側のJSON（`ParsedPayload`）、そして分類・整形済みの
//! `ClassifiedEvent` を定義する。

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::lenient;

/// WebSocketで受信する生のエンベロープ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawEvent {
    /// プロデューサーが付与する種別コード（欠落・未知の値もあり得る）
    #[serde(
        rename = "Type",
        alias = "kindCode",
        default,
        deserialize_with = "lenient::opt_i64"
    )]
    pub kind_code: Option<i64>,
    /// 送信元プロセス名（情報用途のみ）
    #[serde(
        rename = "ProcessName",
        alias = "producerName",
        default,
        deserialize_with = "lenient::string"
    )]
    pub producer_name: String,
    /// 文字列化されたJSON。二次パースが必要
    #[serde(rename = "Data", alias = "payload", default)]
    pub payload: String,
}

/// メッセージID（数値・文字列の両方が来る）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageId {
    Number(i64),
    Text(String),
}

/// ファンクラブ情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct FansClub {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub club_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub level: Option<i64>,
}

/// 発言ユーザー情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct UserInfo {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub short_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub display_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub level: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub pay_level: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub gender: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub head_img_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sec_uid: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub following_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub follower_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub follow_status: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub is_admin: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub is_anchor: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub fans_club: Option<FansClub>,
}

/// 配信ルームのオーナー情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct OwnerInfo {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sec_uid: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub head_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub follow_status: Option<i64>,
}

/// `Data` フィールドをデコードした内側のペイロード
///
/// すべてのフィールドは任意。欠落はエラーではない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ParsedPayload {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub current_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub enter_tip_type: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_parsed")]
    pub msg_id: Option<MessageId>,
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub user: Option<UserInfo>,
    /// プロデューサー側の綴りは `Onwer`
    #[serde(
        rename = "Onwer",
        alias = "Owner",
        default,
        deserialize_with = "lenient::opt_object"
    )]
    pub owner: Option<OwnerInfo>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub room_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub web_room_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub appid: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub gift_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub gift_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub gift_id: Option<i64>,
    /// 未知のフィールド
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ParsedPayload {
    /// 空文字列を欠落扱いにしたギフト名
    pub fn gift_name(&self) -> Option<&str> {
        self.gift_name.as_deref().filter(|name| !name.is_empty())
    }

    /// ギフト情報（名前またはID）を持つか。ID 0 は無し扱い
    pub fn has_gift(&self) -> bool {
        self.gift_name().is_some() || self.gift_id.is_some_and(|id| id != 0)
    }

    /// ギフト個数（欠落・0 は 1）
    pub fn gift_count(&self) -> i64 {
        self.gift_count.filter(|&count| count != 0).unwrap_or(1)
    }

    /// 視聴者数（0 は不明扱い）
    pub fn viewer_count(&self) -> Option<i64> {
        self.current_count.filter(|&count| count != 0)
    }

    /// 本文（欠落時は空文字列）
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// イベント種別
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserEnter,
    UserLeave,
    Comment,
    Gift,
    Like,
    Follow,
    Share,
    System,
    Unknown,
}

impl EventKind {
    /// すべての種別
    pub const ALL: [EventKind; 9] = [
        EventKind::UserEnter,
        EventKind::UserLeave,
        EventKind::Comment,
        EventKind::Gift,
        EventKind::Like,
        EventKind::Follow,
        EventKind::Share,
        EventKind::System,
        EventKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserEnter => "user_enter",
            EventKind::UserLeave => "user_leave",
            EventKind::Comment => "comment",
            EventKind::Gift => "gift",
            EventKind::Like => "like",
            EventKind::Follow => "follow",
            EventKind::Share => "share",
            EventKind::System => "system",
            EventKind::Unknown => "unknown",
        }
    }

    /// 表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::UserEnter => "enter",
            EventKind::UserLeave => "leave",
            EventKind::Comment => "comment",
            EventKind::Gift => "gift",
            EventKind::Like => "like",
            EventKind::Follow => "follow",
            EventKind::Share => "share",
            EventKind::System => "system",
            EventKind::Unknown => "unknown",
        }
    }

    /// 表示用アイコン
    pub fn icon(&self) -> &'static str {
        match self {
            EventKind::UserEnter | EventKind::UserLeave => "👋",
            EventKind::Comment => "💬",
            EventKind::Gift => "🎁",
            EventKind::Like => "👍",
            EventKind::Follow => "➕",
            EventKind::Share => "📤",
            EventKind::System => "📢",
            EventKind::Unknown => "❓",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ルーム情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoomInfo {
    pub room_id: Option<String>,
    pub web_room_id: Option<String>,
    pub current_count: Option<i64>,
}

/// ギフト情報（ギフト名がある場合のみ生成）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GiftInfo {
    pub name: String,
    pub count: i64,
    pub id: Option<i64>,
}

/// 分類・整形済みのイベント
///
/// 受信メッセージごとに一度だけ生成され、以後変更されない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub display_name: String,
    pub formatted_text: String,
    /// 受信時刻（プロデューサー側のタイムスタンプは信頼できない）
    pub timestamp: DateTime<Local>,
    pub user_info: Option<UserInfo>,
    pub owner_info: Option<OwnerInfo>,
    pub room_info: RoomInfo,
    pub gift_info: Option<GiftInfo>,
    pub raw: RawEvent,
    pub parsed: ParsedPayload,
}

impl ClassifiedEvent {
    pub fn is_comment(&self) -> bool {
        self.kind == EventKind::Comment
    }

    pub fn is_gift(&self) -> bool {
        self.kind == EventKind::Gift
    }

    pub fn is_user_enter(&self) -> bool {
        self.kind == EventKind::UserEnter
    }

    /// ターミナル表示用の1行
    pub fn summary_line(&self) -> String {
        format!(
            "[{}] {} {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind.icon(),
            self.display_name,
            self.formatted_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_event_accepts_both_field_spellings() {
        let producer: RawEvent =
            serde_json::from_str(r#"{"Type":1,"ProcessName":"p","Data":"{}"}"#).unwrap();
        let aliased: RawEvent =
            serde_json::from_str(r#"{"kindCode":1,"producerName":"p","payload":"{}"}"#).unwrap();
        assert_eq!(producer, aliased);
        assert_eq!(producer.kind_code, Some(1));
    }

    #[test]
    fn test_payload_keeps_unknown_fields() {
        let payload: ParsedPayload =
            serde_json::from_str(r#"{"Content":"hi","Custom":42}"#).unwrap();
        assert_eq!(payload.content(), "hi");
        assert_eq!(payload.extra.get("Custom"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_msg_id_number_or_string() {
        let a: ParsedPayload = serde_json::from_str(r#"{"MsgId":7}"#).unwrap();
        let b: ParsedPayload = serde_json::from_str(r#"{"MsgId":"abc"}"#).unwrap();
        assert_eq!(a.msg_id, Some(MessageId::Number(7)));
        assert_eq!(b.msg_id, Some(MessageId::Text("abc".to_string())));
    }

    #[test]
    fn test_payload_scalars_accept_either_type() {
        let payload: ParsedPayload = serde_json::from_str(
            r#"{"RoomId":123456789,"WebRoomId":"77","GiftCount":"3","GiftId":"12","CurrentCount":"256","User":{"Id":"42","IsAdmin":1}}"#,
        )
        .unwrap();
        assert_eq!(payload.room_id.as_deref(), Some("123456789"));
        assert_eq!(payload.web_room_id.as_deref(), Some("77"));
        assert_eq!(payload.gift_count, Some(3));
        assert_eq!(payload.gift_id, Some(12));
        assert_eq!(payload.current_count, Some(256));
        let user = payload.user.unwrap();
        assert_eq!(user.id, Some(42));
        assert_eq!(user.is_admin, Some(true));
    }

    #[test]
    fn test_unusable_fields_become_none() {
        let payload: ParsedPayload = serde_json::from_str(
            r#"{"Content":"hi","GiftCount":"lots","User":5,"MsgId":true,"Onwer":[1]}"#,
        )
        .unwrap();
        assert_eq!(payload.content(), "hi");
        assert_eq!(payload.gift_count, None);
        assert!(payload.user.is_none());
        assert!(payload.msg_id.is_none());
        assert!(payload.owner.is_none());
    }

    #[test]
    fn test_raw_event_type_as_string() {
        let raw: RawEvent =
            serde_json::from_str(r#"{"Type":"1","ProcessName":7,"Data":"{}"}"#).unwrap();
        assert_eq!(raw.kind_code, Some(1));
        assert_eq!(raw.producer_name, "7");

        let raw: RawEvent = serde_json::from_str(r#"{"Type":"one","Data":"{}"}"#).unwrap();
        assert_eq!(raw.kind_code, None);
    }

    #[test]
    fn test_zero_counts_are_falsy() {
        let payload = ParsedPayload {
            gift_id: Some(0),
            gift_count: Some(0),
            current_count: Some(0),
            ..Default::default()
        };
        assert!(!payload.has_gift());
        assert_eq!(payload.gift_count(), 1);
        assert_eq!(payload.viewer_count(), None);
    }

    #[test]
    fn test_owner_alias() {
        let payload: ParsedPayload =
            serde_json::from_str(r#"{"Owner":{"Nickname":"host"}}"#).unwrap();
        assert_eq!(
            payload.owner.and_then(|o| o.nickname),
            Some("host".to_string())
        );
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&EventKind::UserEnter).unwrap();
        assert_eq!(json, "\"user_enter\"");
        assert_eq!(EventKind::Gift.to_string(), "gift");
    }
}
