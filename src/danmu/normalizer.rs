//! WebSocketメッセージの正規化
//!
//! 生の文字列（またはデコード済みの `RawEvent`）を受け取り、
//! 内側のJSONを二次パースしたうえで分類・整形まで行う。
//! 不正な入力でパニックすることはなく、すべて `ParseError` として返す。

use chrono::Local;
use thiserror::Error;

use super::classifier::classify;
use super::formatter::format_content;
use super::models::{ClassifiedEvent, GiftInfo, ParsedPayload, RawEvent, RoomInfo, UserInfo};

/// 表示名が解決できない場合の既定値
pub const UNKNOWN_USER: &str = "unknown user";

/// 読み上げ等で使う呼び名の既定値
pub const FALLBACK_SPEAKER: &str = "viewer";

/// 解析エラー
#[derive(Debug, Error)]
pub enum ParseError {
    /// 外側のJSONが不正
    #[error("invalid envelope: {0}")]
    EnvelopeInvalid(#[source] serde_json::Error),

    /// `Data` フィールドのJSONが不正
    #[error("invalid payload: {0}")]
    PayloadInvalid(#[source] serde_json::Error),
}

/// 文字列のメッセージを解析
pub fn parse_message(raw: &str) -> Result<ClassifiedEvent, ParseError> {
    let event: RawEvent = serde_json::from_str(raw).map_err(ParseError::EnvelopeInvalid)?;
    parse_raw_event(event)
}

/// デコード済みのエンベロープを解析
pub fn parse_raw_event(raw: RawEvent) -> Result<ClassifiedEvent, ParseError> {
    let parsed: ParsedPayload = serde_json::from_str(&raw.payload).map_err(|e| {
        tracing::warn!(
            producer = %raw.producer_name,
            kind_code = ?raw.kind_code,
            "⚠️ Data フィールドの解析に失敗: {}",
            e
        );
        ParseError::PayloadInvalid(e)
    })?;

    let display_name = resolve_display_name(parsed.user.as_ref());
    let content = parsed.content().to_string();
    let kind = classify(raw.kind_code, &content, &parsed);
    let formatted_text = format_content(kind, &content, &parsed);

    let gift_info = parsed.gift_name().map(|name| GiftInfo {
        name: name.to_string(),
        count: parsed.gift_count(),
        id: parsed.gift_id,
    });

    let room_info = RoomInfo {
        room_id: parsed.room_id.clone(),
        web_room_id: parsed.web_room_id.clone(),
        current_count: parsed.current_count,
    };

    Ok(ClassifiedEvent {
        kind,
        display_name,
        formatted_text,
        timestamp: Local::now(),
        user_info: parsed.user.clone(),
        owner_info: parsed.owner.clone(),
        room_info,
        gift_info,
        raw,
        parsed,
    })
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// 表示名を解決: ニックネーム → 表示ID → 既定値
pub fn resolve_display_name(user: Option<&UserInfo>) -> String {
    user.and_then(|u| non_empty(u.nickname.as_ref()).or_else(|| non_empty(u.display_id.as_ref())))
        .unwrap_or(UNKNOWN_USER)
        .to_string()
}

/// 読み上げ・AIコンテキスト用の呼び名
pub fn speaker_name(event: &ClassifiedEvent) -> String {
    event
        .user_info
        .as_ref()
        .and_then(|u| non_empty(u.nickname.as_ref()).or_else(|| non_empty(u.display_id.as_ref())))
        .or_else(|| Some(event.display_name.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or(FALLBACK_SPEAKER)
        .to_string()
}
