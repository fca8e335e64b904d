//! 分類済みイベントの表示テキスト整形

use super::models::{EventKind, ParsedPayload};

/// 表示テキストを生成（純粋関数）
pub fn format_content(kind: EventKind, content: &str, payload: &ParsedPayload) -> String {
    match kind {
        EventKind::UserEnter => match payload.viewer_count() {
            Some(count) => format!("entered the room (viewers: {})", count),
            None => "entered the room".to_string(),
        },
        EventKind::UserLeave => "left the room".to_string(),
        EventKind::Gift => {
            let name = payload.gift_name().unwrap_or("a gift");
            let count = payload.gift_count();
            if count > 1 {
                format!("sent {} x{}", name, count)
            } else {
                format!("sent {}", name)
            }
        }
        EventKind::Like => "liked".to_string(),
        EventKind::Follow => "followed the room".to_string(),
        EventKind::Share => "shared the room".to_string(),
        EventKind::Comment | EventKind::System => content.to_string(),
        EventKind::Unknown => {
            if content.is_empty() {
                "unknown message".to_string()
            } else {
                content.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift(name: Option<&str>, count: Option<i64>) -> ParsedPayload {
        ParsedPayload {
            gift_name: name.map(str::to_string),
            gift_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_gift_formatting() {
        assert_eq!(
            format_content(EventKind::Gift, "", &gift(Some("Rose"), Some(3))),
            "sent Rose x3"
        );
        assert_eq!(
            format_content(EventKind::Gift, "", &gift(Some("Rose"), Some(1))),
            "sent Rose"
        );
        assert_eq!(
            format_content(EventKind::Gift, "", &gift(None, None)),
            "sent a gift"
        );
        assert_eq!(
            format_content(EventKind::Gift, "", &gift(Some(""), Some(2))),
            "sent a gift x2"
        );
        assert_eq!(
            format_content(EventKind::Gift, "", &gift(Some("Rose"), Some(0))),
            "sent Rose"
        );
    }

    #[test]
    fn test_enter_with_and_without_count() {
        let mut payload = ParsedPayload::default();
        assert_eq!(
            format_content(EventKind::UserEnter, "x$来了", &payload),
            "entered the room"
        );
        payload.current_count = Some(321);
        assert_eq!(
            format_content(EventKind::UserEnter, "x$来了", &payload),
            "entered the room (viewers: 321)"
        );
        payload.current_count = Some(0);
        assert_eq!(
            format_content(EventKind::UserEnter, "x$来了", &payload),
            "entered the room"
        );
    }

    #[test]
    fn test_fixed_phrases() {
        let p = ParsedPayload::default();
        assert_eq!(format_content(EventKind::UserLeave, "bye", &p), "left the room");
        assert_eq!(format_content(EventKind::Like, "点赞", &p), "liked");
        assert_eq!(format_content(EventKind::Follow, "", &p), "followed the room");
        assert_eq!(format_content(EventKind::Share, "", &p), "shared the room");
    }

    #[test]
    fn test_passthrough_and_unknown() {
        let p = ParsedPayload::default();
        assert_eq!(format_content(EventKind::Comment, "hello", &p), "hello");
        assert_eq!(format_content(EventKind::System, "欢迎", &p), "欢迎");
        assert_eq!(format_content(EventKind::Unknown, "", &p), "unknown message");
        assert_eq!(format_content(EventKind::Unknown, "???", &p), "???");
    }

    #[test]
    fn test_formatter_is_pure() {
        let p = gift(Some("火箭"), Some(5));
        for kind in EventKind::ALL {
            assert_eq!(
                format_content(kind, "content", &p),
                format_content(kind, "content", &p)
            );
        }
    }
}
