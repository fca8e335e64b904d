//! イベント種別の判定
//!
//! 判定順序（最初に一致したものを採用）:
//! 1. 種別コード表に載っていればそれを返す
//! 2. 本文があれば `CONTENT_RULES` を上から順に評価する
//! 3. 本文がなければペイロードのフィールドから推定する
//! 4. いずれにも当てはまらなければ `Unknown`

use super::models::{EventKind, ParsedPayload};

/// 入室ヒントコードの「入室」値
pub const ENTER_TIP_SENTINEL: i64 = 0;

/// 種別コード表
const KIND_CODE_TABLE: &[(i64, EventKind)] = &[
    (1, EventKind::Comment),
    (2, EventKind::Gift),
    (3, EventKind::UserEnter),
    (4, EventKind::UserLeave),
    (5, EventKind::Like),
    (6, EventKind::Follow),
    (7, EventKind::Share),
    (8, EventKind::System),
];

/// 本文に対する判定条件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleMatcher {
    /// いずれかの語句を含む
    Phrases(&'static [&'static str]),
    /// ギフト名またはギフトIDがある
    HasGift,
    /// 本文が空でない（既定のフォールバック）
    NonEmpty,
}

/// 本文ベースの判定ルール
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentRule {
    pub matcher: RuleMatcher,
    pub kind: EventKind,
}

impl ContentRule {
    pub fn matches(&self, content: &str, payload: &ParsedPayload) -> bool {
        match self.matcher {
            RuleMatcher::Phrases(phrases) => phrases.iter().any(|p| content.contains(p)),
            RuleMatcher::HasGift => payload.has_gift(),
            RuleMatcher::NonEmpty => !content.is_empty(),
        }
    }
}

pub const ENTER_PHRASES: &[&str] = &["$来了", "来了直播间", "进入直播间"];
pub const LEAVE_PHRASES: &[&str] = &["离开", "退出"];
pub const LIKE_PHRASES: &[&str] = &["点赞", "like"];
pub const FOLLOW_PHRASES: &[&str] = &["关注", "follow"];
pub const SHARE_PHRASES: &[&str] = &["分享", "share"];
pub const SYSTEM_PHRASES: &[&str] = &["系统", "system"];

/// 本文ベースの判定ルール（評価順）
pub const CONTENT_RULES: &[ContentRule] = &[
    ContentRule {
        matcher: RuleMatcher::Phrases(ENTER_PHRASES),
        kind: EventKind::UserEnter,
    },
    ContentRule {
        matcher: RuleMatcher::Phrases(LEAVE_PHRASES),
        kind: EventKind::UserLeave,
    },
    ContentRule {
        matcher: RuleMatcher::HasGift,
        kind: EventKind::Gift,
    },
    ContentRule {
        matcher: RuleMatcher::Phrases(LIKE_PHRASES),
        kind: EventKind::Like,
    },
    ContentRule {
        matcher: RuleMatcher::Phrases(FOLLOW_PHRASES),
        kind: EventKind::Follow,
    },
    ContentRule {
        matcher: RuleMatcher::Phrases(SHARE_PHRASES),
        kind: EventKind::Share,
    },
    ContentRule {
        matcher: RuleMatcher::Phrases(SYSTEM_PHRASES),
        kind: EventKind::System,
    },
    ContentRule {
        matcher: RuleMatcher::NonEmpty,
        kind: EventKind::Comment,
    },
];

/// 種別コード表を引く
pub fn kind_from_code(code: i64) -> Option<EventKind> {
    KIND_CODE_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, kind)| *kind)
}

/// イベント種別を判定
pub fn classify(kind_code: Option<i64>, content: &str, payload: &ParsedPayload) -> EventKind {
    if let Some(kind) = kind_code.and_then(kind_from_code) {
        return kind;
    }

    if !content.is_empty() {
        return CONTENT_RULES
            .iter()
            .find(|rule| rule.matches(content, payload))
            .map(|rule| rule.kind)
            .unwrap_or(EventKind::Comment);
    }

    if payload.gift_name().is_some() {
        return EventKind::Gift;
    }

    if let Some(tip) = payload.enter_tip_type {
        return if tip == ENTER_TIP_SENTINEL {
            EventKind::UserEnter
        } else {
            EventKind::UserLeave
        };
    }

    EventKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ParsedPayload {
        ParsedPayload::default()
    }

    #[test]
    fn test_kind_code_is_authoritative() {
        for (code, kind) in KIND_CODE_TABLE {
            // 本文に別カテゴリの語句があってもコードが優先
            assert_eq!(classify(Some(*code), "进入直播间 点赞 share", &payload()), *kind);
            assert_eq!(classify(Some(*code), "", &payload()), *kind);
        }
    }

    #[test]
    fn test_unknown_code_falls_back_to_content() {
        assert_eq!(
            classify(Some(99), "小明$来了直播间人数:120", &payload()),
            EventKind::UserEnter
        );
        assert_eq!(classify(None, "hello", &payload()), EventKind::Comment);
    }

    #[test]
    fn test_each_rule_independently() {
        let cases = [
            ("小红 进入直播间", EventKind::UserEnter),
            ("小红 离开了", EventKind::UserLeave),
            ("小红 退出", EventKind::UserLeave),
            ("小红 点赞了", EventKind::Like),
            ("I like it", EventKind::Like),
            ("关注主播", EventKind::Follow),
            ("please follow", EventKind::Follow),
            ("分享了直播间", EventKind::Share),
            ("share this", EventKind::Share),
            ("系统通知", EventKind::System),
            ("system notice", EventKind::System),
            ("主播好", EventKind::Comment),
        ];
        for (content, expected) in cases {
            assert_eq!(classify(None, content, &payload()), expected, "{content}");
        }
    }

    #[test]
    fn test_gift_rule_sits_between_leave_and_like() {
        let mut p = payload();
        p.gift_id = Some(3);
        assert_eq!(classify(None, "点赞", &p), EventKind::Gift);
        assert_eq!(classify(None, "离开", &p), EventKind::UserLeave);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // like と follow の両方を含む場合は先に評価される like
        assert_eq!(
            classify(None, "like and follow", &payload()),
            EventKind::Like
        );
        assert_eq!(
            classify(None, "follow and share", &payload()),
            EventKind::Follow
        );
    }

    #[test]
    fn test_no_content_uses_payload_fields() {
        let mut gift = payload();
        gift.gift_name = Some("Rose".to_string());
        assert_eq!(classify(None, "", &gift), EventKind::Gift);

        let mut enter = payload();
        enter.enter_tip_type = Some(ENTER_TIP_SENTINEL);
        assert_eq!(classify(None, "", &enter), EventKind::UserEnter);

        let mut leave = payload();
        leave.enter_tip_type = Some(1);
        assert_eq!(classify(None, "", &leave), EventKind::UserLeave);

        assert_eq!(classify(None, "", &payload()), EventKind::Unknown);
    }

    #[test]
    fn test_gift_id_alone_without_content_is_not_gift() {
        let mut p = payload();
        p.gift_id = Some(5);
        assert_eq!(classify(None, "", &p), EventKind::Unknown);
    }

    #[test]
    fn test_rule_order() {
        let kinds: Vec<EventKind> = CONTENT_RULES.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::UserEnter,
                EventKind::UserLeave,
                EventKind::Gift,
                EventKind::Like,
                EventKind::Follow,
                EventKind::Share,
                EventKind::System,
                EventKind::Comment,
            ]
        );
    }
}
