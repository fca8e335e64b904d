//! 弾幕（danmu）メッセージ処理
//!
//! エンベロープの正規化 → 種別判定 → 表示テキスト整形 の3段階。

pub mod classifier;
pub mod formatter;
mod lenient;
pub mod models;
pub mod normalizer;

pub use classifier::{classify, kind_from_code, ContentRule, RuleMatcher, CONTENT_RULES};
pub use formatter::format_content;
pub use models::*;
pub use normalizer::{
    parse_message, parse_raw_event, resolve_display_name, speaker_name, ParseError, UNKNOWN_USER,
};
