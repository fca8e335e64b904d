pub mod ai;
pub mod bot;
pub mod chat;
pub mod config;
pub mod danmu;
pub mod database;
pub mod error;
pub mod feed;
pub mod reply;
pub mod tts;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the main error types for convenience
pub use ai::AiError;
pub use danmu::ParseError;
pub use database::StoreError;
pub use error::{BotError, BotResult};
pub use tts::TtsError;

// Re-export message processing
pub use danmu::{classify, format_content, parse_message, ClassifiedEvent, EventKind, RawEvent};

// Re-export the reply pipeline
pub use reply::{QueuedReply, ReplyOrchestrator, ReplyQueue, ReplySequencer};

// Re-export TTS
pub use tts::{SpeakRequest, SpeechOutcome, TtsBackendType, TtsDispatcher};

// Re-export config
pub use config::{AppConfig, ConfigManager, PageConfig};
pub use database::ChatConfigStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        assert!(std::any::type_name::<ReplyQueue>().contains("ReplyQueue"));
        assert!(std::any::type_name::<TtsDispatcher>().contains("TtsDispatcher"));
    }

    #[test]
    fn test_parse_message_reexport() {
        let raw = r#"{"Type":1,"ProcessName":"test","Data":"{\"Content\":\"hi\"}"}"#;
        let event = parse_message(raw).unwrap();
        assert_eq!(event.kind, EventKind::Comment);
    }

    #[test]
    fn test_error_types_re_exported() {
        let error: BotError = StoreError::NothingToUpdate.into();
        assert!(error.to_string().contains("更新する項目がありません"));

        let error: BotError = AiError::EmptyReply.into();
        assert!(matches!(error, BotError::Ai(_)));
    }
}
