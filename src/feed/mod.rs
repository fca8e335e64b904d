//! 弾幕フィード（WebSocket）

pub mod client;
pub mod mock_server;

pub use client::{ConnectionStatus, FeedClient, FeedSettings};
pub use mock_server::{
    to_wire, welcome_event, MockEventGenerator, MockEventKind, MockFeedServer,
    DEFAULT_MOCK_INTERVAL, DEFAULT_MOCK_PORT,
};
