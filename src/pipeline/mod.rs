//! Conversation pipeline: stage messages and the orchestrating loop.

pub mod coordinator;
pub mod messages;

pub use coordinator::{ConversationLoop, OFFLINE_NOTICE, QUOTA_NOTICE};
