pub mod capability;
pub mod config;
pub mod error;
pub mod message;
pub mod paths;
pub mod types;

pub use capability::CapabilityDescriptor;
pub use config::Config;
pub use error::{Error, Result};
pub use message::{Channel, ChannelOutput, TurnRequest};
pub use paths::Paths;
pub use types::{
    ChatMessage, EvidenceSnippet, ProfileDelta, ReplyFragment, Session, Speaker, StructuredReply,
    SuggestedAction, SuppressReason, SuppressedFragment, Turn, UserProfile,
};
