//! Feature stores: thin, typed instantiations of the store engine bound to
//! concrete endpoints, plus the realtime bindings that feed push events into
//! them. All synchronization behavior lives in `streamhub-store`,
//! `streamhub-client` and `streamhub-realtime`; these modules are
//! configuration.

pub mod chat;
pub mod conversations;
pub mod notifications;
pub mod playlists;
pub mod profile;
pub mod reviews;
pub mod watch_sessions;

pub use chat::{chat_store, ChatMessageDto, ChatStore};
pub use conversations::{
    conversation_store, direct_message_store, ConversationDto, ConversationStore,
    DirectMessageDto, DirectMessageStore,
};
pub use notifications::{notification_store, NotificationDto, NotificationStore};
pub use playlists::{playlist_store, PlaylistDto, PlaylistStore};
pub use profile::{profile_store, ProfileStore, UserDto};
pub use reviews::{review_store, ReviewDto, ReviewStore};
pub use watch_sessions::{watch_session_store, WatchSessionDto, WatchSessionStore};
