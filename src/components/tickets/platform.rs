//! Operations the ticket core needs from the chat platform.
//!
//! The lifecycle, recovery and admin code only talk to the platform through
//! [`Platform`]. The serenity implementation lives in [`super::discord`].

use serenity::{
    async_trait,
    model::id::{ChannelId, GuildId, MessageId, RoleId, UserId},
};

use super::archive::{HistoryEntry, Transcript};
use super::error::PlatformError;
use super::model::{ButtonDef, ClosedBy, PanelEmbed, Ticket};

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// What is needed to provision a ticket channel.
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    pub guild_id: GuildId,
    pub category: ChannelId,
    pub name: String,
    pub topic: String,
    pub owner: UserId,
    /// Handler roles granted access besides the owner.
    pub roles: Vec<RoleId>,
}

/// A live channel as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub guild_id: GuildId,
    pub name: String,
    pub is_category: bool,
}

/// Content of the message announcing a closed ticket, carrying the delete and reopen
/// buttons.
#[derive(Debug, Clone)]
pub struct ClosedNotice {
    pub channel: ChannelId,
    pub closed_by: ClosedBy,
    pub timestamp: i64,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Resolve a channel, `None` when it no longer exists.
    async fn channel(&self, channel: ChannelId) -> PlatformResult<Option<ChannelInfo>>;
    /// Create a private text channel visible to the owner, the administrators and the
    /// requested roles.
    async fn create_ticket_channel(&self, request: &ChannelRequest) -> PlatformResult<ChannelId>;
    async fn delete_channel(&self, channel: ChannelId) -> PlatformResult<()>;
    /// Revoke read access for the general membership and for `members`.
    async fn lock_channel(&self, guild: GuildId, channel: ChannelId, members: &[UserId]) -> PlatformResult<()>;
    /// Give `member` read and write access to the channel.
    async fn grant_member(&self, channel: ChannelId, member: UserId) -> PlatformResult<()>;
    async fn send_text(&self, channel: ChannelId, content: &str) -> PlatformResult<()>;
    /// Post the welcome message of an open ticket with its close button.
    async fn post_open_affordance(&self, ticket: &Ticket, type_label: &str, roles: &[RoleId]) -> PlatformResult<()>;
    /// Post the closed notice with the delete and reopen buttons.
    async fn post_closed_affordance(&self, notice: &ClosedNotice) -> PlatformResult<()>;
    /// Whether the most recent message of the channel carries interactive components.
    async fn last_message_has_affordance(&self, channel: ChannelId) -> PlatformResult<bool>;
    /// Whole channel history, oldest first.
    async fn history(&self, channel: ChannelId) -> PlatformResult<Vec<HistoryEntry>>;
    async fn send_transcript(&self, log_channel: ChannelId, transcript: &Transcript, deleted_by: UserId) -> PlatformResult<()>;
    async fn send_panel(&self, channel: ChannelId, embed: &PanelEmbed, buttons: &[ButtonDef]) -> PlatformResult<MessageId>;
    /// Whether the panel message still exists.
    async fn panel_exists(&self, channel: ChannelId, message: MessageId) -> PlatformResult<bool>;
    /// Rewrite the panel message with the given embed and buttons.
    async fn render_panel(&self, channel: ChannelId, message: MessageId, embed: &PanelEmbed, buttons: &[ButtonDef]) -> PlatformResult<()>;
    /// Channels whose parent is `category`.
    async fn category_children(&self, guild: GuildId, category: ChannelId) -> PlatformResult<Vec<ChannelId>>;
}
