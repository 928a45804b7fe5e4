use serenity::model::id::ChannelId;

use super::model::TicketState;
use super::lifecycle::TransitionKind;
use crate::components::utils::data;

/// Failure reported by the chat platform.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
    /// The referenced object (channel, message, member) no longer exists.
    pub not_found: bool,
}

impl PlatformError {
    pub fn new<S: ToString>(message: S) -> Self {
        Self { message: message.to_string(), not_found: false }
    }
    pub fn not_found<S: ToString>(message: S) -> Self {
        Self { message: message.to_string(), not_found: true }
    }
}

/// Every way a ticket operation can fail. The `Display` text is what the requester sees.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("No ticket category is configured on this server.")]
    NoCategoryConfigured,
    #[error("Unknown ticket type `{0}`.")]
    UnknownTicketType(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("You already have an open ticket for this category{}.", .existing.map(|c| format!(": <#{}>", c.0)).unwrap_or_default())]
    DuplicateOpenTicket { existing: Option<ChannelId> },
    #[error("You are banned from the ticket system.")]
    Banned,
    #[error("{0}")]
    NotFound(String),
    /// Rejected administrator input.
    #[error("{0}")]
    InvalidArgument(String),
    #[error("The ticket panel no longer exists. Ask an administrator to send it again.")]
    PanelNotFound,
    #[error("This ticket is {state} and cannot be {}.", .transition.past_participle())]
    IllegalTransition { state: TicketState, transition: TransitionKind },
    #[error("Discord error: {0}")]
    Platform(#[from] PlatformError),
    #[error("Storage error: {0}")]
    Store(#[from] data::Error),
}

impl TicketError {
    pub fn not_found_channel(channel: ChannelId) -> Self {
        TicketError::NotFound(format!("<#{}> is not an open or closed ticket.", channel.0))
    }
    /// Errors caused by a reference to something deleted outside of the bot.
    pub fn is_stale_reference(&self) -> bool {
        match self {
            TicketError::PanelNotFound => true,
            TicketError::Platform(e) => e.not_found,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TicketError>;
