//! Custom ids of the ticket buttons.
//!
//! Panel buttons carry the ticket type as custom id. Buttons posted inside a ticket
//! carry the action and the channel id, which keeps them valid across restarts.

use serenity::model::id::ChannelId;

const CLOSE_PREFIX: &str = "close_ticket_";
const DELETE_PREFIX: &str = "delete_ticket_";
const REOPEN_PREFIX: &str = "reopen_ticket_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    /// A panel button: open a ticket of this type.
    Open(String),
    Close(ChannelId),
    Delete(ChannelId),
    Reopen(ChannelId),
}

impl Affordance {
    pub fn parse(custom_id: &str) -> Self {
        let channel = |rest: &str| rest.parse::<u64>().ok().map(ChannelId);
        if let Some(id) = custom_id.strip_prefix(CLOSE_PREFIX).and_then(channel) {
            return Affordance::Close(id);
        }
        if let Some(id) = custom_id.strip_prefix(DELETE_PREFIX).and_then(channel) {
            return Affordance::Delete(id);
        }
        if let Some(id) = custom_id.strip_prefix(REOPEN_PREFIX).and_then(channel) {
            return Affordance::Reopen(id);
        }
        Affordance::Open(custom_id.to_string())
    }
    pub fn custom_id(&self) -> String {
        match self {
            Affordance::Open(ticket_type) => ticket_type.clone(),
            Affordance::Close(c) => format!("{}{}", CLOSE_PREFIX, c.0),
            Affordance::Delete(c) => format!("{}{}", DELETE_PREFIX, c.0),
            Affordance::Reopen(c) => format!("{}{}", REOPEN_PREFIX, c.0),
        }
    }
}

/// Whether a ticket type id would be mistaken for a ticket button.
pub fn is_reserved(custom_id: &str) -> bool {
    !matches!(Affordance::parse(custom_id), Affordance::Open(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ticket_buttons() {
        assert_eq!(Affordance::parse("close_ticket_123"), Affordance::Close(ChannelId(123)));
        assert_eq!(Affordance::parse("delete_ticket_9"), Affordance::Delete(ChannelId(9)));
        assert_eq!(Affordance::parse("reopen_ticket_9"), Affordance::Reopen(ChannelId(9)));
        assert_eq!(Affordance::Close(ChannelId(5)).custom_id(), "close_ticket_5");
    }

    #[test]
    fn anything_else_is_a_ticket_type() {
        assert_eq!(Affordance::parse("partner"), Affordance::Open("partner".to_string()));
        assert_eq!(Affordance::parse("close_ticket_abc"), Affordance::Open("close_ticket_abc".to_string()));
        assert!(is_reserved("delete_ticket_1"));
        assert!(!is_reserved("lahelu"));
    }
}
