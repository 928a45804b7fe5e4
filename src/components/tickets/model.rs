//! Ticket data model and the shapes of the persisted JSON files.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId, UserId};

/// Lifecycle state of a ticket channel.
///
/// `Deleted` is also what an unknown channel resolves to: absence from both indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Open,
    Closed,
    Deleted,
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketState::Open => "open",
            TicketState::Closed => "closed",
            TicketState::Deleted => "deleted",
        })
    }
}

/// An open ticket as tracked by the registry.
///
/// `owner` and `ticket_type` are `None` only for tickets recovered from an active
/// index entry that has no metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub owner: Option<UserId>,
    pub ticket_type: Option<String>,
    pub opened_at: DateTime<Utc>,
}

/// Who closed a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedBy {
    User(UserId),
    AutoExpire,
}

pub const AUTO_EXPIRE: &str = "auto-expire";

impl fmt::Display for ClosedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedBy::User(id) => write!(f, "<@{}>", id.0),
            ClosedBy::AutoExpire => f.write_str(AUTO_EXPIRE),
        }
    }
}

// Persisted as the user id number, or as the "auto-expire" string.
impl Serialize for ClosedBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClosedBy::User(id) => serializer.serialize_u64(id.0),
            ClosedBy::AutoExpire => serializer.serialize_str(AUTO_EXPIRE),
        }
    }
}
impl<'de> Deserialize<'de> for ClosedBy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(ClosedBy::User(UserId(id))),
            Raw::Text(s) if s == AUTO_EXPIRE => Ok(ClosedBy::AutoExpire),
            Raw::Text(s) => s.parse::<u64>()
                .map(|id| ClosedBy::User(UserId(id)))
                .map_err(|_| serde::de::Error::custom(format!("invalid closed_by value: {}", s))),
        }
    }
}

/// Snapshot of a ticket at the moment it left the Open state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedTicket {
    pub ticket: Ticket,
    pub closed_at: DateTime<Utc>,
    pub closed_by: ClosedBy,
}

/// Timestamps are written as naive UTC ISO-8601. Naive values are read as UTC and
/// RFC 3339 values are accepted as well.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn format(value: &DateTime<Utc>) -> String {
        value.naive_utc().format(FORMAT).to_string()
    }
    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }
        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

/// Visual style of a panel button, stored as its Discord numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

impl ButtonStyle {
    /// Parse a style name; unknown names give `Secondary`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "primary" => ButtonStyle::Primary,
            "success" => ButtonStyle::Success,
            "danger" => ButtonStyle::Danger,
            _ => ButtonStyle::Secondary,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            ButtonStyle::Primary => "primary",
            ButtonStyle::Secondary => "secondary",
            ButtonStyle::Success => "success",
            ButtonStyle::Danger => "danger",
        }
    }
}
impl From<ButtonStyle> for u8 {
    fn from(style: ButtonStyle) -> u8 {
        style as u8
    }
}
impl TryFrom<u8> for ButtonStyle {
    type Error = String;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ButtonStyle::Primary),
            2 => Ok(ButtonStyle::Secondary),
            3 => Ok(ButtonStyle::Success),
            4 => Ok(ButtonStyle::Danger),
            other => Err(format!("unsupported button style {}", other)),
        }
    }
}

/// One option of the panel: the button label, its style and the ticket type it opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonDef {
    pub label: String,
    pub style: ButtonStyle,
    pub custom_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelEmbed {
    pub title: String,
    pub description: String,
    pub footer: String,
}

impl Default for PanelEmbed {
    fn default() -> Self {
        Self {
            title: "Support Ticket".to_string(),
            description: "Click a button to open a ticket matching your request.".to_string(),
            footer: "Ticket system".to_string(),
        }
    }
}

/// Panel record of one guild (`ticket_buttons.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub message_id: u64,
    pub channel_id: u64,
    #[serde(default)]
    pub buttons: Vec<ButtonDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<PanelEmbed>,
}

impl PanelConfig {
    pub fn channel(&self) -> ChannelId {
        ChannelId(self.channel_id)
    }
    pub fn message(&self) -> MessageId {
        MessageId(self.message_id)
    }
    pub fn button(&self, custom_id: &str) -> Option<&ButtonDef> {
        self.buttons.iter().find(|b| b.custom_id == custom_id)
    }
    pub fn embed_or_default(&self) -> PanelEmbed {
        self.embed.clone().unwrap_or_default()
    }
}

/// Closed index entry (`ticket_closed.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedRecord {
    pub user_id: Option<u64>,
    pub closed_by: ClosedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
}

impl ClosedRecord {
    pub fn owner(&self) -> Option<UserId> {
        self.user_id.map(UserId)
    }
}

/// Metadata of an open ticket (`ticket_open.json`), the part the flat active index
/// cannot carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRecord {
    pub guild_id: u64,
    pub user_id: Option<u64>,
    pub ticket_type: Option<String>,
    #[serde(with = "timestamp")]
    pub opened_at: DateTime<Utc>,
}

impl OpenRecord {
    pub fn into_ticket(self, channel_id: ChannelId) -> Ticket {
        Ticket {
            guild_id: GuildId(self.guild_id),
            channel_id,
            owner: self.user_id.map(UserId),
            ticket_type: self.ticket_type,
            opened_at: self.opened_at,
        }
    }
}

impl From<&Ticket> for OpenRecord {
    fn from(ticket: &Ticket) -> Self {
        Self {
            guild_id: ticket.guild_id.0,
            user_id: ticket.owner.map(|u| u.0),
            ticket_type: ticket.ticket_type.clone(),
            opened_at: ticket.opened_at,
        }
    }
}

/// Historical log entry (`ticket_log.json`), appended once per Open to Closed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub user_id: Option<u64>,
    pub ticket_type: Option<String>,
    #[serde(with = "timestamp::option", default)]
    pub opened_at: Option<DateTime<Utc>>,
    pub channel_id: u64,
    #[serde(with = "timestamp")]
    pub closed_at: DateTime<Utc>,
    pub closed_by: ClosedBy,
}

impl From<&ClosedTicket> for LogRecord {
    fn from(closed: &ClosedTicket) -> Self {
        Self {
            user_id: closed.ticket.owner.map(|u| u.0),
            ticket_type: closed.ticket.ticket_type.clone(),
            opened_at: Some(closed.ticket.opened_at),
            channel_id: closed.ticket.channel_id.0,
            closed_at: closed.closed_at,
            closed_by: closed.closed_by,
        }
    }
}

/// Per guild settings (`guild_config.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_channel_id: Option<u64>,
    /// Handler roles per ticket type.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<u64>>,
}

impl GuildConfig {
    pub fn handler_roles(&self, ticket_type: &str) -> Vec<RoleId> {
        self.roles
            .get(ticket_type)
            .map(|ids| ids.iter().copied().map(RoleId).collect())
            .unwrap_or_default()
    }
    pub fn category(&self) -> Option<ChannelId> {
        self.category_id.map(ChannelId)
    }
    pub fn log_channel(&self) -> Option<ChannelId> {
        self.log_channel_id.map(ChannelId)
    }
}
