//! Transcript of a ticket channel, captured before the channel is deleted.

use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

/// One message of the channel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub author_id: UserId,
    pub content: String,
    pub attachments: Vec<String>,
}

impl HistoryEntry {
    fn line(&self) -> String {
        let mut line = format!(
            "{} {} (<@{}>): {}",
            self.timestamp.format("[%Y-%m-%d %H:%M]"),
            self.author,
            self.author_id.0,
            self.content
        );
        for url in &self.attachments {
            line.push(' ');
            line.push_str(url);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub channel_name: String,
    pub content: String,
}

impl Transcript {
    /// Build the transcript from the history, which must be oldest first.
    pub fn build(channel_name: &str, history: &[HistoryEntry]) -> Self {
        let content = if history.is_empty() {
            "No messages.".to_string()
        } else {
            history.iter().map(HistoryEntry::line).collect::<Vec<_>>().join("\n")
        };
        Self { channel_name: channel_name.to_string(), content }
    }
    pub fn filename(&self) -> String {
        format!("transcript-{}.txt", self.channel_name)
    }
}
