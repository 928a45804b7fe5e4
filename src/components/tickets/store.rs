//! Persisted ticket data.
//!
//! One JSON file per store, each behind its own lock. The file names and shapes are
//! shared with the previous deployment of the bot, so existing data loads as is.

use std::{collections::BTreeMap, path::Path};

use serenity::model::id::{ChannelId, GuildId, UserId};

use super::model::{ClosedRecord, GuildConfig, LogRecord, OpenRecord, PanelConfig};
use crate::components::utils::data::{Data, Error};

/// `{ guildId: panel }`
pub type PanelStore = BTreeMap<u64, PanelConfig>;
/// `{ guildId: [userId] }`
pub type BanList = BTreeMap<u64, Vec<u64>>;
/// `[channelId]`
pub type ActiveIndex = Vec<u64>;
/// `{ channelId: { guild_id, user_id, ticket_type, opened_at } }`
pub type OpenIndex = BTreeMap<u64, OpenRecord>;
/// `{ channelId: { user_id, closed_by } }`
pub type ClosedIndex = BTreeMap<u64, ClosedRecord>;
/// `[record]`, append only.
pub type TicketLog = Vec<LogRecord>;
/// `{ guildId: config }`
pub type GuildConfigs = BTreeMap<u64, GuildConfig>;

pub const PANELS_FILE: &str = "ticket_buttons.json";
pub const BANS_FILE: &str = "ticket_bans.json";
pub const ACTIVE_FILE: &str = "ticket_active.json";
pub const OPEN_FILE: &str = "ticket_open.json";
pub const CLOSED_FILE: &str = "ticket_closed.json";
pub const LOG_FILE: &str = "ticket_log.json";
pub const GUILDS_FILE: &str = "guild_config.json";

#[derive(Debug)]
pub struct Stores {
    pub panels: Data<PanelStore>,
    pub bans: Data<BanList>,
    pub active: Data<ActiveIndex>,
    pub open: Data<OpenIndex>,
    pub closed: Data<ClosedIndex>,
    pub log: Data<TicketLog>,
    pub guilds: Data<GuildConfigs>,
}

impl Stores {
    /// Load every store from `dir`. Missing files start empty.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        let dir = dir.as_ref();
        Ok(Self {
            panels: Data::from_file_or_default(dir.join(PANELS_FILE))?,
            bans: Data::from_file_or_default(dir.join(BANS_FILE))?,
            active: Data::from_file_or_default(dir.join(ACTIVE_FILE))?,
            open: Data::from_file_or_default(dir.join(OPEN_FILE))?,
            closed: Data::from_file_or_default(dir.join(CLOSED_FILE))?,
            log: Data::from_file_or_default(dir.join(LOG_FILE))?,
            guilds: Data::from_file_or_default(dir.join(GUILDS_FILE))?,
        })
    }

    pub async fn is_banned(&self, guild: GuildId, user: UserId) -> bool {
        self.bans.read(|bans| bans.get(&guild.0).map_or(false, |users| users.contains(&user.0))).await
    }
    pub async fn panel(&self, guild: GuildId) -> Option<PanelConfig> {
        self.panels.read(|panels| panels.get(&guild.0).cloned()).await
    }
    pub async fn purge_panel(&self, guild: GuildId) -> Result<Option<PanelConfig>, Error> {
        self.panels.update(|panels| panels.remove(&guild.0)).await
    }
    pub async fn guild_config(&self, guild: GuildId) -> GuildConfig {
        self.guilds.read(|guilds| guilds.get(&guild.0).cloned().unwrap_or_default()).await
    }
    pub async fn closed_record(&self, channel: ChannelId) -> Option<ClosedRecord> {
        self.closed.read(|closed| closed.get(&channel.0).cloned()).await
    }
    pub async fn is_active(&self, channel: ChannelId) -> bool {
        self.active.read(|active| active.contains(&channel.0)).await
    }
}
