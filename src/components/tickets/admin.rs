//! Administrator operations over the panel, the ban list and the guild configuration.
//!
//! Authorization is checked by the caller (the slash commands are restricted to
//! administrators). Every operation that changes the panel checks first that the
//! panel message still exists and purges a stale configuration otherwise.

use std::sync::Arc;

use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId, UserId};

use super::affordance;
use super::error::{Result, TicketError};
use super::lifecycle::Lifecycle;
use super::model::{ButtonDef, ButtonStyle, PanelConfig, PanelEmbed};
use crate::log_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Add,
    Remove,
    Edit,
}

impl ButtonAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim().to_lowercase().as_str() {
            "add" => Some(ButtonAction::Add),
            "remove" => Some(ButtonAction::Remove),
            "edit" => Some(ButtonAction::Edit),
            _ => None,
        }
    }
}

pub struct TicketAdmin {
    lifecycle: Arc<Lifecycle>,
}

impl TicketAdmin {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Post the panel in `channel`. The buttons and embed of a previous panel are kept.
    pub async fn send_panel(&self, guild: GuildId, channel: ChannelId) -> Result<MessageId> {
        let previous = self.lifecycle.stores().panel(guild).await;
        let (buttons, embed) = previous
            .map(|p| (p.buttons, p.embed))
            .unwrap_or_default();
        let message = self.lifecycle.platform()
            .send_panel(channel, &embed.clone().unwrap_or_default(), &buttons)
            .await?;
        let panel = PanelConfig { message_id: message.0, channel_id: channel.0, buttons, embed };
        self.lifecycle.stores().panels.update(|p| p.insert(guild.0, panel)).await?;
        log_info!("Ticket panel of guild {} sent in {}", guild.0, channel.0);
        Ok(message)
    }

    /// Add, replace or remove a panel button. Returns the new button list.
    pub async fn edit_button(&self, guild: GuildId, action: ButtonAction, label: &str, style: &str, custom_id: &str) -> Result<Vec<ButtonDef>> {
        let custom_id = custom_id.trim();
        if custom_id.is_empty() {
            return Err(TicketError::InvalidArgument("The button id cannot be empty.".to_string()));
        }
        if affordance::is_reserved(custom_id) {
            return Err(TicketError::InvalidArgument(format!("`{}` is reserved for the ticket buttons.", custom_id)));
        }
        let mut panel = self.lifecycle.live_panel(guild).await?;
        let position = panel.buttons.iter().position(|b| b.custom_id == custom_id);
        let button = ButtonDef {
            label: label.to_string(),
            style: ButtonStyle::from_name(style),
            custom_id: custom_id.to_string(),
        };
        match (action, position) {
            (ButtonAction::Remove, Some(i)) => {
                panel.buttons.remove(i);
            }
            (ButtonAction::Remove, None) => return Err(unknown_button(custom_id)),
            (_, Some(i)) => panel.buttons[i] = button,
            (_, None) => panel.buttons.push(button),
        }
        self.save_panel(guild, panel).await.map(|p| p.buttons)
    }

    /// Move a button. The position is clamped to the list bounds; the final position
    /// is returned.
    pub async fn reorder_button(&self, guild: GuildId, custom_id: &str, position: i64) -> Result<usize> {
        let mut panel = self.lifecycle.live_panel(guild).await?;
        let current = panel.buttons.iter()
            .position(|b| b.custom_id == custom_id)
            .ok_or_else(|| unknown_button(custom_id))?;
        let button = panel.buttons.remove(current);
        let position = position.clamp(0, panel.buttons.len() as i64) as usize;
        panel.buttons.insert(position, button);
        self.save_panel(guild, panel).await?;
        Ok(position)
    }

    /// Forget the panel of the guild. The message itself is left as is.
    pub async fn reset_panel(&self, guild: GuildId) -> Result<()> {
        match self.lifecycle.stores().purge_panel(guild).await? {
            Some(_) => {
                log_info!("Ticket panel of guild {} reset", guild.0);
                Ok(())
            }
            None => Err(TicketError::PanelNotFound),
        }
    }

    /// Panel buttons with the handler roles of their ticket type.
    pub async fn list_buttons(&self, guild: GuildId) -> Result<Vec<(ButtonDef, Vec<RoleId>)>> {
        let buttons = self.lifecycle.stores().panel(guild).await
            .map(|p| p.buttons)
            .unwrap_or_default();
        if buttons.is_empty() {
            return Err(TicketError::NotFound("No ticket button is configured on this server.".to_string()));
        }
        let config = self.lifecycle.stores().guild_config(guild).await;
        Ok(buttons.into_iter()
            .map(|b| {
                let roles = config.handler_roles(&b.custom_id);
                (b, roles)
            })
            .collect())
    }

    /// Replace the panel embed. A literal `\n` in the description is a line break.
    pub async fn edit_embed(&self, guild: GuildId, title: &str, description: &str, footer: &str) -> Result<PanelEmbed> {
        let mut panel = self.lifecycle.live_panel(guild).await?;
        let embed = PanelEmbed {
            title: title.to_string(),
            description: description.replace("\\n", "\n"),
            footer: footer.to_string(),
        };
        panel.embed = Some(embed.clone());
        self.save_panel(guild, panel).await?;
        Ok(embed)
    }

    /// Returns `false` when the user was already banned.
    pub async fn ban(&self, guild: GuildId, user: UserId) -> Result<bool> {
        let added = self.lifecycle.stores().bans.update(|bans| {
            let users = bans.entry(guild.0).or_default();
            if users.contains(&user.0) {
                false
            } else {
                users.push(user.0);
                true
            }
        }).await?;
        if added {
            log_info!("User {} banned from the tickets of guild {}", user.0, guild.0);
        }
        Ok(added)
    }

    /// Returns `false` when the user was not banned.
    pub async fn unban(&self, guild: GuildId, user: UserId) -> Result<bool> {
        let stores = self.lifecycle.stores();
        if !stores.is_banned(guild, user).await {
            return Ok(false);
        }
        let removed = stores.bans.update(|bans| match bans.get_mut(&guild.0) {
            Some(users) => {
                let before = users.len();
                users.retain(|u| *u != user.0);
                before != users.len()
            }
            None => false,
        }).await?;
        if removed {
            log_info!("User {} unbanned from the tickets of guild {}", user.0, guild.0);
        }
        Ok(removed)
    }

    pub async fn is_banned(&self, guild: GuildId, user: UserId) -> bool {
        self.lifecycle.stores().is_banned(guild, user).await
    }

    pub async fn set_category(&self, guild: GuildId, category: ChannelId) -> Result<()> {
        match self.lifecycle.platform().channel(category).await? {
            Some(info) if info.is_category && info.guild_id == guild => (),
            _ => return Err(TicketError::InvalidArgument(format!("<#{}> is not a category of this server.", category.0))),
        }
        self.lifecycle.stores().guilds
            .update(|g| g.entry(guild.0).or_default().category_id = Some(category.0))
            .await?;
        log_info!("Ticket category of guild {} set to {}", guild.0, category.0);
        Ok(())
    }

    pub async fn set_log_channel(&self, guild: GuildId, channel: ChannelId) -> Result<()> {
        match self.lifecycle.platform().channel(channel).await? {
            Some(info) if !info.is_category && info.guild_id == guild => (),
            _ => return Err(TicketError::InvalidArgument(format!("<#{}> is not a text channel of this server.", channel.0))),
        }
        self.lifecycle.stores().guilds
            .update(|g| g.entry(guild.0).or_default().log_channel_id = Some(channel.0))
            .await?;
        log_info!("Ticket log channel of guild {} set to {}", guild.0, channel.0);
        Ok(())
    }

    /// Returns `false` when the role already handled this type.
    pub async fn add_role(&self, guild: GuildId, ticket_type: &str, role: RoleId) -> Result<bool> {
        let ticket_type = ticket_type.trim().to_string();
        let added = self.lifecycle.stores().guilds.update(|g| {
            let roles = g.entry(guild.0).or_default().roles.entry(ticket_type).or_default();
            if roles.contains(&role.0) {
                false
            } else {
                roles.push(role.0);
                true
            }
        }).await?;
        Ok(added)
    }

    /// Returns `false` when the role did not handle this type.
    pub async fn remove_role(&self, guild: GuildId, ticket_type: &str, role: RoleId) -> Result<bool> {
        let ticket_type = ticket_type.trim();
        if !self.list_roles(guild, ticket_type).await.contains(&role) {
            return Ok(false);
        }
        let removed = self.lifecycle.stores().guilds.update(|g| {
            let config = match g.get_mut(&guild.0) {
                Some(config) => config,
                None => return false,
            };
            let removed = match config.roles.get_mut(ticket_type) {
                Some(roles) => {
                    let before = roles.len();
                    roles.retain(|r| *r != role.0);
                    before != roles.len()
                }
                None => false,
            };
            if config.roles.get(ticket_type).map_or(false, Vec::is_empty) {
                config.roles.remove(ticket_type);
            }
            removed
        }).await?;
        Ok(removed)
    }

    pub async fn list_roles(&self, guild: GuildId, ticket_type: &str) -> Vec<RoleId> {
        self.lifecycle.stores().guild_config(guild).await.handler_roles(ticket_type.trim())
    }

    /// Store the panel then render it. The stored value wins if the render fails.
    async fn save_panel(&self, guild: GuildId, panel: PanelConfig) -> Result<PanelConfig> {
        let stored = panel.clone();
        self.lifecycle.stores().panels.update(|p| p.insert(guild.0, stored)).await?;
        let embed = panel.embed_or_default();
        self.lifecycle.platform()
            .render_panel(panel.channel(), panel.message(), &embed, &panel.buttons)
            .await?;
        Ok(panel)
    }
}

fn unknown_button(custom_id: &str) -> TicketError {
    TicketError::NotFound(format!("No panel button has the id `{}`.", custom_id))
}
