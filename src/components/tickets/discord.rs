//! [`Platform`] implementation over the Discord HTTP API.

use std::{borrow::Cow, sync::Arc};

use futures::StreamExt;
use serenity::{
    async_trait,
    builder::{CreateComponents, CreateEmbed},
    http::{Http, HttpError},
    model::{
        application::component::ButtonStyle as DiscordButtonStyle,
        channel::{AttachmentType, Channel, ChannelType, PermissionOverwrite, PermissionOverwriteType},
        id::{ChannelId, GuildId, MessageId, RoleId, UserId},
        permissions::Permissions,
    },
};
use ticketbot_core::message::{COLOR_ERROR, COLOR_INFO, COLOR_SUCCESS};

use super::affordance::Affordance;
use super::archive::{HistoryEntry, Transcript};
use super::error::PlatformError;
use super::model::{ButtonDef, ButtonStyle, ClosedBy, PanelEmbed, Ticket};
use super::platform::{ChannelInfo, ChannelRequest, ClosedNotice, Platform, PlatformResult};
use crate::log_warn;

/// Buttons per action row, and action rows per message.
const ROW_WIDTH: usize = 5;
const MAX_ROWS: usize = 5;

fn is_not_found(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(e) => matches!(e.as_ref(), HttpError::UnsuccessfulRequest(r) if r.status_code.as_u16() == 404),
        _ => false,
    }
}

impl From<serenity::Error> for PlatformError {
    fn from(error: serenity::Error) -> Self {
        if is_not_found(&error) {
            PlatformError::not_found(error)
        } else {
            PlatformError::new(error)
        }
    }
}

fn member_access() -> Permissions {
    Permissions::VIEW_CHANNEL
        | Permissions::SEND_MESSAGES
        | Permissions::READ_MESSAGE_HISTORY
        | Permissions::ATTACH_FILES
        | Permissions::EMBED_LINKS
}

fn button_style(style: ButtonStyle) -> DiscordButtonStyle {
    match style {
        ButtonStyle::Primary => DiscordButtonStyle::Primary,
        ButtonStyle::Secondary => DiscordButtonStyle::Secondary,
        ButtonStyle::Success => DiscordButtonStyle::Success,
        ButtonStyle::Danger => DiscordButtonStyle::Danger,
    }
}

fn panel_embed<'a>(e: &'a mut CreateEmbed, embed: &PanelEmbed) -> &'a mut CreateEmbed {
    e.title(&embed.title)
        .description(&embed.description)
        .footer(|f| f.text(&embed.footer))
        .color(COLOR_INFO)
}

fn panel_rows<'a>(components: &'a mut CreateComponents, buttons: &[ButtonDef]) -> &'a mut CreateComponents {
    if buttons.len() > ROW_WIDTH * MAX_ROWS {
        log_warn!("Panel has {} buttons, only the first {} are shown", buttons.len(), ROW_WIDTH * MAX_ROWS);
    }
    for row in buttons.chunks(ROW_WIDTH).take(MAX_ROWS) {
        components.create_action_row(|r| {
            for button in row {
                r.create_button(|b| {
                    b.label(&button.label)
                        .style(button_style(button.style))
                        .custom_id(&button.custom_id)
                });
            }
            r
        });
    }
    components
}

pub struct SerenityPlatform {
    http: Arc<Http>,
    /// The bot itself, kept visible in the ticket channels.
    bot_id: UserId,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, bot_id: UserId) -> Self {
        Self { http, bot_id }
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn channel(&self, channel: ChannelId) -> PlatformResult<Option<ChannelInfo>> {
        match channel.to_channel(&self.http).await {
            Ok(Channel::Guild(c)) => Ok(Some(ChannelInfo {
                guild_id: c.guild_id,
                is_category: c.kind == ChannelType::Category,
                name: c.name,
            })),
            Ok(Channel::Category(c)) => Ok(Some(ChannelInfo { guild_id: c.guild_id, name: c.name, is_category: true })),
            Ok(_) => Ok(None),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_ticket_channel(&self, request: &ChannelRequest) -> PlatformResult<ChannelId> {
        let mut permissions = vec![
            PermissionOverwrite {
                allow: Permissions::default(),
                deny: Permissions::VIEW_CHANNEL,
                kind: PermissionOverwriteType::Role(RoleId(request.guild_id.0)),
            },
            PermissionOverwrite {
                allow: member_access(),
                deny: Permissions::default(),
                kind: PermissionOverwriteType::Member(request.owner),
            },
            PermissionOverwrite {
                allow: member_access() | Permissions::MANAGE_CHANNELS,
                deny: Permissions::default(),
                kind: PermissionOverwriteType::Member(self.bot_id),
            },
        ];
        permissions.extend(request.roles.iter().map(|role| PermissionOverwrite {
            allow: member_access(),
            deny: Permissions::default(),
            kind: PermissionOverwriteType::Role(*role),
        }));
        let channel = request.guild_id.create_channel(&self.http, |c| {
            c.name(&request.name)
                .kind(ChannelType::Text)
                .category(request.category)
                .topic(&request.topic)
                .permissions(permissions)
        }).await?;
        Ok(channel.id)
    }

    async fn delete_channel(&self, channel: ChannelId) -> PlatformResult<()> {
        match channel.delete(&self.http).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn lock_channel(&self, guild: GuildId, channel: ChannelId, members: &[UserId]) -> PlatformResult<()> {
        channel.create_permission(&self.http, &PermissionOverwrite {
            allow: Permissions::default(),
            deny: Permissions::VIEW_CHANNEL,
            kind: PermissionOverwriteType::Role(RoleId(guild.0)),
        }).await?;
        for member in members {
            channel.create_permission(&self.http, &PermissionOverwrite {
                allow: Permissions::default(),
                deny: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
                kind: PermissionOverwriteType::Member(*member),
            }).await?;
        }
        Ok(())
    }

    async fn grant_member(&self, channel: ChannelId, member: UserId) -> PlatformResult<()> {
        channel.create_permission(&self.http, &PermissionOverwrite {
            allow: member_access(),
            deny: Permissions::default(),
            kind: PermissionOverwriteType::Member(member),
        }).await?;
        Ok(())
    }

    async fn send_text(&self, channel: ChannelId, content: &str) -> PlatformResult<()> {
        channel.say(&self.http, content).await?;
        Ok(())
    }

    async fn post_open_affordance(&self, ticket: &Ticket, type_label: &str, roles: &[RoleId]) -> PlatformResult<()> {
        let mut content = ticket.owner.map(|u| format!("Hey <@{}>, over here!", u.0)).unwrap_or_default();
        if !roles.is_empty() {
            let mentions = roles.iter().map(|r| format!("<@&{}>", r.0)).collect::<Vec<_>>().join(" ");
            content = format!("{} {}", content, mentions);
        }
        let close = Affordance::Close(ticket.channel_id).custom_id();
        let message = ticket.channel_id.send_message(&self.http, |m| {
            m.content(content.trim())
                .embed(|e| {
                    e.title(format!("Ticket: {}", type_label))
                        .description("Describe your request, the team will answer here.\nPress **Close ticket** once it is handled.")
                        .color(COLOR_INFO)
                })
                .components(|c| c.create_action_row(|r| {
                    r.create_button(|b| b.label("Close ticket").style(DiscordButtonStyle::Danger).custom_id(close))
                }))
        }).await?;
        if let Err(e) = message.pin(&self.http).await {
            log_warn!("Unable to pin the welcome message of ticket {}: {}", ticket.channel_id.0, e);
        }
        Ok(())
    }

    async fn post_closed_affordance(&self, notice: &ClosedNotice) -> PlatformResult<()> {
        let by = match notice.closed_by {
            ClosedBy::User(user) => format!("Closed by <@{}> <t:{}:F>.", user.0, notice.timestamp),
            ClosedBy::AutoExpire => format!("Closed automatically for inactivity <t:{}:F>.", notice.timestamp),
        };
        let delete = Affordance::Delete(notice.channel).custom_id();
        let reopen = Affordance::Reopen(notice.channel).custom_id();
        notice.channel.send_message(&self.http, |m| {
            m.embed(|e| e.title("Ticket closed").description(by).color(COLOR_ERROR))
                .components(|c| c.create_action_row(|r| {
                    r.create_button(|b| b.label("Delete ticket").style(DiscordButtonStyle::Danger).custom_id(delete))
                        .create_button(|b| b.label("Reopen ticket").style(DiscordButtonStyle::Success).custom_id(reopen))
                }))
        }).await?;
        Ok(())
    }

    async fn last_message_has_affordance(&self, channel: ChannelId) -> PlatformResult<bool> {
        let messages = channel.messages(&self.http, |r| r.limit(1)).await?;
        Ok(messages.first().map_or(false, |m| !m.components.is_empty()))
    }

    async fn history(&self, channel: ChannelId) -> PlatformResult<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        let mut messages = channel.messages_iter(&self.http).boxed();
        while let Some(message) = messages.next().await {
            let message = message?;
            entries.push(HistoryEntry {
                timestamp: chrono::DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_else(chrono::Utc::now),
                author: message.author.tag(),
                author_id: message.author.id,
                content: message.content,
                attachments: message.attachments.into_iter().map(|a| a.url).collect(),
            });
        }
        // Discord pages from the newest message.
        entries.reverse();
        Ok(entries)
    }

    async fn send_transcript(&self, log_channel: ChannelId, transcript: &Transcript, deleted_by: UserId) -> PlatformResult<()> {
        let file = AttachmentType::Bytes {
            data: Cow::Owned(transcript.content.clone().into_bytes()),
            filename: transcript.filename(),
        };
        log_channel.send_message(&self.http, |m| {
            m.embed(|e| {
                e.title("Ticket deleted")
                    .description(format!("`{}` was deleted by <@{}>.", transcript.channel_name, deleted_by.0))
                    .color(COLOR_SUCCESS)
            })
            .add_file(file)
        }).await?;
        Ok(())
    }

    async fn send_panel(&self, channel: ChannelId, embed: &PanelEmbed, buttons: &[ButtonDef]) -> PlatformResult<MessageId> {
        let message = channel.send_message(&self.http, |m| {
            m.embed(|e| panel_embed(e, embed))
                .components(|c| panel_rows(c, buttons))
        }).await?;
        Ok(message.id)
    }

    async fn panel_exists(&self, channel: ChannelId, message: MessageId) -> PlatformResult<bool> {
        match channel.message(&self.http, message).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn render_panel(&self, channel: ChannelId, message: MessageId, embed: &PanelEmbed, buttons: &[ButtonDef]) -> PlatformResult<()> {
        channel.edit_message(&self.http, message, |m| {
            m.embed(|e| panel_embed(e, embed))
                .components(|c| panel_rows(c, buttons))
        }).await?;
        Ok(())
    }

    async fn category_children(&self, guild: GuildId, category: ChannelId) -> PlatformResult<Vec<ChannelId>> {
        let channels = guild.channels(&self.http).await?;
        let mut children = channels.into_values()
            .filter(|c| c.parent_id == Some(category))
            .map(|c| c.id)
            .collect::<Vec<_>>();
        children.sort();
        Ok(children)
    }
}
