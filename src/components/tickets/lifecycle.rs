//! Ticket lifecycle state machine.
//!
//! ```text
//!  (none) --create--> Open --close--> Closed --delete--> Deleted
//!                                      |
//!                                      +--reopen--> (unlocked, out of the indices)
//! ```
//!
//! Every request goes through [`Lifecycle::apply`], which resolves the current state
//! of the channel and rejects illegal (state, transition) pairs before doing any work.
//! A reopened ticket stays out of the registry and of both indices: its owner can
//! talk again in the channel but it no longer counts as open.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};

use super::archive::Transcript;
use super::error::{Result, TicketError};
use super::model::{ClosedBy, ClosedRecord, ClosedTicket, GuildConfig, LogRecord, OpenRecord, PanelConfig, Ticket, TicketState};
use super::platform::{ChannelRequest, ClosedNotice, Platform};
use super::registry::{AlreadyOpen, Registry};
use super::store::Stores;
use crate::components::utils::data;
use crate::{log_error, log_info, log_warn};

/// Member requesting a transition, with what is needed to authorize it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub name: String,
    pub is_admin: bool,
    pub roles: Vec<RoleId>,
}

impl Actor {
    fn is_handler(&self, config: &GuildConfig, ticket_type: Option<&str>) -> bool {
        ticket_type
            .map(|t| config.handler_roles(t))
            .map_or(false, |roles| roles.iter().any(|r| self.roles.contains(r)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closer {
    Member(Actor),
    /// The expiry sweep. Skips authorization.
    AutoExpire,
}

impl Closer {
    fn closed_by(&self) -> ClosedBy {
        match self {
            Closer::Member(actor) => ClosedBy::User(actor.user_id),
            Closer::AutoExpire => ClosedBy::AutoExpire,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Create { requester: Actor, ticket_type: String },
    Close { channel: ChannelId, closer: Closer },
    Delete { channel: ChannelId, actor: Actor },
    Reopen { channel: ChannelId, actor: Actor },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Create,
    Close,
    Delete,
    Reopen,
}

impl TransitionKind {
    pub fn past_participle(self) -> &'static str {
        match self {
            TransitionKind::Create => "created",
            TransitionKind::Close => "closed",
            TransitionKind::Delete => "deleted",
            TransitionKind::Reopen => "reopened",
        }
    }
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Transition::Create { .. } => TransitionKind::Create,
            Transition::Close { .. } => TransitionKind::Close,
            Transition::Delete { .. } => TransitionKind::Delete,
            Transition::Reopen { .. } => TransitionKind::Reopen,
        }
    }
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Transition::Create { .. } => None,
            Transition::Close { channel, .. }
            | Transition::Delete { channel, .. }
            | Transition::Reopen { channel, .. } => Some(*channel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(Ticket),
    Closed(ClosedTicket),
    Deleted { channel: ChannelId, transcript_delivered: bool },
    Reopened { channel: ChannelId, owner: Option<UserId> },
}

/// Legal transitions. `state` is `None` for a creation, which has no channel yet.
pub fn check(state: Option<TicketState>, kind: TransitionKind) -> Result<()> {
    use TicketState::*;
    match (state, kind) {
        (None, TransitionKind::Create)
        | (Some(Open), TransitionKind::Close)
        | (Some(Closed), TransitionKind::Delete | TransitionKind::Reopen) => Ok(()),
        (Some(Closed), TransitionKind::Close) => Err(TicketError::NotFound("This ticket is already closed.".to_string())),
        (Some(Deleted), _) | (None, _) => Err(TicketError::NotFound("This ticket no longer exists.".to_string())),
        (Some(state), transition) => Err(TicketError::IllegalTransition { state, transition }),
    }
}

lazy_static! {
    static ref BLANKS: Regex = Regex::new(r"\s+").unwrap();
    static ref INVALID: Regex = Regex::new(r"[^\p{L}\p{N}_-]").unwrap();
}

/// Channel name of a ticket opened by `username`.
pub fn channel_name(username: &str) -> String {
    let name = format!("ticket-{}", username.trim()).to_lowercase();
    let name = BLANKS.replace_all(&name, "-");
    INVALID.replace_all(&name, "").chars().take(100).collect()
}

pub struct Lifecycle {
    registry: Arc<Registry>,
    stores: Arc<Stores>,
    platform: Arc<dyn Platform>,
}

impl Lifecycle {
    pub fn new(registry: Arc<Registry>, stores: Arc<Stores>, platform: Arc<dyn Platform>) -> Self {
        Self { registry, stores, platform }
    }
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub async fn state_of(&self, channel: ChannelId) -> TicketState {
        if self.registry.lookup(channel).is_some() {
            TicketState::Open
        } else if self.stores.closed_record(channel).await.is_some() {
            TicketState::Closed
        } else {
            TicketState::Deleted
        }
    }

    pub async fn apply(&self, guild: GuildId, transition: Transition) -> Result<Outcome> {
        self.apply_at(guild, transition, Utc::now()).await
    }

    /// [`apply`](Self::apply) with an explicit clock, used by the expiry sweep.
    pub async fn apply_at(&self, guild: GuildId, transition: Transition, now: DateTime<Utc>) -> Result<Outcome> {
        let state = match transition.channel() {
            Some(channel) => Some(self.state_of(channel).await),
            None => None,
        };
        check(state, transition.kind())?;
        match transition {
            Transition::Create { requester, ticket_type } => {
                self.create(guild, &requester, &ticket_type, now).await.map(Outcome::Created)
            }
            Transition::Close { channel, closer } => {
                self.close(guild, channel, &closer, now).await.map(Outcome::Closed)
            }
            Transition::Delete { channel, actor } => self.delete(guild, channel, &actor).await,
            Transition::Reopen { channel, actor } => self.reopen(channel, &actor).await,
        }
    }

    /// Panel of the guild, purged from the store when its message was deleted.
    pub async fn live_panel(&self, guild: GuildId) -> Result<PanelConfig> {
        let panel = self.stores.panel(guild).await.ok_or(TicketError::PanelNotFound)?;
        let exists = match self.platform.channel(panel.channel()).await? {
            Some(_) => self.platform.panel_exists(panel.channel(), panel.message()).await?,
            None => false,
        };
        if !exists {
            log_warn!("Panel of guild {} was deleted, purging its configuration", guild.0);
            self.stores.purge_panel(guild).await?;
            return Err(TicketError::PanelNotFound);
        }
        Ok(panel)
    }

    async fn create(&self, guild: GuildId, requester: &Actor, ticket_type: &str, now: DateTime<Utc>) -> Result<Ticket> {
        if self.stores.is_banned(guild, requester.user_id).await {
            return Err(TicketError::Banned);
        }
        let duplicate = |e: AlreadyOpen| TicketError::DuplicateOpenTicket { existing: e.existing };
        let handle = match self.registry.try_open(guild, requester.user_id, ticket_type) {
            Ok(handle) => handle,
            Err(e) => {
                // A ticket whose channel was deleted by hand no longer blocks its owner.
                let existing = match e.existing {
                    Some(existing) => existing,
                    None => return Err(duplicate(e)),
                };
                if !matches!(self.platform.channel(existing).await, Ok(None)) {
                    return Err(duplicate(e));
                }
                self.forget_vanished(existing).await?;
                self.registry.try_open(guild, requester.user_id, ticket_type).map_err(duplicate)?
            }
        };

        let panel = self.live_panel(guild).await?;
        let button = panel.button(ticket_type)
            .cloned()
            .ok_or_else(|| TicketError::UnknownTicketType(ticket_type.to_string()))?;
        let config = self.stores.guild_config(guild).await;
        let category = config.category().ok_or(TicketError::NoCategoryConfigured)?;
        match self.platform.channel(category).await? {
            Some(info) if info.is_category => (),
            _ => return Err(TicketError::NoCategoryConfigured),
        }
        let roles = config.handler_roles(ticket_type);
        let request = ChannelRequest {
            guild_id: guild,
            category,
            name: channel_name(&requester.name),
            topic: format!("Ticket by {} - {}", requester.name, button.label),
            owner: requester.user_id,
            roles: roles.clone(),
        };
        let channel = self.platform.create_ticket_channel(&request).await?;
        let ticket = handle.commit(channel, now);

        if let Err(e) = self.persist_open(&ticket).await {
            log_error!("Unable to persist ticket {}: {}", channel.0, e);
            self.registry.discard(channel);
            if let Err(e) = self.platform.delete_channel(channel).await {
                log_error!("Ticket channel {} is orphaned: {}", channel.0, e);
            }
            return Err(e);
        }
        if let Err(e) = self.platform.post_open_affordance(&ticket, &button.label, &roles).await {
            log_warn!("Unable to post the welcome message of ticket {}: {}", channel.0, e);
        }
        log_info!("Ticket {} ({}) opened by {} in guild {}", channel.0, ticket_type, requester.user_id.0, guild.0);
        Ok(ticket)
    }

    /// The sidecar goes first: the active index is what recovery reads.
    async fn persist_open(&self, ticket: &Ticket) -> Result<()> {
        let id = ticket.channel_id.0;
        self.stores.open.update(|open| open.insert(id, OpenRecord::from(ticket))).await?;
        let added = self.stores.active.update(|active| {
            if !active.contains(&id) {
                active.push(id);
            }
        }).await;
        if let Err(e) = added {
            if let Err(e) = self.stores.open.update(|open| open.remove(&id)).await {
                log_warn!("Unable to drop the metadata of ticket {}: {}", id, e);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Drop an open ticket whose channel no longer exists.
    async fn forget_vanished(&self, channel: ChannelId) -> Result<()> {
        log_warn!("Channel of open ticket {} was deleted, forgetting the ticket", channel.0);
        let id = channel.0;
        if self.stores.active.read(|a| a.contains(&id)).await {
            self.stores.active.update(|a| a.retain(|c| *c != id)).await?;
        }
        if self.stores.open.read(|o| o.contains_key(&id)).await {
            self.stores.open.update(|o| o.remove(&id)).await?;
        }
        self.registry.discard(channel);
        Ok(())
    }

    async fn close(&self, guild: GuildId, channel: ChannelId, closer: &Closer, now: DateTime<Utc>) -> Result<ClosedTicket> {
        let ticket = self.registry.lookup(channel).ok_or_else(|| TicketError::not_found_channel(channel))?;
        if let Closer::Member(actor) = closer {
            let config = self.stores.guild_config(guild).await;
            if !actor.is_admin && !actor.is_handler(&config, ticket.ticket_type.as_deref()) {
                return Err(TicketError::Unauthorized("Only administrators or handlers can close a ticket."));
            }
        }
        let closed = self.registry
            .close(channel, closer.closed_by(), now)
            .map_err(|_| TicketError::not_found_channel(channel))?;
        if let Err(e) = self.persist_close(&closed).await {
            log_error!("Unable to persist the closure of ticket {}: {}", channel.0, e);
            self.registry.restore(closed.ticket);
            return Err(e);
        }

        let members = closed.ticket.owner.into_iter().collect::<Vec<_>>();
        if let Err(e) = self.platform.lock_channel(guild, channel, &members).await {
            log_warn!("Unable to lock ticket {}: {}", channel.0, e);
        }
        let notice = ClosedNotice { channel, closed_by: closed.closed_by, timestamp: now.timestamp() };
        if let Err(e) = self.platform.post_closed_affordance(&notice).await {
            log_warn!("Unable to post the closed notice of ticket {}: {}", channel.0, e);
        }
        log_info!("Ticket {} closed by {}", channel.0, closed.closed_by);
        Ok(closed)
    }

    /// Move the ticket from the active to the closed index and log it. On failure the
    /// writes already done are undone, so the channel stays in the active index only.
    async fn persist_close(&self, closed: &ClosedTicket) -> Result<()> {
        let id = closed.ticket.channel_id.0;
        let record = ClosedRecord {
            user_id: closed.ticket.owner.map(|u| u.0),
            closed_by: closed.closed_by,
            ticket_type: closed.ticket.ticket_type.clone(),
        };
        self.stores.closed.update(|c| c.insert(id, record)).await?;
        let moved: std::result::Result<(), data::Error> = async {
            self.stores.active.update(|a| a.retain(|c| *c != id)).await?;
            self.stores.open.update(|o| o.remove(&id)).await?;
            self.stores.log.update(|l| l.push(LogRecord::from(closed))).await
        }.await;
        if let Err(e) = moved {
            self.revert_close(&closed.ticket).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn revert_close(&self, ticket: &Ticket) {
        let id = ticket.channel_id.0;
        if !self.stores.active.read(|a| a.contains(&id)).await {
            if let Err(e) = self.stores.active.update(|a| a.push(id)).await {
                log_error!("Unable to put ticket {} back in the active index: {}", id, e);
            }
        }
        if !self.stores.open.read(|o| o.contains_key(&id)).await {
            if let Err(e) = self.stores.open.update(|o| o.insert(id, OpenRecord::from(ticket))).await {
                log_warn!("Unable to put back the metadata of ticket {}: {}", id, e);
            }
        }
        if let Err(e) = self.stores.closed.update(|c| c.remove(&id)).await {
            log_error!("Unable to take ticket {} out of the closed index: {}", id, e);
        }
    }

    async fn delete(&self, guild: GuildId, channel: ChannelId, actor: &Actor) -> Result<Outcome> {
        let record = self.stores.closed_record(channel).await.ok_or_else(|| TicketError::not_found_channel(channel))?;
        let config = self.stores.guild_config(guild).await;
        let is_owner = record.owner() == Some(actor.user_id);
        if !actor.is_admin && !is_owner && !actor.is_handler(&config, record.ticket_type.as_deref()) {
            return Err(TicketError::Unauthorized("Only administrators, handlers or the ticket owner can delete a ticket."));
        }

        let info = self.platform.channel(channel).await?;
        // Leaving the closed index claims the ticket: a concurrent delete gets NotFound.
        let removed = self.stores.closed.update(|c| c.remove(&channel.0)).await?;
        if removed.is_none() {
            return Err(TicketError::not_found_channel(channel));
        }

        let mut transcript_delivered = false;
        if let (Some(info), Some(log_channel)) = (&info, config.log_channel()) {
            match self.platform.history(channel).await {
                Ok(history) => {
                    let transcript = Transcript::build(&info.name, &history);
                    match self.platform.send_transcript(log_channel, &transcript, actor.user_id).await {
                        Ok(()) => transcript_delivered = true,
                        Err(e) => log_warn!("Unable to deliver the transcript of ticket {}: {}", channel.0, e),
                    }
                }
                Err(e) => log_warn!("Unable to read the history of ticket {}: {}", channel.0, e),
            }
        }

        if info.is_some() {
            self.platform.delete_channel(channel).await?;
        }
        log_info!("Ticket {} deleted by {}", channel.0, actor.user_id.0);
        Ok(Outcome::Deleted { channel, transcript_delivered })
    }

    async fn reopen(&self, channel: ChannelId, actor: &Actor) -> Result<Outcome> {
        let record = self.stores.closed_record(channel).await.ok_or_else(|| TicketError::not_found_channel(channel))?;
        let owner = record.owner();
        if !actor.is_admin && owner != Some(actor.user_id) {
            return Err(TicketError::Unauthorized("Only administrators or the ticket owner can reopen a ticket."));
        }
        if let Some(owner) = owner {
            self.platform.grant_member(channel, owner).await?;
            let text = format!("<@{}> The ticket was reopened by <@{}>.", owner.0, actor.user_id.0);
            if let Err(e) = self.platform.send_text(channel, &text).await {
                log_warn!("Unable to announce the reopening of ticket {}: {}", channel.0, e);
            }
        }
        let removed = self.stores.closed.update(|c| c.remove(&channel.0)).await?;
        if removed.is_none() {
            return Err(TicketError::not_found_channel(channel));
        }
        log_info!("Ticket {} reopened by {}", channel.0, actor.user_id.0);
        Ok(Outcome::Reopened { channel, owner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use TicketState::*;
        assert!(check(None, TransitionKind::Create).is_ok());
        assert!(check(Some(Open), TransitionKind::Close).is_ok());
        assert!(check(Some(Closed), TransitionKind::Delete).is_ok());
        assert!(check(Some(Closed), TransitionKind::Reopen).is_ok());

        assert!(matches!(check(Some(Closed), TransitionKind::Close), Err(TicketError::NotFound(_))));
        for kind in [TransitionKind::Close, TransitionKind::Delete, TransitionKind::Reopen] {
            assert!(matches!(check(Some(Deleted), kind), Err(TicketError::NotFound(_))));
        }
        assert!(matches!(
            check(Some(Open), TransitionKind::Reopen),
            Err(TicketError::IllegalTransition { state: Open, transition: TransitionKind::Reopen })
        ));
        assert!(matches!(check(Some(Open), TransitionKind::Delete), Err(TicketError::IllegalTransition { .. })));
        assert!(matches!(check(Some(Open), TransitionKind::Create), Err(TicketError::IllegalTransition { .. })));
    }

    #[test]
    fn channel_names() {
        assert_eq!(channel_name("Alice Smith"), "ticket-alice-smith");
        assert_eq!(channel_name("bob!!#42"), "ticket-bob42");
        assert_eq!(channel_name("Zoë"), "ticket-zoë");
        assert!(channel_name(&"x".repeat(300)).chars().count() <= 100);
    }

    #[test]
    fn illegal_transition_message() {
        let err = TicketError::IllegalTransition { state: TicketState::Open, transition: TransitionKind::Reopen };
        assert_eq!(err.to_string(), "This ticket is open and cannot be reopened.");
    }
}
