//! In-memory registry of the open tickets.
//!
//! The registry is the authority on which tickets are open while the process runs.
//! Every method takes the internal lock once and never awaits while holding it, so
//! the duplicate check and the reservation of [`Registry::try_open`] form a single
//! step that concurrent requests cannot interleave.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, UserId};

use super::model::{ClosedBy, ClosedTicket, Ticket};

/// An open ticket already exists, or is being created, for this owner and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyOpen {
    /// `None` while the other ticket is still being provisioned.
    pub existing: Option<ChannelId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound(pub ChannelId);

type Key = (GuildId, UserId, String);

#[derive(Debug, Default)]
struct Inner {
    open: HashMap<ChannelId, Ticket>,
    pending: HashSet<Key>,
}

impl Inner {
    fn find(&self, key: &Key) -> Option<ChannelId> {
        self.open.values()
            .find(|t| t.guild_id == key.0 && t.owner == Some(key.1) && t.ticket_type.as_deref() == Some(key.2.as_str()))
            .map(|t| t.channel_id)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

/// Reservation of an (owner, type) pair while its channel is provisioned.
///
/// [`commit`](Self::commit) registers the ticket. Dropping the handle without
/// committing releases the reservation.
#[derive(Debug)]
pub struct TicketHandle<'a> {
    registry: &'a Registry,
    key: Option<Key>,
}

impl<'a> TicketHandle<'a> {
    pub fn commit(mut self, channel_id: ChannelId, opened_at: DateTime<Utc>) -> Ticket {
        let (guild_id, owner, ticket_type) = match self.key.take() {
            Some(key) => key,
            None => unreachable!("ticket handle committed twice"),
        };
        let mut inner = self.registry.lock();
        inner.pending.remove(&(guild_id, owner, ticket_type.clone()));
        let ticket = Ticket {
            guild_id,
            channel_id,
            owner: Some(owner),
            ticket_type: Some(ticket_type),
            opened_at,
        };
        inner.open.insert(channel_id, ticket.clone());
        ticket
    }
}

impl<'a> Drop for TicketHandle<'a> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.registry.lock().pending.remove(&key);
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Reserve the (owner, type) pair, failing when it already has an open or
    /// in-flight ticket in this guild.
    pub fn try_open(&self, guild_id: GuildId, owner: UserId, ticket_type: &str) -> Result<TicketHandle<'_>, AlreadyOpen> {
        let key = (guild_id, owner, ticket_type.to_string());
        let mut inner = self.lock();
        if let Some(existing) = inner.find(&key) {
            return Err(AlreadyOpen { existing: Some(existing) });
        }
        if !inner.pending.insert(key.clone()) {
            return Err(AlreadyOpen { existing: None });
        }
        Ok(TicketHandle { registry: self, key: Some(key) })
    }
    /// Remove an open ticket and return its closing snapshot.
    pub fn close(&self, channel_id: ChannelId, closed_by: ClosedBy, closed_at: DateTime<Utc>) -> Result<ClosedTicket, NotFound> {
        let ticket = self.lock().open.remove(&channel_id).ok_or(NotFound(channel_id))?;
        Ok(ClosedTicket { ticket, closed_at, closed_by })
    }
    pub fn lookup(&self, channel_id: ChannelId) -> Option<Ticket> {
        self.lock().open.get(&channel_id).cloned()
    }
    /// Snapshot of every open ticket, oldest first.
    pub fn list_open(&self) -> Vec<Ticket> {
        let mut tickets = self.lock().open.values().cloned().collect::<Vec<_>>();
        tickets.sort_by_key(|t| (t.opened_at, t.channel_id));
        tickets
    }
    /// Put back a ticket read from the persisted indices. Returns `false` when the
    /// channel was already registered.
    pub fn restore(&self, ticket: Ticket) -> bool {
        let mut inner = self.lock();
        if inner.open.contains_key(&ticket.channel_id) {
            return false;
        }
        inner.open.insert(ticket.channel_id, ticket);
        true
    }
    /// Drop a ticket whose creation could not be persisted.
    pub fn discard(&self, channel_id: ChannelId) -> Option<Ticket> {
        self.lock().open.remove(&channel_id)
    }
    pub fn len(&self) -> usize {
        self.lock().open.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
