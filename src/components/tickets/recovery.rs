//! Start-up restoration of the ticket state.
//!
//! Runs once the client is connected and before interactions are served:
//! 1. the panels are rendered again, or purged when their message is gone;
//! 2. closed tickets whose last message lost its buttons get a fresh closed notice;
//! 3. open tickets are put back into the registry from the active index;
//! 4. channels under a ticket category that no index knows about are reported.
//!
//! Each entry is handled on its own: a failure is logged and the entry skipped.
//! Running the procedure twice posts nothing new.

use std::collections::HashSet;

use chrono::Utc;
use serenity::model::id::{ChannelId, GuildId};

use super::error::Result;
use super::lifecycle::Lifecycle;
use super::model::{Ticket, TicketState};
use super::platform::ClosedNotice;
use crate::{log_info, log_warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub panels_restored: usize,
    pub panels_purged: usize,
    pub closed_notices_posted: usize,
    pub open_restored: usize,
    pub skipped: usize,
    pub orphans: Vec<ChannelId>,
}

pub async fn run(lifecycle: &Lifecycle) -> RecoveryReport {
    let mut report = RecoveryReport::default();
    restore_panels(lifecycle, &mut report).await;
    restore_closed(lifecycle, &mut report).await;
    restore_open(lifecycle, &mut report).await;
    find_orphans(lifecycle, &mut report).await;
    log_info!(
        "Recovery: {} panel(s), {} closed notice(s) posted, {} open ticket(s), {} skipped, {} orphan(s)",
        report.panels_restored,
        report.closed_notices_posted,
        report.open_restored,
        report.skipped,
        report.orphans.len()
    );
    report
}

async fn restore_panels(lifecycle: &Lifecycle, report: &mut RecoveryReport) {
    let panels = lifecycle.stores().panels.snapshot().await;
    for (guild, panel) in panels {
        let guild = GuildId(guild);
        let platform = lifecycle.platform();
        let exists = match platform.channel(panel.channel()).await {
            Ok(Some(_)) => platform.panel_exists(panel.channel(), panel.message()).await,
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        match exists {
            Ok(true) => {
                let embed = panel.embed_or_default();
                match platform.render_panel(panel.channel(), panel.message(), &embed, &panel.buttons).await {
                    Ok(()) => report.panels_restored += 1,
                    Err(e) => {
                        log_warn!("Unable to render the panel of guild {}: {}", guild.0, e);
                        report.skipped += 1;
                    }
                }
            }
            Ok(false) => {
                log_warn!("Panel of guild {} no longer exists, purging it", guild.0);
                match lifecycle.stores().purge_panel(guild).await {
                    Ok(_) => report.panels_purged += 1,
                    Err(e) => {
                        log_warn!("Unable to purge the panel of guild {}: {}", guild.0, e);
                        report.skipped += 1;
                    }
                }
            }
            Err(e) => {
                log_warn!("Unable to check the panel of guild {}: {}", guild.0, e);
                report.skipped += 1;
            }
        }
    }
}

async fn restore_closed(lifecycle: &Lifecycle, report: &mut RecoveryReport) {
    let closed = lifecycle.stores().closed.snapshot().await;
    let platform = lifecycle.platform();
    for (channel, record) in closed {
        let channel = ChannelId(channel);
        match platform.channel(channel).await {
            Ok(Some(_)) => (),
            Ok(None) => {
                log_warn!("Closed ticket {} no longer exists, skipping", channel.0);
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                log_warn!("Unable to resolve closed ticket {}: {}", channel.0, e);
                report.skipped += 1;
                continue;
            }
        }
        // An unreadable history counts as "no buttons": a duplicate notice is better
        // than a ticket nobody can delete.
        let has_affordance = platform.last_message_has_affordance(channel).await.unwrap_or_else(|e| {
            log_warn!("Unable to read the last message of ticket {}: {}", channel.0, e);
            false
        });
        if has_affordance {
            continue;
        }
        let notice = ClosedNotice { channel, closed_by: record.closed_by, timestamp: Utc::now().timestamp() };
        match platform.post_closed_affordance(&notice).await {
            Ok(()) => report.closed_notices_posted += 1,
            Err(e) => {
                log_warn!("Unable to post the closed notice of ticket {}: {}", channel.0, e);
                report.skipped += 1;
            }
        }
    }
}

async fn restore_open(lifecycle: &Lifecycle, report: &mut RecoveryReport) {
    let active = lifecycle.stores().active.snapshot().await;
    let mut metadata = lifecycle.stores().open.snapshot().await;
    for channel in active {
        let record = metadata.remove(&channel);
        let channel = ChannelId(channel);
        if lifecycle.state_of(channel).await == TicketState::Open {
            continue;
        }
        let info = match lifecycle.platform().channel(channel).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                log_warn!("Open ticket {} no longer exists, skipping", channel.0);
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                log_warn!("Unable to resolve open ticket {}: {}", channel.0, e);
                report.skipped += 1;
                continue;
            }
        };
        let ticket = match record {
            Some(record) => record.into_ticket(channel),
            None => {
                log_warn!("Open ticket {} has no owner metadata, restoring it without owner", channel.0);
                Ticket {
                    guild_id: info.guild_id,
                    channel_id: channel,
                    owner: None,
                    ticket_type: None,
                    opened_at: Utc::now(),
                }
            }
        };
        if lifecycle.registry().restore(ticket) {
            report.open_restored += 1;
        }
    }
}

async fn find_orphans(lifecycle: &Lifecycle, report: &mut RecoveryReport) {
    let stores = lifecycle.stores();
    let known = {
        let mut known = stores.active.snapshot().await.into_iter().collect::<HashSet<_>>();
        known.extend(stores.closed.snapshot().await.into_keys());
        known.extend(stores.panels.snapshot().await.values().map(|p| p.channel_id));
        known
    };
    for (guild, config) in stores.guilds.snapshot().await {
        let category = match config.category() {
            Some(category) => category,
            None => continue,
        };
        match orphans_in(lifecycle, GuildId(guild), category, &known).await {
            Ok(orphans) => {
                for orphan in &orphans {
                    log_warn!("Channel {} sits in the ticket category of guild {} but no index knows it", orphan.0, guild);
                }
                report.orphans.extend(orphans);
            }
            Err(e) => log_warn!("Unable to list the ticket category of guild {}: {}", guild, e),
        }
    }
}

async fn orphans_in(lifecycle: &Lifecycle, guild: GuildId, category: ChannelId, known: &HashSet<u64>) -> Result<Vec<ChannelId>> {
    let children = lifecycle.platform().category_children(guild, category).await?;
    Ok(children.into_iter().filter(|c| !known.contains(&c.0)).collect())
}
