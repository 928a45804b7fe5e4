//! Automatic closure of stale tickets.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serenity::model::id::ChannelId;
use tokio::task::JoinHandle;

use super::error::TicketError;
use super::lifecycle::{Closer, Lifecycle, Transition};
use crate::{log_info, log_warn};

/// Result of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub closed: Vec<ChannelId>,
    pub failed: Vec<(ChannelId, TicketError)>,
}

pub struct ExpiryScheduler {
    lifecycle: Arc<Lifecycle>,
    threshold: chrono::Duration,
    interval: Duration,
}

impl ExpiryScheduler {
    pub fn new(lifecycle: Arc<Lifecycle>, threshold: chrono::Duration, interval: Duration) -> Self {
        Self { lifecycle, threshold, interval }
    }

    /// Close every open ticket older than the threshold at `now`.
    ///
    /// A failure on one ticket is logged and does not stop the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let stale = self.lifecycle.registry()
            .list_open()
            .into_iter()
            .filter(|t| now - t.opened_at > self.threshold);
        for ticket in stale {
            let channel = ticket.channel_id;
            // Announced first: the closed notice must stay the last message of the channel.
            let text = format!(
                "This ticket is closed automatically after {} without activity.",
                describe(self.threshold)
            );
            if let Err(e) = self.lifecycle.platform().send_text(channel, &text).await {
                log_warn!("Unable to announce the expiry of ticket {}: {}", channel.0, e);
            }
            let transition = Transition::Close { channel, closer: Closer::AutoExpire };
            match self.lifecycle.apply_at(ticket.guild_id, transition, now).await {
                Ok(_) => report.closed.push(channel),
                Err(e) => {
                    log_warn!("Unable to expire ticket {}: {}", channel.0, e);
                    report.failed.push((channel, e));
                }
            }
        }
        if !report.closed.is_empty() {
            log_info!("Expiry sweep closed {} ticket(s)", report.closed.len());
        }
        report
    }

    /// Run the sweep periodically in the background. The first sweep happens one
    /// interval after the start.
    pub fn spawn(self) -> ExpiryTask {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep(Utc::now()).await;
            }
        });
        ExpiryTask(handle)
    }
}

/// Handle on the background sweep. Dropping it stops the sweep.
pub struct ExpiryTask(JoinHandle<()>);

impl Drop for ExpiryTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn describe(threshold: chrono::Duration) -> String {
    match threshold.num_days() {
        0 => match threshold.num_hours() {
            0 => format!("{} minute(s)", threshold.num_minutes()),
            hours => format!("{} hour(s)", hours),
        },
        days => format!("{} day(s)", days),
    }
}
