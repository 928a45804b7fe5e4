use chrono::Utc;
use futures::future::join_all;
use serenity::model::id::{ChannelId, UserId};

use super::fake::*;
use crate::components::tickets::{
    error::TicketError,
    lifecycle::{Closer, Outcome, Transition},
    model::{ClosedBy, Ticket, TicketState},
};

fn create(requester: u64, ticket_type: &str) -> Transition {
    Transition::Create { requester: member(requester), ticket_type: ticket_type.to_string() }
}

async fn open(h: &Harness, requester: u64, ticket_type: &str) -> Ticket {
    match h.lifecycle.apply(GUILD, create(requester, ticket_type)).await {
        Ok(Outcome::Created(ticket)) => ticket,
        other => panic!("ticket not created: {:?}", other),
    }
}

async fn close(h: &Harness, channel: ChannelId, closer: u64) {
    let transition = Transition::Close { channel, closer: Closer::Member(admin(closer)) };
    h.lifecycle.apply(GUILD, transition).await.unwrap();
}

#[tokio::test]
async fn create_provisions_and_persists() {
    let h = Harness::new().await;
    let ticket = open(&h, 100, "partner").await;

    assert_eq!(ticket.owner, Some(UserId(100)));
    assert_eq!(ticket.ticket_type.as_deref(), Some("partner"));
    assert_eq!(h.lifecycle.state_of(ticket.channel_id).await, TicketState::Open);
    {
        let state = h.platform.state();
        let request = &state.created[0];
        assert_eq!(request.category, CATEGORY);
        assert_eq!(request.name, "ticket-user100");
        assert_eq!(request.roles, vec![HANDLER_ROLE]);
        assert_eq!(state.open_notices, vec![ticket.channel_id]);
    }
    let stores = h.lifecycle.stores();
    assert_eq!(stores.active.snapshot().await, vec![ticket.channel_id.0]);
    let record = stores.open.read(|o| o.get(&ticket.channel_id.0).cloned()).await.unwrap();
    assert_eq!(record.user_id, Some(100));
}

#[tokio::test]
async fn duplicate_partner_ticket_is_refused() {
    let h = Harness::new().await;
    let first = open(&h, 100, "partner").await;

    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::DuplicateOpenTicket { existing: Some(c) } if c == first.channel_id));
    assert_eq!(h.platform.state().created.len(), 1);

    // Another type, or another member, is fine.
    open(&h, 100, "lahelu").await;
    open(&h, 101, "partner").await;
    assert_eq!(h.lifecycle.registry().len(), 3);
}

#[tokio::test]
async fn concurrent_creates_admit_exactly_one() {
    let h = Harness::new().await;
    let results = join_all((0..10).map(|_| h.lifecycle.apply(GUILD, create(100, "partner")))).await;

    let created = results.iter().filter(|r| matches!(r, Ok(Outcome::Created(_)))).count();
    let refused = results.iter().filter(|r| matches!(r, Err(TicketError::DuplicateOpenTicket { .. }))).count();
    assert_eq!(created, 1);
    assert_eq!(refused, 9);
    assert_eq!(h.platform.state().created.len(), 1);
    assert_eq!(h.lifecycle.stores().active.snapshot().await.len(), 1);
}

#[tokio::test]
async fn banned_member_cannot_open() {
    let h = Harness::new().await;
    h.lifecycle.stores().bans.update(|b| b.insert(GUILD.0, vec![100])).await.unwrap();

    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::Banned));
    assert!(h.platform.state().created.is_empty());
}

#[tokio::test]
async fn unknown_type_releases_the_reservation() {
    let h = Harness::new().await;
    let err = h.lifecycle.apply(GUILD, create(100, "ghost")).await.unwrap_err();
    assert!(matches!(err, TicketError::UnknownTicketType(t) if t == "ghost"));
    assert!(h.lifecycle.registry().is_empty());
    open(&h, 100, "partner").await;
}

#[tokio::test]
async fn missing_category_is_reported() {
    let h = Harness::new().await;
    h.platform.remove_channel(CATEGORY);
    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::NoCategoryConfigured));

    h.lifecycle.stores().guilds.update(|g| g.clear()).await.unwrap();
    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::NoCategoryConfigured));
    assert!(h.lifecycle.registry().is_empty());
}

#[tokio::test]
async fn deleted_panel_is_purged_on_use() {
    let h = Harness::new().await;
    h.platform.state().panels.clear();

    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::PanelNotFound));
    assert!(err.is_stale_reference());
    assert!(h.lifecycle.stores().panel(GUILD).await.is_none());
}

#[tokio::test]
async fn close_moves_the_ticket_to_the_closed_index() {
    let h = Harness::new().await;
    let ticket = open(&h, 100, "partner").await;
    let channel = ticket.channel_id;

    let outcome = h.lifecycle
        .apply(GUILD, Transition::Close { channel, closer: Closer::Member(handler(200)) })
        .await
        .unwrap();
    let closed = match outcome {
        Outcome::Closed(closed) => closed,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(closed.closed_by, ClosedBy::User(UserId(200)));
    assert_eq!(h.lifecycle.state_of(channel).await, TicketState::Closed);

    let stores = h.lifecycle.stores();
    assert!(stores.active.snapshot().await.is_empty());
    assert!(stores.open.snapshot().await.is_empty());
    let record = stores.closed_record(channel).await.unwrap();
    assert_eq!(record.owner(), Some(UserId(100)));
    assert_eq!(record.ticket_type.as_deref(), Some("partner"));
    let log = stores.log.snapshot().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].channel_id, channel.0);
    assert_eq!(log[0].opened_at, Some(ticket.opened_at));

    let state = h.platform.state();
    assert_eq!(state.locked, vec![channel]);
    assert_eq!(state.closed_notices.len(), 1);
    assert!(state.with_buttons.contains(&channel));
}

#[tokio::test]
async fn only_staff_can_close() {
    let h = Harness::new().await;
    let ticket = open(&h, 100, "lahelu").await;
    let channel = ticket.channel_id;

    for actor in [member(100), handler(200)] {
        let err = h.lifecycle
            .apply(GUILD, Transition::Close { channel, closer: Closer::Member(actor) })
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::Unauthorized(_)));
    }
    assert_eq!(h.lifecycle.state_of(channel).await, TicketState::Open);
}

#[tokio::test]
async fn closing_twice_is_not_found() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;

    let err = h.lifecycle
        .apply(GUILD, Transition::Close { channel, closer: Closer::Member(admin(1)) })
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::NotFound(_)));
    assert_eq!(h.lifecycle.stores().log.snapshot().await.len(), 1);
}

#[tokio::test]
async fn delete_sends_the_transcript_then_removes_the_channel() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    h.platform.state().history.insert(channel, vec![crate::components::tickets::archive::HistoryEntry {
        timestamp: Utc::now(),
        author: "user100#0001".to_string(),
        author_id: UserId(100),
        content: "my server is down".to_string(),
        attachments: Vec::new(),
    }]);
    close(&h, channel, 1).await;

    let outcome = h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: member(100) }).await.unwrap();
    assert_eq!(outcome, Outcome::Deleted { channel, transcript_delivered: true });
    assert_eq!(h.lifecycle.state_of(channel).await, TicketState::Deleted);
    assert!(h.lifecycle.stores().closed.snapshot().await.is_empty());

    let state = h.platform.state();
    assert_eq!(state.deleted, vec![channel]);
    let (log_channel, transcript, deleted_by) = &state.transcripts[0];
    assert_eq!(*log_channel, LOG_CHANNEL);
    assert_eq!(*deleted_by, UserId(100));
    assert_eq!(transcript.channel_name, "ticket-user100");
    assert!(transcript.content.ends_with("my server is down"));
}

#[tokio::test]
async fn transcript_failure_does_not_block_deletion() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;
    h.platform.state().fail_transcript = true;

    let outcome = h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: admin(1) }).await.unwrap();
    assert_eq!(outcome, Outcome::Deleted { channel, transcript_delivered: false });
    assert_eq!(h.platform.state().deleted, vec![channel]);
}

#[tokio::test]
async fn delete_needs_owner_staff_or_admin() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;

    let err = h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: member(300) }).await.unwrap_err();
    assert!(matches!(err, TicketError::Unauthorized(_)));
    h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: handler(200) }).await.unwrap();
}

#[tokio::test]
async fn deleted_ticket_accepts_nothing() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;
    h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: admin(1) }).await.unwrap();

    let transitions = [
        Transition::Close { channel, closer: Closer::Member(admin(1)) },
        Transition::Close { channel, closer: Closer::AutoExpire },
        Transition::Delete { channel, actor: admin(1) },
        Transition::Reopen { channel, actor: admin(1) },
    ];
    for transition in transitions {
        let err = h.lifecycle.apply(GUILD, transition).await.unwrap_err();
        assert!(matches!(err, TicketError::NotFound(_)));
    }
    assert_eq!(h.platform.state().deleted.len(), 1);
}

#[tokio::test]
async fn open_ticket_cannot_be_deleted_or_reopened() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;

    let err = h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: admin(1) }).await.unwrap_err();
    assert!(matches!(err, TicketError::IllegalTransition { state: TicketState::Open, .. }));
    let err = h.lifecycle.apply(GUILD, Transition::Reopen { channel, actor: admin(1) }).await.unwrap_err();
    assert!(matches!(err, TicketError::IllegalTransition { state: TicketState::Open, .. }));
}

#[tokio::test]
async fn reopen_by_owner_restores_access() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;

    let err = h.lifecycle.apply(GUILD, Transition::Reopen { channel, actor: handler(200) }).await.unwrap_err();
    assert!(matches!(err, TicketError::Unauthorized(_)));

    let outcome = h.lifecycle.apply(GUILD, Transition::Reopen { channel, actor: member(100) }).await.unwrap();
    assert_eq!(outcome, Outcome::Reopened { channel, owner: Some(UserId(100)) });
    assert_eq!(h.platform.state().granted, vec![(channel, UserId(100))]);
    assert!(h.lifecycle.stores().closed.snapshot().await.is_empty());
}

#[tokio::test]
async fn reopened_ticket_no_longer_counts_as_open() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;
    h.lifecycle.apply(GUILD, Transition::Reopen { channel, actor: admin(1) }).await.unwrap();

    assert_eq!(h.lifecycle.state_of(channel).await, TicketState::Deleted);
    assert!(!h.lifecycle.stores().is_active(channel).await);
    // The owner may open the same type again.
    open(&h, 100, "partner").await;
}

/// The store file can no longer be replaced: every write to it fails.
fn make_unwritable(path: &std::path::Path) {
    let _ = std::fs::remove_file(path);
    std::fs::create_dir(path).unwrap();
    std::fs::write(path.join("keep"), "x").unwrap();
}

fn make_writable(path: &std::path::Path) {
    std::fs::remove_dir_all(path).unwrap();
}

#[tokio::test]
async fn failed_creation_leaves_nothing_behind() {
    let h = Harness::new().await;
    let active = h.lifecycle.stores().active.path().to_path_buf();
    make_unwritable(&active);

    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::Store(_)));
    assert!(h.lifecycle.registry().is_empty());
    assert!(h.lifecycle.stores().open.snapshot().await.is_empty());
    {
        let state = h.platform.state();
        assert_eq!(state.created.len(), 1);
        assert_eq!(state.deleted.len(), 1);
        assert!(state.open_notices.is_empty());
    }

    make_writable(&active);
    open(&h, 100, "partner").await;
}

#[tokio::test]
async fn failed_closure_keeps_the_ticket_open() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    let active = h.lifecycle.stores().active.path().to_path_buf();
    make_unwritable(&active);

    let err = h.lifecycle
        .apply(GUILD, Transition::Close { channel, closer: Closer::Member(admin(1)) })
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::Store(_)));
    let stores = h.lifecycle.stores();
    assert_eq!(h.lifecycle.state_of(channel).await, TicketState::Open);
    assert!(stores.closed_record(channel).await.is_none());
    assert!(stores.is_active(channel).await);
    assert!(stores.open.read(|o| o.contains_key(&channel.0)).await);
    assert!(stores.log.snapshot().await.is_empty());
    assert!(h.platform.state().closed_notices.is_empty());

    make_writable(&active);
    close(&h, channel, 1).await;
    assert_eq!(h.lifecycle.state_of(channel).await, TicketState::Closed);
    assert!(!stores.is_active(channel).await);
}

#[tokio::test]
async fn failed_log_write_reverts_the_indices() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    let log = h.lifecycle.stores().log.path().to_path_buf();
    make_unwritable(&log);

    let err = h.lifecycle
        .apply(GUILD, Transition::Close { channel, closer: Closer::AutoExpire })
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::Store(_)));
    let stores = h.lifecycle.stores();
    assert!(stores.closed_record(channel).await.is_none());
    assert_eq!(stores.active.snapshot().await, vec![channel.0]);
    assert!(stores.open.read(|o| o.contains_key(&channel.0)).await);
    assert_eq!(h.lifecycle.registry().lookup(channel).map(|t| t.owner), Some(Some(UserId(100))));
}

#[tokio::test]
async fn vanished_channel_does_not_block_a_new_ticket() {
    let h = Harness::new().await;
    let first = open(&h, 100, "partner").await.channel_id;
    h.platform.remove_channel(first);

    let second = open(&h, 100, "partner").await.channel_id;
    assert_ne!(first, second);
    assert_eq!(h.lifecycle.state_of(first).await, TicketState::Deleted);
    assert_eq!(h.lifecycle.registry().len(), 1);
    assert_eq!(h.lifecycle.stores().active.snapshot().await, vec![second.0]);
    assert!(!h.lifecycle.stores().open.read(|o| o.contains_key(&first.0)).await);
}

#[tokio::test]
async fn live_channel_still_blocks_a_new_ticket() {
    let h = Harness::new().await;
    let first = open(&h, 100, "partner").await.channel_id;
    h.platform.state().unreachable = true;

    let err = h.lifecycle.apply(GUILD, create(100, "partner")).await.unwrap_err();
    assert!(matches!(err, TicketError::DuplicateOpenTicket { existing: Some(c) } if c == first));
    assert_eq!(h.lifecycle.registry().len(), 1);
}

#[tokio::test]
async fn delete_of_a_vanished_channel_cleans_the_index() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;
    h.platform.remove_channel(channel);

    let outcome = h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: admin(1) }).await.unwrap();
    assert_eq!(outcome, Outcome::Deleted { channel, transcript_delivered: false });
    assert!(h.lifecycle.stores().closed.snapshot().await.is_empty());
    let state = h.platform.state();
    assert!(state.deleted.is_empty());
    assert!(state.transcripts.is_empty());
}

#[tokio::test]
async fn concurrent_deletes_send_one_transcript() {
    let h = Harness::new().await;
    let channel = open(&h, 100, "partner").await.channel_id;
    close(&h, channel, 1).await;

    let deletes = (0..2).map(|_| h.lifecycle.apply(GUILD, Transition::Delete { channel, actor: admin(1) }));
    let results = join_all(deletes).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(TicketError::NotFound(_)))));
    let state = h.platform.state();
    assert_eq!(state.transcripts.len(), 1);
    assert_eq!(state.deleted, vec![channel]);
}
