use serenity::model::id::{ChannelId, RoleId, UserId};

use super::fake::*;
use crate::components::tickets::{
    admin::{ButtonAction, TicketAdmin},
    error::TicketError,
    model::ButtonStyle,
};

fn admin_of(h: &Harness) -> TicketAdmin {
    TicketAdmin::new(h.lifecycle.clone())
}

fn ids(buttons: &[crate::components::tickets::model::ButtonDef]) -> Vec<&str> {
    buttons.iter().map(|b| b.custom_id.as_str()).collect()
}

#[tokio::test]
async fn edit_button_adds_edits_and_removes() {
    let h = Harness::new().await;
    let admin = admin_of(&h);

    let buttons = admin.edit_button(GUILD, ButtonAction::Add, "Custom", "danger", "custom").await.unwrap();
    assert_eq!(ids(&buttons), vec!["partner", "lahelu", "custom"]);
    assert_eq!(buttons[2].style, ButtonStyle::Danger);

    let buttons = admin.edit_button(GUILD, ButtonAction::Edit, "Partnership", "success", "partner").await.unwrap();
    assert_eq!(ids(&buttons), vec!["partner", "lahelu", "custom"]);
    assert_eq!(buttons[0].label, "Partnership");

    let buttons = admin.edit_button(GUILD, ButtonAction::Remove, "", "", "lahelu").await.unwrap();
    assert_eq!(ids(&buttons), vec!["partner", "custom"]);

    // The live message follows the store.
    let rendered = h.platform.state().panels.get(&PANEL_MESSAGE).map(|p| p.2.clone()).unwrap();
    assert_eq!(rendered, buttons);
    assert_eq!(h.lifecycle.stores().panel(GUILD).await.unwrap().buttons, buttons);
}

#[tokio::test]
async fn edit_button_rejects_bad_ids() {
    let h = Harness::new().await;
    let admin = admin_of(&h);

    let err = admin.edit_button(GUILD, ButtonAction::Add, "Close", "primary", "close_ticket_1").await.unwrap_err();
    assert!(matches!(err, TicketError::InvalidArgument(_)));
    let err = admin.edit_button(GUILD, ButtonAction::Remove, "", "", "ghost").await.unwrap_err();
    assert!(matches!(err, TicketError::NotFound(_)));
}

#[tokio::test]
async fn panel_edits_purge_a_deleted_panel() {
    let h = Harness::new().await;
    let admin = admin_of(&h);
    h.platform.state().panels.clear();

    let err = admin.edit_button(GUILD, ButtonAction::Add, "Custom", "primary", "custom").await.unwrap_err();
    assert!(matches!(err, TicketError::PanelNotFound));
    assert!(h.lifecycle.stores().panel(GUILD).await.is_none());
    let err = admin.edit_embed(GUILD, "Title", "Body", "Footer").await.unwrap_err();
    assert!(matches!(err, TicketError::PanelNotFound));
}

#[tokio::test]
async fn reorder_clamps_the_position() {
    let h = Harness::new().await;
    let admin = admin_of(&h);
    admin.edit_button(GUILD, ButtonAction::Add, "Custom", "primary", "custom").await.unwrap();

    assert_eq!(admin.reorder_button(GUILD, "custom", 0).await.unwrap(), 0);
    assert_eq!(admin.reorder_button(GUILD, "custom", 99).await.unwrap(), 2);
    assert_eq!(admin.reorder_button(GUILD, "partner", -4).await.unwrap(), 0);
    let panel = h.lifecycle.stores().panel(GUILD).await.unwrap();
    assert_eq!(ids(&panel.buttons), vec!["partner", "lahelu", "custom"]);

    let err = admin.reorder_button(GUILD, "ghost", 0).await.unwrap_err();
    assert!(matches!(err, TicketError::NotFound(_)));
}

#[tokio::test]
async fn send_panel_keeps_the_buttons() {
    let h = Harness::new().await;
    let admin = admin_of(&h);

    let message = admin.send_panel(GUILD, LOG_CHANNEL).await.unwrap();
    let panel = h.lifecycle.stores().panel(GUILD).await.unwrap();
    assert_eq!(panel.message(), message);
    assert_eq!(panel.channel(), LOG_CHANNEL);
    assert_eq!(ids(&panel.buttons), vec!["partner", "lahelu"]);
}

#[tokio::test]
async fn reset_and_list() {
    let h = Harness::new().await;
    let admin = admin_of(&h);
    admin.add_role(GUILD, "lahelu", RoleId(88)).await.unwrap();

    let listed = admin.list_buttons(GUILD).await.unwrap();
    assert_eq!(listed[0].1, vec![HANDLER_ROLE]);
    assert_eq!(listed[1].1, vec![RoleId(88)]);

    admin.reset_panel(GUILD).await.unwrap();
    assert!(matches!(admin.reset_panel(GUILD).await, Err(TicketError::PanelNotFound)));
    assert!(matches!(admin.list_buttons(GUILD).await, Err(TicketError::NotFound(_))));
}

#[tokio::test]
async fn edit_embed_turns_escapes_into_newlines() {
    let h = Harness::new().await;
    let admin = admin_of(&h);

    let embed = admin.edit_embed(GUILD, "Support", "Line one\\nLine two", "Footer").await.unwrap();
    assert_eq!(embed.description, "Line one\nLine two");
    assert_eq!(h.lifecycle.stores().panel(GUILD).await.unwrap().embed, Some(embed.clone()));
    assert_eq!(h.platform.state().panels[&PANEL_MESSAGE].1, embed);
}

#[tokio::test]
async fn ban_list() {
    let h = Harness::new().await;
    let admin = admin_of(&h);
    let user = UserId(100);

    assert!(admin.ban(GUILD, user).await.unwrap());
    assert!(!admin.ban(GUILD, user).await.unwrap());
    assert!(admin.is_banned(GUILD, user).await);
    assert!(admin.unban(GUILD, user).await.unwrap());
    assert!(!admin.unban(GUILD, user).await.unwrap());
    assert!(!admin.is_banned(GUILD, user).await);
}

#[tokio::test]
async fn guild_configuration() {
    let h = Harness::new().await;
    let admin = admin_of(&h);
    let other_category = ChannelId(20);
    h.platform.add_category(other_category);

    let err = admin.set_category(GUILD, PANEL_CHANNEL).await.unwrap_err();
    assert!(matches!(err, TicketError::InvalidArgument(_)));
    admin.set_category(GUILD, other_category).await.unwrap();
    assert_eq!(h.lifecycle.stores().guild_config(GUILD).await.category(), Some(other_category));

    let err = admin.set_log_channel(GUILD, other_category).await.unwrap_err();
    assert!(matches!(err, TicketError::InvalidArgument(_)));
    admin.set_log_channel(GUILD, PANEL_CHANNEL).await.unwrap();
    assert_eq!(h.lifecycle.stores().guild_config(GUILD).await.log_channel(), Some(PANEL_CHANNEL));

    assert!(!admin.add_role(GUILD, "partner", HANDLER_ROLE).await.unwrap());
    assert!(admin.add_role(GUILD, "partner", RoleId(78)).await.unwrap());
    assert_eq!(admin.list_roles(GUILD, "partner").await, vec![HANDLER_ROLE, RoleId(78)]);
    assert!(admin.remove_role(GUILD, "partner", HANDLER_ROLE).await.unwrap());
    assert!(!admin.remove_role(GUILD, "partner", HANDLER_ROLE).await.unwrap());
    assert!(admin.remove_role(GUILD, "partner", RoleId(78)).await.unwrap());
    assert!(admin.list_roles(GUILD, "partner").await.is_empty());
}
