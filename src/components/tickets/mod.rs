//! Ticket manager
//!
//! Members open a private channel from the buttons of a panel message. Staff close
//! the ticket, then delete it (a transcript goes to the log channel) or reopen it.
//! Open tickets older than the expiry threshold are closed automatically.
//!
//! The component owns the stores and the registry. The Discord side of the work is
//! done through [`platform::Platform`], which this component provides on Ready.

pub mod admin;
pub mod affordance;
pub mod archive;
pub mod commands;
pub mod discord;
pub mod error;
pub mod expiry;
pub mod lifecycle;
pub mod model;
pub mod platform;
pub mod recovery;
pub mod registry;
pub mod store;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serenity::{
    async_trait,
    client::Context,
    http::Http,
    model::{
        application::{
            command::Command as ApplicationCommand,
            interaction::{
                application_command::ApplicationCommandInteraction,
                message_component::MessageComponentInteraction,
                Interaction,
            },
        },
        event::Event,
        gateway::Ready,
        guild::Member,
        id::GuildId,
        user::User,
    },
};
use tokio::sync::{watch, Mutex};
use ticketbot_core::{message, ComponentEvent, InteractionReply};

use self::admin::TicketAdmin;
use self::affordance::Affordance;
use self::discord::SerenityPlatform;
use self::error::TicketError;
use self::expiry::{ExpiryScheduler, ExpiryTask};
use self::lifecycle::{Actor, Closer, Lifecycle, Outcome, Transition};
use self::platform::Platform;
use self::registry::Registry;
use self::store::Stores;
use crate::{config::Config, log_debug, log_error, log_info, log_warn};

/// State built on the first Ready, once the HTTP client is known.
struct Runtime {
    lifecycle: Arc<Lifecycle>,
    admin: TicketAdmin,
}

/// The ticket component.
pub struct Tickets {
    stores: Arc<Stores>,
    registry: Arc<Registry>,
    expiry: crate::config::ExpiryConfig,
    command_guilds: Vec<GuildId>,
    started: AtomicBool,
    /// `None` until the recovery has run. Interactions wait on it.
    runtime: watch::Sender<Option<Arc<Runtime>>>,
    expiry_task: Mutex<Option<ExpiryTask>>,
}

impl Tickets {
    pub fn new(config: &Config) -> Result<Self, crate::components::utils::data::Error> {
        let stores = Stores::load(&config.data_dir)?;
        let (runtime, _) = watch::channel(None);
        Ok(Self {
            stores: Arc::new(stores),
            registry: Arc::new(Registry::new()),
            expiry: config.expiry,
            command_guilds: config.guild_commands.iter().copied().map(GuildId).collect(),
            started: AtomicBool::new(false),
            runtime,
            expiry_task: Mutex::new(None),
        })
    }

    async fn on_ready(&self, ctx: &Context, ready: &Ready) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        log_info!("Connected as {}", ready.user.tag());
        self.register_commands(&ctx.http).await;

        let platform: Arc<dyn Platform> = Arc::new(SerenityPlatform::new(ctx.http.clone(), ready.user.id));
        let lifecycle = Arc::new(Lifecycle::new(self.registry.clone(), self.stores.clone(), platform));
        recovery::run(&lifecycle).await;

        let scheduler = ExpiryScheduler::new(lifecycle.clone(), self.expiry.threshold(), self.expiry.sweep_interval());
        *self.expiry_task.lock().await = Some(scheduler.spawn());

        let admin = TicketAdmin::new(lifecycle.clone());
        self.runtime.send_replace(Some(Arc::new(Runtime { lifecycle, admin })));
        log_info!("Ticket system ready, {} open ticket(s)", self.registry.len());
    }

    async fn register_commands(&self, http: &Http) {
        if self.command_guilds.is_empty() {
            match ApplicationCommand::set_global_application_commands(http, |c| commands::register(c)).await {
                Ok(cmds) => log_info!("{} global application command(s) registered", cmds.len()),
                Err(e) => log_error!("Unable to register the application commands: {}", e),
            }
            return;
        }
        for guild in &self.command_guilds {
            match guild.set_application_commands(http, |c| commands::register(c)).await {
                Ok(cmds) => log_info!("{} application command(s) registered on guild {}", cmds.len(), guild.0),
                Err(e) => log_error!("Unable to register the application commands on guild {}: {}", guild.0, e),
            }
        }
    }

    /// Wait for the end of the recovery.
    async fn runtime(&self) -> Option<Arc<Runtime>> {
        let mut rx = self.runtime.subscribe();
        loop {
            let current = rx.borrow().clone();
            if current.is_some() {
                return current;
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    async fn on_command(&self, ctx: &Context, command: &ApplicationCommandInteraction) {
        if !commands::is_ticket_command(&command.data.name) {
            return;
        }
        let guild = match command.guild_id {
            Some(guild) => guild,
            None => {
                reply_now(ctx, command, message::error("This command is only available in a server.")).await;
                return;
            }
        };
        if !command.member.as_ref().map_or(false, is_admin) {
            reply_now(ctx, command, message::error("This command is reserved to administrators.")).await;
            return;
        }
        if let Err(e) = InteractionReply::defer(command, &ctx.http, true).await {
            log_error!("Unable to defer the command {}: {}", command.data.name, e);
            return;
        }
        let msg = match self.runtime().await {
            Some(runtime) => match commands::dispatch(&runtime.admin, guild, command).await {
                Ok(msg) => msg,
                Err(e) => error_reply(&command.data.name, e),
            },
            None => message::error("The ticket system is not available."),
        };
        if let Err(e) = InteractionReply::edit_reply(command, &ctx.http, msg).await {
            log_error!("Unable to answer the command {}: {}", command.data.name, e);
        }
    }

    async fn on_component(&self, ctx: &Context, component: &MessageComponentInteraction) {
        let guild = match component.guild_id {
            Some(guild) => guild,
            None => return,
        };
        let actor = actor_of(&component.user, component.member.as_ref());
        let transition = match Affordance::parse(&component.data.custom_id) {
            Affordance::Open(ticket_type) => Transition::Create { requester: actor, ticket_type },
            Affordance::Close(channel) => Transition::Close { channel, closer: Closer::Member(actor) },
            Affordance::Delete(channel) => Transition::Delete { channel, actor },
            Affordance::Reopen(channel) => Transition::Reopen { channel, actor },
        };
        if let Err(e) = InteractionReply::defer(component, &ctx.http, true).await {
            log_error!("Unable to defer the button {}: {}", component.data.custom_id, e);
            return;
        }
        let msg = match self.runtime().await {
            Some(runtime) => match runtime.lifecycle.apply(guild, transition).await {
                Ok(outcome) => outcome_reply(&outcome),
                Err(e) => error_reply(&component.data.custom_id, e),
            },
            None => message::error("The ticket system is not available."),
        };
        if let Err(e) = InteractionReply::edit_reply(component, &ctx.http, msg).await {
            log_error!("Unable to answer the button {}: {}", component.data.custom_id, e);
        }
    }
}

#[async_trait]
impl ComponentEvent for Tickets {
    fn name(&self) -> &'static str {
        "tickets"
    }
    fn wants(&self, event: &Event) -> bool {
        matches!(event, Event::Ready(_) | Event::InteractionCreate(_))
    }
    async fn event(&self, ctx: &Context, event: &Event) {
        match event {
            Event::Ready(ready) => self.on_ready(ctx, &ready.ready).await,
            Event::InteractionCreate(ev) => match &ev.interaction {
                Interaction::ApplicationCommand(command) => self.on_command(ctx, command).await,
                Interaction::MessageComponent(component) => self.on_component(ctx, component).await,
                _ => (),
            },
            _ => (),
        }
    }
}

fn is_admin(member: &Member) -> bool {
    member.permissions.map_or(false, |p| p.administrator())
}

fn actor_of(user: &User, member: Option<&Member>) -> Actor {
    Actor {
        user_id: user.id,
        name: user.name.clone(),
        is_admin: member.map_or(false, is_admin),
        roles: member.map(|m| m.roles.clone()).unwrap_or_default(),
    }
}

async fn reply_now<I: InteractionReply>(ctx: &Context, interaction: &I, msg: message::Message) {
    if let Err(e) = interaction.reply(&ctx.http, msg).await {
        log_error!("Unable to answer the interaction: {}", e);
    }
}

fn error_reply(origin: &str, error: TicketError) -> message::Message {
    match &error {
        TicketError::Platform(_) | TicketError::Store(_) => log_warn!("{}: {}", origin, error),
        _ => log_debug!("{}: {}", origin, error),
    }
    message::error(error)
}

fn outcome_reply(outcome: &Outcome) -> message::Message {
    match outcome {
        Outcome::Created(ticket) => message::success(format!("Ticket created: <#{}>", ticket.channel_id.0)),
        Outcome::Closed(_) => message::success("Ticket closed."),
        Outcome::Deleted { transcript_delivered: true, .. } => message::success("Ticket deleted, the transcript was sent to the log channel."),
        Outcome::Deleted { transcript_delivered: false, .. } => message::success("Ticket deleted. No transcript was delivered."),
        Outcome::Reopened { owner: Some(owner), .. } => message::success(format!("Ticket reopened for <@{}>.", owner.0)),
        Outcome::Reopened { owner: None, .. } => message::success("Ticket reopened."),
    }
}
