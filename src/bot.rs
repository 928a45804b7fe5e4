//! Application core.
//! The bot and its components are initialized in this module.

use serenity::{Client, prelude::GatewayIntents};
use ticketbot_core::ComponentContainer;

use crate::{components as cmp, config::Config, log_info};

/// The bot.
///
/// The bot is made of components created and placed in a [ComponentContainer].
/// The container hands the client a [ComponentEventDispatcher] which forwards
/// the Discord events to the components.
///
/// [ComponentEventDispatcher]: ticketbot_core::component::ComponentEventDispatcher
pub struct Bot {
    client: Client,
    _container: ComponentContainer,
}

impl Bot {
    /// Create the bot and its components.
    pub async fn new(config: &Config) -> Result<Bot, String> {
        let mut container = ComponentContainer::new();
        let tickets = cmp::Tickets::new(config)
            .map_err(|e| format!("Unable to load the ticket data: {}", e))?;
        container.add_component(tickets);

        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
        let dispatcher = container.get_event_dispatcher();
        let names = container.names();
        log_info!("{} component(s) loaded: {}", names.len(), names.join(", "));
        let client = Client::builder(&config.token, intents)
            .raw_event_handler(dispatcher)
            .application_id(config.app_id)
            .await
            .map_err(|e| format!("Unable to create the client: {}", e))?;
        Ok(Bot {
            client,
            _container: container,
        })
    }
    /// Run the bot until the connection is lost.
    pub async fn start(&mut self) -> serenity::Result<()> {
        self.client.start().await
    }
}
