//! Interaction helpers: replies and slash command arguments.

use serenity::{
    async_trait,
    http::Http,
    model::{
        application::interaction::{
            application_command::{ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue},
            message_component::MessageComponentInteraction,
            InteractionResponseType,
        },
        id::{ChannelId, RoleId, UserId},
    },
};

use crate::message::Message;

/// Uniform way to answer an interaction, whatever its kind.
///
/// Discord expects an answer within three seconds. Handlers doing network work
/// first [`defer`](Self::defer) and then [`edit_reply`](Self::edit_reply).
#[async_trait]
pub trait InteractionReply: Sync {
    async fn reply(&self, http: &Http, msg: Message) -> serenity::Result<()>;
    async fn defer(&self, http: &Http, ephemeral: bool) -> serenity::Result<()>;
    async fn edit_reply(&self, http: &Http, msg: Message) -> serenity::Result<()>;
}

macro_rules! impl_interaction_reply {
    ($interaction:ty) => {
        #[async_trait]
        impl InteractionReply for $interaction {
            async fn reply(&self, http: &Http, msg: Message) -> serenity::Result<()> {
                self.create_interaction_response(http, |resp| {
                    *resp = msg.into();
                    resp
                }).await
            }
            async fn defer(&self, http: &Http, ephemeral: bool) -> serenity::Result<()> {
                self.create_interaction_response(http, |resp| {
                    resp.kind(InteractionResponseType::DeferredChannelMessageWithSource)
                        .interaction_response_data(|data| data.ephemeral(ephemeral))
                }).await
            }
            async fn edit_reply(&self, http: &Http, msg: Message) -> serenity::Result<()> {
                self.edit_original_interaction_response(http, |resp| {
                    *resp = msg.into();
                    resp
                }).await.map(|_| ())
            }
        }
    };
}

impl_interaction_reply!(ApplicationCommandInteraction);
impl_interaction_reply!(MessageComponentInteraction);

/// Typed access to the arguments of a slash command.
///
/// Every accessor returns `Err` with a displayable message when a required
/// argument is missing or has the wrong type.
pub struct CommandArgs<'a>(&'a [CommandDataOption]);

impl<'a> CommandArgs<'a> {
    pub fn new(interaction: &'a ApplicationCommandInteraction) -> Self {
        CommandArgs(&interaction.data.options)
    }
    fn get(&self, name: &str) -> Option<&'a CommandDataOption> {
        self.0.iter().find(|opt| opt.name == name)
    }
    fn required(&self, name: &str) -> Result<&'a CommandDataOption, String> {
        self.get(name).ok_or_else(|| format!("{}: missing required argument", name))
    }
    pub fn string(&self, name: &str) -> Result<String, String> {
        match self.required(name)?.resolved {
            Some(CommandDataOptionValue::String(ref s)) => Ok(s.clone()),
            _ => Err(format!("{}: a text value is expected", name)),
        }
    }
    pub fn integer(&self, name: &str) -> Result<i64, String> {
        match self.required(name)?.resolved {
            Some(CommandDataOptionValue::Integer(v)) => Ok(v),
            _ => Err(format!("{}: an integer is expected", name)),
        }
    }
    pub fn user(&self, name: &str) -> Result<UserId, String> {
        match self.required(name)?.resolved {
            Some(CommandDataOptionValue::User(ref user, _)) => Ok(user.id),
            _ => Err(format!("{}: a user is expected", name)),
        }
    }
    pub fn role(&self, name: &str) -> Result<RoleId, String> {
        match self.required(name)?.resolved {
            Some(CommandDataOptionValue::Role(ref role)) => Ok(role.id),
            _ => Err(format!("{}: a role is expected", name)),
        }
    }
    pub fn channel(&self, name: &str) -> Result<ChannelId, String> {
        match self.required(name)?.resolved {
            Some(CommandDataOptionValue::Channel(ref channel)) => Ok(channel.id),
            _ => Err(format!("{}: a channel is expected", name)),
        }
    }
}
