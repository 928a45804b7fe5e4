use serenity::builder::{CreateEmbed, CreateInteractionResponse, EditInteractionResponse};
use serenity::model::application::interaction::InteractionResponseType;
use serenity::utils::Colour;

pub const COLOR_INFO: Colour = Colour(0x3498DB);
pub const COLOR_SUCCESS: Colour = Colour(0x2ECC71);
pub const COLOR_ERROR: Colour = Colour(0xE74C3C);
pub const COLOR_WARN: Colour = Colour(0xFFB800);

/// Reply sent back to an interaction.
///
/// The same value can be turned into an immediate response or into the edit of a
/// deferred one, see [`InteractionReply`](crate::InteractionReply).
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub message: String,
    pub embeds: Vec<CreateEmbed>,
    pub ephemeral: bool,
}

impl Message {
    pub fn set_ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }
    pub fn last_embed_mut(&mut self) -> Option<&mut CreateEmbed> {
        self.embeds.last_mut()
    }
}

impl From<Message> for CreateInteractionResponse<'_> {
    fn from(message: Message) -> Self {
        let mut response = CreateInteractionResponse::default();
        response.interaction_response_data(|data| {
            data.ephemeral(message.ephemeral);
            if !message.message.is_empty() {
                data.content(message.message);
            }
            data.set_embeds(message.embeds)
        });
        response.kind(InteractionResponseType::ChannelMessageWithSource);
        response
    }
}
impl From<Message> for EditInteractionResponse {
    fn from(message: Message) -> Self {
        let mut response = Self::default();
        response.content(message.message);
        response.set_embeds(message.embeds);
        response
    }
}

/// Error reply, ephemeral.
pub fn error<S: ToString>(error_message: S) -> Message {
    custom_embed("Error", error_message, COLOR_ERROR).set_ephemeral(true)
}
/// Warning reply, ephemeral.
pub fn warn<S: ToString>(warn_message: S) -> Message {
    custom_embed("Warning", warn_message, COLOR_WARN).set_ephemeral(true)
}
/// Success reply, ephemeral.
pub fn success<S: ToString>(success_message: S) -> Message {
    custom_embed("Done", success_message, COLOR_SUCCESS).set_ephemeral(true)
}
/// Information reply, ephemeral.
pub fn info<S: ToString>(info_message: S) -> Message {
    custom_embed("Information", info_message, COLOR_INFO).set_ephemeral(true)
}
pub fn custom_embed<S1, S2, C>(title: S1, message: S2, color: C) -> Message
    where
    S1: ToString,
    S2: ToString,
    C: Into<Colour>
{
    let mut embed = CreateEmbed::default();
    embed
        .title(title)
        .description(message)
        .color(color);
    Message {
        embeds: vec![embed],
        ..Default::default()
    }
}
