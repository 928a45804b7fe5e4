//! Administrator slash commands.
//!
//! Commands are declared in [`COMMANDS`], registered on Ready and dispatched by name
//! to [`TicketAdmin`].

use serenity::{
    builder::{CreateApplicationCommandOption, CreateApplicationCommands},
    model::{
        application::{
            command::CommandOptionType,
            interaction::application_command::ApplicationCommandInteraction,
        },
        channel::ChannelType,
        id::GuildId,
        permissions::Permissions,
    },
};
use ticketbot_core::{message::{self, Message}, CommandArgs};

use super::admin::{ButtonAction, TicketAdmin};
use super::error::{Result, TicketError};

#[derive(Debug, Clone, Copy)]
enum ArgKind {
    String(&'static [&'static str]),
    Integer,
    User,
    Role,
    TextChannel,
    Category,
}

#[derive(Debug)]
struct Arg {
    name: &'static str,
    description: &'static str,
    kind: ArgKind,
}

#[derive(Debug)]
struct Command {
    name: &'static str,
    description: &'static str,
    args: &'static [Arg],
}

const fn arg(name: &'static str, description: &'static str, kind: ArgKind) -> Arg {
    Arg { name, description, kind }
}

const USER: Arg = arg("user", "Member concerned", ArgKind::User);
const TICKET_TYPE: Arg = arg("tipe", "Ticket type (button id)", ArgKind::String(&[]));

const COMMANDS: &[Command] = &[
    Command { name: "sendticketpanel", description: "Send the ticket panel in this channel", args: &[] },
    Command {
        name: "editticketbutton",
        description: "Add, edit or remove a ticket panel button",
        args: &[
            arg("action", "add / remove / edit", ArgKind::String(&["add", "remove", "edit"])),
            arg("label", "Button text", ArgKind::String(&[])),
            arg("style", "Button colour", ArgKind::String(&["primary", "secondary", "success", "danger"])),
            arg("custom_id", "Unique button id, also the ticket type", ArgKind::String(&[])),
        ],
    },
    Command {
        name: "reorderticketbutton",
        description: "Move a ticket panel button",
        args: &[
            arg("custom_id", "Id of the button to move", ArgKind::String(&[])),
            arg("position", "New position, starting at 0", ArgKind::Integer),
        ],
    },
    Command { name: "resetticketpanel", description: "Forget the ticket panel of this server", args: &[] },
    Command { name: "listticketbuttons", description: "List the ticket panel buttons", args: &[] },
    Command {
        name: "editticketembed",
        description: "Edit the ticket panel embed",
        args: &[
            arg("title", "Embed title", ArgKind::String(&[])),
            arg("description", "Embed description, \\n for a new line", ArgKind::String(&[])),
            arg("footer", "Embed footer", ArgKind::String(&[])),
        ],
    },
    Command { name: "banticketuser", description: "Ban a member from the ticket system", args: &[USER] },
    Command { name: "unbanticketuser", description: "Unban a member from the ticket system", args: &[USER] },
    Command { name: "checkticketban", description: "Check whether a member is banned from the ticket system", args: &[USER] },
    Command {
        name: "setticketcategory",
        description: "Set the category where tickets are created",
        args: &[arg("category", "Discord category", ArgKind::Category)],
    },
    Command {
        name: "setticketlog",
        description: "Set the channel receiving the transcripts",
        args: &[arg("channel", "Text channel", ArgKind::TextChannel)],
    },
    Command {
        name: "addticketrole",
        description: "Add a handler role to a ticket type",
        args: &[TICKET_TYPE, arg("role", "Handler role", ArgKind::Role)],
    },
    Command {
        name: "removeticketrole",
        description: "Remove a handler role from a ticket type",
        args: &[TICKET_TYPE, arg("role", "Handler role", ArgKind::Role)],
    },
    Command { name: "listticketrole", description: "List the handler roles of a ticket type", args: &[TICKET_TYPE] },
];

pub fn is_ticket_command(name: &str) -> bool {
    COMMANDS.iter().any(|c| c.name == name)
}

fn add_option<'a>(option: &'a mut CreateApplicationCommandOption, arg: &Arg) -> &'a mut CreateApplicationCommandOption {
    option.name(arg.name).description(arg.description).required(true);
    match arg.kind {
        ArgKind::String(choices) => {
            option.kind(CommandOptionType::String);
            for choice in choices {
                option.add_string_choice(choice, choice);
            }
        }
        ArgKind::Integer => {
            option.kind(CommandOptionType::Integer).min_int_value(0);
        }
        ArgKind::User => {
            option.kind(CommandOptionType::User);
        }
        ArgKind::Role => {
            option.kind(CommandOptionType::Role);
        }
        ArgKind::TextChannel => {
            option.kind(CommandOptionType::Channel).channel_types(&[ChannelType::Text]);
        }
        ArgKind::Category => {
            option.kind(CommandOptionType::Channel).channel_types(&[ChannelType::Category]);
        }
    }
    option
}

/// Declare every ticket command, restricted to administrators.
pub fn register(commands: &mut CreateApplicationCommands) -> &mut CreateApplicationCommands {
    for command in COMMANDS {
        commands.create_application_command(|c| {
            c.name(command.name)
                .description(command.description)
                .dm_permission(false)
                .default_member_permissions(Permissions::ADMINISTRATOR);
            for arg in command.args {
                c.create_option(|o| add_option(o, arg));
            }
            c
        });
    }
    commands
}

fn invalid(e: String) -> TicketError {
    TicketError::InvalidArgument(e)
}

/// Run a ticket command and build the reply.
pub async fn dispatch(admin: &TicketAdmin, guild: GuildId, command: &ApplicationCommandInteraction) -> Result<Message> {
    let args = CommandArgs::new(command);
    let reply = match command.data.name.as_str() {
        "sendticketpanel" => {
            admin.send_panel(guild, command.channel_id).await?;
            message::success("Ticket panel sent.")
        }
        "editticketbutton" => {
            let action = args.string("action").map_err(invalid)?;
            let action = ButtonAction::parse(&action)
                .ok_or_else(|| invalid(format!("Unknown action `{}`, expected add, remove or edit.", action)))?;
            let label = args.string("label").map_err(invalid)?;
            let style = args.string("style").map_err(invalid)?;
            let custom_id = args.string("custom_id").map_err(invalid)?;
            let buttons = admin.edit_button(guild, action, &label, &style, &custom_id).await?;
            message::success(format!("Panel updated, {} button(s).", buttons.len()))
        }
        "reorderticketbutton" => {
            let custom_id = args.string("custom_id").map_err(invalid)?;
            let position = args.integer("position").map_err(invalid)?;
            let position = admin.reorder_button(guild, &custom_id, position).await?;
            message::success(format!("`{}` moved to position {}.", custom_id, position))
        }
        "resetticketpanel" => {
            admin.reset_panel(guild).await?;
            message::success("Ticket panel data removed.")
        }
        "listticketbuttons" => {
            let buttons = admin.list_buttons(guild).await?;
            let mut msg = message::info(format!("{} button(s) on the panel.", buttons.len()));
            if let Some(embed) = msg.last_embed_mut() {
                embed.title("Ticket buttons");
                for (i, (button, roles)) in buttons.iter().enumerate() {
                    let handlers = if roles.is_empty() {
                        "*No handler*".to_string()
                    } else {
                        roles.iter().map(|r| format!("<@&{}>", r.0)).collect::<Vec<_>>().join(", ")
                    };
                    embed.field(
                        format!("{}. {}", i + 1, button.label),
                        format!("ID: `{}`, style: `{}`, handled by: {}", button.custom_id, button.style.name(), handlers),
                        false,
                    );
                }
            }
            msg
        }
        "editticketembed" => {
            let title = args.string("title").map_err(invalid)?;
            let description = args.string("description").map_err(invalid)?;
            let footer = args.string("footer").map_err(invalid)?;
            admin.edit_embed(guild, &title, &description, &footer).await?;
            message::success("Panel embed updated.")
        }
        "banticketuser" => {
            let user = args.user("user").map_err(invalid)?;
            if admin.ban(guild, user).await? {
                message::success(format!("<@{}> is now banned from the ticket system.", user.0))
            } else {
                message::warn(format!("<@{}> was already banned.", user.0))
            }
        }
        "unbanticketuser" => {
            let user = args.user("user").map_err(invalid)?;
            if admin.unban(guild, user).await? {
                message::success(format!("<@{}> can use the ticket system again.", user.0))
            } else {
                message::warn(format!("<@{}> is not banned.", user.0))
            }
        }
        "checkticketban" => {
            let user = args.user("user").map_err(invalid)?;
            if admin.is_banned(guild, user).await {
                message::info(format!("<@{}> is banned from the ticket system.", user.0))
            } else {
                message::info(format!("<@{}> is not banned from the ticket system.", user.0))
            }
        }
        "setticketcategory" => {
            let category = args.channel("category").map_err(invalid)?;
            admin.set_category(guild, category).await?;
            message::success(format!("Tickets are now created in <#{}>.", category.0))
        }
        "setticketlog" => {
            let channel = args.channel("channel").map_err(invalid)?;
            admin.set_log_channel(guild, channel).await?;
            message::success(format!("Transcripts are now sent to <#{}>.", channel.0))
        }
        "addticketrole" => {
            let ticket_type = args.string("tipe").map_err(invalid)?;
            let role = args.role("role").map_err(invalid)?;
            if admin.add_role(guild, &ticket_type, role).await? {
                message::success(format!("<@&{}> now handles `{}` tickets.", role.0, ticket_type))
            } else {
                message::warn(format!("<@&{}> already handles `{}` tickets.", role.0, ticket_type))
            }
        }
        "removeticketrole" => {
            let ticket_type = args.string("tipe").map_err(invalid)?;
            let role = args.role("role").map_err(invalid)?;
            if admin.remove_role(guild, &ticket_type, role).await? {
                message::success(format!("<@&{}> no longer handles `{}` tickets.", role.0, ticket_type))
            } else {
                message::warn(format!("<@&{}> does not handle `{}` tickets.", role.0, ticket_type))
            }
        }
        "listticketrole" => {
            let ticket_type = args.string("tipe").map_err(invalid)?;
            let roles = admin.list_roles(guild, &ticket_type).await;
            if roles.is_empty() {
                message::info(format!("No handler role for `{}` tickets.", ticket_type))
            } else {
                let mentions = roles.iter().map(|r| format!("<@&{}>", r.0)).collect::<Vec<_>>().join(" ");
                message::info(format!("Handler roles of `{}` tickets: {}", ticket_type, mentions))
            }
        }
        other => return Err(invalid(format!("Unknown command `{}`.", other))),
    };
    Ok(reply)
}
