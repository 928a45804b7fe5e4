//! # Core library of ticketbot
//!
//! This library provides the glue the bot components share on top of [`serenity`].
//!
//! ## Components system
//!
//! The bot is made of components. Each component manages its own data and receives
//! the gateway events it wants through the [`ComponentEvent`] trait. Components are
//! stored in a [`ComponentContainer`] which hands a [`ComponentEventDispatcher`] to the client.
//!
//! ## Simplify serenity
//!
//! [`serenity`] implements the Discord API very well but its builders are verbose for
//! the common cases of a bot: replying with a coloured embed, deferring an interaction,
//! reading a typed slash command argument. The [`message`] and [`interaction`] modules
//! cover these cases.
//!
//! [`ComponentEventDispatcher`]: component::ComponentEventDispatcher

pub mod component;
pub mod interaction;
pub mod message;

pub use component::{ComponentContainer, ComponentEvent};
pub use interaction::{CommandArgs, InteractionReply};
