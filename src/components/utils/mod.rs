//! Helpers shared by the components.

pub mod data;
