//! Bot components

pub mod tickets;
pub use tickets::Tickets;

// Helpers shared by the components
pub mod utils;
