//! Components and the dispatch of gateway events to them.

use std::sync::Arc;

use serenity::{async_trait, client::Context, model::event::Event};
pub use serenity::prelude::RawEventHandler;

/// # A bot component.
///
/// A component owns its data and reacts to the gateway events it subscribes to.
#[async_trait]
pub trait ComponentEvent: Sync + Send {
    /// Short name, used in the logs.
    fn name(&self) -> &'static str;
    /// Filter applied by the dispatcher before [`ComponentEvent::event`]. Every event by default.
    fn wants(&self, _event: &Event) -> bool {
        true
    }
    async fn event(&self, ctx: &Context, event: &Event);
}

pub type Components = Vec<Arc<dyn ComponentEvent>>;

/// # The component container
///
/// Holds the components until the client is built.
#[derive(Clone, Default)]
pub struct ComponentContainer {
    components: Components,
}

impl ComponentContainer {
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a component and return a shared handle on it.
    pub fn add_component<T: 'static + ComponentEvent>(&mut self, component: T) -> Arc<T> {
        let component = Arc::new(component);
        self.components.push(component.clone());
        component
    }
    pub fn names(&self) -> Vec<&'static str> {
        self.components.iter().map(|c| c.name()).collect()
    }
    /// Build the dispatcher handed to the client. Components added afterward are not part of it.
    pub fn get_event_dispatcher(&self) -> ComponentEventDispatcher {
        ComponentEventDispatcher { components: self.components.clone() }
    }
}

/// # The component event dispatcher.
///
/// Forwards each raw gateway event to the components that want it, in insertion order.
///
/// See [`serenity::client::ClientBuilder::raw_event_handler()`].
pub struct ComponentEventDispatcher {
    components: Components,
}

#[async_trait]
impl RawEventHandler for ComponentEventDispatcher {
    async fn raw_event(&self, ctx: Context, event: Event) {
        for component in self.components.iter().filter(|c| c.wants(&event)) {
            component.event(&ctx, &event).await
        }
    }
}
