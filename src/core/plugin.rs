//! The contract every plugin implements.

use super::channels::{LogLevel, LogMessage, LOGGER};
use super::events::EventSource;
use super::registry::{BusError, ChannelKey, Registry, RegistryExt};
use crate::chat::ChatClient;
use crate::config::Config;
use crate::db::Database;
use std::sync::Arc;

/// Shared dependencies handed to every plugin.
#[derive(Clone)]
pub struct InitOptions {
    pub config: Arc<Config>,
    pub store: Database,
    pub client: Arc<dyn ChatClient>,
    pub events: EventSource,
    pub registry: Arc<dyn Registry>,
}

/// A unit loaded once at startup.
///
/// Construction must be side-effect free. Everything that touches the
/// registry or subscribes to a stream happens in [`Plugin::wire`], which the
/// bootstrap calls in dependency order.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError>;
}

/// Uniform entry point the bootstrap uses to build a plugin. Returns `None`
/// when the plugin opts out for the given configuration.
pub type PluginConstructor = fn(&InitOptions) -> Option<Arc<dyn Plugin>>;

/// Registry access shared by plugin implementations.
#[derive(Clone)]
pub struct PluginBase {
    registry: Arc<dyn Registry>,
}

impl PluginBase {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Send a line to the logger plugin.
    pub fn log(&self, message: impl Into<String>, level: LogLevel) -> Result<(), BusError> {
        self.dispatch(
            &LOGGER,
            LogMessage {
                message: message.into(),
                level,
            },
        )
    }

    pub fn dispatch<T>(&self, key: &ChannelKey<T>, message: T) -> Result<(), BusError>
    where
        T: Clone + Send + 'static,
    {
        self.registry.dispatch(key, message)
    }
}
