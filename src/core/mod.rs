//! The in-process plugin bus.

pub mod bootstrap;
pub mod channels;
pub mod events;
pub mod plugin;
pub mod registry;
pub mod serial;
pub mod subject;

pub use bootstrap::bootstrap;
pub use events::EventSource;
pub use plugin::{InitOptions, Plugin, PluginConstructor};
pub use registry::{BusError, PluginRegistry, Registry, RegistryExt};
pub use subject::Subject;
