//! Two-phase startup: construct every plugin, then wire them in order.

use super::plugin::{InitOptions, Plugin, PluginConstructor};
use super::registry::BusError;
use crate::plugins::{CommandDispatcher, Logger, Pulse};
use std::sync::Arc;
use tracing::{debug, info};

/// Plugins every bot runs, in wiring order.
pub const SYSTEM_PLUGINS: [PluginConstructor; 3] =
    [Logger::create, Pulse::create, CommandDispatcher::create];

/// Build and wire the system plugins followed by `plugins`.
///
/// Construction has no side effects, so a wiring failure leaves nothing
/// half-started except the channels registered before it.
pub fn bootstrap(
    options: &InitOptions,
    plugins: &[PluginConstructor],
) -> Result<Vec<Arc<dyn Plugin>>, BusError> {
    let instances: Vec<Arc<dyn Plugin>> = SYSTEM_PLUGINS
        .iter()
        .chain(plugins)
        .filter_map(|create| create(options))
        .collect();

    for plugin in &instances {
        plugin.clone().wire(options)?;
        debug!("Bootstrap: wired plugin {}", plugin.name());
    }

    info!(
        "Bootstrap: {} plugins ready ({})",
        instances.len(),
        instances
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::{command_exec, LOGGER, PULSE};
    use crate::core::registry::RegistryExt;
    use crate::testing::test_options;

    struct Probe {
        trigger: &'static str,
    }

    impl Plugin for Probe {
        fn name(&self) -> &str {
            self.trigger
        }

        fn wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
            // Logger must already be there.
            assert!(options.registry.contains(LOGGER.name()));
            options.registry.register(&command_exec(self.trigger))?;
            Ok(())
        }
    }

    fn roll(_: &InitOptions) -> Option<Arc<dyn Plugin>> {
        Some(Arc::new(Probe { trigger: "roll" }))
    }

    fn skipped(_: &InitOptions) -> Option<Arc<dyn Plugin>> {
        None
    }

    #[tokio::test]
    async fn test_system_plugins_come_first() {
        let (options, _chat) = test_options();
        let plugins = bootstrap(&options, &[roll, skipped]).unwrap();

        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["logger", "pulse", "dispatcher", "roll"]);
        assert_eq!(
            options.registry.keys(),
            vec![
                LOGGER.name().to_string(),
                PULSE.name().to_string(),
                "commands/roll".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_trigger_fails_fast() {
        let (options, _chat) = test_options();
        let Err(err) = bootstrap(&options, &[roll, roll]) else {
            panic!("duplicate trigger was accepted");
        };
        assert_eq!(err, BusError::DuplicateChannel("commands/roll".to_string()));
    }
}
