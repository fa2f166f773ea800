use crate::core::channels::{
    command_exec, is_help_key, CommandDispatcherMessage, ExecContext, CUSTOM_COMMANDS,
};
use crate::core::events::CommandMessage;
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::{BusError, Registry, RegistryExt};
use crate::db::Database;
use std::sync::Arc;
use tracing::{debug, error};

/// Routes parsed commands to `commands/<trigger>` or the custom-command
/// fallback.
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn create(_options: &InitOptions) -> Option<Arc<dyn Plugin>> {
        Some(Arc::new(CommandDispatcher))
    }
}

/// Where a command ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command(String),
    Fallback,
    Dropped,
}

pub fn route(
    registry: &dyn Registry,
    store: &Database,
    cmd: CommandMessage,
) -> Result<Route, BusError> {
    let command = cmd.command.to_lowercase();
    let key = command_exec(&command);
    let known = registry
        .lookup_keys(|k| !is_help_key(k))
        .iter()
        .any(|k| k == key.name());

    if known {
        registry.dispatch(
            &key,
            ExecContext {
                msg: cmd.message,
                store: store.clone(),
                args: cmd.args,
            },
        )?;
        return Ok(Route::Command(key.name().to_string()));
    }

    if registry.contains(CUSTOM_COMMANDS.name()) {
        registry.dispatch(
            &CUSTOM_COMMANDS,
            CommandDispatcherMessage {
                store: store.clone(),
                command,
                message: cmd.message,
            },
        )?;
        return Ok(Route::Fallback);
    }

    // No built-in and no fallback handler: nothing answers.
    debug!("Dispatcher: no channel for command \"{}\", dropping", command);
    Ok(Route::Dropped)
}

impl Plugin for CommandDispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    fn wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let registry = options.registry.clone();
        let store = options.store.clone();

        options.events.command_message.subscribe(move |cmd| {
            if let Err(e) = route(registry.as_ref(), &store, cmd) {
                error!("Dispatcher: {}", e);
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::command_help;
    use crate::testing::{mock_message, mock_user, test_options};
    use serenity::model::id::MessageId;
    use std::sync::Mutex;

    fn collect<T: Clone + Send + 'static>(
        options: &InitOptions,
        key: &crate::core::registry::ChannelKey<T>,
    ) -> Arc<Mutex<Vec<T>>> {
        let subject = options.registry.register(key).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subject.subscribe(move |message| sink.lock().unwrap().push(message));
        seen
    }

    fn wired() -> InitOptions {
        let (options, _chat) = test_options();
        CommandDispatcher::create(&options)
            .unwrap()
            .wire(&options)
            .unwrap();
        options
    }

    #[test]
    fn test_routes_to_command_channel() {
        let options = wired();
        let exec = collect(&options, &command_exec("testcommand"));
        let fallback = collect(&options, &CUSTOM_COMMANDS);

        let author = mock_user(1, "alice", false);
        options
            .events
            .emit_message(mock_message(7, 10, author, "!testcommand foo bar"));

        let exec = exec.lock().unwrap();
        assert_eq!(exec.len(), 1);
        assert_eq!(exec[0].args, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(exec[0].msg.id, MessageId::new(7));
        assert_eq!(exec[0].msg.content, "!testcommand foo bar");
        assert!(exec[0].store.same_as(&options.store));
        assert!(fallback.lock().unwrap().is_empty());
    }

    #[test]
    fn test_command_lookup_is_case_insensitive() {
        let options = wired();
        let exec = collect(&options, &command_exec("roll"));

        options
            .events
            .emit_message(mock_message(1, 10, mock_user(1, "a", false), "!ROLL d20"));

        assert_eq!(exec.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_command_goes_to_fallback() {
        let options = wired();
        let exec = collect(&options, &command_exec("roll"));
        let fallback = collect(&options, &CUSTOM_COMMANDS);

        options
            .events
            .emit_message(mock_message(3, 10, mock_user(1, "a", false), "!Hello there"));

        assert!(exec.lock().unwrap().is_empty());
        let fallback = fallback.lock().unwrap();
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].command, "hello");
        assert_eq!(fallback[0].message.id, MessageId::new(3));
        assert!(fallback[0].store.same_as(&options.store));
    }

    #[test]
    fn test_help_channels_are_not_commands() {
        let options = wired();
        let help = collect(&options, &command_help("roll"));
        let fallback = collect(&options, &CUSTOM_COMMANDS);

        options
            .events
            .emit_message(mock_message(1, 10, mock_user(1, "a", false), "!roll/help"));

        assert!(help.lock().unwrap().is_empty());
        assert_eq!(fallback.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_without_fallback_the_message_is_dropped() {
        // Known gap: nothing tells the user the command does not exist.
        let (options, _chat) = test_options();
        let cmd = CommandMessage {
            message: mock_message(1, 10, mock_user(1, "a", false), "!nope"),
            command: "nope".to_string(),
            args: Vec::new(),
        };

        let routed = route(options.registry.as_ref(), &options.store, cmd).unwrap();
        assert_eq!(routed, Route::Dropped);
    }
}
