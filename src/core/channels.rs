//! Well-known channel keys and the payloads they carry.

use super::registry::ChannelKey;
use crate::chat::ChatClient;
use crate::db::Database;
use serenity::model::channel::Message;
use std::sync::Arc;

pub const COMMAND_PREFIX: &str = "commands/";
pub const HELP_SUFFIX: &str = "/help";

pub const LOGGER: ChannelKey<LogMessage> = ChannelKey::fixed("logger");
pub const PULSE: ChannelKey<PulseMessage> = ChannelKey::fixed("pulse");
/// Fallback for commands without a dedicated channel. Upper-case so that no
/// lower-cased user command can name it.
pub const CUSTOM_COMMANDS: ChannelKey<CommandDispatcherMessage> =
    ChannelKey::fixed("commands/CUSTOM");

pub fn command_exec(trigger: &str) -> ChannelKey<ExecContext> {
    ChannelKey::new(format!("{COMMAND_PREFIX}{trigger}"))
}

pub fn command_help(trigger: &str) -> ChannelKey<Message> {
    ChannelKey::new(format!("{COMMAND_PREFIX}{trigger}{HELP_SUFFIX}"))
}

pub fn is_help_key(key: &str) -> bool {
    key.starts_with(COMMAND_PREFIX) && key.ends_with(HELP_SUFFIX)
}

/// The trigger named by a help channel key.
pub fn trigger_of_help_key(key: &str) -> Option<&str> {
    key.strip_prefix(COMMAND_PREFIX)?.strip_suffix(HELP_SUFFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub message: String,
    pub level: LogLevel,
}

/// Per-invocation bundle handed to a command's execution channel.
#[derive(Clone)]
pub struct ExecContext {
    pub msg: Message,
    pub store: Database,
    pub args: Vec<String>,
}

/// Sent on [`CUSTOM_COMMANDS`] when no built-in command matched.
#[derive(Clone)]
pub struct CommandDispatcherMessage {
    pub store: Database,
    pub command: String,
    pub message: Message,
}

/// Broadcast on every pulse tick.
#[derive(Clone)]
pub struct PulseMessage {
    pub store: Database,
    pub chat_client: Arc<dyn ChatClient>,
}
