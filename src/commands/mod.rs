//! User-facing `!<trigger>` commands.
//!
//! A [`Command`] only implements behaviour; [`CommandPlugin`] turns it into a
//! [`Plugin`] by registering `commands/<trigger>` and `commands/<trigger>/help`
//! and subscribing the command's handlers to them.

use crate::chat::{react_fail, ChatClient};
use crate::core::channels::{command_exec, command_help, is_help_key, trigger_of_help_key};
use crate::core::channels::{ExecContext, LogLevel};
use crate::core::plugin::{InitOptions, Plugin, PluginBase, PluginConstructor};
use crate::core::registry::{BusError, Registry, RegistryExt};
use crate::config::Config;
use async_trait::async_trait;
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use tracing::{error, warn};

pub mod about;
pub mod ai;
pub mod counter;
pub mod friendly;
pub mod help;
pub mod quote;
pub mod react;
pub mod reminder;
pub mod roll;
pub mod simple;
pub mod uptime;

pub const HELP_NOT_AVAILABLE: &str = "Help not available!";
pub const UNKNOWN_ERROR: &str = "Some unknown error occured.";

/// Shared handles every command carries.
#[derive(Clone)]
pub struct CommandBase {
    plugin: PluginBase,
    client: Arc<dyn ChatClient>,
    prefix: String,
}

impl CommandBase {
    pub fn new(options: &InitOptions) -> Self {
        Self {
            plugin: PluginBase::new(options.registry.clone()),
            client: options.client.clone(),
            prefix: options.config.prefix.clone(),
        }
    }

    pub fn client(&self) -> &dyn ChatClient {
        self.client.as_ref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        self.plugin.registry()
    }

    /// Log through the logger channel, falling back to tracing directly.
    pub fn log(&self, message: impl Into<String>, level: LogLevel) {
        let message = message.into();
        if let Err(e) = self.plugin.log(message.clone(), level) {
            warn!("{} ({})", message, e);
        }
    }

    /// Triggers of every loaded command with a help channel, in load order.
    pub fn get_commands(&self) -> Vec<String> {
        self.registry()
            .lookup_keys(is_help_key)
            .iter()
            .filter_map(|key| trigger_of_help_key(key))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
pub trait Command: Send + Sync + 'static {
    fn trigger(&self) -> &str;

    fn base(&self) -> &CommandBase;

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()>;

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        self.base()
            .client()
            .send_message(msg.channel_id, HELP_NOT_AVAILABLE)
            .await
    }

    /// Extra subscriptions beyond the two command channels.
    fn on_wire(self: Arc<Self>, _options: &InitOptions) -> Result<(), BusError> {
        Ok(())
    }
}

/// Adapter exposing a [`Command`] as a plugin.
pub struct CommandPlugin<C> {
    command: Arc<C>,
}

impl<C: Command> CommandPlugin<C> {
    pub fn new(command: C) -> Self {
        Self {
            command: Arc::new(command),
        }
    }

    pub fn boxed(command: C) -> Option<Arc<dyn Plugin>> {
        Some(Arc::new(Self::new(command)))
    }
}

impl<C: Command> Plugin for CommandPlugin<C> {
    fn name(&self) -> &str {
        self.command.trigger()
    }

    fn wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let trigger = self.command.trigger();

        let exec = options.registry.register(&command_exec(trigger))?;
        let command = self.command.clone();
        exec.subscribe_async(move |ctx: ExecContext| {
            let command = command.clone();
            async move {
                let msg = ctx.msg.clone();
                if let Err(e) = command.exec(ctx).await {
                    report_failure(command.base().client(), &msg, command.trigger(), e).await;
                }
                Ok(())
            }
        });

        let help = options.registry.register(&command_help(trigger))?;
        let command = self.command.clone();
        help.subscribe_async(move |msg| {
            let command = command.clone();
            async move { command.send_help(msg).await }
        });

        self.command.clone().on_wire(options)
    }
}

/// Every built-in command, in default load order.
pub const BUILTIN_COMMANDS: [(&str, PluginConstructor); 11] = [
    ("help", help::create),
    ("about", about::create),
    ("uptime", uptime::create),
    ("roll", roll::create),
    ("command", simple::create),
    ("reminder", reminder::create),
    ("quote", quote::create),
    ("cnt", counter::create),
    ("friendly", friendly::create),
    ("react", react::create),
    ("ai", ai::create),
];

/// Constructors for the commands named in the configuration.
pub fn select(config: &Config) -> anyhow::Result<Vec<PluginConstructor>> {
    let Some(names) = &config.plugins else {
        return Ok(BUILTIN_COMMANDS.iter().map(|(_, create)| *create).collect());
    };

    names
        .iter()
        .map(|name| {
            BUILTIN_COMMANDS
                .iter()
                .find(|(trigger, _)| *trigger == name.as_str())
                .map(|(_, create)| *create)
                .ok_or_else(|| anyhow::anyhow!("Unknown command plugin \"{}\"", name))
        })
        .collect()
}

/// Newest cached message in the channel that is neither a command nor from
/// a bot.
pub(crate) fn newest_regular_message(
    client: &dyn ChatClient,
    channel_id: ChannelId,
    prefix: &str,
) -> Option<Message> {
    client
        .recent_messages(channel_id)
        .into_iter()
        .rev()
        .find(|m| !m.author.bot && !m.content.starts_with(prefix))
}

/// Leading integer of `arg`, ignoring trailing garbage (`"12abc"` is 12).
pub(crate) fn parse_int(arg: &str) -> Option<i64> {
    let trimmed = arg.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Log a failed command and answer its message with a failure reaction.
pub(crate) async fn report_failure(
    client: &dyn ChatClient,
    msg: &Message,
    trigger: &str,
    error: anyhow::Error,
) {
    error!("Command {} failed on message {}: {:#}", trigger, msg.id, error);
    react_fail(client, msg.channel_id, msg.id, Some(UNKNOWN_ERROR)).await;
}
