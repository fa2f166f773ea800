use crate::core::channels::{LogLevel, LogMessage, LOGGER};
use crate::core::events::CommandMessage;
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::{BusError, RegistryExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Observability for connects and commands, plus the shared `logger` channel.
pub struct Logger;

impl Logger {
    pub fn create(_options: &InitOptions) -> Option<Arc<dyn Plugin>> {
        Some(Arc::new(Logger))
    }

    fn emit(message: &LogMessage) {
        match message.level {
            LogLevel::Debug => debug!("{}", message.message),
            LogLevel::Info => info!("{}", message.message),
            LogLevel::Success => info!(success = true, "{}", message.message),
            LogLevel::Warn => warn!("{}", message.message),
            LogLevel::Error => error!("{}", message.message),
        }
    }
}

/// One-line summary of a received command.
pub fn describe_command(cmd: &CommandMessage) -> String {
    let command_info = format!("{} {}", cmd.command, cmd.args.join(" "))
        .trim()
        .to_string();
    let origin = match cmd.message.guild_id {
        Some(guild_id) => format!("on guild {}, channel {}", guild_id, cmd.message.channel_id),
        None => "via direct message".to_string(),
    };

    format!(
        "Rcvd cmd \"{}\" from {} {}.",
        command_info,
        cmd.message.author.tag(),
        origin
    )
}

impl Plugin for Logger {
    fn name(&self) -> &str {
        "logger"
    }

    fn wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let subject = options.registry.register(&LOGGER)?;
        subject.subscribe(|message| Logger::emit(&message));

        options.events.ready.subscribe(|client| {
            let tag = client
                .current_user_tag()
                .unwrap_or_else(|| "unknown user".to_string());
            info!("Logged in as {}!", tag);
        });

        options
            .events
            .command_message
            .subscribe(|cmd| info!("{}", describe_command(&cmd)));

        Ok(())
    }
}
