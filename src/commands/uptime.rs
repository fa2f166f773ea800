use super::{Command, CommandBase, CommandPlugin};
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Uptime {
    base: CommandBase,
    started: Instant,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Uptime {
        base: CommandBase::new(options),
        started: Instant::now(),
    })
}

/// Whole seconds only; humantime otherwise prints down to nanoseconds.
pub fn uptime_text(elapsed: Duration) -> String {
    let rounded = Duration::from_secs(elapsed.as_secs());
    let human = if rounded.is_zero() {
        "0s".to_string()
    } else {
        humantime::format_duration(rounded).to_string()
    };
    format!(
        "The bot has been running for {} on {} {}.",
        human,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[async_trait]
impl Command for Uptime {
    fn trigger(&self) -> &str {
        "uptime"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        self.base
            .client()
            .send_message(ctx.msg.channel_id, &uptime_text(self.started.elapsed()))
            .await
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let embed = build_help(
            HelpSpec {
                title: self.trigger(),
                description: "Shows how long the bot has been running uninterrupted.",
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }
}
