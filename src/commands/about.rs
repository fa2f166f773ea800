use super::{Command, CommandBase, CommandPlugin};
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use std::sync::Arc;

pub struct About {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(About {
        base: CommandBase::new(options),
    })
}

pub fn about_text() -> String {
    let authors = env!("CARGO_PKG_AUTHORS").replace(':', ", ");
    let mut text = format!(
        "Loot Lord v{}.\n\nDeveloped by _{}_.\n",
        env!("CARGO_PKG_VERSION"),
        authors
    );
    if let Some(repository) = option_env!("CARGO_PKG_REPOSITORY").filter(|r| !r.is_empty()) {
        text.push_str(&format!("Source code at {}\n", repository));
    }
    text
}

#[async_trait]
impl Command for About {
    fn trigger(&self) -> &str {
        "about"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        self.base
            .client()
            .send_message(ctx.msg.channel_id, &about_text())
            .await
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let embed = build_help(
            HelpSpec {
                title: self.trigger(),
                description: "Displays some info about the bot and it's authors.",
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_about_mentions_version() {
        let text = about_text();
        assert!(text.starts_with(&format!("Loot Lord v{}.", env!("CARGO_PKG_VERSION"))));
        assert!(text.contains("Source code at https://github.com/paskausks/loot-lord"));
    }
}
