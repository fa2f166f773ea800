use super::{newest_regular_message, Command, CommandBase, CommandPlugin};
use crate::chat::react_fail;
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use std::sync::Arc;
use tracing::warn;

/// Reactions are slow to add, so words are kept short.
const MAX_CHARS: usize = 10;

const KEYCAPS: [&str; 10] = [
    "0️⃣", "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣",
];

/// Spells a word on the last regular message using reactions.
pub struct React {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(React {
        base: CommandBase::new(options),
    })
}

/// Reaction emoji for a character; digits become keycaps and letters
/// regional indicators. Anything else has none.
pub fn emoji_for(c: char) -> Option<String> {
    let c = c.to_ascii_lowercase();
    if let Some(digit) = c.to_digit(10) {
        return KEYCAPS.get(digit as usize).map(|k| k.to_string());
    }
    if c.is_ascii_lowercase() {
        let indicator = char::from_u32(0x1F1E6 + (c as u32 - 'a' as u32))?;
        return Some(indicator.to_string());
    }
    None
}

#[async_trait]
impl Command for React {
    fn trigger(&self) -> &str {
        "react"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let (channel_id, message_id) = (ctx.msg.channel_id, ctx.msg.id);

        if ctx.args.is_empty() {
            return self.send_help(ctx.msg).await;
        }

        let word = ctx.args.join(" ");
        let word = word.trim();
        if word.chars().count() > MAX_CHARS {
            let reply = format!("The input is longer than {} characters!", MAX_CHARS);
            react_fail(client, channel_id, message_id, Some(&reply)).await;
            return Ok(());
        }

        let Some(target) = newest_regular_message(client, channel_id, self.base.prefix()) else {
            react_fail(
                client,
                channel_id,
                message_id,
                Some("No messages have been cached which I can react to!"),
            )
            .await;
            return Ok(());
        };

        for emoji in word.chars().filter_map(emoji_for) {
            if let Err(e) = client.react(channel_id, target.id, &emoji).await {
                warn!("Failed to react with {} on {}: {}", emoji, target.id, e);
            }
        }
        Ok(())
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let embed = build_help(
            HelpSpec {
                title: self.trigger(),
                description: &format!(
                    "React to the last message (excluding bot command messages) with text. \
                     Limited to {} characters.",
                    MAX_CHARS
                ),
                commands: vec![(
                    format!("{} <text>", self.trigger()),
                    "Spell the text with reactions.".to_string(),
                )],
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }
}
