use super::{Command, CommandBase, CommandPlugin};
use crate::chat::Embed;
use crate::core::channels::ExecContext;
use crate::core::plugin::{InitOptions, Plugin};
use crate::db::CounterRecord;
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use std::sync::Arc;

const SUBCOMMANDS: [&str; 6] = ["list", "inc", "dec", "set", "del", "delete"];

/// Named counters anyone can bump.
pub struct Counter {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Counter {
        base: CommandBase::new(options),
    })
}

pub fn list_embed(counters: &[CounterRecord]) -> Embed {
    let keys = counters.iter().map(|c| c.key.as_str()).collect::<Vec<_>>();
    let counts = counters.iter().map(|c| c.count.to_string()).collect::<Vec<_>>();
    Embed::new()
        .title("List of saved counters")
        .field("key", keys.join("\n"), true)
        .field("count", counts.join("\n"), true)
}

impl Counter {
    /// Add `delta` to the counter, creating it at zero first.
    async fn bump(&self, ctx: &ExecContext, key: String, delta: i64) -> anyhow::Result<i64> {
        ctx.store
            .run_blocking(move |db| {
                let count = db.get_counter(&key)?.unwrap_or(0).saturating_add(delta);
                db.set_counter(&key, count)?;
                Ok(count)
            })
            .await
    }

    async fn run(&self, ctx: &ExecContext, sub: &str, key: String) -> anyhow::Result<String> {
        let reply = match sub {
            "inc" => {
                let count = self.bump(ctx, key.clone(), 1).await?;
                format!("Counter for {} incremented to: {}", key, count)
            }
            "dec" => {
                let count = self.bump(ctx, key.clone(), -1).await?;
                format!("Counter for {} decremented to: {}", key, count)
            }
            "set" => {
                let Some(count) = ctx.args.get(2).and_then(|n| n.trim().parse::<i64>().ok())
                else {
                    return Ok("Provided count is not a valid number. :sob:".to_string());
                };
                let stored = key.clone();
                ctx.store
                    .run_blocking(move |db| db.set_counter(&stored, count))
                    .await?;
                format!("Counter for {} set to: {}", key, count)
            }
            _ => {
                let stored = key.clone();
                ctx.store
                    .run_blocking(move |db| db.delete_counter(&stored))
                    .await?;
                format!("Counter for {} deleted", key)
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl Command for Counter {
    fn trigger(&self) -> &str {
        "cnt"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let channel_id = ctx.msg.channel_id;

        let Some(sub) = ctx.args.first().map(String::as_str) else {
            return self.send_help(ctx.msg).await;
        };

        if !SUBCOMMANDS.contains(&sub) {
            if ctx.args.len() > 1 {
                return self.send_help(ctx.msg).await;
            }
            let key = sub.to_lowercase();
            let count = {
                let key = key.clone();
                ctx.store.run_blocking(move |db| db.get_counter(&key)).await?
            };
            let reply = match count {
                Some(count) => format!("Counter for {}: {}", key, count),
                None => format!("Counter for {} does not exist", key),
            };
            return client.send_message(channel_id, &reply).await;
        }

        if sub == "list" {
            let counters = ctx.store.run_blocking(|db| db.list_counters()).await?;
            if counters.is_empty() {
                return client.send_message(channel_id, "No counters saved yet.").await;
            }
            return client.send_embed(channel_id, list_embed(&counters)).await;
        }

        let Some(key) = ctx.args.get(1).map(|k| k.to_lowercase()) else {
            return self.send_help(ctx.msg).await;
        };
        let reply = self.run(&ctx, sub, key).await?;
        client.send_message(channel_id, &reply).await
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let t = self.trigger();
        let embed = build_help(
            HelpSpec {
                title: t,
                description: "Keeps track of count for given key.",
                commands: vec![
                    (format!("{t} <key>"), "Shows the count for given key.".to_string()),
                    (format!("{t} list"), "Lists all saved counters.".to_string()),
                    (
                        format!("{t} inc <key>"),
                        "Increments count for given key. Starts at 0 if given key doesn't already exist."
                            .to_string(),
                    ),
                    (
                        format!("{t} dec <key>"),
                        "Decrements count for given key. Starts at 0 if given key doesn't already exist."
                            .to_string(),
                    ),
                    (format!("{t} set <key> <count>"), "Sets count for given key.".to_string()),
                    (
                        format!("{t} del <key>"),
                        "Deletes saved counter for given key.".to_string(),
                    ),
                ],
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }
}
