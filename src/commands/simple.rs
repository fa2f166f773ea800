use super::{report_failure, Command, CommandBase, CommandPlugin};
use crate::chat::{react_fail, react_success};
use crate::core::channels::{CommandDispatcherMessage, ExecContext, CUSTOM_COMMANDS};
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::{BusError, RegistryExt};
use crate::db::parse_timestamp;
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use serenity::model::channel::Message;
use serenity::model::id::UserId;
use std::sync::Arc;

const MAX_NAME_CHARS: usize = 50;
const MAX_RESPONSE_CHARS: usize = 1000;
const VALID_SUBCOMMANDS: &str = "`add`, `rm`, `info`, `list`";

/// Custom commands with static responses, plus the fallback for anything
/// the dispatcher could not route.
pub struct SimpleCommand {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(SimpleCommand {
        base: CommandBase::new(options),
    })
}

/// Why a new custom command was refused.
pub fn validate(name: Option<&str>, response: &str) -> Result<(), &'static str> {
    let Some(name) = name else {
        return Err("Provide a command name.");
    };
    if response.is_empty() {
        return Err("Provide a response.");
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err("The length of the command can't exceed 50 characters.");
    }
    if response.chars().count() > MAX_RESPONSE_CHARS {
        return Err("The length of the response can't exceed 1000 characters.");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("The command name can only contain letters and numbers");
    }
    Ok(())
}

impl SimpleCommand {
    async fn add(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let name = ctx.args.get(1).map(String::as_str);
        let response = ctx.args.get(2..).unwrap_or_default().join(" ");

        if let Err(reason) = validate(name, &response) {
            react_fail(client, ctx.msg.channel_id, ctx.msg.id, Some(reason)).await;
            return Ok(());
        }
        // The dispatcher looks commands up lower-cased.
        let name = name.unwrap_or_default().to_lowercase();

        let author = ctx.msg.author.id.to_string();
        let stored = {
            let name = name.clone();
            ctx.store
                .run_blocking(move |db| db.create_simple_command(&name, &response, &author))
                .await
        };

        match stored {
            Ok(true) => react_success(client, ctx.msg.channel_id, ctx.msg.id, None).await,
            Ok(false) => {
                let reply = format!("The command \"{}\" is already taken!", name);
                react_fail(client, ctx.msg.channel_id, ctx.msg.id, Some(&reply)).await;
            }
            Err(e) => {
                tracing::error!("Failed to store custom command {}: {:#}", name, e);
                react_fail(
                    client,
                    ctx.msg.channel_id,
                    ctx.msg.id,
                    Some("Some unknown error occured."),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn remove(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let Some(name) = ctx.args.get(1).map(|n| n.to_lowercase()) else {
            react_fail(
                client,
                ctx.msg.channel_id,
                ctx.msg.id,
                Some("Missing command to remove."),
            )
            .await;
            return Ok(());
        };

        let removed = {
            let name = name.clone();
            ctx.store
                .run_blocking(move |db| db.delete_simple_command(&name))
                .await?
        };

        if removed == 0 {
            let reply = format!("There doesn't seem to be a command called \"{}\".", name);
            react_fail(client, ctx.msg.channel_id, ctx.msg.id, Some(&reply)).await;
            return Ok(());
        }

        react_success(client, ctx.msg.channel_id, ctx.msg.id, None).await;
        Ok(())
    }

    async fn info(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let name = ctx.args.get(1).map(|n| n.to_lowercase()).unwrap_or_default();
        let record = {
            let name = name.clone();
            ctx.store
                .run_blocking(move |db| db.get_simple_command(&name))
                .await?
        };

        let Some(record) = record else {
            return client
                .send_message(ctx.msg.channel_id, "This command does not exist.")
                .await;
        };

        let created = parse_timestamp(&record.created_at)
            .map(|at| at.format("%b %-d, %Y %-I:%M %p UTC").to_string())
            .unwrap_or(record.created_at);
        let creator = match record.created_by_id.parse::<u64>() {
            Ok(id) if id != 0 => client.display_name(ctx.msg.guild_id, UserId::new(id)).await,
            _ => "Unknown".to_string(),
        };

        client
            .send_message(
                ctx.msg.channel_id,
                &format!("Command \"{}\" created at {} by {}.", name, created, creator),
            )
            .await
    }

    async fn list(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let all = ctx
            .store
            .run_blocking(|db| db.list_simple_commands())
            .await?;

        let text = if all.is_empty() {
            "No custom commands created.".to_string()
        } else {
            format!(
                "Currently saved commands: {}",
                all.iter()
                    .map(|cmd| format!("`{}`", cmd))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        self.base.client().send_message(ctx.msg.channel_id, &text).await
    }

    /// Answer a command no built-in handled.
    async fn fallback(&self, message: CommandDispatcherMessage) -> anyhow::Result<()> {
        let client = self.base.client();
        let channel_id = message.message.channel_id;
        let command = message.command.clone();
        let found = message
            .store
            .run_blocking(move |db| db.get_simple_command(&command))
            .await?;

        if let Some(record) = found {
            return client.send_message(channel_id, &record.response).await;
        }

        let custom = message
            .store
            .run_blocking(|db| db.list_simple_commands())
            .await?;
        let prefix = self.base.prefix();
        let listing = self
            .base
            .get_commands()
            .into_iter()
            .chain(custom)
            .map(|name| format!("`{prefix}{name}`"))
            .collect::<Vec<_>>()
            .join(", ");

        client
            .send_message(
                channel_id,
                &format!("Unrecognized command. Try one of these: {}.", listing),
            )
            .await
    }
}

#[async_trait]
impl Command for SimpleCommand {
    fn trigger(&self) -> &str {
        "command"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        match ctx.args.first().map(String::as_str) {
            None => {
                self.base
                    .client()
                    .send_message(
                        ctx.msg.channel_id,
                        &format!("Missing sub command, try: {}!", VALID_SUBCOMMANDS),
                    )
                    .await
            }
            Some("list") => self.list(&ctx).await,
            Some("info") => self.info(&ctx).await,
            Some("add") => self.add(&ctx).await,
            Some("rm") => self.remove(&ctx).await,
            Some(_) => {
                self.base
                    .client()
                    .send_message(
                        ctx.msg.channel_id,
                        &format!("Invalid subcommand. Try: {}", VALID_SUBCOMMANDS),
                    )
                    .await
            }
        }
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let t = self.trigger();
        let embed = build_help(
            HelpSpec {
                title: t,
                description: "Create and manage custom commands with simple, static responses.",
                commands: vec![
                    (
                        format!("{t} add <command> <some response text>"),
                        "Add a new command.".to_string(),
                    ),
                    (format!("{t} rm <command>"), "Remove a command.".to_string()),
                    (
                        format!("{t} info <command>"),
                        "Shows some basic information about the command.".to_string(),
                    ),
                    (format!("{t} list"), "List all saved commands.".to_string()),
                ],
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }

    fn on_wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let fallback = options.registry.register(&CUSTOM_COMMANDS)?;
        fallback.subscribe_async(move |message| {
            let this = self.clone();
            async move {
                let msg = message.message.clone();
                if let Err(e) = this.fallback(message).await {
                    report_failure(this.base.client(), &msg, "fallback", e).await;
                }
                Ok(())
            }
        });
        Ok(())
    }
}
