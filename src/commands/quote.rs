use super::{newest_regular_message, Command, CommandBase, CommandPlugin};
use crate::chat::{react_fail, react_success, Embed};
use crate::core::channels::{ExecContext, LogLevel};
use crate::core::events::ReactionEvent;
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::BusError;
use crate::db::{parse_timestamp, Database, NewQuote};
use crate::help::{build_help, HelpSpec};
use async_trait::async_trait;
use chrono::Datelike;
use serenity::model::channel::Message;
use serenity::model::id::UserId;
use std::sync::Arc;
use tracing::debug;

pub const VOTE_EMOJI: &str = "👍";

/// Quotes nominated from chat and accepted by a vote reaction.
pub struct Quote {
    base: CommandBase,
}

pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
    CommandPlugin::boxed(Quote {
        base: CommandBase::new(options),
    })
}

impl Quote {
    async fn random(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let quote = ctx.store.run_blocking(|db| db.random_quote()).await?;

        let Some(quote) = quote else {
            react_fail(
                client,
                ctx.msg.channel_id,
                ctx.msg.id,
                Some("No quotes found in the database!"),
            )
            .await;
            return Ok(());
        };

        let author = match quote.author_id.parse::<u64>() {
            Ok(id) if id != 0 => client.display_name(ctx.msg.guild_id, UserId::new(id)).await,
            _ => "Unknown".to_string(),
        };
        let year = parse_timestamp(&quote.created_at)
            .map(|at| at.year().to_string())
            .unwrap_or_default();

        let embed = Embed::new().description(format!(
            "{}\n\n- _[{}]({}), {}_\n\n",
            quote.message, author, quote.message_url, year
        ));
        client.send_embed(ctx.msg.channel_id, embed).await
    }

    async fn nominate(&self, ctx: &ExecContext) -> anyhow::Result<()> {
        let client = self.base.client();
        let (channel_id, message_id) = (ctx.msg.channel_id, ctx.msg.id);

        let Some(target) = newest_regular_message(client, channel_id, self.base.prefix()) else {
            react_fail(
                client,
                channel_id,
                message_id,
                Some("I don't have any messages cached which you can nominate!"),
            )
            .await;
            return Ok(());
        };

        if target.author.id == ctx.msg.author.id {
            react_fail(
                client,
                channel_id,
                message_id,
                Some("You can't nominate your own messages!"),
            )
            .await;
            return Ok(());
        }

        let target_id = target.id.to_string();
        let seen = {
            let target_id = target_id.clone();
            ctx.store
                .run_blocking(move |db| db.quote_exists(&target_id))
                .await?
        };
        if seen {
            react_fail(client, channel_id, message_id, Some("Message already seen!")).await;
            return Ok(());
        }

        let quote = NewQuote {
            author_id: target.author.id.to_string(),
            nominee_id: ctx.msg.author.id.to_string(),
            message_id: target_id,
            message: target.content.clone(),
            message_url: target.link(),
        };
        ctx.store
            .run_blocking(move |db| db.create_quote(&quote))
            .await?;

        let author = client.display_name(ctx.msg.guild_id, target.author.id).await;
        let reply = format!(
            "Message by {} nominated! React with {} on it to add as a quote!",
            author, VOTE_EMOJI
        );
        react_success(client, channel_id, message_id, Some(&reply)).await;
        Ok(())
    }

    /// Accept a pending nomination voted on by someone other than its author.
    pub async fn handle_reaction(
        &self,
        store: &Database,
        reaction: ReactionEvent,
        user_id: UserId,
    ) -> anyhow::Result<()> {
        if reaction.emoji != VOTE_EMOJI {
            return Ok(());
        }

        let message_id = reaction.message_id.to_string();
        let author = {
            let message_id = message_id.clone();
            store
                .run_blocking(move |db| db.pending_quote_author(&message_id))
                .await?
        };
        match author {
            Some(author) if author != user_id.to_string() => {}
            _ => return Ok(()),
        }

        let accepted = store
            .run_blocking(move |db| db.accept_quote(&message_id))
            .await?;
        if accepted {
            debug!("Quote {} accepted by {}", reaction.message_id, user_id);
            react_success(
                self.base.client(),
                reaction.channel_id,
                reaction.message_id,
                Some("Message added to quotes!"),
            )
            .await;
        }
        Ok(())
    }

    /// Drop nominations nobody voted for before the last restart.
    pub async fn clean_up(&self, store: &Database) -> anyhow::Result<()> {
        let removed = store.run_blocking(|db| db.delete_pending_quotes()).await?;
        if removed > 0 {
            self.base
                .log(format!("Removed {} non-accepted quotes!", removed), LogLevel::Info);
        }
        Ok(())
    }
}

#[async_trait]
impl Command for Quote {
    fn trigger(&self) -> &str {
        "quote"
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    async fn exec(&self, ctx: ExecContext) -> anyhow::Result<()> {
        match ctx.args.first().map(String::as_str) {
            Some("random") => self.random(&ctx).await,
            Some("nominate") => self.nominate(&ctx).await,
            _ => self.send_help(ctx.msg).await,
        }
    }

    async fn send_help(&self, msg: Message) -> anyhow::Result<()> {
        let t = self.trigger();
        let embed = build_help(
            HelpSpec {
                title: t,
                description: "Manage quotes.",
                commands: vec![
                    (format!("{t} random"), "Get a random quote.".to_string()),
                    (
                        format!("{t} nominate"),
                        format!(
                            "Nominate the previous message as a quote. If someone reacts with \
                             {VOTE_EMOJI} on the nominated message, it'll be added to the \
                             database. You can only nominate messages which don't come from \
                             the bot and aren't bot commands. You can't nominate your own \
                             messages. Reacting to your own messages won't count."
                        ),
                    ),
                ],
                ..Default::default()
            },
            self.base.prefix(),
        );
        self.base.client().send_embed(msg.channel_id, embed).await
    }

    fn on_wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let this = self.clone();
        let store = options.store.clone();
        options
            .events
            .reaction_added
            .subscribe_async(move |(reaction, user_id)| {
                let this = this.clone();
                let store = store.clone();
                async move { this.handle_reaction(&store, reaction, user_id).await }
            });

        let store = options.store.clone();
        options.events.ready.subscribe_async(move |_client| {
            let this = self.clone();
            let store = store.clone();
            async move { this.clean_up(&store).await }
        });
        Ok(())
    }
}
