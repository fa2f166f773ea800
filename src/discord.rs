//! Serenity-backed chat transport.
//!
//! [`SerenityClient`] is the outbound [`ChatClient`]; [`Handler`] turns
//! gateway events into the [`EventSource`] streams plugins subscribe to.

use crate::cache::MessageCache;
use crate::chat::{ChatClient, Embed};
use crate::core::events::{EventSource, ReactionEvent};
use async_trait::async_trait;
use serenity::all::{
    ChannelId, Context, CreateEmbed, CreateMessage, EventHandler, GatewayIntents, GuildId, Http,
    Message, MessageId, Reaction, ReactionType, Ready, UserId,
};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Gateway events the bot listens to.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
}

struct Identity {
    id: UserId,
    tag: String,
}

pub struct SerenityClient {
    http: Arc<Http>,
    cache: MessageCache,
    identity: OnceLock<Identity>,
}

impl SerenityClient {
    pub fn new(token: &str, cache: MessageCache) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            cache,
            identity: OnceLock::new(),
        }
    }

    fn http(&self) -> &Http {
        &self.http
    }

    /// Remember who the bot is. Only the first ready event counts.
    fn set_identity(&self, id: UserId, tag: String) {
        let _ = self.identity.set(Identity { id, tag });
    }
}

fn create_embed(embed: Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();
    if let Some(title) = embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = embed.description {
        builder = builder.description(description);
    }
    if let Some(color) = embed.color {
        builder = builder.colour(color);
    }
    builder.fields(
        embed
            .fields
            .into_iter()
            .map(|field| (field.name, field.value, field.inline)),
    )
}

#[async_trait]
impl ChatClient for SerenityClient {
    async fn send_message(&self, channel_id: ChannelId, content: &str) -> anyhow::Result<()> {
        channel_id.say(self.http(), content).await?;
        Ok(())
    }

    async fn send_embed(&self, channel_id: ChannelId, embed: Embed) -> anyhow::Result<()> {
        channel_id
            .send_message(self.http(), CreateMessage::new().embed(create_embed(embed)))
            .await?;
        Ok(())
    }

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> anyhow::Result<()> {
        let builder = CreateMessage::new()
            .content(content)
            .reference_message((channel_id, message_id));
        channel_id.send_message(self.http(), builder).await?;
        Ok(())
    }

    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> anyhow::Result<()> {
        channel_id
            .create_reaction(
                self.http(),
                message_id,
                ReactionType::Unicode(emoji.to_string()),
            )
            .await?;
        Ok(())
    }

    async fn direct_message(
        &self,
        user_id: UserId,
        content: &str,
        embed: Option<Embed>,
    ) -> anyhow::Result<()> {
        let channel = user_id.create_dm_channel(self.http()).await?;
        let mut builder = CreateMessage::new().content(content);
        if let Some(embed) = embed {
            builder = builder.embed(create_embed(embed));
        }
        channel.id.send_message(self.http(), builder).await?;
        Ok(())
    }

    async fn display_name(&self, guild_id: Option<GuildId>, user_id: UserId) -> String {
        if let Some(guild_id) = guild_id {
            match guild_id.member(self.http(), user_id).await {
                Ok(member) => return member.display_name().to_string(),
                Err(e) => debug!("No member {} in guild {}: {}", user_id, guild_id, e),
            }
        }
        match user_id.to_user(self.http()).await {
            Ok(user) => user.display_name().to_string(),
            Err(e) => {
                debug!("Could not fetch user {}: {}", user_id, e);
                "Unknown".to_string()
            }
        }
    }

    fn recent_messages(&self, channel_id: ChannelId) -> Vec<Message> {
        self.cache.get_channel_history(channel_id)
    }

    fn current_user_id(&self) -> Option<UserId> {
        self.identity.get().map(|identity| identity.id)
    }

    fn current_user_tag(&self) -> Option<String> {
        self.identity.get().map(|identity| identity.tag.clone())
    }
}

/// Feeds gateway events into the bus.
pub struct Handler {
    client: Arc<SerenityClient>,
    cache: MessageCache,
    events: EventSource,
}

impl Handler {
    pub fn new(client: Arc<SerenityClient>, cache: MessageCache, events: EventSource) -> Self {
        Self {
            client,
            cache,
            events,
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.client.set_identity(ready.user.id, ready.user.tag());
        self.events.emit_ready(self.client.clone());
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        self.cache.insert(msg.clone());
        self.events.emit_message(msg);
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        let Some(user_id) = reaction.user_id else {
            return;
        };
        let event = ReactionEvent {
            channel_id: reaction.channel_id,
            message_id: reaction.message_id,
            guild_id: reaction.guild_id,
            emoji: reaction.emoji.to_string(),
        };
        self.events.emit_reaction(event, user_id);
    }
}
