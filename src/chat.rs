//! Outbound side of the chat transport.
//!
//! Plugins talk to Discord only through [`ChatClient`]; the serenity-backed
//! implementation lives in [`crate::discord`].

use async_trait::async_trait;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use tracing::warn;

pub const SUCCESS_EMOJI: &str = "✅";
pub const FAIL_EMOJI: &str = "❌";

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Transport-neutral rich message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, channel_id: ChannelId, content: &str) -> anyhow::Result<()>;

    async fn send_embed(&self, channel_id: ChannelId, embed: Embed) -> anyhow::Result<()>;

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> anyhow::Result<()>;

    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> anyhow::Result<()>;

    async fn direct_message(
        &self,
        user_id: UserId,
        content: &str,
        embed: Option<Embed>,
    ) -> anyhow::Result<()>;

    /// Guild nickname when available, else the username, else `Unknown`.
    async fn display_name(&self, guild_id: Option<GuildId>, user_id: UserId) -> String;

    /// Recently seen messages in a channel, oldest first.
    fn recent_messages(&self, channel_id: ChannelId) -> Vec<Message>;

    fn current_user_id(&self) -> Option<UserId>;

    fn current_user_tag(&self) -> Option<String>;
}

/// React with the success emoji and optionally follow up with text.
///
/// Delivery is best-effort: failures are logged, not returned.
pub async fn react_success(
    client: &dyn ChatClient,
    channel_id: ChannelId,
    message_id: MessageId,
    reply: Option<&str>,
) {
    react_with(client, channel_id, message_id, SUCCESS_EMOJI, reply).await;
}

/// React with the failure emoji and optionally follow up with text.
pub async fn react_fail(
    client: &dyn ChatClient,
    channel_id: ChannelId,
    message_id: MessageId,
    reply: Option<&str>,
) {
    react_with(client, channel_id, message_id, FAIL_EMOJI, reply).await;
}

async fn react_with(
    client: &dyn ChatClient,
    channel_id: ChannelId,
    message_id: MessageId,
    emoji: &str,
    reply: Option<&str>,
) {
    if let Err(e) = client.react(channel_id, message_id, emoji).await {
        warn!("Failed to react to message {}: {}", message_id, e);
    }

    if let Some(text) = reply {
        if let Err(e) = client.send_message(channel_id, text).await {
            warn!("Failed to send reply in channel {}: {}", channel_id, e);
        }
    }
}

/// Split text into chunks that fit a single Discord message, preferring line
/// breaks as cut points.
pub fn split_for_discord(content: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in content.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if line.chars().count() > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if current.chars().count() + piece.chars().count() > limit && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current.push_str(&piece);
            }
            continue;
        }

        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
