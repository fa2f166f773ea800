//! Test doubles shared by the module tests.

use crate::chat::{ChatClient, Embed};
use crate::config::Config;
use crate::core::events::EventSource;
use crate::core::plugin::InitOptions;
use crate::core::registry::PluginRegistry;
use crate::db::Database;
use async_trait::async_trait;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use serenity::model::user::User;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(u64, String),
    Embed(u64, Embed),
    Reply(u64, u64, String),
    React(u64, u64, String),
    Direct(u64, String, Option<Embed>),
}

/// In-memory [`ChatClient`] that records everything sent through it.
#[derive(Clone, Default)]
pub struct RecordingChat {
    actions: Arc<Mutex<Vec<Action>>>,
    history: Arc<Mutex<HashMap<u64, Vec<Message>>>>,
    names: Arc<Mutex<HashMap<u64, String>>>,
    bot_id: Option<u64>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot_id(mut self, id: u64) -> Self {
        self.bot_id = Some(id);
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    /// Poll until at least `count` actions were recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<Action> {
        for _ in 0..400 {
            let actions = self.actions();
            if actions.len() >= count {
                return actions;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.actions()
    }

    pub fn push_history(&self, message: Message) {
        self.history
            .lock()
            .unwrap()
            .entry(message.channel_id.get())
            .or_default()
            .push(message);
    }

    pub fn set_name(&self, user_id: u64, name: &str) {
        self.names.lock().unwrap().insert(user_id, name.to_string());
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_message(&self, channel_id: ChannelId, content: &str) -> anyhow::Result<()> {
        self.record(Action::Send(channel_id.get(), content.to_string()));
        Ok(())
    }

    async fn send_embed(&self, channel_id: ChannelId, embed: Embed) -> anyhow::Result<()> {
        self.record(Action::Embed(channel_id.get(), embed));
        Ok(())
    }

    async fn reply(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> anyhow::Result<()> {
        self.record(Action::Reply(
            channel_id.get(),
            message_id.get(),
            content.to_string(),
        ));
        Ok(())
    }

    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> anyhow::Result<()> {
        self.record(Action::React(
            channel_id.get(),
            message_id.get(),
            emoji.to_string(),
        ));
        Ok(())
    }

    async fn direct_message(
        &self,
        user_id: UserId,
        content: &str,
        embed: Option<Embed>,
    ) -> anyhow::Result<()> {
        self.record(Action::Direct(user_id.get(), content.to_string(), embed));
        Ok(())
    }

    async fn display_name(&self, _guild_id: Option<GuildId>, user_id: UserId) -> String {
        self.names
            .lock()
            .unwrap()
            .get(&user_id.get())
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn recent_messages(&self, channel_id: ChannelId) -> Vec<Message> {
        self.history
            .lock()
            .unwrap()
            .get(&channel_id.get())
            .cloned()
            .unwrap_or_default()
    }

    fn current_user_id(&self) -> Option<UserId> {
        self.bot_id.map(UserId::new)
    }

    fn current_user_tag(&self) -> Option<String> {
        self.bot_id.map(|_| "lootlord#0001".to_string())
    }
}

pub fn mock_user(id: u64, name: &str, bot: bool) -> User {
    let mut user = User::default();
    user.id = UserId::new(id);
    user.name = name.to_string();
    user.bot = bot;
    user
}

pub fn mock_message(id: u64, channel_id: u64, author: User, content: &str) -> Message {
    let mut msg = Message::default();
    msg.id = MessageId::new(id);
    msg.channel_id = ChannelId::new(channel_id);
    msg.author = author;
    msg.content = content.to_string();
    msg
}

pub fn test_db() -> Database {
    let db = Database::new(":memory:").unwrap();
    db.execute_init().unwrap();
    db
}

/// Fresh plugin dependencies with prefix `!`, an in-memory store and a
/// recording chat client whose bot id is 999.
pub fn test_options() -> (InitOptions, RecordingChat) {
    test_options_with(Config::for_tests("!"))
}

pub fn test_options_with(config: Config) -> (InitOptions, RecordingChat) {
    let chat = RecordingChat::new().with_bot_id(999);
    let options = InitOptions {
        events: EventSource::new(config.prefix.clone()),
        config: Arc::new(config),
        store: test_db(),
        client: Arc::new(chat.clone()),
        registry: Arc::new(PluginRegistry::new()),
    };
    (options, chat)
}
