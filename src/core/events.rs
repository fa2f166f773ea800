//! Typed event streams derived from the chat client's raw events.

use super::subject::Subject;
use crate::chat::ChatClient;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::sync::Arc;

/// A chat message that looks like a bot command.
#[derive(Debug, Clone)]
pub struct CommandMessage {
    pub message: Message,
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMessage {
    pub command: String,
    pub args: Vec<String>,
}

/// A reaction added to some message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub guild_id: Option<GuildId>,
    pub emoji: String,
}

/// Strip `prefix` and split the rest on single spaces.
///
/// The first token is the command, the remainder its arguments. Case is
/// preserved; the dispatcher lower-cases the command.
pub fn split_message(content: &str, prefix: &str) -> SplitMessage {
    let body = content.strip_prefix(prefix).unwrap_or(content);
    let mut tokens = body.split(' ').map(str::to_string);
    let command = tokens.next().unwrap_or_default();

    SplitMessage {
        command,
        args: tokens.collect(),
    }
}

fn is_command_candidate(message: &Message, prefix: &str) -> bool {
    message.content.starts_with(prefix)
        && message.content.len() > prefix.len()
        && !message.author.bot
}

/// The four event streams every plugin may subscribe to.
///
/// `command_message` is derived from `raw_message`, so feeding a raw message
/// is enough to drive the command pipeline.
#[derive(Clone)]
pub struct EventSource {
    pub ready: Subject<Arc<dyn ChatClient>>,
    pub raw_message: Subject<Message>,
    pub command_message: Subject<CommandMessage>,
    pub reaction_added: Subject<(ReactionEvent, UserId)>,
}

impl EventSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let raw_message: Subject<Message> = Subject::new();
        let command_message = raw_message.filter_map(move |message: Message| {
            if !is_command_candidate(&message, &prefix) {
                return None;
            }
            let SplitMessage { command, args } = split_message(&message.content, &prefix);
            Some(CommandMessage {
                message,
                command,
                args,
            })
        });

        Self {
            ready: Subject::new(),
            raw_message,
            command_message,
            reaction_added: Subject::new(),
        }
    }

    pub fn emit_ready(&self, client: Arc<dyn ChatClient>) {
        self.ready.next(client);
    }

    pub fn emit_message(&self, message: Message) {
        self.raw_message.next(message);
    }

    pub fn emit_reaction(&self, reaction: ReactionEvent, user_id: UserId) {
        self.reaction_added.next((reaction, user_id));
    }
}
