use lru::LruCache;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, MessageId};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Bounded cache of recently seen messages across all channels.
#[derive(Clone)]
pub struct MessageCache {
    cache: Arc<Mutex<LruCache<MessageId, Message>>>,
}

impl MessageCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN.saturating_add(99));
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn insert(&self, message: Message) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(message.id, message);
    }

    /// Cached messages of one channel, oldest first.
    pub fn get_channel_history(&self, channel_id: ChannelId) -> Vec<Message> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let mut history: Vec<Message> = cache
            .iter()
            .filter(|(_, message)| message.channel_id == channel_id)
            .map(|(_, message)| message.clone())
            .collect();
        // Snowflakes grow with time.
        history.sort_by_key(|message| message.id);
        history
    }
}
