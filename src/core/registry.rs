//! The plugin registry: a string-keyed namespace of [`Subject`]s.
//!
//! The [`Registry`] trait is the object-safe storage seam, so plugins hold an
//! `Arc<dyn Registry>` and tests can swap in their own. Typed access goes
//! through [`ChannelKey`] and the [`RegistryExt`] helpers, which downcast the
//! stored channel to the payload type named by the key.

use super::subject::Subject;
use std::any::Any;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

pub type ErasedChannel = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("Plugin channel with key {0} is already registered!")]
    DuplicateChannel(String),
    #[error("Plugin channel with key {0} not found!")]
    ChannelNotFound(String),
    #[error("Plugin channel with key {0} carries a different message type!")]
    ChannelTypeMismatch(String),
}

/// Storage behind the bus.
pub trait Registry: Send + Sync {
    /// Insert a channel. Fails if `key` is taken; the existing entry is kept.
    fn insert(&self, key: &str, channel: ErasedChannel) -> Result<(), BusError>;

    fn get(&self, key: &str) -> Option<ErasedChannel>;

    /// All keys, in registration order.
    fn keys(&self) -> Vec<String>;
}

/// Default in-process registry.
#[derive(Default)]
pub struct PluginRegistry {
    channels: RwLock<Vec<(String, ErasedChannel)>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for PluginRegistry {
    fn insert(&self, key: &str, channel: ErasedChannel) -> Result<(), BusError> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        if channels.iter().any(|(existing, _)| existing == key) {
            return Err(BusError::DuplicateChannel(key.to_string()));
        }
        debug!("Registry: registered channel {}", key);
        channels.push((key.to_string(), channel));
        Ok(())
    }

    fn get(&self, key: &str) -> Option<ErasedChannel> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        channels
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, channel)| channel.clone())
    }

    fn keys(&self) -> Vec<String> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        channels.iter().map(|(key, _)| key.clone()).collect()
    }
}

/// A registry key bound to the payload type its channel carries.
pub struct ChannelKey<T> {
    name: Cow<'static, str>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> ChannelKey<T> {
    pub const fn fixed(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _payload: PhantomData,
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for ChannelKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for ChannelKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChannelKey").field(&self.name).finish()
    }
}

impl<T> std::fmt::Display for ChannelKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Typed operations over any [`Registry`].
pub trait RegistryExt: Registry {
    /// Create and register a fresh channel under `key`.
    fn register<T>(&self, key: &ChannelKey<T>) -> Result<Subject<T>, BusError>
    where
        T: Clone + Send + 'static,
    {
        let subject = Subject::<T>::new();
        self.insert(key.name(), Arc::new(subject.clone()))?;
        Ok(subject)
    }

    /// Look up the channel registered under `key`.
    fn subject<T>(&self, key: &ChannelKey<T>) -> Result<Subject<T>, BusError>
    where
        T: Clone + Send + 'static,
    {
        let erased = self
            .get(key.name())
            .ok_or_else(|| BusError::ChannelNotFound(key.name().to_string()))?;
        erased
            .downcast_ref::<Subject<T>>()
            .cloned()
            .ok_or_else(|| BusError::ChannelTypeMismatch(key.name().to_string()))
    }

    /// Deliver `message` synchronously to the subscribers of `key`.
    fn dispatch<T>(&self, key: &ChannelKey<T>, message: T) -> Result<(), BusError>
    where
        T: Clone + Send + 'static,
    {
        self.subject(key)?.next(message);
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Registered keys accepted by `predicate`, in registration order.
    fn lookup_keys<P>(&self, predicate: P) -> Vec<String>
    where
        P: Fn(&str) -> bool,
    {
        self.keys().into_iter().filter(|key| predicate(key)).collect()
    }
}

impl<R: Registry + ?Sized> RegistryExt for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const NUMBERS: ChannelKey<u32> = ChannelKey::fixed("numbers");

    #[test]
    fn test_register_and_dispatch() {
        let registry = PluginRegistry::new();
        let subject = registry.register(&NUMBERS).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subject.subscribe(move |n| sink.lock().unwrap().push(n));

        registry.dispatch(&NUMBERS, 5).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = PluginRegistry::new();
        let first = registry.register(&NUMBERS).unwrap();
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        first.subscribe(move |_| *counter.lock().unwrap() += 1);

        let err = registry.register(&NUMBERS).unwrap_err();
        assert_eq!(err, BusError::DuplicateChannel("numbers".to_string()));

        // Still routed to the original subject.
        registry.dispatch(&NUMBERS, 1).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_dispatch_to_missing_key_names_it() {
        let registry = PluginRegistry::new();
        let err = registry
            .dispatch(&ChannelKey::<u32>::new("commands/nope"), 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "Plugin channel with key commands/nope not found!");
    }

    #[test]
    fn test_dispatch_with_wrong_payload_type() {
        let registry = PluginRegistry::new();
        registry.register(&NUMBERS).unwrap();

        let err = registry
            .dispatch(&ChannelKey::<String>::fixed("numbers"), "x".to_string())
            .unwrap_err();
        assert_eq!(err, BusError::ChannelTypeMismatch("numbers".to_string()));
    }

    #[test]
    fn test_dispatch_delivers_exactly_once() {
        let registry = PluginRegistry::new();
        let key: ChannelKey<Vec<String>> = ChannelKey::new("payload");
        let subject = registry.register(&key).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        subject.subscribe(move |payload| sink.lock().unwrap().push(payload));

        let payload = vec!["a".to_string(), "b".to_string()];
        registry.dispatch(&key, payload.clone()).unwrap();

        assert_eq!(*received.lock().unwrap(), vec![payload]);
    }

    #[test]
    fn test_lookup_keys_preserves_registration_order() {
        let registry = PluginRegistry::new();
        for name in ["commands/foo", "logger", "commands/bar", "commands/baz"] {
            registry.register(&ChannelKey::<()>::new(name)).unwrap();
        }

        let keys = registry.lookup_keys(|key| key.starts_with("commands/"));

        assert_eq!(keys, vec!["commands/foo", "commands/bar", "commands/baz"]);
    }
}
