//! Synchronous multicast channels.
//!
//! A [`Subject`] delivers every message to all of its current subscribers, in
//! the order they subscribed. Nothing is buffered: a message emitted before a
//! subscriber attaches is never seen by it.

use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::error;

type Subscriber<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct Subject<T> {
    subscribers: Arc<Mutex<Vec<Subscriber<T>>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a synchronous handler.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.push(Arc::new(handler));
    }

    /// Attach an asynchronous handler.
    ///
    /// Each message spawns the handler's future on the current tokio runtime.
    /// The emitting call returns as soon as the task is spawned; a handler
    /// error is logged and otherwise dropped.
    pub fn subscribe_async<F, Fut>(&self, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(move |message| {
            let fut = handler(message);
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    error!("Channel handler failed: {:#}", e);
                }
            });
        });
    }

    /// Deliver `message` to every current subscriber.
    pub fn next(&self, message: T) {
        // Snapshot so handlers may subscribe while we are emitting.
        let subscribers: Vec<Subscriber<T>> = {
            let guard = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };

        let Some((last, rest)) = subscribers.split_last() else {
            return;
        };
        for subscriber in rest {
            subscriber(message.clone());
        }
        last(message);
    }

    /// Derive a subject carrying only the messages accepted by `filter`,
    /// mapped through it.
    pub fn filter_map<U, F>(&self, filter: F) -> Subject<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let derived = Subject::new();
        let sink = derived.clone();
        self.subscribe(move |message| {
            if let Some(mapped) = filter(message) {
                sink.next(mapped);
            }
        });
        derived
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|s| s.len())
            .unwrap_or_default()
    }
}
