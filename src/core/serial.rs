//! Per-key sequential execution.
//!
//! Work pushed under the same key runs one item at a time in FIFO order;
//! different keys proceed independently. A key's worker task lives only while
//! its lane has work and removes the lane once it drains.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::debug;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;
type Lanes<K> = Arc<Mutex<HashMap<K, UnboundedSender<Job>>>>;

pub struct SerialQueue<K> {
    lanes: Lanes<K>,
}

impl<K> Default for SerialQueue<K> {
    fn default() -> Self {
        Self {
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> SerialQueue<K>
where
    K: Eq + Hash + Clone + std::fmt::Display + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` behind any unfinished work for `key`.
    pub fn push<F>(&self, key: K, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner());
        let mut job: Job = Box::pin(job);

        if let Some(lane) = lanes.get(&key) {
            match lane.send(job) {
                Ok(()) => return,
                // Worker is gone (a job panicked); start a new lane.
                Err(SendError(returned)) => job = returned,
            }
        }

        debug!("Serial queue: starting lane {}", key);
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        // Receiver is alive, so this cannot fail.
        let _ = tx.send(job);
        lanes.insert(key.clone(), tx);
        tokio::spawn(drain(self.lanes.clone(), key, rx));
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.lock().map(|l| l.len()).unwrap_or_default()
    }
}

/// Run a lane's jobs until it is empty, then retire it.
///
/// The emptiness check and the removal happen under the lanes lock, which
/// `push` also holds while sending, so no job is stranded in a retired lane.
async fn drain<K>(lanes: Lanes<K>, key: K, mut rx: UnboundedReceiver<Job>)
where
    K: Eq + Hash + std::fmt::Display,
{
    loop {
        let next = {
            let mut lanes = lanes.lock().unwrap_or_else(|e| e.into_inner());
            match rx.try_recv() {
                Ok(job) => Some(job),
                Err(_) => {
                    lanes.remove(&key);
                    None
                }
            }
        };
        let Some(job) = next else {
            debug!("Serial queue: lane {} drained", key);
            return;
        };
        job.await;
    }
}
