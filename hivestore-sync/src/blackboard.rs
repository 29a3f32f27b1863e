//! The shared key/value blackboard.
//!
//! The blackboard is the only medium the sync protocol has: a key/value
//! area visible to all cooperating processes, used purely for signaling
//! (liveness flags) and mailboxes (serialized change-record queues). The
//! trait deliberately offers no atomic read-and-clear — receivers drain
//! with separate get and remove calls, and the resulting cross-process
//! race is a documented property of the protocol.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// A value stored under a blackboard key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlackboardValue {
    /// A peer liveness flag.
    Flag(bool),
    /// An append-ordered mailbox of serialized change records.
    Queue(Vec<Vec<u8>>),
}

/// A shared key/value area visible to all cooperating processes.
///
/// Implementations guard all value mutation with a single intra-process
/// lock; cross-process mutual exclusion is NOT provided.
pub trait Blackboard: Send + Sync {
    /// Reads the value under `key`.
    fn get(&self, key: &str) -> Option<BlackboardValue>;

    /// Writes the value under `key`.
    fn set(&self, key: &str, value: BlackboardValue);

    /// Removes `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str);

    /// Appends an entry to the queue under `key`, creating it if absent.
    /// The read-modify-write happens under the implementation's lock.
    fn append(&self, key: &str, entry: Vec<u8>);

    /// Subscribes to change signals for `key`. Every mutation of the key
    /// through this instance sends the key on the returned channel;
    /// mutations made by other processes are surfaced however the
    /// implementation observes them.
    fn subscribe(&self, key: &str) -> mpsc::UnboundedReceiver<String>;
}

pub(crate) type Watchers = HashMap<String, Vec<mpsc::UnboundedSender<String>>>;

pub(crate) fn notify(watchers: &mut Watchers, key: &str) {
    if let Some(senders) = watchers.get_mut(key) {
        senders.retain(|tx| tx.send(key.to_string()).is_ok());
    }
}

/// An in-process blackboard.
///
/// Shared between several channels in one process it stands in for the
/// cross-process medium, which makes it the workhorse of the test suite.
#[derive(Default)]
pub struct MemoryBlackboard {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, BlackboardValue>,
    watchers: Watchers,
}

impl MemoryBlackboard {
    /// Creates an empty blackboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently present.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().values.len()
    }

    /// Whether the blackboard holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Blackboard for MemoryBlackboard {
    fn get(&self, key: &str) -> Option<BlackboardValue> {
        self.inner.lock().unwrap().values.get(key).cloned()
    }

    fn set(&self, key: &str, value: BlackboardValue) {
        let mut inner = self.inner.lock().unwrap();
        inner.values.insert(key.to_string(), value);
        notify(&mut inner.watchers, key);
    }

    fn remove(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.values.remove(key).is_some() {
            notify(&mut inner.watchers, key);
        }
    }

    fn append(&self, key: &str, entry: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .values
            .entry(key.to_string())
            .or_insert_with(|| BlackboardValue::Queue(Vec::new()))
        {
            BlackboardValue::Queue(entries) => entries.push(entry),
            other => {
                warn!("blackboard key {key:?} held a flag; replacing with a queue");
                *other = BlackboardValue::Queue(vec![entry]);
            }
        }
        notify(&mut inner.watchers, key);
    }

    fn subscribe(&self, key: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .unwrap()
            .watchers
            .entry(key.to_string())
            .or_default()
            .push(tx);
        rx
    }
}
