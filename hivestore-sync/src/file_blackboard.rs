//! File-backed blackboard for real cross-process use.
//!
//! The whole key/value map lives as one JSON image on disk. Writes replace
//! the image atomically (temp file + rename); a polling watcher task diffs
//! the on-disk image against the last-seen one and signals subscribers of
//! every changed key. Cross-process mutual exclusion is NOT provided — two
//! processes writing in the same instant can lose one write, which is the
//! same documented limitation every blackboard here has.

use crate::blackboard::{notify, Blackboard, BlackboardValue, Watchers};
use crate::error::{SyncError, SyncResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Image = HashMap<String, BlackboardValue>;

/// A blackboard persisted as a single JSON file.
pub struct FileBlackboard {
    path: PathBuf,
    state: Mutex<FileState>,
}

struct FileState {
    /// Last image this instance has seen, for change detection.
    snapshot: Image,
    watchers: Watchers,
}

impl FileBlackboard {
    /// Opens the blackboard at `path`, creating an empty image if the file
    /// does not exist, and starts a watcher task polling every
    /// `poll_interval`. The watcher stops when the last handle is dropped.
    pub fn open(path: impl Into<PathBuf>, poll_interval: Duration) -> SyncResult<Arc<Self>> {
        let path = path.into();
        let snapshot = read_image(&path)?;
        let board = Arc::new(Self {
            path,
            state: Mutex::new(FileState {
                snapshot,
                watchers: Watchers::new(),
            }),
        });

        let weak = Arc::downgrade(&board);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(board) = weak.upgrade() else { break };
                board.poll();
            }
        });

        Ok(board)
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the on-disk image once and signals subscribers of every key
    /// whose value differs from the last-seen image. Runs on the watcher
    /// task; exposed for tests that want deterministic polling.
    pub fn poll(&self) {
        let image = match read_image(&self.path) {
            Ok(image) => image,
            Err(e) => {
                warn!("blackboard poll failed: {e}");
                return;
            }
        };

        let mut state = self.state.lock().unwrap();
        let changed: std::collections::HashSet<String> = state
            .snapshot
            .keys()
            .chain(image.keys())
            .filter(|key| state.snapshot.get(*key) != image.get(*key))
            .cloned()
            .collect();

        state.snapshot = image;
        for key in changed {
            debug!("blackboard key {key:?} changed externally");
            notify(&mut state.watchers, &key);
        }
    }

    /// Mutates the on-disk image under the state lock and signals local
    /// subscribers of `key`. The fresh image becomes the last-seen one so
    /// the watcher does not re-signal our own write.
    fn mutate(&self, key: &str, op: impl FnOnce(&mut Image) -> bool) {
        let mut state = self.state.lock().unwrap();
        let mut image = match read_image(&self.path) {
            Ok(image) => image,
            Err(e) => {
                warn!("blackboard read failed, starting from last snapshot: {e}");
                state.snapshot.clone()
            }
        };

        if !op(&mut image) {
            return;
        }
        if let Err(e) = write_image(&self.path, &image) {
            warn!("blackboard write failed: {e}");
            return;
        }
        state.snapshot = image;
        notify(&mut state.watchers, key);
    }
}

impl Blackboard for FileBlackboard {
    fn get(&self, key: &str) -> Option<BlackboardValue> {
        match read_image(&self.path) {
            Ok(image) => image.get(key).cloned(),
            Err(e) => {
                warn!("blackboard read failed: {e}");
                self.state.lock().unwrap().snapshot.get(key).cloned()
            }
        }
    }

    fn set(&self, key: &str, value: BlackboardValue) {
        self.mutate(key, |image| {
            image.insert(key.to_string(), value);
            true
        });
    }

    fn remove(&self, key: &str) {
        self.mutate(key, |image| image.remove(key).is_some());
    }

    fn append(&self, key: &str, entry: Vec<u8>) {
        self.mutate(key, |image| {
            match image
                .entry(key.to_string())
                .or_insert_with(|| BlackboardValue::Queue(Vec::new()))
            {
                BlackboardValue::Queue(entries) => entries.push(entry),
                other => {
                    warn!("blackboard key {key:?} held a flag; replacing with a queue");
                    *other = BlackboardValue::Queue(vec![entry]);
                }
            }
            true
        });
    }

    fn subscribe(&self, key: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .unwrap()
            .watchers
            .entry(key.to_string())
            .or_default()
            .push(tx);
        rx
    }
}

fn read_image(path: &Path) -> SyncResult<Image> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Blackboard(format!("corrupt image at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Image::new()),
        Err(e) => Err(SyncError::Blackboard(format!(
            "cannot read {}: {e}",
            path.display()
        ))),
    }
}

fn write_image(path: &Path, image: &Image) -> SyncResult<()> {
    let tmp = path.with_extension("tmp");
    let bytes = serde_json::to_vec(image)?;
    std::fs::write(&tmp, bytes)
        .map_err(|e| SyncError::Blackboard(format!("cannot write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| SyncError::Blackboard(format!("cannot replace {}: {e}", path.display())))?;
    Ok(())
}
