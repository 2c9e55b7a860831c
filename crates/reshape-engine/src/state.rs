use std::sync::Arc;

use bitflags::bitflags;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reshape_events::{EventBus, Payload};
use reshape_io::HandlerId;
use rustc_hash::FxHashMap;

use crate::context::ProcessingContext;

/// Lifecycle stage of a tracked file. Ordering follows the lifecycle, so
/// callers may compare stages but should not rely on concrete values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileStage {
    New,
    Processing,
    Processed,
    Archived,
}

impl std::fmt::Display for FileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileStage::New => "new",
            FileStage::Processing => "processing",
            FileStage::Processed => "processed",
            FileStage::Archived => "archived",
        })
    }
}

bitflags! {
    /// Combinable status markers for a tracked file.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FileFlags: u8 {
        const UNKNOWN  = 1 << 0;
        const VALID    = 1 << 1;
        const EXPORTED = 1 << 2;
        const PENDING  = 1 << 3;
        const ERROR    = 1 << 4;
        const DELETED  = 1 << 5;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStatus {
    pub stage: FileStage,
    pub flags: FileFlags,
}

impl Default for FileStatus {
    fn default() -> Self {
        Self {
            stage: FileStage::New,
            flags: FileFlags::UNKNOWN,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:?}", self.stage, self.flags)
    }
}

/// Ordered collection of tracked files with their statuses.
///
/// Every mutation emits `state.file.<list>.<action>` plus a
/// `state.file.<list>.file.count` update so list views can refresh without
/// re-reading the collection.
pub struct FileList {
    name: String,
    bus: Arc<EventBus>,
    files: Mutex<Vec<(HandlerId, FileStatus)>>,
}

impl FileList {
    pub fn new(name: impl Into<String>, bus: Arc<EventBus>) -> Self {
        Self {
            name: name.into(),
            bus,
            files: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, id: HandlerId, status: FileStatus) {
        let action = {
            let mut files = self.files.lock();
            if let Some(i) = files.iter().position(|(existing, _)| *existing == id) {
                files[i].1 = status;
                "updated"
            } else {
                files.push((id.clone(), status));
                "added"
            }
        };
        self.bus.emit_from(
            "state",
            &format!("state.file.{}.{action}", self.name),
            Payload::new()
                .with("file", id.to_string())
                .with("status", status.to_string()),
        );
        self.emit_count();
    }

    pub fn remove(&self, id: &HandlerId) -> bool {
        let removed = {
            let mut files = self.files.lock();
            let before = files.len();
            files.retain(|(existing, _)| existing != id);
            files.len() != before
        };
        if removed {
            self.bus.emit_from(
                "state",
                &format!("state.file.{}.deleted", self.name),
                Payload::new().with("file", id.to_string()),
            );
            self.emit_count();
        }
        removed
    }

    pub fn clear(&self) {
        self.files.lock().clear();
        self.bus.emit_from(
            "state",
            &format!("state.file.{}.cleared", self.name),
            Payload::new(),
        );
        self.emit_count();
    }

    pub fn get(&self, id: &HandlerId) -> Option<FileStatus> {
        self.files
            .lock()
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, status)| *status)
    }

    pub fn contains(&self, id: &HandlerId) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> Vec<HandlerId> {
        self.files.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit_count(&self) {
        let count = self.len() as i64;
        self.bus.emit_from(
            "state",
            &format!("state.file.{}.file.count", self.name),
            Payload::new().with("count", count),
        );
    }
}

/// Thread-safe bag of named controls plus the tracked-file collection.
///
/// Controls are JSON values keyed by dotted names; reads copy snapshots out
/// of the lock. The engine only ever reads the `processing.*` keys.
pub struct State {
    bus: Arc<EventBus>,
    controls: Mutex<FxHashMap<String, serde_json::Value>>,
    pub tracked_files: FileList,
}

impl State {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus: Arc::clone(&bus),
            controls: Mutex::new(FxHashMap::default()),
            tracked_files: FileList::new("tracked_files", bus),
        }
    }

    pub fn controls(&self) -> FxHashMap<String, serde_json::Value> {
        self.controls.lock().clone()
    }

    pub fn control(&self, name: &str) -> Option<serde_json::Value> {
        self.controls.lock().get(name).cloned()
    }

    pub fn control_bool(&self, name: &str) -> bool {
        self.control(name)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn control_u64(&self, name: &str, default: u64) -> u64 {
        self.control(name)
            .and_then(|v| v.as_u64())
            .filter(|n| *n > 0)
            .unwrap_or(default)
    }

    pub fn control_str(&self, name: &str) -> Option<String> {
        self.control(name)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
    }

    pub fn update_control(&self, name: &str, value: impl Into<serde_json::Value>) {
        let value = value.into();
        self.controls.lock().insert(name.to_string(), value.clone());
        self.bus.emit_from(
            "state",
            &format!("control.{name}.updated"),
            Payload::new().with("control", name).with("new_value", value),
        );
    }

    /// Current processing context from `processing.current`, if parseable.
    pub fn current_context(&self) -> Option<ProcessingContext> {
        let value = self.control("processing.current")?;
        match serde_json::from_value(value) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                tracing::warn!(error = %e, "processing.current is not a valid context");
                None
            }
        }
    }

    pub fn set_current(&self, ctx: &ProcessingContext) {
        match serde_json::to_value(ctx) {
            Ok(value) => self.update_control("processing.current", value),
            Err(e) => tracing::warn!(error = %e, "could not serialize processing context"),
        }
    }
}

static DEFAULT: Lazy<Arc<State>> = Lazy::new(|| Arc::new(State::new(reshape_events::global())));

/// Process-wide state bound to the global event bus.
pub fn default_state() -> Arc<State> {
    Arc::clone(&DEFAULT)
}
