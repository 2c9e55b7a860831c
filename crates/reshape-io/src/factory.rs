use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::backends::csv::CsvHandler;
use crate::backends::xlsx::XlsxHandler;
use crate::error::IoError;
use crate::traits::TableHandler;

/// One registered back-end: an extension matcher plus a constructor.
#[derive(Clone)]
pub struct HandlerEntry {
    pub name: &'static str,
    pub can_handle: fn(&Path) -> bool,
    pub open: fn(&Path) -> Result<Box<dyn TableHandler>, IoError>,
}

/// Registry of handler back-ends; `create` dispatches on the first match.
///
/// Registration is the only mutation and is serialized by the mutex.
pub struct HandlerFactory {
    entries: Mutex<Vec<HandlerEntry>>,
}

impl Default for HandlerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerFactory {
    /// An empty factory with no back-ends registered.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// A factory with the built-in CSV and XLSX back-ends.
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        factory.register(HandlerEntry {
            name: "csv",
            can_handle: CsvHandler::can_handle,
            open: CsvHandler::open,
        });
        factory.register(HandlerEntry {
            name: "xlsx",
            can_handle: XlsxHandler::can_handle,
            open: XlsxHandler::open,
        });
        factory
    }

    pub fn register(&self, entry: HandlerEntry) {
        self.entries.lock().push(entry);
    }

    pub fn can_handle(&self, path: &Path) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| (entry.can_handle)(path))
    }

    /// Open the first back-end that claims `path`.
    pub fn create(&self, path: &Path) -> Result<Box<dyn TableHandler>, IoError> {
        let entries = self.entries.lock().clone();
        for entry in &entries {
            if (entry.can_handle)(path) {
                return (entry.open)(path);
            }
        }
        Err(IoError::NoHandler {
            path: path.to_path_buf(),
        })
    }
}

static DEFAULT: Lazy<Arc<HandlerFactory>> = Lazy::new(|| Arc::new(HandlerFactory::with_defaults()));

/// Process-wide factory with the built-in back-ends registered.
pub fn default_factory() -> Arc<HandlerFactory> {
    Arc::clone(&DEFAULT)
}
