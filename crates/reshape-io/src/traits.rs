use std::path::{Path, PathBuf};

use reshape_common::{Frame, Row};

use crate::error::IoError;

/// Owned, finite, non-restartable chunk sequence.
pub type FrameIter = Box<dyn Iterator<Item = Result<Frame, IoError>> + Send>;

/// Logical identity of a handler: absolute path plus active sheet.
///
/// Two handlers over different sheets of one workbook are distinct sources,
/// so the sheet participates in equality and hashing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId {
    pub path: PathBuf,
    pub sheet: Option<String>,
}

impl HandlerId {
    pub fn new(path: &Path, sheet: Option<&str>) -> Self {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self {
            path,
            sheet: sheet.map(str::to_string),
        }
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}::{sheet}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Capability surface every tabular back-end presents.
///
/// Readers are lazy where the format allows it; writers accumulate an
/// in-memory buffer that `save`/`save_as` flush to disk.
pub trait TableHandler: Send {
    fn path(&self) -> &Path;

    /// Short format name, e.g. `"csv"` or `"xlsx"`.
    fn file_type(&self) -> &'static str;

    /// Active sheet, for back-ends that have one.
    fn sheet(&self) -> Option<&str> {
        None
    }

    fn handler_id(&self) -> HandlerId {
        HandlerId::new(self.path(), self.sheet())
    }

    /// Select the active sheet. Back-ends without sheets reject this.
    fn set_sheet(&mut self, sheet: &str) -> Result<(), IoError> {
        let _ = sheet;
        Err(IoError::unsupported("sheets", self.file_type()))
    }

    /// Configure the field delimiter where the format has one.
    fn set_delimiter(&mut self, delimiter: char) {
        let _ = delimiter;
    }

    /// Skip the first `n` rows of the source.
    fn set_header_rows_to_skip(&mut self, n: usize);

    /// Skip exactly the given zero-based row indices. Takes precedence over
    /// the header count when both are set.
    fn set_rows_to_skip(&mut self, rows: Vec<usize>) -> Result<(), IoError>;

    /// Header row of the source (after row-skips), `None` sheet means the
    /// active one.
    fn get_headers(&mut self, sheet: Option<&str>) -> Result<Vec<String>, IoError>;

    /// Eagerly read the remaining rows into one frame.
    fn load(&mut self) -> Result<Frame, IoError>;

    /// Lazily read `chunksize`-row frames.
    fn iter_load(&mut self, chunksize: usize) -> Result<FrameIter, IoError>;

    /// Lazily yield one-column frames, each truncated to `value_count`
    /// values when given.
    fn iter_columns(
        &mut self,
        value_count: Option<usize>,
        chunksize: usize,
    ) -> Result<FrameIter, IoError>;

    /// Stream single rows as ordered column/value pairs.
    fn stream_rows(&mut self) -> Result<Box<dyn Iterator<Item = Result<Row, IoError>> + Send>, IoError> {
        let chunks = self.iter_load(1024)?;
        Ok(Box::new(chunks.flat_map(|chunk| match chunk {
            Ok(frame) => frame
                .iter_rows()
                .map(Ok)
                .collect::<Vec<_>>()
                .into_iter(),
            Err(e) => vec![Err(e)].into_iter(),
        })))
    }

    /// Append a frame to the in-memory output buffer.
    fn append_frame(&mut self, frame: &Frame) -> Result<(), IoError>;

    /// Append loose rows to the in-memory output buffer.
    fn append_rows(&mut self, rows: &[Row]) -> Result<(), IoError>;

    /// Write the buffer back to this handler's own path.
    fn save(&mut self) -> Result<(), IoError>;

    /// Write the buffer to `path`.
    fn save_as(&mut self, path: &Path) -> Result<(), IoError>;

    /// Column-to-dtype mapping, probed without loading everything when the
    /// format allows.
    fn get_schema(&mut self) -> Result<Vec<(String, String)>, IoError>;

    /// Format-specific metadata (sheet names, column list, ...).
    fn load_metadata(&mut self) -> Result<serde_json::Value, IoError>;

    /// Sheet names for workbook formats; empty for single-table formats.
    fn get_sheets(&mut self) -> Result<Vec<String>, IoError> {
        Ok(Vec::new())
    }

    /// Content contract shared by all back-ends.
    fn validate(&self, frame: &Frame) -> Result<(), IoError> {
        frame.validate()?;
        Ok(())
    }

    /// Fresh handler of the same family (and sheet) for writing output.
    fn output_sibling(&self) -> Box<dyn TableHandler>;
}

/// How a handler applies row skips to a raw record stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RowSkip {
    #[default]
    None,
    /// Skip the first `n` raw rows.
    Head(usize),
    /// Skip exactly these zero-based raw row indices (sorted).
    List(Vec<usize>),
}

impl RowSkip {
    pub fn skips(&self, index: usize) -> bool {
        match self {
            RowSkip::None => false,
            RowSkip::Head(n) => index < *n,
            RowSkip::List(rows) => rows.binary_search(&index).is_ok(),
        }
    }

    pub fn set_head(&mut self, n: usize) {
        *self = if n == 0 { RowSkip::None } else { RowSkip::Head(n) };
    }

    pub fn set_list(&mut self, mut rows: Vec<usize>) {
        rows.sort_unstable();
        rows.dedup();
        *self = if rows.is_empty() {
            RowSkip::None
        } else {
            RowSkip::List(rows)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_skip_semantics() {
        let mut skip = RowSkip::default();
        assert!(!skip.skips(0));
        skip.set_head(2);
        assert!(skip.skips(1));
        assert!(!skip.skips(2));
        skip.set_list(vec![3, 1, 3]);
        assert!(skip.skips(1));
        assert!(skip.skips(3));
        assert!(!skip.skips(0));
        // List replaces the head count entirely.
        assert!(!skip.skips(0));
    }

    #[test]
    fn handler_id_distinguishes_sheets() {
        let a = HandlerId::new(Path::new("/tmp/book.xlsx"), Some("S1"));
        let b = HandlerId::new(Path::new("/tmp/book.xlsx"), Some("S2"));
        let c = HandlerId::new(Path::new("/tmp/book.xlsx"), Some("S1"));
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
