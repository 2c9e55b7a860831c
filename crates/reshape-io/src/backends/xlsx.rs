use std::path::{Path, PathBuf};

use calamine::{Data, Reader};
use reshape_common::{Frame, Row, Value};

use crate::error::IoError;
use crate::traits::{FrameIter, RowSkip, TableHandler};

/// Workbook handler: calamine reads, umya-spreadsheet writes.
///
/// One handler instance operates on a single active sheet (default: the
/// first listed). Chunked iteration is emulated from an in-memory
/// materialization; a workbook sheet cannot be streamed from disk.
pub struct XlsxHandler {
    path: PathBuf,
    requested_sheet: Option<String>,
    resolved_sheet: Option<String>,
    skip: RowSkip,
    cached: Option<Frame>,
    buffer: Option<Frame>,
}

impl XlsxHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requested_sheet: None,
            resolved_sheet: None,
            skip: RowSkip::None,
            cached: None,
            buffer: None,
        }
    }

    pub fn with_sheet(path: impl Into<PathBuf>, sheet: Option<&str>) -> Self {
        let mut handler = Self::new(path);
        handler.requested_sheet = sheet.map(str::to_string);
        handler
    }

    pub fn can_handle(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("xlsx")
                || ext.eq_ignore_ascii_case("xls")
                || ext.eq_ignore_ascii_case("xlsm")
        )
    }

    pub fn open(path: &Path) -> Result<Box<dyn TableHandler>, IoError> {
        Ok(Box::new(Self::new(path)))
    }

    fn open_workbook(&self) -> Result<calamine::Sheets<std::io::BufReader<std::fs::File>>, IoError> {
        calamine::open_workbook_auto(&self.path).map_err(|e| IoError::from_backend("xlsx", e))
    }

    /// Resolve the active sheet name against the workbook's sheet list.
    ///
    /// A requested sheet that does not exist falls back to the first sheet
    /// with a warning rather than failing the run.
    fn resolve_sheet(&mut self) -> Result<String, IoError> {
        if let Some(name) = &self.resolved_sheet {
            return Ok(name.clone());
        }
        let workbook = self.open_workbook()?;
        let names = workbook.sheet_names().to_vec();
        let first = names.first().cloned().ok_or_else(|| IoError::Backend {
            backend: "xlsx".to_string(),
            message: format!("workbook has no sheets: {}", self.path.display()),
        })?;
        let resolved = match &self.requested_sheet {
            Some(wanted) if names.iter().any(|n| n == wanted) => wanted.clone(),
            Some(wanted) => {
                tracing::warn!(
                    sheet = %wanted,
                    fallback = %first,
                    "requested sheet not in workbook, using first sheet"
                );
                first
            }
            None => first,
        };
        self.resolved_sheet = Some(resolved.clone());
        Ok(resolved)
    }

    /// Materialize the active sheet: row-skips applied, first surviving row
    /// taken as the header.
    fn materialize(&mut self) -> Result<Frame, IoError> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let sheet = self.resolve_sheet()?;
        let mut workbook = self.open_workbook()?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| IoError::from_backend("xlsx", e))?;

        let mut headers: Option<Vec<String>> = None;
        let mut columns: Vec<Vec<Value>> = Vec::new();
        for (index, row) in range.rows().enumerate() {
            if self.skip.skips(index) {
                continue;
            }
            if headers.is_none() {
                let names: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let name = convert_cell(cell).as_field();
                        if name.trim().is_empty() {
                            format!("Unnamed_{}", i + 1)
                        } else {
                            name
                        }
                    })
                    .collect();
                columns = vec![Vec::new(); names.len()];
                headers = Some(names);
            } else {
                for (i, col) in columns.iter_mut().enumerate() {
                    let value = row.get(i).map(convert_cell).unwrap_or(Value::Empty);
                    col.push(value);
                }
            }
        }

        let frame = match headers {
            Some(names) => Frame::with_columns(names.into_iter().zip(columns))?,
            None => Frame::new(),
        };
        self.cached = Some(frame.clone());
        Ok(frame)
    }

    fn invalidate(&mut self) {
        self.cached = None;
    }
}

fn convert_cell(data: &Data) -> Value {
    match data {
        Data::Empty => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => {
            // Calamine reports workbook integers as floats.
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Int(*f as i64)
            } else {
                Value::Number(*f)
            }
        }
        Data::Int(i) => Value::Int(*i),
        Data::Bool(b) => Value::Boolean(*b),
        Data::Error(_) => Value::Empty,
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Value::Text(s.clone()),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

fn slice_rows(frame: &Frame, start: usize, end: usize) -> Frame {
    let mut out = Frame::new();
    for name in frame.column_names() {
        let values = frame.column(name).unwrap_or(&[]);
        let _ = out.push_column(name.to_string(), values[start..end].to_vec());
    }
    out
}

impl TableHandler for XlsxHandler {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type(&self) -> &'static str {
        "xlsx"
    }

    fn sheet(&self) -> Option<&str> {
        self.resolved_sheet
            .as_deref()
            .or(self.requested_sheet.as_deref())
    }

    fn set_sheet(&mut self, sheet: &str) -> Result<(), IoError> {
        self.requested_sheet = Some(sheet.to_string());
        self.resolved_sheet = None;
        self.invalidate();
        Ok(())
    }

    fn set_header_rows_to_skip(&mut self, n: usize) {
        self.skip.set_head(n);
        self.invalidate();
    }

    fn set_rows_to_skip(&mut self, rows: Vec<usize>) -> Result<(), IoError> {
        self.skip.set_list(rows);
        self.invalidate();
        Ok(())
    }

    fn get_headers(&mut self, sheet: Option<&str>) -> Result<Vec<String>, IoError> {
        if let Some(sheet) = sheet {
            self.set_sheet(sheet)?;
        }
        let frame = self.materialize()?;
        Ok(frame.column_names().into_iter().map(str::to_string).collect())
    }

    fn load(&mut self) -> Result<Frame, IoError> {
        self.materialize()
    }

    fn iter_load(&mut self, chunksize: usize) -> Result<FrameIter, IoError> {
        let frame = self.materialize()?;
        let chunksize = chunksize.max(1);
        let total = frame.len();
        let mut chunks: Vec<Result<Frame, IoError>> = Vec::new();
        let mut start = 0usize;
        while start < total {
            let end = (start + chunksize).min(total);
            chunks.push(Ok(slice_rows(&frame, start, end)));
            start = end;
        }
        Ok(Box::new(chunks.into_iter()))
    }

    fn iter_columns(
        &mut self,
        value_count: Option<usize>,
        chunksize: usize,
    ) -> Result<FrameIter, IoError> {
        let frame = self.materialize()?;
        let chunksize = chunksize.max(1);
        let mut out: Vec<Result<Frame, IoError>> = Vec::new();
        for name in frame.column_names() {
            let values = frame.column(name).unwrap_or(&[]);
            let limit = value_count.unwrap_or(values.len()).min(values.len());
            let mut start = 0usize;
            if limit == 0 {
                out.push(
                    Frame::with_columns([(name.to_string(), Vec::new())]).map_err(IoError::from),
                );
                continue;
            }
            while start < limit {
                let end = (start + chunksize).min(limit);
                out.push(
                    Frame::with_columns([(name.to_string(), values[start..end].to_vec())])
                        .map_err(IoError::from),
                );
                start = end;
            }
        }
        Ok(Box::new(out.into_iter()))
    }

    fn append_frame(&mut self, frame: &Frame) -> Result<(), IoError> {
        self.validate(frame)?;
        match &mut self.buffer {
            Some(buffer) => buffer.append(frame),
            None => self.buffer = Some(frame.clone()),
        }
        Ok(())
    }

    fn append_rows(&mut self, rows: &[Row]) -> Result<(), IoError> {
        let buffer = self.buffer.get_or_insert_with(Frame::new);
        for row in rows {
            buffer.push_row(row);
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), IoError> {
        let path = self.path.clone();
        self.save_as(&path)
    }

    fn save_as(&mut self, path: &Path) -> Result<(), IoError> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Err(IoError::Backend {
                backend: "xlsx".to_string(),
                message: "no buffered data to save".to_string(),
            });
        };
        let sheet_name = self
            .resolved_sheet
            .clone()
            .or_else(|| self.requested_sheet.clone())
            .unwrap_or_else(|| "Sheet1".to_string());

        let mut book = umya_spreadsheet::new_file();
        {
            let ws = book.get_sheet_mut(&0).ok_or_else(|| IoError::Backend {
                backend: "xlsx".to_string(),
                message: "new workbook has no sheet".to_string(),
            })?;
            ws.set_name(sheet_name);
            let names = buffer.column_names();
            for (col_index, name) in names.iter().enumerate() {
                ws.get_cell_mut(((col_index + 1) as u32, 1u32)).set_value(*name);
            }
            for row_index in 0..buffer.len() {
                for (col_index, name) in names.iter().enumerate() {
                    let cell = ws.get_cell_mut(((col_index + 1) as u32, (row_index + 2) as u32));
                    match buffer.cell(name, row_index) {
                        Some(Value::Empty) | None => {}
                        Some(Value::Boolean(b)) => {
                            cell.set_value_bool(*b);
                        }
                        Some(Value::Int(i)) => {
                            cell.set_value_number(*i as f64);
                        }
                        Some(Value::Number(n)) => {
                            cell.set_value_number(*n);
                        }
                        Some(Value::Text(s)) => {
                            cell.set_value(s.clone());
                        }
                    }
                }
            }
        }
        umya_spreadsheet::writer::xlsx::write(&book, path)
            .map_err(|e| IoError::from_backend("xlsx", e))
    }

    fn get_schema(&mut self) -> Result<Vec<(String, String)>, IoError> {
        let frame = self.materialize()?;
        Ok(frame
            .column_names()
            .into_iter()
            .map(|name| {
                let tag = frame
                    .cell(name, 0)
                    .map(Value::type_tag)
                    .unwrap_or("str");
                (name.to_string(), tag.to_string())
            })
            .collect())
    }

    fn load_metadata(&mut self) -> Result<serde_json::Value, IoError> {
        let sheets = self.get_sheets()?;
        Ok(serde_json::json!({ "sheet_names": sheets }))
    }

    fn get_sheets(&mut self) -> Result<Vec<String>, IoError> {
        let workbook = self.open_workbook()?;
        Ok(workbook.sheet_names().to_vec())
    }

    fn output_sibling(&self) -> Box<dyn TableHandler> {
        Box::new(XlsxHandler::with_sheet(
            self.path.clone(),
            self.sheet(),
        ))
    }
}
