use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use reshape_common::{Frame, Row, Value};

use crate::error::IoError;
use crate::traits::{FrameIter, RowSkip, TableHandler};

const SNIFF_SAMPLE_BYTES: usize = 2048;
const SNIFF_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Delimited-text handler.
///
/// The dialect is sniffed from a leading sample unless an explicit
/// delimiter override is set. UTF-8 only. The first non-skipped row is the
/// header.
pub struct CsvHandler {
    path: PathBuf,
    delimiter: Option<u8>,
    sniffed: Option<u8>,
    skip: RowSkip,
    buffer: Option<Frame>,
}

impl CsvHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: None,
            sniffed: None,
            skip: RowSkip::None,
            buffer: None,
        }
    }

    pub fn can_handle(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv")
        )
    }

    pub fn open(path: &Path) -> Result<Box<dyn TableHandler>, IoError> {
        Ok(Box::new(Self::new(path)))
    }

    fn effective_delimiter(&mut self) -> Result<u8, IoError> {
        if let Some(d) = self.delimiter {
            return Ok(d);
        }
        if let Some(d) = self.sniffed {
            return Ok(d);
        }
        let d = sniff_delimiter(&self.path)?;
        self.sniffed = Some(d);
        Ok(d)
    }

    fn reader(&mut self) -> Result<csv::Reader<File>, IoError> {
        let delimiter = self.effective_delimiter()?;
        csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| IoError::from_backend("csv", e))
    }

    /// Header plus a record iterator positioned at the first data row.
    fn open_stream(&mut self) -> Result<CsvStream, IoError> {
        let reader = self.reader()?;
        let mut records = reader.into_records();
        let skip = self.skip.clone();
        let mut index = 0usize;
        let headers = loop {
            match records.next() {
                Some(record) => {
                    let record = record.map_err(|e| IoError::from_backend("csv", e))?;
                    let skip_this = skip.skips(index);
                    index += 1;
                    if skip_this {
                        continue;
                    }
                    break record.iter().map(str::to_string).collect::<Vec<_>>();
                }
                None => break Vec::new(),
            }
        };
        Ok(CsvStream {
            records,
            headers,
            skip,
            index,
        })
    }
}

struct CsvStream {
    records: csv::StringRecordsIntoIter<File>,
    headers: Vec<String>,
    skip: RowSkip,
    index: usize,
}

impl CsvStream {
    /// Next surviving data record, padded/truncated to the header width.
    fn next_row(&mut self) -> Option<Result<Vec<Value>, IoError>> {
        loop {
            let record = match self.records.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(IoError::from_backend("csv", e))),
            };
            let skip_this = self.skip.skips(self.index);
            self.index += 1;
            if skip_this {
                continue;
            }
            let mut row: Vec<Value> = record
                .iter()
                .take(self.headers.len())
                .map(Value::infer_field)
                .collect();
            row.resize(self.headers.len(), Value::Empty);
            return Some(Ok(row));
        }
    }

    fn next_chunk(&mut self, chunksize: usize) -> Option<Result<Frame, IoError>> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); self.headers.len()];
        let mut rows = 0usize;
        while rows < chunksize {
            match self.next_row() {
                Some(Ok(row)) => {
                    for (col, value) in columns.iter_mut().zip(row) {
                        col.push(value);
                    }
                    rows += 1;
                }
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        if rows == 0 {
            return None;
        }
        let frame = Frame::with_columns(
            self.headers.iter().cloned().zip(columns),
        );
        Some(frame.map_err(IoError::from))
    }
}

struct CsvChunks {
    stream: CsvStream,
    chunksize: usize,
}

impl Iterator for CsvChunks {
    type Item = Result<Frame, IoError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next_chunk(self.chunksize)
    }
}

impl TableHandler for CsvHandler {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_type(&self) -> &'static str {
        "csv"
    }

    fn set_delimiter(&mut self, delimiter: char) {
        if delimiter.is_ascii() {
            self.delimiter = Some(delimiter as u8);
        }
    }

    fn set_header_rows_to_skip(&mut self, n: usize) {
        self.skip.set_head(n);
    }

    fn set_rows_to_skip(&mut self, rows: Vec<usize>) -> Result<(), IoError> {
        self.skip.set_list(rows);
        Ok(())
    }

    fn get_headers(&mut self, _sheet: Option<&str>) -> Result<Vec<String>, IoError> {
        Ok(self.open_stream()?.headers)
    }

    fn load(&mut self) -> Result<Frame, IoError> {
        let mut stream = self.open_stream()?;
        let headers = stream.headers.clone();
        let mut frame = match stream.next_chunk(usize::MAX) {
            Some(chunk) => chunk?,
            None => Frame::empty_with_columns(headers)?,
        };
        while let Some(chunk) = stream.next_chunk(usize::MAX) {
            frame.append(&chunk?);
        }
        Ok(frame)
    }

    fn iter_load(&mut self, chunksize: usize) -> Result<FrameIter, IoError> {
        let stream = self.open_stream()?;
        Ok(Box::new(CsvChunks {
            stream,
            chunksize: chunksize.max(1),
        }))
    }

    fn iter_columns(
        &mut self,
        value_count: Option<usize>,
        chunksize: usize,
    ) -> Result<FrameIter, IoError> {
        let chunks = self.iter_load(chunksize)?;
        Ok(Box::new(chunks.flat_map(move |chunk| match chunk {
            Ok(frame) => {
                let truncated = match value_count {
                    Some(n) => frame.head(n),
                    None => frame,
                };
                truncated
                    .column_names()
                    .iter()
                    .map(|name| {
                        let values = truncated.column(name).unwrap_or(&[]).to_vec();
                        Frame::with_columns([(name.to_string(), values)]).map_err(IoError::from)
                    })
                    .collect::<Vec<_>>()
                    .into_iter()
            }
            Err(e) => vec![Err(e)].into_iter(),
        })))
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
                backend: "csv".to_string(),
                message: "no buffered data to save".to_string(),
            });
        };
        let delimiter = self.delimiter.or(self.sniffed).unwrap_or(b',');
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .map_err(|e| IoError::from_backend("csv", e))?;
        writer
            .write_record(buffer.column_names())
            .map_err(|e| IoError::from_backend("csv", e))?;
        for row in buffer.iter_rows() {
            let record: Vec<String> = row.iter().map(|(_, v)| v.as_field()).collect();
            writer
                .write_record(record)
                .map_err(|e| IoError::from_backend("csv", e))?;
        }
        writer
            .flush()
            .map_err(|e| IoError::from_backend("csv", e))?;
        Ok(())
    }

    fn get_schema(&mut self) -> Result<Vec<(String, String)>, IoError> {
        let mut stream = self.open_stream()?;
        let headers = stream.headers.clone();
        let first = stream.next_row().transpose()?;
        Ok(headers
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let tag = first
                    .as_ref()
                    .and_then(|row| row.get(i))
                    .map(Value::type_tag)
                    .unwrap_or("str");
                (name, tag.to_string())
            })
            .collect())
    }

    fn load_metadata(&mut self) -> Result<serde_json::Value, IoError> {
        let headers = self.get_headers(None)?;
        Ok(serde_json::json!({ "columns": headers }))
    }

    fn output_sibling(&self) -> Box<dyn TableHandler> {
        let mut sibling = CsvHandler::new(self.path.clone());
        sibling.delimiter = self.delimiter.or(self.sniffed);
        Box::new(sibling)
    }
}

/// Pick the candidate delimiter with the most consistent per-line count in
/// a leading sample. Falls back to a comma.
fn sniff_delimiter(path: &Path) -> Result<u8, IoError> {
    let mut file = File::open(path)?;
    let mut sample = vec![0u8; SNIFF_SAMPLE_BYTES];
    let read = file.read(&mut sample)?;
    sample.truncate(read);
    let text = String::from_utf8_lossy(&sample);

    let lines: Vec<&str> = text.lines().take(10).collect();
    if lines.is_empty() {
        return Ok(b',');
    }

    let mut best = (b',', 0usize);
    for candidate in SNIFF_CANDIDATES {
        let min_count = lines
            .iter()
            .map(|line| line.bytes().filter(|b| *b == candidate).count())
            .min()
            .unwrap_or(0);
        if min_count > best.1 {
            best = (candidate, min_count);
        }
    }
    Ok(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn sniffs_semicolon_dialect() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "a;b;c\n1;2;3\n");
        let mut handler = CsvHandler::new(&path);
        assert_eq!(
            handler.get_headers(None).unwrap(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn delimiter_override_beats_sniffing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "a|b\n1|2\n");
        let mut handler = CsvHandler::new(&path);
        handler.set_delimiter('|');
        assert_eq!(handler.get_headers(None).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn chunked_iteration_preserves_order_and_types() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "a,b\n1,x\n2,y\n3,z\n");
        let mut handler = CsvHandler::new(&path);
        let chunks: Vec<Frame> = handler
            .iter_load(2)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[1].len(), 1);
        assert_eq!(chunks[0].cell("a", 0), Some(&Value::Int(1)));
        assert_eq!(chunks[1].cell("b", 0), Some(&Value::Text("z".into())));
    }

    #[test]
    fn skip_list_takes_precedence_over_head_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "junk\na,b\n1,2\n3,4\n");
        let mut handler = CsvHandler::new(&path);
        handler.set_header_rows_to_skip(3);
        handler.set_rows_to_skip(vec![0, 2]).unwrap();
        assert_eq!(handler.get_headers(None).unwrap(), vec!["a", "b"]);
        let frame = handler.load().unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.cell("a", 0), Some(&Value::Int(3)));
    }

    #[test]
    fn ragged_rows_are_padded_to_the_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "a,b,c\n1,2\n3,4,5,6\n");
        let mut handler = CsvHandler::new(&path);
        let frame = handler.load().unwrap();
        assert_eq!(frame.cell("c", 0), Some(&Value::Empty));
        assert_eq!(frame.cell("c", 1), Some(&Value::Int(5)));
    }

    #[test]
    fn append_then_save_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = write_file(&dir, "in.csv", "a,b\n1,2\n");
        let out = dir.path().join("out.csv");

        let mut handler = CsvHandler::new(&src);
        let frame = handler.load().unwrap();
        let mut sibling = handler.output_sibling();
        sibling.append_frame(&frame).unwrap();
        sibling.save_as(&out).unwrap();

        let mut reread = CsvHandler::new(&out);
        assert_eq!(reread.load().unwrap(), frame);
    }

    #[test]
    fn save_without_buffer_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut handler = CsvHandler::new(dir.path().join("x.csv"));
        assert!(matches!(
            handler.save(),
            Err(IoError::Backend { .. })
        ));
    }

    #[test]
    fn stream_rows_yields_ordered_pairs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "a,b\n1,x\n2,y\n");
        let mut handler = CsvHandler::new(&path);
        let rows: Vec<_> = handler
            .stream_rows()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::Text("x".into())),
            ]
        );
    }

    #[test]
    fn schema_probe_reads_one_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(&dir, "t.csv", "id,name,score\n1,ann,2.5\n");
        let mut handler = CsvHandler::new(&path);
        let schema = handler.get_schema().unwrap();
        assert_eq!(
            schema,
            vec![
                ("id".to_string(), "int".to_string()),
                ("name".to_string(), "str".to_string()),
                ("score".to_string(), "float".to_string()),
            ]
        );
    }
}
