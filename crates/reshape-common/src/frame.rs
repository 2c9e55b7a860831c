use crate::value::Value;

/// A single row as ordered `(column, value)` pairs.
pub type Row = Vec<(String, Value)>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty column name at position {position}")]
    EmptyColumnName { position: usize },
    #[error("duplicate column name: {name}")]
    DuplicateColumnName { name: String },
    #[error("column length mismatch: expected {expected}, got {got} for {name}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Column {
    name: String,
    values: Vec<Value>,
}

/// Column-ordered table chunk.
///
/// Columns keep their insertion order; all columns have the same length.
/// This is the unit the handlers read and the transform consumes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    rows: usize,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, values)` pairs.
    pub fn with_columns<I, S>(columns: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut frame = Frame::new();
        for (name, values) in columns {
            frame.push_column(name.into(), values)?;
        }
        Ok(frame)
    }

    /// A frame with no columns but a known row count.
    ///
    /// This is what an empty mapping produces: the row index survives even
    /// though every column was dropped.
    pub fn with_row_count(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// A frame with the given column names and zero rows (header-only output).
    pub fn empty_with_columns<I, S>(names: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_columns(names.into_iter().map(|n| (n, Vec::new())))
    }

    pub fn push_column(&mut self, name: String, values: Vec<Value>) -> Result<(), FrameError> {
        if self.columns.iter().any(|c| c.name == name) {
            return Err(FrameError::DuplicateColumnName { name });
        }
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(FrameError::LengthMismatch {
                name,
                expected: self.rows,
                got: values.len(),
            });
        }
        self.rows = values.len();
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn cell(&self, name: &str, row: usize) -> Option<&Value> {
        self.column(name).and_then(|values| values.get(row))
    }

    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[index].clone()))
                .collect(),
        )
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.rows).map(|i| self.row(i).unwrap_or_default())
    }

    /// Select `names` in order; absent columns come back filled with `Empty`.
    pub fn project(&self, names: &[String]) -> Frame {
        let mut out = Frame::new();
        for name in names {
            if out.has_column(name) {
                continue;
            }
            let values = match self.column(name) {
                Some(v) => v.to_vec(),
                None => vec![Value::Empty; self.rows],
            };
            // Unique by construction after the has_column guard.
            let _ = out.push_column(name.clone(), values);
        }
        out
    }

    /// First `n` rows of every column.
    pub fn head(&self, n: usize) -> Frame {
        let take = n.min(self.rows);
        let mut out = Frame::new();
        for c in &self.columns {
            let _ = out.push_column(c.name.clone(), c.values[..take].to_vec());
        }
        out
    }

    /// Append `other` row-wise, unioning columns by name.
    ///
    /// Columns present on one side only are padded with `Empty` on the other.
    pub fn append(&mut self, other: &Frame) {
        let added = other.rows;
        for c in &mut self.columns {
            match other.column(&c.name) {
                Some(values) => c.values.extend_from_slice(values),
                None => c.values.extend(std::iter::repeat_n(Value::Empty, added)),
            }
        }
        for oc in &other.columns {
            if !self.has_column(&oc.name) {
                let mut values = vec![Value::Empty; self.rows];
                values.extend_from_slice(&oc.values);
                self.columns.push(Column {
                    name: oc.name.clone(),
                    values,
                });
            }
        }
        self.rows += added;
    }

    pub fn push_row(&mut self, row: &Row) {
        for c in &mut self.columns {
            let value = row
                .iter()
                .find(|(name, _)| name == &c.name)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Empty);
            c.values.push(value);
        }
        for (name, value) in row {
            if !self.has_column(name) {
                let mut values = vec![Value::Empty; self.rows];
                values.push(value.clone());
                self.columns.push(Column {
                    name: name.clone(),
                    values,
                });
            }
        }
        self.rows += 1;
    }

    /// Shared handler-side content contract: no empty or duplicate names.
    pub fn validate(&self) -> Result<(), FrameError> {
        for (i, c) in self.columns.iter().enumerate() {
            if c.name.trim().is_empty() {
                return Err(FrameError::EmptyColumnName { position: i });
            }
        }
        for (i, c) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|p| p.name == c.name) {
                return Err(FrameError::DuplicateColumnName {
                    name: c.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn columns_keep_insertion_order() {
        let frame = Frame::with_columns([
            ("b", vec![text("1")]),
            ("a", vec![text("2")]),
        ])
        .unwrap();
        assert_eq!(frame.column_names(), vec!["b", "a"]);
    }

    #[test]
    fn push_column_rejects_duplicates_and_ragged_lengths() {
        let mut frame = Frame::new();
        frame.push_column("a".into(), vec![text("1"), text("2")]).unwrap();
        assert!(matches!(
            frame.push_column("a".into(), vec![text("3"), text("4")]),
            Err(FrameError::DuplicateColumnName { .. })
        ));
        assert!(matches!(
            frame.push_column("b".into(), vec![text("3")]),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn append_unions_columns() {
        let mut left = Frame::with_columns([("a", vec![text("1")])]).unwrap();
        let right = Frame::with_columns([
            ("a", vec![text("2")]),
            ("b", vec![text("x")]),
        ])
        .unwrap();
        left.append(&right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.column("a").unwrap(), &[text("1"), text("2")]);
        assert_eq!(left.column("b").unwrap(), &[Value::Empty, text("x")]);
    }

    #[test]
    fn project_fills_missing_columns_with_empty() {
        let frame = Frame::with_columns([("a", vec![text("1"), text("2")])]).unwrap();
        let projected = frame.project(&["a".to_string(), "zz".to_string()]);
        assert_eq!(projected.column_names(), vec!["a", "zz"]);
        assert_eq!(projected.column("zz").unwrap(), &[Value::Empty, Value::Empty]);
    }

    #[test]
    fn validate_flags_empty_and_duplicate_names() {
        let mut frame = Frame::new();
        frame.push_column(" ".into(), vec![text("1")]).unwrap();
        assert!(matches!(
            frame.validate(),
            Err(FrameError::EmptyColumnName { .. })
        ));
    }
}
