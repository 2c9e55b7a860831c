use reshape_common::{Frame, Value};
use rustc_hash::{FxHashMap, FxHashSet};

/// Streaming drop-duplicates: first occurrence per key wins.
///
/// Keeps only the seen-key set and a projection of the columns the mapping
/// actually reads, so memory stays proportional to distinct keys.
pub struct DropDedupe {
    key: String,
    projection: Vec<String>,
    seen: FxHashSet<String>,
    aggregate: Frame,
}

impl DropDedupe {
    /// `sources` are the columns the mapping references; the key is added
    /// to the projection when absent.
    pub fn new(key: impl Into<String>, sources: &[String]) -> Self {
        let key = key.into();
        let mut projection = sources.to_vec();
        if !projection.contains(&key) {
            projection.push(key.clone());
        }
        Self {
            key,
            projection,
            seen: FxHashSet::default(),
            aggregate: Frame::new(),
        }
    }

    /// Fold a chunk into the aggregate. Returns `false` when the chunk has
    /// no key column at all; the caller then treats it as un-deduped.
    pub fn absorb(&mut self, chunk: &Frame) -> bool {
        let Some(keys) = chunk.column(&self.key) else {
            return false;
        };
        let mut keep: Vec<usize> = Vec::new();
        for (row, key_value) in keys.iter().enumerate() {
            if matches!(key_value, Value::Empty) {
                continue;
            }
            let key_str = key_value.as_field();
            if self.seen.contains(&key_str) {
                continue;
            }
            self.seen.insert(key_str);
            keep.push(row);
        }
        if keep.is_empty() {
            return true;
        }
        let projected = chunk.project(&self.projection);
        let mut rows = Frame::new();
        for name in projected.column_names() {
            let values = projected.column(name).unwrap_or(&[]);
            let kept: Vec<Value> = keep.iter().map(|&r| values[r].clone()).collect();
            let _ = rows.push_column(name.to_string(), kept);
        }
        self.aggregate.append(&rows);
        true
    }

    pub fn len(&self) -> usize {
        self.aggregate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregate.is_empty()
    }

    pub fn finish(self) -> Frame {
        self.aggregate
    }
}

/// Two-phase concat dedup: per key, per source, ordered unique non-empty
/// string values, later joined with the configured separator.
pub struct ConcatDedupe {
    key: String,
    sources: Vec<String>,
    concat_sep: String,
    key_order: Vec<String>,
    /// key -> source -> ordered unique values.
    aggregate: FxHashMap<String, FxHashMap<String, Vec<String>>>,
}

impl ConcatDedupe {
    pub fn new(key: impl Into<String>, sources: &[String], concat_sep: &str) -> Self {
        let key = key.into();
        let sources = sources
            .iter()
            .filter(|s| **s != key)
            .cloned()
            .collect();
        Self {
            key,
            sources,
            concat_sep: concat_sep.to_string(),
            key_order: Vec::new(),
            aggregate: FxHashMap::default(),
        }
    }

    pub fn absorb(&mut self, chunk: &Frame) -> bool {
        let Some(keys) = chunk.column(&self.key) else {
            return false;
        };
        let present: Vec<&String> = self
            .sources
            .iter()
            .filter(|s| chunk.has_column(s))
            .collect();
        for (row, key_value) in keys.iter().enumerate() {
            if matches!(key_value, Value::Empty) {
                continue;
            }
            let key_str = key_value.as_field();
            if !self.aggregate.contains_key(&key_str) {
                self.key_order.push(key_str.clone());
            }
            let per_source = self.aggregate.entry(key_str).or_default();
            for source in &present {
                let value = chunk
                    .cell(source, row)
                    .cloned()
                    .unwrap_or(Value::Empty);
                if value.is_empty() {
                    continue;
                }
                let text = value.as_field();
                let list = per_source.entry((*source).clone()).or_default();
                if !list.contains(&text) {
                    list.push(text);
                }
            }
        }
        true
    }

    pub fn key_count(&self) -> usize {
        self.key_order.len()
    }

    /// Materialize one row per key, cells joined with the separator. Every
    /// referenced source appears as a column even when it never occurred.
    pub fn finish(self) -> Frame {
        let mut out = Frame::new();
        let keys: Vec<Value> = self
            .key_order
            .iter()
            .map(|k| Value::Text(k.clone()))
            .collect();
        let _ = out.push_column(self.key.clone(), keys);
        for source in &self.sources {
            let values: Vec<Value> = self
                .key_order
                .iter()
                .map(|k| {
                    let joined = self
                        .aggregate
                        .get(k)
                        .and_then(|per_source| per_source.get(source))
                        .map(|list| list.join(&self.concat_sep))
                        .unwrap_or_default();
                    Value::Text(joined)
                })
                .collect();
            let _ = out.push_column(source.clone(), values);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn chunk(rows: &[(&str, &str, Value)]) -> Frame {
        Frame::with_columns([
            ("A", rows.iter().map(|(a, _, _)| text(a)).collect()),
            ("B", rows.iter().map(|(_, b, _)| text(b)).collect()),
            ("C", rows.iter().map(|(_, _, c)| c.clone()).collect()),
        ])
        .unwrap()
    }

    #[test]
    fn drop_keeps_first_occurrence_across_chunks() {
        let sources = vec!["A".to_string(), "B".to_string()];
        let mut dedupe = DropDedupe::new("A", &sources);
        assert!(dedupe.absorb(&chunk(&[
            ("k1", "b1", text("1")),
            ("k2", "b2", text("2")),
        ])));
        assert!(dedupe.absorb(&chunk(&[
            ("k1", "b1_dup", text("3")),
            ("k3", "b3", text("4")),
        ])));
        let out = dedupe.finish();
        assert_eq!(out.len(), 3);
        assert_eq!(out.column("A").unwrap(), &[text("k1"), text("k2"), text("k3")]);
        assert_eq!(out.column("B").unwrap(), &[text("b1"), text("b2"), text("b3")]);
    }

    #[test]
    fn drop_skips_null_keys_and_signals_missing_key_column() {
        let sources = vec!["A".to_string(), "B".to_string()];
        let mut dedupe = DropDedupe::new("A", &sources);
        let with_null = Frame::with_columns([
            ("A", vec![text("k1"), Value::Empty, text("k2")]),
            ("B", vec![text("b1"), text("no key"), text("b2")]),
        ])
        .unwrap();
        let keyless = Frame::with_columns([("B", vec![text("b")])]).unwrap();
        assert!(dedupe.absorb(&with_null));
        assert!(!dedupe.absorb(&keyless));
        assert_eq!(dedupe.len(), 2);
    }

    #[test]
    fn concat_merges_ordered_unique_non_empty_values() {
        let sources = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let mut dedupe = ConcatDedupe::new("A", &sources, ",");
        assert!(dedupe.absorb(&chunk(&[
            ("k1", "x", text("p")),
            ("k1", "y", text("p")),
            ("k2", "y", text("q")),
            ("k1", "x", Value::Empty),
        ])));
        let out = dedupe.finish();
        assert_eq!(out.column_names(), vec!["A", "B", "C"]);
        assert_eq!(out.len(), 2);
        assert_eq!(out.cell("B", 0), Some(&text("x,y")));
        assert_eq!(out.cell("C", 0), Some(&text("p")));
        assert_eq!(out.cell("B", 1), Some(&text("y")));
        assert_eq!(out.cell("C", 1), Some(&text("q")));
    }

    #[test]
    fn concat_fills_absent_sources_with_empty_strings() {
        let sources = vec!["A".to_string(), "Z".to_string()];
        let mut dedupe = ConcatDedupe::new("A", &sources, ";");
        dedupe.absorb(&chunk(&[("k1", "x", text("p"))]));
        let out = dedupe.finish();
        assert_eq!(out.column_names(), vec!["A", "Z"]);
        assert_eq!(out.cell("Z", 0), Some(&text("")));
    }

    #[test]
    fn concat_key_order_is_first_seen() {
        let sources = vec!["A".to_string(), "B".to_string()];
        let mut dedupe = ConcatDedupe::new("A", &sources, ",");
        dedupe.absorb(&chunk(&[("z", "1", text("")), ("a", "2", text(""))]));
        dedupe.absorb(&chunk(&[("m", "3", text("")), ("z", "4", text(""))]));
        let out = dedupe.finish();
        assert_eq!(
            out.column("A").unwrap(),
            &[text("z"), text("a"), text("m")]
        );
        assert_eq!(out.cell("B", 0), Some(&text("1,4")));
    }
}
