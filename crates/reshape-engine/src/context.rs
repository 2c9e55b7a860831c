use serde::{Deserialize, Serialize};

use crate::mapping::Slot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeStrategy {
    /// Keep the first occurrence per key.
    Drop,
    /// Merge all occurrences per key into joined unique value lists.
    Concat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DedupeConfig {
    pub enabled: bool,
    pub key: String,
    pub strategy: DedupeStrategy,
    #[serde(default = "default_concat_sep")]
    pub concat_sep: String,
}

fn default_concat_sep() -> String {
    ",".to_string()
}

impl DedupeConfig {
    pub fn drop(key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            key: key.into(),
            strategy: DedupeStrategy::Drop,
            concat_sep: default_concat_sep(),
        }
    }

    pub fn concat(key: impl Into<String>, sep: &str) -> Self {
        Self {
            enabled: true,
            key: key.into(),
            strategy: DedupeStrategy::Concat,
            concat_sep: sep.to_string(),
        }
    }
}

/// The bundle one run consumes. The UI writes it into state under
/// `processing.current`; each confirmation replaces the previous one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingContext {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub mapping: Vec<Slot>,
    #[serde(default)]
    pub skip_rows: Vec<usize>,
    #[serde(default)]
    pub dedupe: Option<DedupeConfig>,
}

impl ProcessingContext {
    pub fn new(source: impl Into<String>, mapping: Vec<Slot>) -> Self {
        Self {
            source: source.into(),
            mapping,
            skip_rows: Vec::new(),
            dedupe: None,
        }
    }

    pub fn with_skip_rows(mut self, skip_rows: Vec<usize>) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    pub fn with_dedupe(mut self, dedupe: DedupeConfig) -> Self {
        self.dedupe = Some(dedupe);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_round_trips_through_json() {
        let ctx = ProcessingContext::new(
            "/tmp/in.xlsx::Sheet1",
            vec![Slot::single("A"), Slot::new(["B", "C"], "-")],
        )
        .with_skip_rows(vec![0, 3])
        .with_dedupe(DedupeConfig::concat("A", ";"));

        let json = serde_json::to_value(&ctx).unwrap();
        let back: ProcessingContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn missing_fields_default() {
        let ctx: ProcessingContext =
            serde_json::from_str(r#"{"source": "a.csv", "mapping": []}"#).unwrap();
        assert!(ctx.skip_rows.is_empty());
        assert!(ctx.dedupe.is_none());
    }
}
