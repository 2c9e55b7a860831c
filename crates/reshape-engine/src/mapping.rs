use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One mapping entry: the input columns it reads and the joiner used when
/// it reads more than one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub sources: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    " ".to_string()
}

impl Slot {
    pub fn new<S: Into<String>>(sources: impl IntoIterator<Item = S>, separator: &str) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            separator: separator.to_string(),
        }
    }

    pub fn single(source: impl Into<String>) -> Self {
        Self::new([source.into()], " ")
    }

    /// Output column name: the sole source, or `Combined_{i+1}` by slot
    /// position.
    pub fn output_name(&self, index: usize) -> String {
        if self.sources.len() == 1 {
            self.sources[0].clone()
        } else {
            format!("Combined_{}", index + 1)
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("mapping slot {slot} has no sources")]
    EmptySlot { slot: usize },
    #[error("mapping slot {slot} lists source {name:?} twice")]
    DuplicateSource { slot: usize, name: String },
    #[error("output column {name:?} produced by multiple multi-source slots")]
    AmbiguousOutput { name: String },
}

/// Slot invariants plus the cross-slot output-name rule: a duplicate output
/// name is only legal when every producer is the same single-source column.
pub fn validate_mapping(mapping: &[Slot]) -> Result<(), MappingError> {
    for (i, slot) in mapping.iter().enumerate() {
        if slot.sources.is_empty() {
            return Err(MappingError::EmptySlot { slot: i });
        }
        for (j, source) in slot.sources.iter().enumerate() {
            if slot.sources[..j].contains(source) {
                return Err(MappingError::DuplicateSource {
                    slot: i,
                    name: source.clone(),
                });
            }
        }
    }
    let names = output_columns(mapping);
    for (i, name) in names.iter().enumerate() {
        for (j, other) in names[..i].iter().enumerate() {
            if name == other
                && (mapping[i].sources.len() > 1 || mapping[j].sources.len() > 1)
            {
                return Err(MappingError::AmbiguousOutput { name: name.clone() });
            }
        }
    }
    Ok(())
}

/// Output column sequence in mapping order.
pub fn output_columns(mapping: &[Slot]) -> Vec<String> {
    mapping
        .iter()
        .enumerate()
        .map(|(i, slot)| slot.output_name(i))
        .collect()
}

/// Every source referenced by the mapping, first-seen order, no duplicates.
pub fn collect_all_sources(mapping: &[Slot]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for slot in mapping {
        for source in &slot.sources {
            if !source.is_empty() && !out.contains(source) {
                out.push(source.clone());
            }
        }
    }
    out
}

/// Split a composite source id `path::sheet` on the rightmost `::`.
///
/// The rightmost split keeps Windows drive letters intact; an empty sheet
/// part collapses to `None`.
pub fn parse_source_id(source_id: &str) -> (String, Option<String>) {
    match source_id.rsplit_once("::") {
        Some((path, sheet)) if !sheet.is_empty() => (path.to_string(), Some(sheet.to_string())),
        Some((path, _)) => (path.to_string(), None),
        None => (source_id.to_string(), None),
    }
}

/// Default output location: `{stem}_processed{ext}` beside the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_processed.{ext}"),
        None => format!("{stem}_processed"),
    };
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_follow_the_slot_shape() {
        let mapping = vec![
            Slot::single("A"),
            Slot::new(["B", "C"], "-"),
            Slot::single("D"),
        ];
        assert_eq!(output_columns(&mapping), vec!["A", "Combined_2", "D"]);
    }

    #[test]
    fn validation_rejects_empty_and_duplicate_sources() {
        assert!(matches!(
            validate_mapping(&[Slot::new(Vec::<String>::new(), " ")]),
            Err(MappingError::EmptySlot { slot: 0 })
        ));
        assert!(matches!(
            validate_mapping(&[Slot::new(["A", "A"], " ")]),
            Err(MappingError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn duplicate_outputs_allowed_only_for_shared_single_source() {
        // Same single source twice: fine.
        assert!(validate_mapping(&[Slot::single("A"), Slot::single("A")]).is_ok());
        // A multi-source slot colliding with a single-source name: rejected.
        let colliding = vec![
            Slot::new(["Combined_2"], " "),
            Slot::new(["B", "C"], "-"),
        ];
        assert!(matches!(
            validate_mapping(&colliding),
            Err(MappingError::AmbiguousOutput { .. })
        ));
    }

    #[test]
    fn source_id_splits_on_rightmost_separator() {
        assert_eq!(
            parse_source_id("C::\\data\\in.xlsx::Sheet 1"),
            ("C::\\data\\in.xlsx".to_string(), Some("Sheet 1".to_string()))
        );
        assert_eq!(
            parse_source_id("/tmp/in.csv"),
            ("/tmp/in.csv".to_string(), None)
        );
        assert_eq!(
            parse_source_id("/tmp/in.xlsx::"),
            ("/tmp/in.xlsx".to_string(), None)
        );
    }

    #[test]
    fn default_output_path_keeps_extension() {
        assert_eq!(
            default_output_path(Path::new("/data/in.csv")),
            PathBuf::from("/data/in_processed.csv")
        );
        assert_eq!(
            default_output_path(Path::new("noext")),
            PathBuf::from("noext_processed")
        );
    }

    #[test]
    fn sources_are_collected_in_first_seen_order() {
        let mapping = vec![
            Slot::new(["B", "A"], "-"),
            Slot::single("A"),
            Slot::single("C"),
        ];
        assert_eq!(collect_all_sources(&mapping), vec!["B", "A", "C"]);
    }
}
