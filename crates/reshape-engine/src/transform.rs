use reshape_common::{Frame, Value};

use crate::mapping::Slot;

/// Join the slot's source columns row-wise with `sep`.
///
/// Missing columns and empty cells contribute empty strings, so the output
/// always has one entry per input row.
pub fn combine_sources(frame: &Frame, sources: &[String], sep: &str) -> Vec<Value> {
    let rows = frame.len();
    if sources.is_empty() {
        return vec![Value::Text(String::new()); rows];
    }
    let columns: Vec<Option<&[Value]>> = sources.iter().map(|s| frame.column(s)).collect();
    (0..rows)
        .map(|row| {
            let joined = columns
                .iter()
                .map(|col| match col.and_then(|values| values.get(row)) {
                    Some(Value::Empty) | None => String::new(),
                    Some(value) => value.as_field(),
                })
                .collect::<Vec<_>>()
                .join(sep);
            Value::Text(joined)
        })
        .collect()
}

/// Pure mapping application: one output column per slot, named per the slot
/// rule, row index preserved. An empty mapping keeps the row count and
/// drops every column.
pub fn apply_mapping(frame: &Frame, mapping: &[Slot]) -> Frame {
    if mapping.is_empty() {
        return Frame::with_row_count(frame.len());
    }
    let mut out = Frame::new();
    for (i, slot) in mapping.iter().enumerate() {
        let name = slot.output_name(i);
        if out.has_column(&name) {
            // Duplicate outputs are only legal when both slots read the same
            // single source, so the column is already correct.
            continue;
        }
        let values = combine_sources(frame, &slot.sources, &slot.separator);
        let _ = out.push_column(name, values);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::output_columns;

    fn frame() -> Frame {
        Frame::with_columns([
            (
                "A",
                vec![
                    Value::Text("x".into()),
                    Value::Text("y".into()),
                    Value::Empty,
                ],
            ),
            ("B", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            (
                "C",
                vec![
                    Value::Text("u".into()),
                    Value::Text("v".into()),
                    Value::Text("w".into()),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn combine_joins_with_separator_and_blanks_missing_values() {
        let mapping = vec![Slot::new(["A"], "|"), Slot::new(["B", "C"], "-")];
        let out = apply_mapping(&frame(), &mapping);
        assert_eq!(out.column_names(), vec!["A", "Combined_2"]);
        assert_eq!(out.cell("A", 2), Some(&Value::Text("".into())));
        assert_eq!(out.cell("Combined_2", 0), Some(&Value::Text("1-u".into())));
        assert_eq!(out.cell("Combined_2", 2), Some(&Value::Text("3-w".into())));
    }

    #[test]
    fn missing_sources_become_empty_strings() {
        let mapping = vec![Slot::new(["A", "ZZ"], "-")];
        let out = apply_mapping(&frame(), &mapping);
        assert_eq!(out.cell("Combined_1", 0), Some(&Value::Text("x-".into())));
    }

    #[test]
    fn output_columns_always_match_the_mapping() {
        for mapping in [
            vec![Slot::single("A")],
            vec![Slot::new(["A", "B"], " "), Slot::single("C")],
            vec![Slot::single("nope"), Slot::new(["B", "C", "A"], "+")],
        ] {
            let out = apply_mapping(&frame(), &mapping);
            let names = output_columns(&mapping);
            let mut expected_unique: Vec<&str> = Vec::new();
            for name in &names {
                if !expected_unique.contains(&name.as_str()) {
                    expected_unique.push(name);
                }
            }
            assert_eq!(out.column_names(), expected_unique);
            assert_eq!(out.len(), 3);
        }
    }

    #[test]
    fn empty_mapping_keeps_the_row_index() {
        let out = apply_mapping(&frame(), &[]);
        assert_eq!(out.column_count(), 0);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn empty_frame_yields_header_only_columns() {
        let empty = Frame::empty_with_columns(["A", "B"]).unwrap();
        let mapping = vec![Slot::new(["A", "B"], " ")];
        let out = apply_mapping(&empty, &mapping);
        assert_eq!(out.column_names(), vec!["Combined_1"]);
        assert!(out.is_empty());
    }
}
