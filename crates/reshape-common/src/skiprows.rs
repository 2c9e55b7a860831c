//! Skip-rows expression grammar.
//!
//! `expr := item (',' item)*` where each item is a zero-based row index or
//! an inclusive range written `A-B` or `A..B` (endpoint order does not
//! matter). Parsing yields a sorted, de-duplicated index list.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SkipRowsError {
    #[error("invalid skip-rows item: {item:?}")]
    BadItem { item: String },
    #[error("negative row index not allowed: {item:?}")]
    Negative { item: String },
}

/// Parse a human-written skip-rows expression into sorted unique indices.
///
/// Empty items are ignored, whitespace around items and endpoints is
/// permitted, negative integers are rejected.
pub fn parse_skip_rows(expr: &str) -> Result<Vec<usize>, SkipRowsError> {
    let mut rows = Vec::new();
    for raw in expr.split(',') {
        let item = raw.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((a, b)) = split_range(item) {
            let start = parse_endpoint(a, item)?;
            let end = parse_endpoint(b, item)?;
            let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
            rows.extend(lo..=hi);
        } else {
            rows.push(parse_endpoint(item, item)?);
        }
    }
    rows.sort_unstable();
    rows.dedup();
    Ok(rows)
}

/// Canonical rendering: maximal runs collapse to `A-B`, singletons stay bare.
pub fn render_skip_rows(rows: &[usize]) -> String {
    let mut sorted = rows.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts: Vec<String> = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let start = sorted[i];
        let mut end = start;
        while i + 1 < sorted.len() && sorted[i + 1] == end + 1 {
            i += 1;
            end = sorted[i];
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
        i += 1;
    }
    parts.join(",")
}

/// True when `rows` is exactly `0..n` for some `n`, i.e. expressible as a
/// header-row count.
pub fn is_contiguous_prefix(rows: &[usize]) -> bool {
    let mut sorted = rows.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.iter().copied().eq(0..sorted.len())
}

fn split_range(item: &str) -> Option<(&str, &str)> {
    if let Some((a, b)) = item.split_once("..") {
        return Some((a, b));
    }
    // A leading '-' is a (rejected) sign, not a range separator.
    match item.split_once('-') {
        Some((a, b)) if !a.trim().is_empty() => Some((a, b)),
        _ => None,
    }
}

fn parse_endpoint(s: &str, item: &str) -> Result<usize, SkipRowsError> {
    let s = s.trim();
    if s.starts_with('-') {
        return Err(SkipRowsError::Negative {
            item: item.to_string(),
        });
    }
    s.parse::<usize>().map_err(|_| SkipRowsError::BadItem {
        item: item.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_singletons_and_ranges() {
        assert_eq!(parse_skip_rows("0, 2, 4-6").unwrap(), vec![0, 2, 4, 5, 6]);
        assert_eq!(parse_skip_rows("1..3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn endpoint_order_is_immaterial() {
        assert_eq!(
            parse_skip_rows("6-4").unwrap(),
            parse_skip_rows("4-6").unwrap()
        );
    }

    #[test]
    fn ignores_empty_items_and_dedupes() {
        assert_eq!(parse_skip_rows(",,1,1,, 2 ,").unwrap(), vec![1, 2]);
        assert_eq!(parse_skip_rows("").unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn rejects_negatives_and_garbage() {
        assert!(matches!(
            parse_skip_rows("-1"),
            Err(SkipRowsError::Negative { .. })
        ));
        assert!(matches!(
            parse_skip_rows("abc"),
            Err(SkipRowsError::BadItem { .. })
        ));
    }

    #[test]
    fn parse_render_parse_is_idempotent() {
        for expr in ["0,1,2,5,9-12", "3..1, 7", "0-0", " 4 , 2 "] {
            let parsed = parse_skip_rows(expr).unwrap();
            let reparsed = parse_skip_rows(&render_skip_rows(&parsed)).unwrap();
            assert_eq!(parsed, reparsed, "expr {expr:?}");
        }
    }

    #[test]
    fn contiguous_prefix_detection() {
        assert!(is_contiguous_prefix(&[]));
        assert!(is_contiguous_prefix(&[0, 1, 2]));
        assert!(is_contiguous_prefix(&[2, 0, 1, 1]));
        assert!(!is_contiguous_prefix(&[1, 2]));
        assert!(!is_contiguous_prefix(&[0, 2]));
    }
}
