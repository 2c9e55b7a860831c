use regex::Regex;
use reshape_common::Value;
use rustc_hash::FxHashSet;

/// Scoring strategy of a [`Check`].
///
/// Checks are data, not subclasses: each kind carries its own parameters
/// and scores a value list in `[0, 1]` before weighting.
#[derive(Clone, Debug)]
pub enum CheckKind {
    /// Share of text values matched by the regex.
    Pattern(Regex),
    /// Share of text values whose length lies in `[min, max]`.
    Length { min: usize, max: Option<usize> },
    /// Share of text values whose whitespace tokens are all alphabetic.
    AlphaTokens,
    /// Variance of text lengths: above `max` scores 0, at or above `min`
    /// scores 1, otherwise 0.25.
    LengthVariance { min: f64, max: Option<f64> },
    /// Distinct-value ratio: above `max` scores 0, at or above `min`
    /// scores 1, otherwise 0.25.
    Uniqueness { min: f64, max: Option<f64> },
    /// Numeric variance inside `[min, max]` scores 1, otherwise 0.
    Variance { min: f64, max: f64 },
    /// Share of numeric values.
    Numeric,
    /// Share of values whose text form is a recognised boolean token.
    Boolean,
    /// 1.0 when every non-empty value is text, 0.25 when some are.
    StringType,
    /// Share of text values parseable with a known date format.
    Date,
}

#[derive(Clone, Debug)]
pub struct Check {
    pub name: &'static str,
    pub weight: f64,
    pub kind: CheckKind,
}

const BOOLEAN_TOKENS: [&str; 6] = ["true", "false", "1", "0", "yes", "no"];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y",
    "%B %d, %Y",
];

impl Check {
    pub fn new(name: &'static str, weight: f64, kind: CheckKind) -> Self {
        Self { name, weight, kind }
    }

    pub fn pattern(name: &'static str, weight: f64, pattern: &str) -> Self {
        let regex = Regex::new(pattern).unwrap_or_else(|e| {
            // Catalog patterns are literals; a bad one is a programming error.
            panic!("invalid check pattern {pattern:?}: {e}")
        });
        Self::new(name, weight, CheckKind::Pattern(regex))
    }

    pub fn is_applicable(&self, values: &[Value]) -> bool {
        match &self.kind {
            CheckKind::Numeric => numeric_ratio(values) > 0.0,
            CheckKind::StringType | CheckKind::Date => {
                values.iter().any(|v| matches!(v, Value::Text(_)))
            }
            _ => !values.is_empty(),
        }
    }

    /// Score in `[0, weight]`.
    pub fn run(&self, values: &[Value]) -> f64 {
        self.raw_score(values) * self.weight
    }

    fn raw_score(&self, values: &[Value]) -> f64 {
        match &self.kind {
            CheckKind::Pattern(regex) => match_ratio(values, |v| {
                v.as_str().is_some_and(|s| regex.is_match(s))
            }),
            CheckKind::Length { min, max } => match_ratio(values, |v| {
                v.as_str().is_some_and(|s| {
                    s.len() >= *min && max.is_none_or(|m| s.len() <= m)
                })
            }),
            CheckKind::AlphaTokens => match_ratio(values, |v| {
                v.as_str().is_some_and(|s| {
                    s.split_whitespace()
                        .all(|tok| tok.chars().all(char::is_alphabetic))
                })
            }),
            CheckKind::LengthVariance { min, max } => {
                let lengths: Vec<f64> = values
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.len() as f64))
                    .collect();
                if lengths.is_empty() {
                    return 0.0;
                }
                let variance = population_variance(&lengths);
                if max.is_some_and(|m| variance > m) {
                    0.0
                } else if variance >= *min {
                    1.0
                } else {
                    0.25
                }
            }
            CheckKind::Uniqueness { min, max } => {
                if values.is_empty() {
                    return 0.0;
                }
                let distinct: FxHashSet<String> =
                    values.iter().map(Value::as_field).collect();
                let ratio = distinct.len() as f64 / values.len() as f64;
                if max.is_some_and(|m| ratio > m) {
                    0.0
                } else if ratio >= *min {
                    1.0
                } else {
                    0.25
                }
            }
            CheckKind::Variance { min, max } => {
                let nums: Vec<f64> = values.iter().filter_map(as_number).collect();
                if nums.is_empty() {
                    return 0.0;
                }
                let variance = population_variance(&nums);
                if variance >= *min && variance <= *max { 1.0 } else { 0.0 }
            }
            CheckKind::Numeric => numeric_ratio(values),
            CheckKind::Boolean => match_ratio(values, |v| {
                BOOLEAN_TOKENS.contains(&v.as_field().to_ascii_lowercase().as_str())
            }),
            CheckKind::StringType => {
                let non_empty: Vec<&Value> =
                    values.iter().filter(|v| !matches!(v, Value::Empty)).collect();
                let any = non_empty.iter().any(|v| matches!(v, Value::Text(_)));
                let all = non_empty.iter().all(|v| matches!(v, Value::Text(_)));
                if all && any {
                    1.0
                } else if any {
                    0.25
                } else {
                    0.0
                }
            }
            CheckKind::Date => match_ratio(values, |v| {
                v.as_str().is_some_and(is_date_like)
            }),
        }
    }
}

fn match_ratio(values: &[Value], pred: impl Fn(&Value) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let matches = values.iter().filter(|v| pred(v)).count();
    matches as f64 / values.len() as f64
}

fn numeric_ratio(values: &[Value]) -> f64 {
    match_ratio(values, |v| matches!(v, Value::Int(_) | Value::Number(_)))
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn population_variance(xs: &[f64]) -> f64 {
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64
}

fn is_date_like(s: &str) -> bool {
    DATE_FORMATS.iter().any(|fmt| {
        chrono::NaiveDate::parse_from_str(s, fmt).is_ok()
            || chrono::NaiveDateTime::parse_from_str(s, fmt).is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::Text(s.to_string())).collect()
    }

    #[test]
    fn run_stays_within_weight() {
        let check = Check::pattern("duns_hyphen_check", 1.6, r"^\d{2}-\d{3}-\d{4}$");
        let values = texts(&["12-345-6789", "nope", "98-765-4321"]);
        let score = check.run(&values);
        assert!(score >= 0.0 && score <= check.weight);
        assert!((score - 1.6 * (2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn boolean_tokens_cover_typed_values() {
        let check = Check::new("boolean_check", 0.5, CheckKind::Boolean);
        let values = vec![
            Value::Boolean(true),
            Value::Text("no".into()),
            Value::Int(0),
            Value::Text("maybe".into()),
        ];
        assert!((check.run(&values) - 0.5 * 0.75).abs() < 1e-12);
    }

    #[test]
    fn uniqueness_thresholds() {
        let check = Check::new(
            "uniqueness_check",
            1.0,
            CheckKind::Uniqueness { min: 0.8, max: None },
        );
        assert_eq!(check.run(&texts(&["a", "b", "c"])), 1.0);
        assert_eq!(check.run(&texts(&["a", "a", "a", "a"])), 0.25);

        let capped = Check::new(
            "category_uniqueness",
            1.0,
            CheckKind::Uniqueness { min: 0.0, max: Some(0.1) },
        );
        assert_eq!(capped.run(&texts(&["a", "b", "c"])), 0.0);
    }

    #[test]
    fn length_variance_zero_for_uniform_strings() {
        let check = Check::new(
            "length_variance_check",
            1.1,
            CheckKind::LengthVariance { min: 0.0, max: Some(0.1) },
        );
        assert!((check.run(&texts(&["123456789", "987654321"])) - 1.1).abs() < 1e-12);
        assert_eq!(check.run(&texts(&["a", "abcdef"])), 0.0);
    }

    #[test]
    fn numeric_check_not_applicable_to_pure_text() {
        let check = Check::new("numeric_check", 0.5, CheckKind::Numeric);
        assert!(!check.is_applicable(&texts(&["x", "y"])));
        assert!(check.is_applicable(&[Value::Int(3)]));
    }

    #[test]
    fn date_check_recognises_common_formats() {
        let check = Check::new("date_check", 1.0, CheckKind::Date);
        let values = texts(&["2024-01-31", "31/01/2024", "not a date"]);
        assert!((check.run(&values) - 2.0 / 3.0).abs() < 1e-12);
    }
}
