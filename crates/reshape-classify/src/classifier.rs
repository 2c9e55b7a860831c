use std::sync::Arc;

use reshape_common::Value;

use crate::registry::{DetectorRegistry, default_registry};
use crate::result::{Candidate, ClassificationResult};
use crate::score::{normalize, subsequence_ratio};

/// Ranks type hypotheses for a column by running every applicable detector
/// and biasing the scores with the column name.
pub struct ColumnTypeClassifier {
    registry: Arc<DetectorRegistry>,
}

impl Default for ColumnTypeClassifier {
    fn default() -> Self {
        Self::new(default_registry())
    }
}

impl ColumnTypeClassifier {
    pub fn new(registry: Arc<DetectorRegistry>) -> Self {
        Self { registry }
    }

    pub fn classify(&self, column_name: Option<&str>, values: &[Value]) -> ClassificationResult {
        let name = column_name.map(str::to_lowercase).unwrap_or_default();
        let mut candidates: Vec<Candidate> = Vec::new();

        for (order, detector) in self.registry.detectors().into_iter().enumerate() {
            if !detector.is_applicable(values) {
                continue;
            }
            let depth = self.registry.depth(detector.type_name);
            let mut score = detector.detect(values, depth);
            if score == 0.0 {
                continue;
            }

            // Column-name bias: a keyword hit is worth a flat 0.1, otherwise
            // the name/type similarity contributes up to 0.05.
            if detector.keywords.iter().any(|kw| name.contains(kw)) {
                score += 0.1;
            } else {
                score += subsequence_ratio(&name, detector.type_name).max(0.0) * 0.05;
            }
            score = normalize(score);

            if score > 0.0 {
                candidates.push(Candidate {
                    type_name: detector.type_name.to_string(),
                    score,
                    depth,
                    root: self.registry.root(detector.type_name),
                    order,
                });
            }
        }

        // Child specialization bonus: a candidate whose parent also made the
        // cut inherits a fifth of the parent's current score. Applied in
        // registration order and intentionally not re-normalized, so
        // downstream consumers may see scores slightly above 1.
        for i in 0..candidates.len() {
            let parent = self
                .registry
                .get(&candidates[i].type_name)
                .and_then(|d| d.parent);
            if let Some(parent) = parent
                && let Some(parent_score) =
                    candidates.iter().find(|c| c.type_name == parent).map(|c| c.score)
            {
                candidates[i].score += parent_score / 5.0;
            }
        }

        let examples = values
            .iter()
            .map(Value::as_field)
            .filter(|s| !s.trim().is_empty())
            .take(3)
            .collect();

        ClassificationResult::new(column_name.map(str::to_string), candidates, examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::Text(s.to_string())).collect()
    }

    #[test]
    fn boolean_column_is_detected() {
        let classifier = ColumnTypeClassifier::default();
        let values = vec![
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Text("yes".into()),
            Value::Text("no".into()),
            Value::Int(0),
            Value::Int(1),
        ];
        let result = classifier.classify(Some("is_active"), &values);
        assert!(result.score_of("boolean").is_some_and(|s| s > 0.0));
        assert_eq!(
            result.best_match(0.1).map(|c| c.type_name.as_str()),
            Some("boolean")
        );
    }

    #[test]
    fn duns_outranks_numeric_for_nine_digit_ids() {
        let classifier = ColumnTypeClassifier::default();
        let values: Vec<Value> = (0..20)
            .map(|i| Value::Text(format!("{:09}", 100_000_000i64 + i * 7_919)))
            .collect();
        let result = classifier.classify(Some("duns"), &values);
        let duns = result.score_of("duns").unwrap_or(0.0);
        let numeric = result.score_of("numeric").unwrap_or(0.0);
        assert!(duns > 0.0);
        assert!(duns > numeric, "duns {duns} vs numeric {numeric}");
        // Whatever wins outright, it is a numeric specialization, not the root.
        let best = result.best_match(0.1).unwrap();
        assert!(best.depth >= 1);
        assert_eq!(best.root, "numeric");
    }

    #[test]
    fn parent_bonus_is_not_renormalized() {
        let classifier = ColumnTypeClassifier::default();
        // Typed integers make both numeric and its children candidates.
        let values: Vec<Value> = (0..10).map(|i| Value::Int(100_000_000 + i)).collect();
        let result = classifier.classify(Some("duns"), &values);
        let numeric = result.score_of("numeric").unwrap_or(0.0);
        let duns = result.score_of("duns").unwrap_or(0.0);
        assert!(numeric > 0.0);
        // The child carries its own score plus exactly the parent bonus on top.
        assert!(duns > numeric / 5.0);
    }

    #[test]
    fn country_codes_rank_above_plain_text() {
        let classifier = ColumnTypeClassifier::default();
        let values = texts(&["SE", "NO", "DK", "FI", "DE", "FR"]);
        let result = classifier.classify(Some("country"), &values);
        let code = result.score_of("country_code").unwrap_or(0.0);
        let text = result.score_of("text").unwrap_or(0.0);
        assert!(code > text, "country_code {code} vs text {text}");
    }

    #[test]
    fn examples_are_limited_to_three_non_blank_values() {
        let classifier = ColumnTypeClassifier::default();
        let values = vec![
            Value::Empty,
            Value::Text(" ".into()),
            Value::Text("a".into()),
            Value::Text("b".into()),
            Value::Text("c".into()),
            Value::Text("d".into()),
        ];
        let result = classifier.classify(Some("col"), &values);
        assert_eq!(result.examples, vec!["a", "b", "c"]);
    }

    #[test]
    fn most_generic_walks_to_the_taxonomy_root() {
        let classifier = ColumnTypeClassifier::default();
        let values: Vec<Value> = (0..12)
            .map(|i| Value::Text(format!("{:09}", 200_000_000i64 + i * 104_729)))
            .collect();
        let result = classifier.classify(Some("duns"), &values);
        assert_eq!(result.most_generic(), Some("numeric"));
    }
}
