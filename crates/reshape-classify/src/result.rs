/// One scored type hypothesis for a column.
///
/// Taxonomy facts (depth, root) and registry insertion order are resolved
/// at classification time so the result stays self-contained.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub type_name: String,
    pub score: f64,
    pub depth: usize,
    pub root: String,
    pub order: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ClassificationResult {
    pub column_name: Option<String>,
    /// Candidates sorted by descending score, insertion order as tie order.
    pub candidates: Vec<Candidate>,
    /// Up to three non-blank example values from the column.
    pub examples: Vec<String>,
}

impl ClassificationResult {
    pub fn new(
        column_name: Option<String>,
        mut candidates: Vec<Candidate>,
        examples: Vec<String>,
    ) -> Self {
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.order.cmp(&b.order))
        });
        Self {
            column_name,
            candidates,
            examples,
        }
    }

    pub fn score_of(&self, type_name: &str) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.type_name == type_name)
            .map(|c| c.score)
    }

    /// Strongest candidate at or above `threshold`.
    ///
    /// Exact score ties prefer the deepest candidate; remaining ties fall
    /// back to registry insertion order, which is deterministic.
    pub fn best_match(&self, threshold: f64) -> Option<&Candidate> {
        let top = self
            .candidates
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max);
        if !top.is_finite() || top < threshold {
            return None;
        }
        self.candidates
            .iter()
            .filter(|c| c.score == top)
            .max_by(|a, b| a.depth.cmp(&b.depth).then(b.order.cmp(&a.order)))
    }

    /// Taxonomy root of the best match.
    pub fn most_generic(&self) -> Option<&str> {
        self.best_match(0.1).map(|c| c.root.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(type_name: &str, score: f64, depth: usize, root: &str, order: usize) -> Candidate {
        Candidate {
            type_name: type_name.to_string(),
            score,
            depth,
            root: root.to_string(),
            order,
        }
    }

    #[test]
    fn sorted_descending_by_score() {
        let result = ClassificationResult::new(
            None,
            vec![
                candidate("a", 0.2, 0, "a", 0),
                candidate("b", 0.9, 0, "b", 1),
            ],
            vec![],
        );
        assert_eq!(result.candidates[0].type_name, "b");
    }

    #[test]
    fn best_match_honours_threshold() {
        let result = ClassificationResult::new(
            None,
            vec![candidate("a", 0.05, 0, "a", 0)],
            vec![],
        );
        assert!(result.best_match(0.1).is_none());
        assert!(result.best_match(0.01).is_some());
    }

    #[test]
    fn exact_ties_prefer_depth_then_insertion_order() {
        let result = ClassificationResult::new(
            None,
            vec![
                candidate("numeric", 0.5, 0, "numeric", 0),
                candidate("duns", 0.5, 1, "numeric", 4),
                candidate("zip_code", 0.5, 1, "numeric", 6),
            ],
            vec![],
        );
        let best = result.best_match(0.1).unwrap();
        assert_eq!(best.type_name, "duns");
    }

    #[test]
    fn most_generic_returns_root() {
        let result = ClassificationResult::new(
            None,
            vec![candidate("swedish_registration_number", 0.7, 2, "numeric", 8)],
            vec![],
        );
        assert_eq!(result.most_generic(), Some("numeric"));
    }

    #[test]
    fn empty_result_has_no_match() {
        let result = ClassificationResult::default();
        assert!(result.best_match(0.1).is_none());
        assert!(result.most_generic().is_none());
    }
}
