use reshape_common::Value;

use crate::check::Check;
use crate::score::normalize;

/// Cheap pre-filter deciding whether a detector looks at a column at all.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Applicability {
    Always,
    /// Any numeric value or digit-only string present.
    AnyNumeric,
    /// Share of text values above the given ratio.
    TextShare(f64),
}

/// A named column-type hypothesis: a bundle of weighted checks plus its
/// position in the type taxonomy.
///
/// Parent/child relationships live in the registry's taxonomy table, not in
/// any inheritance structure; `detect` receives the resolved depth.
#[derive(Clone, Debug)]
pub struct Detector {
    pub type_name: &'static str,
    pub parent: Option<&'static str>,
    pub keywords: &'static [&'static str],
    pub applicability: Applicability,
    pub checks: Vec<Check>,
}

impl Detector {
    pub fn new(
        type_name: &'static str,
        parent: Option<&'static str>,
        keywords: &'static [&'static str],
        applicability: Applicability,
        checks: Vec<Check>,
    ) -> Self {
        Self {
            type_name,
            parent,
            keywords,
            applicability,
            checks,
        }
    }

    pub fn is_applicable(&self, values: &[Value]) -> bool {
        match self.applicability {
            Applicability::Always => true,
            Applicability::AnyNumeric => values.iter().any(|v| match v {
                Value::Int(_) | Value::Number(_) => true,
                Value::Text(s) => {
                    let t = s.trim();
                    !t.is_empty() && t.chars().all(|c| c.is_ascii_digit())
                }
                _ => false,
            }),
            Applicability::TextShare(min_ratio) => {
                if values.is_empty() {
                    return false;
                }
                let text = values
                    .iter()
                    .filter(|v| matches!(v, Value::Text(_)))
                    .count();
                text as f64 / values.len() as f64 > min_ratio
            }
        }
    }

    /// Aggregate the applicable checks into a score in `[0, 1)`.
    ///
    /// `depth` is this detector's distance to its taxonomy root. Averages at
    /// or below 0.3 are returned as-is (cheap rejection); stronger averages
    /// are sharpened by depth and check count, then squashed by `normalize`.
    pub fn detect(&self, values: &[Value], depth: usize) -> f64 {
        let mut sum = 0.0;
        let mut applicable = 0usize;
        for check in &self.checks {
            if check.is_applicable(values) {
                sum += check.run(values);
                applicable += 1;
            }
        }
        if applicable == 0 {
            tracing::debug!(detector = self.type_name, "no applicable checks");
            return 0.0;
        }
        let avg = sum / applicable as f64;
        if avg <= 0.3 {
            return avg;
        }
        let effective_depth = depth.max(1) as f64;
        let exponent = 1.0 + applicable as f64 / 10.0;
        normalize((avg * effective_depth).powf(exponent))
    }
}
