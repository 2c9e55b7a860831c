use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::detector::Detector;

#[derive(Default)]
struct Inner {
    detectors: Vec<Arc<Detector>>,
    index: FxHashMap<&'static str, usize>,
}

/// Insertion-ordered detector registry plus the taxonomy queries
/// (`depth`, `root`) that the scoring and tie-break logic consult.
///
/// Registration is the only mutation; lookups copy snapshots out of the
/// lock before returning.
#[derive(Default)]
pub struct DetectorRegistry {
    inner: Mutex<Inner>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a detector under its `type_name`.
    pub fn register(&self, detector: Detector) {
        let mut inner = self.inner.lock();
        let name = detector.type_name;
        match inner.index.get(name).copied() {
            Some(i) => inner.detectors[i] = Arc::new(detector),
            None => {
                let i = inner.detectors.len();
                inner.detectors.push(Arc::new(detector));
                inner.index.insert(name, i);
            }
        }
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<Detector>> {
        let inner = self.inner.lock();
        inner
            .index
            .get(type_name)
            .map(|&i| Arc::clone(&inner.detectors[i]))
    }

    /// All detectors in registration order.
    pub fn detectors(&self) -> Vec<Arc<Detector>> {
        self.inner.lock().detectors.iter().map(Arc::clone).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distance to the taxonomy root (roots have depth 0).
    pub fn depth(&self, type_name: &str) -> usize {
        let inner = self.inner.lock();
        let mut depth = 0;
        let mut current = type_name;
        while let Some(parent) = inner
            .index
            .get(current)
            .and_then(|&i| inner.detectors[i].parent)
        {
            depth += 1;
            current = parent;
            if depth > inner.detectors.len() {
                // Defensive cap: a parent cycle would otherwise spin forever.
                break;
            }
        }
        depth
    }

    /// Top-most ancestor of `type_name` (itself when it is a root).
    pub fn root(&self, type_name: &str) -> String {
        let inner = self.inner.lock();
        let mut current = type_name;
        let mut hops = 0;
        while let Some(parent) = inner
            .index
            .get(current)
            .and_then(|&i| inner.detectors[i].parent)
        {
            current = parent;
            hops += 1;
            if hops > inner.detectors.len() {
                break;
            }
        }
        current.to_string()
    }
}

static DEFAULT: Lazy<Arc<DetectorRegistry>> = Lazy::new(|| {
    let registry = Arc::new(DetectorRegistry::new());
    crate::catalog::install_default_detectors(&registry);
    registry
});

/// Process-wide registry populated with the default catalog on first use.
pub fn default_registry() -> Arc<DetectorRegistry> {
    Arc::clone(&DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Applicability;

    fn bare(name: &'static str, parent: Option<&'static str>) -> Detector {
        Detector::new(name, parent, &[], Applicability::Always, Vec::new())
    }

    #[test]
    fn registration_order_is_preserved() {
        let registry = DetectorRegistry::new();
        registry.register(bare("b", None));
        registry.register(bare("a", None));
        let names: Vec<&str> = registry.detectors().iter().map(|d| d.type_name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn re_registration_replaces_in_place() {
        let registry = DetectorRegistry::new();
        registry.register(bare("a", None));
        registry.register(bare("b", None));
        registry.register(bare("a", Some("b")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.depth("a"), 1);
    }

    #[test]
    fn depth_and_root_walk_the_taxonomy() {
        let registry = DetectorRegistry::new();
        registry.register(bare("numeric", None));
        registry.register(bare("nordic", Some("numeric")));
        registry.register(bare("swedish", Some("nordic")));
        assert_eq!(registry.depth("numeric"), 0);
        assert_eq!(registry.depth("swedish"), 2);
        assert_eq!(registry.root("swedish"), "numeric");
        assert_eq!(registry.root("numeric"), "numeric");
    }

    #[test]
    fn default_registry_carries_the_catalog() {
        let registry = default_registry();
        assert!(registry.get("boolean").is_some());
        assert!(registry.get("duns").is_some());
        assert_eq!(registry.root("swedish_registration_number"), "numeric");
    }
}
