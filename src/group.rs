use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKind {
    Exact,   // same size and content fingerprint
    Similar, // perceptual fingerprints within range
}

/// Two or more paths judged equivalent. Finders never emit fewer than two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub kind: DuplicateKind,
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Returns `None` for groups of fewer than two paths.
    pub fn new(kind: DuplicateKind, paths: Vec<PathBuf>) -> Option<Self> {
        (paths.len() > 1).then_some(Self { kind, paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_rejected() {
        assert!(DuplicateGroup::new(DuplicateKind::Exact, vec![]).is_none());
        assert!(DuplicateGroup::new(DuplicateKind::Exact, vec!["a.jpg".into()]).is_none());
        let group =
            DuplicateGroup::new(DuplicateKind::Similar, vec!["a.jpg".into(), "b.jpg".into()])
                .unwrap();
        assert_eq!(group.len(), 2);
    }
}
