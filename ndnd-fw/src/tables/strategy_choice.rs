use std::collections::HashMap;

use log::info;
use ndnd_core::Name;

/// A bound strategy: its NDN name and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyChoice {
    pub strategy: Name,
    pub version: u64,
}

/// Errors from mutating the strategy choice table
#[derive(Debug, thiserror::Error)]
pub enum StrategyChoiceError {
    #[error("the root strategy entry cannot be unset")]
    RootImmutable,
    #[error("no strategy entry for prefix")]
    NoEntry,
}

/// Name-prefix → strategy binding with longest-prefix lookup.
///
/// The root prefix is always bound, so `find` never fails. Process-wide,
/// mutated only by management.
pub struct StrategyChoiceTable {
    entries: HashMap<Name, StrategyChoice>,
}

impl StrategyChoiceTable {
    pub fn new(root: StrategyChoice) -> Self {
        let mut entries = HashMap::new();
        entries.insert(Name::new(), root);
        Self { entries }
    }

    /// Bind a prefix to a strategy, replacing any previous binding
    pub fn set(&mut self, prefix: Name, choice: StrategyChoice) {
        info!("strategy choice {} -> {} v{}", prefix, choice.strategy, choice.version);
        self.entries.insert(prefix, choice);
    }

    /// Remove a binding; names under it fall back to the next-longest prefix
    pub fn unset(&mut self, prefix: &Name) -> Result<(), StrategyChoiceError> {
        if prefix.is_empty() {
            return Err(StrategyChoiceError::RootImmutable);
        }
        match self.entries.remove(prefix) {
            Some(_) => Ok(()),
            None => Err(StrategyChoiceError::NoEntry),
        }
    }

    /// Longest-prefix strategy lookup; the root entry always matches
    pub fn find(&self, name: &Name) -> StrategyChoice {
        for k in (0..=name.len()).rev() {
            if let Some(choice) = self.entries.get(&name.get_prefix(k)) {
                return choice.clone();
            }
        }
        unreachable!("root strategy entry is always present")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(name: &str, version: u64) -> StrategyChoice {
        StrategyChoice {
            strategy: Name::from_str(name),
            version,
        }
    }

    #[test]
    fn test_root_always_matches() {
        let table = StrategyChoiceTable::new(choice("/s/default", 1));
        assert_eq!(table.find(&Name::from_str("/anything/at/all")), choice("/s/default", 1));
        assert_eq!(table.find(&Name::new()), choice("/s/default", 1));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut table = StrategyChoiceTable::new(choice("/s/default", 1));
        table.set(Name::from_str("/a"), choice("/s/one", 1));
        table.set(Name::from_str("/a/b"), choice("/s/two", 1));

        assert_eq!(table.find(&Name::from_str("/a/b/c")), choice("/s/two", 1));
        assert_eq!(table.find(&Name::from_str("/a/x")), choice("/s/one", 1));
        assert_eq!(table.find(&Name::from_str("/z")), choice("/s/default", 1));
    }

    #[test]
    fn test_unset_falls_back() {
        let mut table = StrategyChoiceTable::new(choice("/s/default", 1));
        table.set(Name::from_str("/a"), choice("/s/one", 1));
        table.set(Name::from_str("/a/b"), choice("/s/two", 1));

        table.unset(&Name::from_str("/a/b")).unwrap();
        assert_eq!(table.find(&Name::from_str("/a/b/c")), choice("/s/one", 1));
    }

    #[test]
    fn test_root_cannot_be_unset() {
        let mut table = StrategyChoiceTable::new(choice("/s/default", 1));
        assert!(matches!(
            table.unset(&Name::new()),
            Err(StrategyChoiceError::RootImmutable)
        ));
    }

    #[test]
    fn test_unset_missing_entry() {
        let mut table = StrategyChoiceTable::new(choice("/s/default", 1));
        assert!(matches!(
            table.unset(&Name::from_str("/a")),
            Err(StrategyChoiceError::NoEntry)
        ));
    }

    #[test]
    fn test_set_replaces() {
        let mut table = StrategyChoiceTable::new(choice("/s/default", 1));
        table.set(Name::from_str("/a"), choice("/s/one", 1));
        table.set(Name::from_str("/a"), choice("/s/one", 2));
        assert_eq!(table.find(&Name::from_str("/a")).version, 2);
    }
}
