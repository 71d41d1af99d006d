use std::collections::HashMap;

use ndnd_core::name::component_types;
use ndnd_core::Name;

use crate::strategy::{best_route, multicast, Strategy};

/// Constructor for a strategy instance
pub type StrategyCtor = fn() -> Box<dyn Strategy>;

/// Named, versioned strategy implementations.
///
/// The registry maps (strategy name, version) to a constructor; workers
/// instantiate lazily and cache per worker.
pub struct StrategyRegistry {
    ctors: HashMap<(Name, u64), StrategyCtor>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(best_route::name(), best_route::VERSION, || Box::new(best_route::BestRoute));
        registry.register(multicast::name(), multicast::VERSION, || Box::new(multicast::Multicast));
        registry
    }

    pub fn register(&mut self, name: Name, version: u64, ctor: StrategyCtor) {
        self.ctors.insert((name, version), ctor);
    }

    pub fn contains(&self, name: &Name, version: u64) -> bool {
        self.ctors.contains_key(&(name.clone(), version))
    }

    /// Split a trailing decimal version component off a strategy name
    pub fn split_version(name: &Name) -> (Name, Option<u64>) {
        if let Some(last) = name.components.last() {
            if last.typ == component_types::GENERIC {
                if let Ok(text) = std::str::from_utf8(&last.value) {
                    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                        if let Ok(version) = text.parse::<u64>() {
                            return (name.get_prefix(name.len() - 1), Some(version));
                        }
                    }
                }
            }
        }
        (name.clone(), None)
    }

    /// Resolve a possibly versioned strategy name to a registered
    /// (name, version) pair; an unversioned name picks the highest version.
    pub fn resolve(&self, name: &Name) -> Option<(Name, u64)> {
        let (base, version) = Self::split_version(name);
        match version {
            Some(version) => self.contains(&base, version).then_some((base, version)),
            None => {
                let highest = self
                    .ctors
                    .keys()
                    .filter(|(registered, _)| *registered == base)
                    .map(|(_, version)| *version)
                    .max()?;
                Some((base, highest))
            }
        }
    }

    /// Build a fresh instance of a registered strategy
    pub fn instantiate(&self, name: &Name, version: u64) -> Option<Box<dyn Strategy>> {
        self.ctors.get(&(name.clone(), version)).map(|ctor| ctor())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.contains(&best_route::name(), best_route::VERSION));
        assert!(registry.contains(&multicast::name(), multicast::VERSION));
    }

    #[test]
    fn test_resolve_versioned() {
        let registry = StrategyRegistry::with_builtins();
        let mut versioned = best_route::name();
        versioned.append_str("1");

        let (name, version) = registry.resolve(&versioned).unwrap();
        assert_eq!(name, best_route::name());
        assert_eq!(version, 1);

        let mut unknown = best_route::name();
        unknown.append_str("42");
        assert!(registry.resolve(&unknown).is_none());
    }

    #[test]
    fn test_resolve_unversioned_picks_highest() {
        let mut registry = StrategyRegistry::with_builtins();
        registry.register(best_route::name(), 5, || Box::new(best_route::BestRoute));

        let (_, version) = registry.resolve(&best_route::name()).unwrap();
        assert_eq!(version, 5);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.resolve(&Name::from_str("/localhost/nfd/strategy/nope")).is_none());
    }

    #[test]
    fn test_instantiate() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.instantiate(&best_route::name(), 1).is_some());
        assert!(registry.instantiate(&best_route::name(), 9).is_none());
    }
}
