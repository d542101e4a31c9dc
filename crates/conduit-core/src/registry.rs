//! The part type registry and unknown-type resolution.
//!
//! Part types register once at startup under their persisted name. When a
//! stored name is no longer registered (a part type was renamed or its
//! provider removed), the network's resolver list is consulted in
//! registration order; the first non-empty answer supplies a substitute
//! definition.

use crate::part::PartDefinition;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Errors that can occur during part type registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("part type already registered: {0}")]
    Duplicate(String),
}

/// Registry of part definitions, keyed by persisted name.
#[derive(Debug, Default)]
pub struct PartRegistry {
    parts: BTreeMap<String, Arc<dyn PartDefinition>>,
}

impl PartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its name. Names are unique.
    pub fn register(&mut self, definition: Arc<dyn PartDefinition>) -> Result<(), RegistryError> {
        let name = definition.name().to_string();
        if self.parts.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.parts.insert(name, definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PartDefinition>> {
        self.parts.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Registered names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }
}

/// Supplies a substitute definition for a stored part type name the
/// registry does not know. Resolvers are consulted in registration order;
/// the first non-empty answer wins.
pub trait UnknownPartResolver: fmt::Debug {
    fn resolve(&self, name: &str) -> Option<Arc<dyn PartDefinition>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ProbeDefinition;

    fn probe_named(name: &str) -> Arc<dyn PartDefinition> {
        Arc::new(ProbeDefinition::named(name))
    }

    #[test]
    fn register_and_look_up() {
        let mut registry = PartRegistry::new();
        registry.register(probe_named("probe")).unwrap();
        assert!(registry.contains("probe"));
        assert_eq!(registry.get("probe").unwrap().name(), "probe");
        assert!(registry.get("emitter").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = PartRegistry::new();
        registry.register(probe_named("probe")).unwrap();
        let err = registry.register(probe_named("probe")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "probe"));
    }

    #[test]
    fn names_are_ordered() {
        let mut registry = PartRegistry::new();
        registry.register(probe_named("b")).unwrap();
        registry.register(probe_named("a")).unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
