//! Schema store: operation name to its declarative spec.
//!
//! Populated from the operation-map file at startup, then optionally extended
//! by code-time registrations before the server starts serving. First
//! registration wins: file-sourced schemas stay authoritative over later
//! code-time registrations of the same name. The store is read-only during
//! the request-handling phase, so it needs no synchronization.

use std::collections::HashMap;

use opsgate_core::{OperationMap, OperationSpec};
use tracing::{debug, warn};

/// Mapping from operation name to its [`OperationSpec`].
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
    specs: HashMap<String, OperationSpec>,
}

impl SchemaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a parsed declarative source.
    #[must_use]
    pub fn from_map(map: OperationMap) -> Self {
        Self { specs: map }
    }

    /// Registers `spec` under `name` if the name is absent.
    ///
    /// A duplicate registration is logged and discarded; the existing entry
    /// stays untouched and no error is surfaced to the caller. Returns
    /// whether the spec was stored.
    pub fn register(&mut self, name: &str, spec: OperationSpec) -> bool {
        if self.specs.contains_key(name) {
            warn!(operation = name, "duplicate schema registration ignored");
            return false;
        }
        debug!(operation = name, method = %spec.method, "schema registered");
        self.specs.insert(name.to_string(), spec);
        true
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&OperationSpec> {
        self.specs.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OperationSpec)> {
        self.specs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use opsgate_core::{ParamSpec, ParamType, TransportMethod};

    use super::*;

    fn spec_with_param(param: &str) -> OperationSpec {
        OperationSpec {
            method: TransportMethod::Post,
            params: vec![ParamSpec {
                name: param.to_string(),
                param_type: ParamType::String,
                mandatory: true,
                validation: None,
            }],
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut store = SchemaStore::new();
        assert!(store.register("createUser", spec_with_param("email")));

        let spec = store.lookup("createUser").unwrap();
        assert_eq!(spec.params[0].name, "email");
        assert!(store.lookup("deleteUser").is_none());
    }

    #[test]
    fn first_registration_wins() {
        let mut store = SchemaStore::new();
        assert!(store.register("createUser", spec_with_param("email")));
        assert!(!store.register("createUser", spec_with_param("username")));

        // The original schema stays authoritative.
        let spec = store.lookup("createUser").unwrap();
        assert_eq!(spec.params[0].name, "email");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_sourced_schemas_beat_code_time_registrations() {
        let mut map = OperationMap::new();
        map.insert("createUser".to_string(), spec_with_param("email"));

        let mut store = SchemaStore::from_map(map);
        assert!(!store.register("createUser", spec_with_param("username")));
        assert_eq!(store.lookup("createUser").unwrap().params[0].name, "email");
    }

    #[test]
    fn empty_store() {
        let store = SchemaStore::new();
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
    }
}
