//! Conditional visibility between fields.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
    form::state::{FormState, path_touches},
    schema::FieldTree,
};

/// Watch graph of `options.dependencies` declarations.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Field path -> conditions that must all hold for it to be visible.
    conditions: BTreeMap<String, Map<String, Value>>,
}

impl DependencyGraph {
    /// Collect the conditions of every field, nested ones included.
    pub fn build(fields: &FieldTree) -> Self {
        let conditions = fields
            .walk()
            .into_iter()
            .filter_map(|f| f.dependencies.clone().map(|d| (f.path.clone(), d)))
            .collect();
        DependencyGraph { conditions }
    }

    /// Whether `field` is visible in `state`. Unconditional fields always are.
    pub fn is_visible(&self, field: &str, state: &FormState) -> bool {
        self.conditions
            .get(field)
            .is_none_or(|deps| conditions_met(deps, state))
    }

    /// Visibility of every conditional field.
    pub fn evaluate_all(&self, state: &FormState) -> BTreeMap<String, bool> {
        self.conditions
            .iter()
            .map(|(field, deps)| (field.clone(), conditions_met(deps, state)))
            .collect()
    }

    /// Conditional fields watching a value that changed at `changed`.
    pub fn affected_by(&self, changed: &str) -> Vec<String> {
        self.conditions
            .iter()
            .filter(|(_, deps)| deps.keys().any(|watched| path_touches(watched, changed)))
            .map(|(field, _)| field.clone())
            .collect()
    }

    /// Every path some field's visibility depends on.
    pub fn watched_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .conditions
            .values()
            .flat_map(|deps| deps.keys().cloned())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Every `path -> expected` pair matches exactly; no type coercion.
pub fn conditions_met(deps: &Map<String, Value>, state: &FormState) -> bool {
    deps.iter()
        .all(|(path, expected)| state.get(path) == Some(expected))
}
