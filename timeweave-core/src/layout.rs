//! Final column naming for joined datasets.
//!
//! Two sources can carry a field with the same name. The layout is the
//! explicit map from `(category, field)` to the output column name, built
//! once per alignment in join order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::Category;

/// How to name a column whose field name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// First dataset to claim a name keeps it; later ones get
    /// `{field}_{category}`, then `{field}_{category}_{n}`.
    #[default]
    SuffixLater,
    /// Every column is `{category}_{field}`.
    QualifyAll,
}

/// `(category, field)` → output column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnLayout {
    names: BTreeMap<(Category, String), String>,
    taken: HashSet<String>,
    policy: CollisionPolicy,
}

impl ColumnLayout {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Claim an output name for `field` of `category` and return it.
    ///
    /// Claiming the same pair twice returns the name from the first claim.
    pub fn claim(&mut self, category: Category, field: &str) -> String {
        let key = (category, field.to_string());
        if let Some(existing) = self.names.get(&key) {
            return existing.clone();
        }

        let name = match self.policy {
            CollisionPolicy::QualifyAll => self.first_free(format!("{category}_{field}")),
            CollisionPolicy::SuffixLater => {
                if self.taken.contains(field) {
                    self.first_free(format!("{field}_{category}"))
                } else {
                    field.to_string()
                }
            }
        };

        self.taken.insert(name.clone());
        self.names.insert(key, name.clone());
        name
    }

    fn first_free(&self, base: String) -> String {
        if !self.taken.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or(base)
    }

    pub fn name(&self, category: Category, field: &str) -> Option<&str> {
        self.names
            .get(&(category, field.to_string()))
            .map(String::as_str)
    }

    /// Columns whose output name differs from their source field name.
    pub fn renamed(&self) -> impl Iterator<Item = (Category, &str, &str)> + '_ {
        self.names
            .iter()
            .filter(|((_, field), name)| field != *name)
            .map(|((category, field), name)| (*category, field.as_str(), name.as_str()))
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
