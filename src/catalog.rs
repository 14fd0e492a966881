//! Item catalog and reference corpus.
//!
//! Both are built once before a search starts and are only ever read
//! afterwards, so they can be shared across evaluation threads by reference.
//!
//! Author: menu-pareto developers
//! License: MIT
//! Version: 0.3.0

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::genome::Recipe;

/// Position class an item may occupy in a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// First and last slot (buns)
    Boundary,
    /// Interior slots (fillings)
    Filler,
}

/// Per-item weights as they appear in catalog files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub uniqueness: f64,
    pub cost: f64,
}

impl Weights {
    pub fn new(uniqueness: f64, cost: f64) -> Self {
        Self { uniqueness, cost }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub role: Role,
    pub cost_weight: f64,
    pub uniqueness_weight: f64,
}

/// Immutable item catalog partitioned into boundary and filler roles
#[derive(Debug, Clone)]
pub struct Catalog {
    items: HashMap<String, Item>,
    // Name-ordered so index-based sampling is reproducible
    boundary: Vec<String>,
    filler: Vec<String>,
}

impl Catalog {
    /// Build a catalog from the two role mappings.
    ///
    /// Fails with `InvalidConfiguration` when either role is empty, a name is
    /// blank or holds a separator used by the CSV output (`,` `;` `"` or a
    /// control character), a weight is negative or not finite, or a name
    /// appears in both roles.
    pub fn new(
        boundary: &BTreeMap<String, Weights>,
        filler: &BTreeMap<String, Weights>,
    ) -> Result<Self> {
        if boundary.is_empty() {
            return Err(SearchError::InvalidConfiguration(
                "boundary catalog is empty".to_string(),
            ));
        }
        if filler.is_empty() {
            return Err(SearchError::InvalidConfiguration(
                "filler catalog is empty".to_string(),
            ));
        }

        let mut items = HashMap::with_capacity(boundary.len() + filler.len());
        for (role, table) in [(Role::Boundary, boundary), (Role::Filler, filler)] {
            for (name, w) in table {
                if name.trim().is_empty()
                    || name.chars().any(|c| matches!(c, ',' | ';' | '"') || c.is_control())
                {
                    return Err(SearchError::InvalidConfiguration(format!(
                        "item name {:?} is blank or contains a reserved character",
                        name
                    )));
                }
                if !(w.cost.is_finite() && w.cost >= 0.0) {
                    return Err(SearchError::InvalidConfiguration(format!(
                        "item '{}' has invalid cost weight {}",
                        name, w.cost
                    )));
                }
                if !(w.uniqueness.is_finite() && w.uniqueness >= 0.0) {
                    return Err(SearchError::InvalidConfiguration(format!(
                        "item '{}' has invalid uniqueness weight {}",
                        name, w.uniqueness
                    )));
                }
                let item = Item {
                    name: name.clone(),
                    role,
                    cost_weight: w.cost,
                    uniqueness_weight: w.uniqueness,
                };
                if items.insert(name.clone(), item).is_some() {
                    return Err(SearchError::InvalidConfiguration(format!(
                        "item '{}' is listed as both boundary and filler",
                        name
                    )));
                }
            }
        }

        Ok(Self {
            items,
            boundary: boundary.keys().cloned().collect(),
            filler: filler.keys().cloned().collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    /// Look up an item, failing with `UnknownItem` when absent
    pub fn item(&self, name: &str) -> Result<&Item> {
        self.items
            .get(name)
            .ok_or_else(|| SearchError::UnknownItem(name.to_string()))
    }

    pub fn role_of(&self, name: &str) -> Option<Role> {
        self.items.get(name).map(|item| item.role)
    }

    pub fn has_role(&self, name: &str, role: Role) -> bool {
        self.role_of(name) == Some(role)
    }

    /// Item names of one role in name order
    pub fn names(&self, role: Role) -> &[String] {
        match role {
            Role::Boundary => &self.boundary,
            Role::Filler => &self.filler,
        }
    }

    /// Draw one item of `role` uniformly, with replacement
    pub fn sample<R: Rng + ?Sized>(&self, role: Role, rng: &mut R) -> &str {
        let names = self.names(role);
        &names[rng.gen_range(0..names.len())]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fixed set of existing menus that uniqueness is measured against
#[derive(Debug, Clone, Default)]
pub struct ReferenceCorpus {
    menus: Vec<Recipe>,
}

impl ReferenceCorpus {
    pub fn new(menus: Vec<Recipe>) -> Self {
        Self { menus }
    }

    pub fn menus(&self) -> &[Recipe] {
        &self.menus
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recipe> {
        self.menus.iter()
    }

    pub fn len(&self) -> usize {
        self.menus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }

    /// Distinct item names used by the corpus but missing from `catalog`
    pub fn unknown_items(&self, catalog: &Catalog) -> Vec<String> {
        let mut missing: Vec<String> = self
            .menus
            .iter()
            .flat_map(|menu| menu.items())
            .filter(|name| catalog.get(name).is_none())
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}
