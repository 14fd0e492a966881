//! Recipe genome: encoding, validity, random generation and variation.
//!
//! A recipe is `[boundary, filler*, boundary]`. All randomness is drawn from
//! the generator passed in by the caller, in the order documented on each
//! operator, so a seeded run replays exactly.
//!
//! Author: menu-pareto developers
//! License: MIT
//! Version: 0.3.0

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Role};
use crate::error::{Result, SearchError};

/// Ordered sequence of item names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe {
    items: Vec<String>,
}

impl Recipe {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn from_names(names: &[&str]) -> Self {
        names.iter().map(|s| s.to_string()).collect()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn into_items(self) -> Vec<String> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items strictly between the two boundary slots
    pub fn interior(&self) -> &[String] {
        if self.items.len() < 2 {
            &[]
        } else {
            &self.items[1..self.items.len() - 1]
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Recipe {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.items.join(", "))
    }
}

/// Inclusive recipe length range (boundaries included)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for LengthBounds {
    fn default() -> Self {
        Self { min: 3, max: 10 }
    }
}

impl LengthBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min < 2 {
            return Err(SearchError::InvalidConfiguration(format!(
                "length_bounds.min must be >= 2 (got {})",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(SearchError::InvalidConfiguration(format!(
                "length_bounds inverted: min {} > max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Where crossover splits the two interiors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutPolicy {
    /// Cut after the last interior slot shared by both parents
    #[default]
    Shortest,
    /// Cut uniformly within the shared interior range
    Uniform,
}

/// Random generation, repair and variation over one catalog
#[derive(Debug, Clone, Copy)]
pub struct GenomeModel<'a> {
    catalog: &'a Catalog,
    bounds: LengthBounds,
}

impl<'a> GenomeModel<'a> {
    /// Fails with `InvalidConfiguration` when `bounds` cannot hold a recipe
    pub fn new(catalog: &'a Catalog, bounds: LengthBounds) -> Result<Self> {
        bounds.validate()?;
        Ok(Self { catalog, bounds })
    }

    fn draw<R: Rng + ?Sized>(&self, role: Role, rng: &mut R) -> String {
        self.catalog.sample(role, rng).to_string()
    }

    /// Sample a fresh recipe.
    ///
    /// Draw order: length, first boundary, last boundary, then interior
    /// positions left to right.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Recipe {
        let len = rng.gen_range(self.bounds.min..=self.bounds.max);
        let first = self.draw(Role::Boundary, rng);
        let last = self.draw(Role::Boundary, rng);

        let mut items = Vec::with_capacity(len);
        items.push(first);
        for _ in 0..len - 2 {
            items.push(self.draw(Role::Filler, rng));
        }
        items.push(last);
        Recipe::new(items)
    }

    /// Check length and role invariants
    pub fn is_valid(&self, recipe: &Recipe) -> bool {
        let items = recipe.items();
        if items.len() < 2 || !self.bounds.contains(items.len()) {
            return false;
        }
        self.catalog.has_role(&items[0], Role::Boundary)
            && self.catalog.has_role(&items[items.len() - 1], Role::Boundary)
            && recipe
                .interior()
                .iter()
                .all(|name| self.catalog.has_role(name, Role::Filler))
    }

    /// Bring a recipe back inside the length and role invariants.
    ///
    /// Boundary slots holding a non-boundary item are resampled (first, then
    /// last). The interior is cut to the maximum length, then everything from
    /// the first non-filler position onward is resampled, and a short interior
    /// is padded with sampled fillers.
    pub fn repair<R: Rng + ?Sized>(&self, recipe: Recipe, rng: &mut R) -> Recipe {
        let mut items = recipe.into_items();
        if items.len() < 2 {
            return self.random(rng);
        }

        let mut last = items.pop().unwrap_or_default();
        let mut first = items.remove(0);
        let mut interior = items;

        if !self.catalog.has_role(&first, Role::Boundary) {
            first = self.draw(Role::Boundary, rng);
        }
        if !self.catalog.has_role(&last, Role::Boundary) {
            last = self.draw(Role::Boundary, rng);
        }

        interior.truncate(self.bounds.max - 2);
        let target = interior.len().max(self.bounds.min - 2);
        if let Some(pos) = interior
            .iter()
            .position(|name| !self.catalog.has_role(name, Role::Filler))
        {
            interior.truncate(pos);
        }
        while interior.len() < target {
            interior.push(self.draw(Role::Filler, rng));
        }

        let mut items = Vec::with_capacity(interior.len() + 2);
        items.push(first);
        items.extend(interior);
        items.push(last);
        Recipe::new(items)
    }

    /// Splice two parents at a single interior cut.
    ///
    /// Each child keeps its own parent's boundaries, takes that parent's
    /// interior up to the cut and the other parent's interior after it.
    /// Only `CutPolicy::Uniform` draws from `rng` before repair.
    pub fn crossover<R: Rng + ?Sized>(
        &self,
        a: &Recipe,
        b: &Recipe,
        policy: CutPolicy,
        rng: &mut R,
    ) -> (Recipe, Recipe) {
        let (ia, ib) = (a.interior(), b.interior());
        let shared = ia.len().min(ib.len());
        let cut = match policy {
            CutPolicy::Shortest => shared,
            CutPolicy::Uniform => rng.gen_range(0..=shared),
        };

        let child_a = splice(a, &ia[..cut], &ib[cut..]);
        let child_b = splice(b, &ib[..cut], &ia[cut..]);

        let child_a = self.repair(child_a, rng);
        let child_b = self.repair(child_b, rng);
        (child_a, child_b)
    }

    /// Point resampling followed by an optional length change.
    ///
    /// Draw order: one Bernoulli per position left to right (plus the
    /// replacement item when it fires), then the length Bernoulli, the
    /// grow/shrink coin (only when both are possible), the index, and for
    /// growth the inserted filler.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        recipe: &mut Recipe,
        mutation_rate: f64,
        length_mutation_rate: f64,
        rng: &mut R,
    ) {
        let n = recipe.items.len();
        if n < 2 {
            return;
        }

        for i in 0..n {
            if rng.gen_bool(mutation_rate) {
                let role = if i == 0 || i == n - 1 {
                    Role::Boundary
                } else {
                    Role::Filler
                };
                recipe.items[i] = self.draw(role, rng);
            }
        }

        if !rng.gen_bool(length_mutation_rate) {
            return;
        }

        let can_grow = n < self.bounds.max;
        let can_shrink = n > self.bounds.min && n > 2;
        let grow = match (can_grow, can_shrink) {
            (true, true) => rng.gen_bool(0.5),
            (true, false) => true,
            (false, true) => false,
            (false, false) => return,
        };

        if grow {
            // Any slot from just after the first boundary to just before the last
            let idx = rng.gen_range(1..n);
            let filler = self.draw(Role::Filler, rng);
            recipe.items.insert(idx, filler);
        } else {
            let idx = rng.gen_range(1..n - 1);
            recipe.items.remove(idx);
        }
    }
}

fn splice(parent: &Recipe, head: &[String], tail: &[String]) -> Recipe {
    let items = parent.items();
    let mut out = Vec::with_capacity(head.len() + tail.len() + 2);
    if let Some(first) = items.first() {
        out.push(first.clone());
    }
    out.extend(head.iter().cloned());
    out.extend(tail.iter().cloned());
    if let Some(last) = items.last() {
        out.push(last.clone());
    }
    Recipe::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Weights;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use std::collections::BTreeMap;

    fn catalog() -> Catalog {
        let boundary: BTreeMap<String, Weights> = [("B1", 1.0, 1.0), ("B2", 1.0, 2.0)]
            .iter()
            .map(|&(n, u, c)| (n.to_string(), Weights::new(u, c)))
            .collect();
        let filler: BTreeMap<String, Weights> = [("F1", 2.0, 1.0), ("F2", 1.0, 3.0), ("F3", 0.5, 2.0)]
            .iter()
            .map(|&(n, u, c)| (n.to_string(), Weights::new(u, c)))
            .collect();
        Catalog::new(&boundary, &filler).unwrap()
    }

    #[test]
    fn test_length_bounds_validation() {
        assert!(LengthBounds::default().validate().is_ok());
        assert!(LengthBounds::new(2, 2).validate().is_ok());
        assert!(LengthBounds::new(1, 5).validate().is_err());
        assert!(LengthBounds::new(6, 4).validate().is_err());
    }

    #[test]
    fn test_model_rejects_unusable_bounds() {
        let catalog = catalog();
        for bounds in [LengthBounds::new(1, 1), LengthBounds::new(0, 4), LengthBounds::new(7, 3)] {
            assert!(matches!(
                GenomeModel::new(&catalog, bounds),
                Err(SearchError::InvalidConfiguration(_))
            ));
        }
        assert!(GenomeModel::new(&catalog, LengthBounds::new(2, 2)).is_ok());
    }

    #[test]
    fn test_random_recipes_are_valid() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(1);

        let mut seen_lengths = [false; 11];
        for _ in 0..500 {
            let recipe = model.random(&mut rng);
            assert!(model.is_valid(&recipe), "invalid recipe {}", recipe);
            seen_lengths[recipe.len()] = true;
        }
        assert!(seen_lengths[3..=10].iter().all(|&s| s));
    }

    #[test]
    fn test_random_is_reproducible() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::default()).unwrap();
        let mut a = Pcg64::seed_from_u64(99);
        let mut b = Pcg64::seed_from_u64(99);

        for _ in 0..50 {
            assert_eq!(model.random(&mut a), model.random(&mut b));
        }
    }

    #[test]
    fn test_repair_fixes_roles_and_length() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::new(4, 6)).unwrap();
        let mut rng = Pcg64::seed_from_u64(3);

        // Filler in a boundary slot, boundary in the interior
        let broken = Recipe::from_names(&["F1", "F2", "B1", "F3", "B2"]);
        let fixed = model.repair(broken, &mut rng);
        assert!(model.is_valid(&fixed));
        assert_eq!(fixed.len(), 5);
        assert_eq!(fixed.items()[1], "F2");
        assert_eq!(fixed.items()[4], "B2");

        let long = Recipe::from_names(&["B1", "F1", "F1", "F1", "F1", "F1", "F1", "B2"]);
        let fixed = model.repair(long, &mut rng);
        assert!(model.is_valid(&fixed));
        assert_eq!(fixed.len(), 6);

        let short = Recipe::from_names(&["B1", "B2"]);
        let fixed = model.repair(short, &mut rng);
        assert!(model.is_valid(&fixed));
        assert_eq!(fixed.len(), 4);
        assert_eq!(fixed.items()[0], "B1");
        assert_eq!(fixed.items()[3], "B2");

        let valid = Recipe::from_names(&["B2", "F3", "F1", "B1"]);
        assert_eq!(model.repair(valid.clone(), &mut rng), valid);
    }

    #[test]
    fn test_crossover_shortest_cut() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(5);

        let a = Recipe::from_names(&["B1", "F1", "B1"]);
        let b = Recipe::from_names(&["B2", "F2", "F3", "F3", "B2"]);
        let (ca, cb) = model.crossover(&a, &b, CutPolicy::Shortest, &mut rng);

        assert_eq!(ca, Recipe::from_names(&["B1", "F1", "F3", "F3", "B1"]));
        assert_eq!(cb, Recipe::from_names(&["B2", "F2", "B2"]));
    }

    #[test]
    fn test_crossover_uniform_preserves_invariants() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(11);

        for _ in 0..200 {
            let a = model.random(&mut rng);
            let b = model.random(&mut rng);
            let (ca, cb) = model.crossover(&a, &b, CutPolicy::Uniform, &mut rng);
            assert!(model.is_valid(&ca));
            assert!(model.is_valid(&cb));
            assert_eq!(ca.items()[0], a.items()[0]);
            assert_eq!(cb.items()[cb.len() - 1], b.items()[b.len() - 1]);
            assert_eq!(ca.len() + cb.len(), a.len() + b.len());
        }
    }

    #[test]
    fn test_mutation_respects_bounds() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::new(3, 5)).unwrap();
        let mut rng = Pcg64::seed_from_u64(17);

        let mut recipe = model.random(&mut rng);
        for _ in 0..500 {
            model.mutate(&mut recipe, 0.3, 0.8, &mut rng);
            assert!(model.is_valid(&recipe), "invalid after mutation: {}", recipe);
        }
    }

    #[test]
    fn test_mutation_zero_rates_is_identity() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(23);

        let original = Recipe::from_names(&["B1", "F1", "F2", "B2"]);
        let mut recipe = original.clone();
        model.mutate(&mut recipe, 0.0, 0.0, &mut rng);
        assert_eq!(recipe, original);
    }

    #[test]
    fn test_fixed_length_never_changes_length() {
        let catalog = catalog();
        let model = GenomeModel::new(&catalog, LengthBounds::new(4, 4)).unwrap();
        let mut rng = Pcg64::seed_from_u64(29);

        let mut recipe = model.random(&mut rng);
        for _ in 0..100 {
            model.mutate(&mut recipe, 0.5, 1.0, &mut rng);
            assert_eq!(recipe.len(), 4);
        }
    }
}
