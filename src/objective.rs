//! Cost and uniqueness objectives.
//!
//! Both only look at the multiset of items in a recipe, never at their order.
//! Histograms are `BTreeMap`s so the floating-point sums are accumulated in
//! the same order on every run.
//!
//! Author: menu-pareto developers
//! License: MIT
//! Version: 0.3.0

use std::collections::BTreeMap;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ReferenceCorpus};
use crate::error::{Result, SearchError};
use crate::genome::Recipe;

/// Objective values of one recipe: minimize cost, maximize uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveVector {
    pub cost: f64,
    pub uniqueness: f64,
}

impl ObjectiveVector {
    pub fn new(cost: f64, uniqueness: f64) -> Self {
        Self { cost, uniqueness }
    }

    /// No worse on both axes and strictly better on at least one
    pub fn dominates(&self, other: &ObjectiveVector) -> bool {
        if self.cost > other.cost || self.uniqueness < other.uniqueness {
            return false;
        }
        self.cost < other.cost || self.uniqueness > other.uniqueness
    }
}

fn histogram(recipe: &Recipe) -> BTreeMap<&str, u32> {
    let mut counts = BTreeMap::new();
    for name in recipe.items() {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Sum of `count * cost_weight` over distinct items
pub fn cost(recipe: &Recipe, catalog: &Catalog) -> Result<f64> {
    let mut total = 0.0;
    for (name, count) in histogram(recipe) {
        total += count as f64 * catalog.item(name)?.cost_weight;
    }
    Ok(total)
}

/// Sum of `|count_a - count_b| * uniqueness_weight` over the union of items
pub fn weighted_diff_distance(a: &Recipe, b: &Recipe, catalog: &Catalog) -> Result<f64> {
    let hist_a = histogram(a);
    let hist_b = histogram(b);

    let mut names: Vec<&str> = hist_a.keys().chain(hist_b.keys()).copied().collect();
    names.sort_unstable();
    names.dedup();

    let mut distance = 0.0;
    for name in names {
        let count_a = hist_a.get(name).copied().unwrap_or(0);
        let count_b = hist_b.get(name).copied().unwrap_or(0);
        let weight = catalog.item(name)?.uniqueness_weight;
        trace!(
            "distance term {}: {} vs {} x {}",
            name,
            count_a,
            count_b,
            weight
        );
        distance += count_a.abs_diff(count_b) as f64 * weight;
    }
    Ok(distance)
}

/// Distance to the nearest reference menu
pub fn uniqueness(recipe: &Recipe, catalog: &Catalog, corpus: &ReferenceCorpus) -> Result<f64> {
    let mut nearest: Option<f64> = None;
    for menu in corpus.iter() {
        let d = weighted_diff_distance(recipe, menu, catalog)?;
        nearest = Some(nearest.map_or(d, |best| best.min(d)));
    }
    nearest.ok_or(SearchError::EmptyReferenceCorpus)
}

/// Scores recipes against a fixed catalog and corpus.
///
/// Holds only shared references, so one evaluator can be used from any number
/// of threads at once.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    catalog: &'a Catalog,
    corpus: &'a ReferenceCorpus,
}

impl<'a> Evaluator<'a> {
    /// Fails with `EmptyReferenceCorpus` since uniqueness is undefined without one
    pub fn new(catalog: &'a Catalog, corpus: &'a ReferenceCorpus) -> Result<Self> {
        if corpus.is_empty() {
            return Err(SearchError::EmptyReferenceCorpus);
        }
        Ok(Self { catalog, corpus })
    }

    pub fn evaluate(&self, recipe: &Recipe) -> Result<ObjectiveVector> {
        Ok(ObjectiveVector {
            cost: cost(recipe, self.catalog)?,
            uniqueness: uniqueness(recipe, self.catalog, self.corpus)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Weights;

    fn catalog() -> Catalog {
        let boundary: BTreeMap<String, Weights> = [("B1", 1.0, 1.0), ("B2", 1.0, 2.0)]
            .iter()
            .map(|&(n, u, c)| (n.to_string(), Weights::new(u, c)))
            .collect();
        let filler: BTreeMap<String, Weights> = [("F1", 2.0, 1.0), ("F2", 1.0, 3.0)]
            .iter()
            .map(|&(n, u, c)| (n.to_string(), Weights::new(u, c)))
            .collect();
        Catalog::new(&boundary, &filler).unwrap()
    }

    #[test]
    fn test_cost_counts_repeats() {
        let catalog = catalog();
        let recipe = Recipe::from_names(&["B1", "F2", "F2", "F2", "B2"]);
        // 3 * 3 + 1 + 2
        assert_eq!(cost(&recipe, &catalog).unwrap(), 12.0);
    }

    #[test]
    fn test_distance_ignores_order() {
        let catalog = catalog();
        let a = Recipe::from_names(&["B1", "F1", "F2", "B2"]);
        let b = Recipe::from_names(&["B2", "F2", "F1", "B1"]);
        assert_eq!(weighted_diff_distance(&a, &b, &catalog).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_weights() {
        let catalog = catalog();
        let a = Recipe::from_names(&["B1", "F1", "F1", "B1"]);
        let b = Recipe::from_names(&["B2", "F2", "B1"]);
        // B1: 2 vs 1 -> 1, B2: 0 vs 1 -> 1, F1: 2 vs 0 -> 4, F2: 0 vs 1 -> 1
        assert_eq!(weighted_diff_distance(&a, &b, &catalog).unwrap(), 7.0);
        assert_eq!(weighted_diff_distance(&b, &a, &catalog).unwrap(), 7.0);
    }

    #[test]
    fn test_unknown_item() {
        let catalog = catalog();
        let corpus = ReferenceCorpus::new(vec![Recipe::from_names(&["B1", "F1", "B1"])]);
        let recipe = Recipe::from_names(&["B1", "pickle", "B1"]);

        assert_eq!(
            cost(&recipe, &catalog),
            Err(SearchError::UnknownItem("pickle".to_string()))
        );
        assert_eq!(
            uniqueness(&recipe, &catalog, &corpus),
            Err(SearchError::UnknownItem("pickle".to_string()))
        );
    }

    #[test]
    fn test_empty_corpus() {
        let catalog = catalog();
        let corpus = ReferenceCorpus::default();
        let recipe = Recipe::from_names(&["B1", "F1", "B1"]);

        assert_eq!(
            uniqueness(&recipe, &catalog, &corpus),
            Err(SearchError::EmptyReferenceCorpus)
        );
        assert!(matches!(
            Evaluator::new(&catalog, &corpus),
            Err(SearchError::EmptyReferenceCorpus)
        ));
    }

    #[test]
    fn test_uniqueness_takes_nearest_menu() {
        let catalog = catalog();
        let corpus = ReferenceCorpus::new(vec![
            Recipe::from_names(&["B2", "F2", "F2", "B2"]),
            Recipe::from_names(&["B1", "F1", "F2", "B1"]),
        ]);
        let recipe = Recipe::from_names(&["B1", "F1", "B1"]);

        // Second menu differs only by one F2
        assert_eq!(uniqueness(&recipe, &catalog, &corpus).unwrap(), 1.0);
    }

    #[test]
    fn test_dominance() {
        let a = ObjectiveVector::new(3.0, 5.0);
        let b = ObjectiveVector::new(4.0, 5.0);
        let c = ObjectiveVector::new(2.0, 1.0);

        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&c));
        assert!(!c.dominates(&a));
        assert!(!a.dominates(&a));
    }
}
