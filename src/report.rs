//! Post-processing of the final Pareto front.
//!
//! Author: menu-pareto developers
//! License: MIT
//! Version: 0.3.0

use std::cmp::Ordering;

use serde::Serialize;

use crate::genome::Recipe;
use crate::nsga2::Individual;
use crate::objective::ObjectiveVector;

/// Recipe with its objective values
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredRecipe {
    pub recipe: Recipe,
    pub cost: f64,
    pub uniqueness: f64,
}

/// Front sorted ascending by `(uniqueness, cost)`, optionally keeping only
/// entries strictly above a uniqueness threshold
#[derive(Clone, Debug, Default, Serialize)]
pub struct ParetoReport {
    entries: Vec<ScoredRecipe>,
}

impl ParetoReport {
    /// Build the report from a front; the front itself is left untouched.
    /// Individuals without objective values are skipped.
    pub fn new(front: &[Individual], uniqueness_threshold: Option<f64>) -> Self {
        let mut entries: Vec<ScoredRecipe> = front
            .iter()
            .filter_map(|ind| {
                ind.objectives.map(|o| ScoredRecipe {
                    recipe: ind.genome.clone(),
                    cost: o.cost,
                    uniqueness: o.uniqueness,
                })
            })
            .filter(|entry| uniqueness_threshold.map_or(true, |t| entry.uniqueness > t))
            .collect();

        entries.sort_by(|a, b| {
            a.uniqueness
                .partial_cmp(&b.uniqueness)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cost.partial_cmp(&b.cost).unwrap_or(Ordering::Equal))
        });

        Self { entries }
    }

    pub fn scored(&self) -> &[ScoredRecipe] {
        &self.entries
    }

    pub fn recipes(&self) -> Vec<&Recipe> {
        self.entries.iter().map(|entry| &entry.recipe).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Area dominated by `front` and bounded by `reference`, for minimized cost
/// and maximized uniqueness. Points not strictly better than the reference
/// on both axes contribute nothing.
pub fn hypervolume_2d(front: &[ObjectiveVector], reference: ObjectiveVector) -> f64 {
    let mut sorted: Vec<&ObjectiveVector> = front
        .iter()
        .filter(|o| o.cost < reference.cost && o.uniqueness > reference.uniqueness)
        .collect();
    if sorted.is_empty() {
        return 0.0;
    }

    // Cost ascending; for equal cost the higher uniqueness shadows the rest
    sorted.sort_by(|a, b| {
        a.cost
            .partial_cmp(&b.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.uniqueness.partial_cmp(&a.uniqueness).unwrap_or(Ordering::Equal))
    });

    let mut hv = 0.0;
    let mut covered = reference.uniqueness;
    for o in sorted {
        let height = o.uniqueness - covered;
        if height > 0.0 {
            hv += (reference.cost - o.cost) * height;
            covered = o.uniqueness;
        }
    }

    hv
}
