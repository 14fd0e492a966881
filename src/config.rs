use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::genome::{CutPolicy, LengthBounds};
use crate::nsga2::SearchConfig;

/// Run file: `[search]`, `[report]` and `[data]` tables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Root {
    #[serde(default)]
    pub search: Search,
    #[serde(default)]
    pub report: Report,
    pub data: Data,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Search {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Total trial budget; overrides `generations` when present
    #[serde(default)]
    pub trials: Option<usize>,
    #[serde(default)]
    pub length_bounds: LengthBounds,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_length_mutation_rate")]
    pub length_mutation_rate: f64,
    /// "shortest" or "uniform"
    #[serde(default)]
    pub crossover_cut: CutPolicy,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_population_size() -> usize { 100 }
fn default_generations() -> usize { 50 }
fn default_crossover_rate() -> f64 { 0.9 }
fn default_mutation_rate() -> f64 { 0.1 }
fn default_length_mutation_rate() -> f64 { 0.1 }
fn default_seed() -> u64 { 42 }

impl Default for Search {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            trials: None,
            length_bounds: LengthBounds::default(),
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            length_mutation_rate: default_length_mutation_rate(),
            crossover_cut: CutPolicy::default(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Report {
    /// Keep only front entries with uniqueness strictly above this value
    #[serde(default)]
    pub uniqueness_threshold: Option<f64>,
    /// Hypervolume reference point as `[cost, uniqueness]`
    #[serde(default)]
    pub hypervolume_reference: Option<[f64; 2]>,
}

/// Data file paths, relative to the run file's directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Data {
    pub catalog: String,
    pub corpus: String,
}

impl Root {
    /// Apply command-line overrides to `[search]`.
    ///
    /// Call before `validate()` and `search_config()` so a trial budget is
    /// resolved and checked against the overridden population size. An
    /// explicit generation count replaces the trial budget.
    pub fn override_search(
        &mut self,
        population_size: Option<usize>,
        generations: Option<usize>,
        seed: Option<u64>,
    ) {
        if let Some(p) = population_size {
            self.search.population_size = p;
        }
        if let Some(g) = generations {
            self.search.generations = g;
            self.search.trials = None;
        }
        if let Some(s) = seed {
            self.search.seed = s;
        }
    }

    /// Engine configuration with the trial budget resolved
    pub fn search_config(&self) -> SearchConfig {
        let s = &self.search;
        let config = SearchConfig {
            population_size: s.population_size,
            generations: s.generations,
            length_bounds: s.length_bounds,
            crossover_rate: s.crossover_rate,
            mutation_rate: s.mutation_rate,
            length_mutation_rate: s.length_mutation_rate,
            crossover_cut: s.crossover_cut,
            seed: s.seed,
        };
        match s.trials {
            Some(trials) => config.with_trial_budget(trials),
            None => config,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.search_config().validate()?;

        if let Some(trials) = self.search.trials {
            if trials < self.search.population_size {
                bail!(
                    "search.trials ({}) must be >= search.population_size ({})",
                    trials,
                    self.search.population_size
                );
            }
        }
        if let Some(t) = self.report.uniqueness_threshold {
            if !t.is_finite() {
                bail!("report.uniqueness_threshold must be finite");
            }
        }
        if let Some([cost, uniqueness]) = self.report.hypervolume_reference {
            if !(cost.is_finite() && uniqueness.is_finite()) {
                bail!("report.hypervolume_reference must be finite");
            }
        }
        if self.data.catalog.trim().is_empty() {
            bail!("data.catalog must name a file");
        }
        if self.data.corpus.trim().is_empty() {
            bail!("data.corpus must name a file");
        }

        Ok(())
    }
}
