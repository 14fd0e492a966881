//! NSGA-II Multi-Objective Optimization Algorithm
//!
//! Non-dominated Sorting Genetic Algorithm II over variable-length recipe
//! genomes, trading cost (minimized) against uniqueness (maximized).
//!
//! Each generation: breed P offspring from the current population by binary
//! tournament, crossover and mutation; evaluate them; merge with the parents
//! into a 2P pool; rank by non-dominated sorting and crowding distance; keep
//! the best P. Evaluation runs on the rayon pool, every random draw happens
//! on one seeded generator in the sequential stages, so a run is reproducible
//! regardless of thread count.
//!
//! References:
//! - Deb, K., et al. "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II" (2002)
//!
//! Author: menu-pareto developers
//! License: MIT
//! Version: 0.3.0

use std::cmp::Ordering;

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::{Catalog, ReferenceCorpus};
use crate::error::{Result, SearchError};
use crate::genome::{CutPolicy, GenomeModel, LengthBounds, Recipe};
use crate::objective::{Evaluator, ObjectiveVector};

/// Individual in the population
#[derive(Clone, Debug)]
pub struct Individual {
    pub genome: Recipe,
    /// `None` when evaluation failed
    pub objectives: Option<ObjectiveVector>,
    /// Pareto rank (0 = non-dominated front)
    pub rank: usize,
    pub crowding_distance: f64,
}

impl Individual {
    pub fn new(genome: Recipe) -> Self {
        Self {
            genome,
            objectives: None,
            rank: usize::MAX,
            crowding_distance: 0.0,
        }
    }

    pub fn with_objectives(genome: Recipe, objectives: ObjectiveVector) -> Self {
        Self {
            objectives: Some(objectives),
            ..Self::new(genome)
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.objectives.is_some()
    }

    /// Check if this individual dominates another.
    ///
    /// Failed individuals neither dominate nor are dominated; ranking puts
    /// them behind every front instead.
    pub fn dominates(&self, other: &Individual) -> bool {
        match (&self.objectives, &other.objectives) {
            (Some(a), Some(b)) => a.dominates(b),
            _ => false,
        }
    }
}

/// Search configuration
#[derive(Clone, Debug, Serialize)]
pub struct SearchConfig {
    /// Population size P
    pub population_size: usize,
    /// Number of generations after the initial population
    pub generations: usize,
    pub length_bounds: LengthBounds,
    /// Probability that a parent pair is recombined
    pub crossover_rate: f64,
    /// Per-position resampling probability
    pub mutation_rate: f64,
    /// Probability of one interior insertion or deletion
    pub length_mutation_rate: f64,
    pub crossover_cut: CutPolicy,
    /// Seed for reproducibility
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 50,
            length_bounds: LengthBounds::default(),
            crossover_rate: 0.9,
            mutation_rate: 0.1,
            length_mutation_rate: 0.1,
            crossover_cut: CutPolicy::Shortest,
            seed: 42,
        }
    }
}

impl SearchConfig {
    /// Derive the generation count from a total trial budget.
    ///
    /// The initial population spends P trials and every generation another P,
    /// so only whole generations that fit in the budget are run.
    pub fn with_trial_budget(mut self, trials: usize) -> Self {
        self.generations = match self.population_size {
            0 => 0,
            p => trials.saturating_sub(p) / p,
        };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(SearchError::InvalidConfiguration(format!(
                "population_size must be >= 2 (got {})",
                self.population_size
            )));
        }
        self.length_bounds.validate()?;
        for (name, rate) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_rate", self.mutation_rate),
            ("length_mutation_rate", self.length_mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(SearchError::InvalidConfiguration(format!(
                    "{} must be in [0, 1] (got {})",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}

/// Evaluation failure kept for the caller
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub generation: usize,
    pub recipe: Recipe,
    pub message: String,
}

/// Snapshot of one generation's merged pool
#[derive(Clone, Debug, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub pool_size: usize,
    pub front_size: usize,
    pub min_cost: f64,
    pub max_uniqueness: f64,
    pub failed: usize,
}

/// Search result
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// Final merged pool (parents + offspring of the last generation)
    pub pool: Vec<Individual>,
    /// Rank-0 individuals of `pool`
    pub front: Vec<Individual>,
    pub generations: usize,
    pub history: Vec<GenerationStats>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Fast non-dominated sorting.
///
/// Assigns `rank` to every individual and returns the fronts as index lists.
/// Failed individuals all go into one extra front after the last real one.
pub fn non_dominated_sort(pool: &mut [Individual]) -> Vec<Vec<usize>> {
    let n = pool.len();

    for ind in pool.iter_mut() {
        ind.rank = usize::MAX;
    }

    let evaluated: Vec<usize> = (0..n).filter(|&i| pool[i].is_evaluated()).collect();
    let failed: Vec<usize> = (0..n).filter(|&i| !pool[i].is_evaluated()).collect();

    // Domination counts and dominated sets
    let mut domination_count: Vec<usize> = vec![0; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (k, &i) in evaluated.iter().enumerate() {
        for &j in &evaluated[k + 1..] {
            if pool[i].dominates(&pool[j]) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if pool[j].dominates(&pool[i]) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current_front: Vec<usize> = evaluated
        .iter()
        .copied()
        .filter(|&i| domination_count[i] == 0)
        .collect();

    while !current_front.is_empty() {
        let rank = fronts.len();
        for &i in &current_front {
            pool[i].rank = rank;
        }

        let mut next_front: Vec<usize> = Vec::new();
        for &i in &current_front {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next_front.push(j);
                }
            }
        }
        next_front.sort_unstable();
        fronts.push(current_front);
        current_front = next_front;
    }

    if !failed.is_empty() {
        let rank = fronts.len();
        for &i in &failed {
            pool[i].rank = rank;
        }
        fronts.push(failed);
    }

    fronts
}

/// Calculate crowding distance within each front.
///
/// Extremes on either axis get +inf; interior points add the normalized gap
/// between their neighbours on each axis. Fronts of failed individuals keep 0.
pub fn crowding_distance(pool: &mut [Individual], fronts: &[Vec<usize>]) {
    for ind in pool.iter_mut() {
        ind.crowding_distance = 0.0;
    }

    let axes: [fn(&ObjectiveVector) -> f64; 2] =
        [|o: &ObjectiveVector| o.cost, |o: &ObjectiveVector| o.uniqueness];

    for front in fronts {
        if front.iter().any(|&i| !pool[i].is_evaluated()) {
            continue;
        }

        if front.len() <= 2 {
            for &i in front {
                pool[i].crowding_distance = f64::INFINITY;
            }
            continue;
        }

        let mut sorted = front.clone();
        for axis in axes {
            let value = |i: usize| pool[i].objectives.as_ref().map(axis).unwrap_or(0.0);
            sorted.sort_by(|&a, &b| value(a).partial_cmp(&value(b)).unwrap_or(Ordering::Equal));

            let first = sorted[0];
            let last = sorted[sorted.len() - 1];
            let f_min = value(first);
            let f_max = value(last);
            let range = if (f_max - f_min).abs() > 1e-12 {
                f_max - f_min
            } else {
                1.0
            };

            let gaps: Vec<(usize, f64)> = (1..sorted.len() - 1)
                .map(|k| (sorted[k], (value(sorted[k + 1]) - value(sorted[k - 1])) / range))
                .collect();

            pool[first].crowding_distance = f64::INFINITY;
            pool[last].crowding_distance = f64::INFINITY;
            for (i, gap) in gaps {
                pool[i].crowding_distance += gap;
            }
        }
    }
}

/// Keep the best `size` individuals: whole fronts first, the partial front by
/// descending crowding distance. Ties keep pool order.
pub fn environmental_selection(pool: &[Individual], size: usize) -> Vec<Individual> {
    let mut indices: Vec<usize> = (0..pool.len()).collect();
    indices.sort_by(|&a, &b| {
        pool[a].rank.cmp(&pool[b].rank).then_with(|| {
            pool[b]
                .crowding_distance
                .partial_cmp(&pool[a].crowding_distance)
                .unwrap_or(Ordering::Equal)
        })
    });

    indices
        .into_iter()
        .take(size)
        .map(|i| pool[i].clone())
        .collect()
}

fn generation_stats(generation: usize, pool: &[Individual]) -> GenerationStats {
    let evaluated = pool.iter().filter_map(|ind| ind.objectives.as_ref());
    let (min_cost, max_uniqueness) = evaluated.fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(c, u), o| (c.min(o.cost), u.max(o.uniqueness)),
    );
    GenerationStats {
        generation,
        pool_size: pool.len(),
        front_size: pool
            .iter()
            .filter(|ind| ind.rank == 0 && ind.is_evaluated())
            .count(),
        min_cost,
        max_uniqueness,
        failed: pool.iter().filter(|ind| !ind.is_evaluated()).count(),
    }
}

/// NSGA-II optimizer
pub struct NSGA2<'a> {
    config: SearchConfig,
    evaluator: Evaluator<'a>,
    model: GenomeModel<'a>,
    population: Vec<Individual>,
    diagnostics: Vec<Diagnostic>,
    rng: Pcg64,
}

impl<'a> NSGA2<'a> {
    /// Validate the configuration and bind the catalog and corpus.
    ///
    /// Fails with `InvalidConfiguration` or `EmptyReferenceCorpus` before any
    /// generation runs.
    pub fn new(
        config: SearchConfig,
        catalog: &'a Catalog,
        corpus: &'a ReferenceCorpus,
    ) -> Result<Self> {
        config.validate()?;
        let model = GenomeModel::new(catalog, config.length_bounds)?;
        let evaluator = Evaluator::new(catalog, corpus)?;
        let unknown = corpus.unknown_items(catalog);
        if !unknown.is_empty() {
            warn!(
                "reference corpus uses items missing from the catalog: {}",
                unknown.join(", ")
            );
        }

        Ok(Self {
            model,
            rng: Pcg64::seed_from_u64(config.seed),
            config,
            evaluator,
            population: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Initialize population by random generation
    pub fn initialize_population(&mut self) {
        let genomes: Vec<Recipe> = (0..self.config.population_size)
            .map(|_| self.model.random(&mut self.rng))
            .collect();
        self.population = self.evaluate(genomes, 0);
    }

    /// Evaluate genomes in parallel; output order matches input order
    fn evaluate(&mut self, genomes: Vec<Recipe>, generation: usize) -> Vec<Individual> {
        let evaluator = self.evaluator;
        let results: Vec<(Recipe, Result<ObjectiveVector>)> = genomes
            .into_par_iter()
            .map(|genome| {
                let result = evaluator.evaluate(&genome);
                (genome, result)
            })
            .collect();

        results
            .into_iter()
            .map(|(genome, result)| match result {
                Ok(objectives) => Individual::with_objectives(genome, objectives),
                Err(err) => {
                    warn!("generation {}: evaluation of {} failed: {}", generation, genome, err);
                    self.diagnostics.push(Diagnostic {
                        generation,
                        recipe: genome.clone(),
                        message: err.to_string(),
                    });
                    Individual::new(genome)
                }
            })
            .collect()
    }

    /// Binary tournament: lower rank wins, then larger crowding distance.
    ///
    /// Failed individuals carry the worst rank, so they lose to any evaluated
    /// one. When both draws failed and the population still holds evaluated
    /// individuals, a third draw picks uniformly among those instead; a failed
    /// parent is only possible when nothing in the population evaluated.
    fn tournament_select(&mut self) -> usize {
        let n = self.population.len();
        let a = self.rng.gen_range(0..n);
        let b = self.rng.gen_range(0..n);

        let ind_a = &self.population[a];
        let ind_b = &self.population[b];

        if !ind_a.is_evaluated() && !ind_b.is_evaluated() {
            let evaluated: Vec<usize> = (0..n)
                .filter(|&i| self.population[i].is_evaluated())
                .collect();
            if evaluated.is_empty() {
                return a;
            }
            return evaluated[self.rng.gen_range(0..evaluated.len())];
        }

        if ind_a.rank < ind_b.rank {
            a
        } else if ind_b.rank < ind_a.rank {
            b
        } else if ind_a.crowding_distance > ind_b.crowding_distance {
            a
        } else {
            b
        }
    }

    /// Create offspring genomes: tournament, crossover, then mutation
    pub fn create_offspring(&mut self) -> Vec<Recipe> {
        let n = self.config.population_size;
        let mut offspring = Vec::with_capacity(n);

        while offspring.len() < n {
            let p1 = self.tournament_select();
            let p2 = self.tournament_select();
            let parent_a = &self.population[p1].genome;
            let parent_b = &self.population[p2].genome;

            let (mut c1, mut c2) = if self.rng.gen_bool(self.config.crossover_rate) {
                self.model
                    .crossover(parent_a, parent_b, self.config.crossover_cut, &mut self.rng)
            } else {
                (parent_a.clone(), parent_b.clone())
            };

            self.model.mutate(
                &mut c1,
                self.config.mutation_rate,
                self.config.length_mutation_rate,
                &mut self.rng,
            );
            offspring.push(c1);

            if offspring.len() < n {
                self.model.mutate(
                    &mut c2,
                    self.config.mutation_rate,
                    self.config.length_mutation_rate,
                    &mut self.rng,
                );
                offspring.push(c2);
            }
        }

        offspring
    }

    /// Run optimization.
    ///
    /// Restarts from the configured seed, so repeated calls give identical
    /// results.
    pub fn optimize(&mut self) -> SearchResult {
        self.rng = Pcg64::seed_from_u64(self.config.seed);
        self.diagnostics.clear();

        info!(
            "starting NSGA-II: population={} generations={} seed={}",
            self.config.population_size, self.config.generations, self.config.seed
        );

        let mut history = Vec::with_capacity(self.config.generations + 1);

        self.initialize_population();
        let fronts = non_dominated_sort(&mut self.population);
        crowding_distance(&mut self.population, &fronts);
        let mut pool = self.population.clone();
        history.push(generation_stats(0, &pool));

        for generation in 1..=self.config.generations {
            let genomes = self.create_offspring();
            let offspring = self.evaluate(genomes, generation);

            let mut combined = std::mem::take(&mut self.population);
            combined.extend(offspring);

            let fronts = non_dominated_sort(&mut combined);
            crowding_distance(&mut combined, &fronts);

            let stats = generation_stats(generation, &combined);
            debug!(
                "generation {}: front={} min_cost={:.3} max_uniqueness={:.3} failed={}",
                stats.generation, stats.front_size, stats.min_cost, stats.max_uniqueness, stats.failed
            );
            history.push(stats);

            self.population = environmental_selection(&combined, self.config.population_size);
            pool = combined;
        }

        // Extract Pareto front (rank 0)
        let front: Vec<Individual> = pool
            .iter()
            .filter(|ind| ind.rank == 0 && ind.is_evaluated())
            .cloned()
            .collect();

        info!(
            "NSGA-II complete: pool={} front={} failed evaluations={}",
            pool.len(),
            front.len(),
            self.diagnostics.len()
        );

        SearchResult {
            pool,
            front,
            generations: self.config.generations,
            history,
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// Get current population
    pub fn population(&self) -> &[Individual] {
        &self.population
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Weights;
    use std::collections::BTreeMap;

    fn fixture() -> (Catalog, ReferenceCorpus) {
        let table = |entries: &[(&str, f64, f64)]| -> BTreeMap<String, Weights> {
            entries
                .iter()
                .map(|&(n, u, c)| (n.to_string(), Weights::new(u, c)))
                .collect()
        };
        let catalog = Catalog::new(
            &table(&[("B", 1.0, 1.0)]),
            &table(&[("F", 2.0, 1.0), ("G", 1.0, 2.0)]),
        )
        .unwrap();
        let corpus = ReferenceCorpus::new(vec![Recipe::from_names(&["B", "F", "B"])]);
        (catalog, corpus)
    }

    fn scored(cost: f64, uniqueness: f64) -> Individual {
        Individual::with_objectives(
            Recipe::from_names(&["B", "F", "B"]),
            ObjectiveVector::new(cost, uniqueness),
        )
    }

    #[test]
    fn test_dominance() {
        let a = scored(1.0, 3.0);
        let b = scored(2.0, 2.0);
        let failed = Individual::new(Recipe::from_names(&["B", "X", "B"]));

        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&failed));
        assert!(!failed.dominates(&b));
    }

    #[test]
    fn test_non_dominated_sort_layers() {
        let mut pool = vec![
            scored(1.0, 1.0), // front 0
            scored(2.0, 2.0), // front 0
            scored(2.0, 1.0), // front 1
            scored(3.0, 0.5), // front 2
            Individual::new(Recipe::from_names(&["B", "X", "B"])),
        ];

        let fronts = non_dominated_sort(&mut pool);
        assert_eq!(fronts, vec![vec![0, 1], vec![2], vec![3], vec![4]]);
        assert_eq!(pool[4].rank, 3);
    }

    #[test]
    fn test_crowding_distance_extremes() {
        let mut pool = vec![
            scored(1.0, 1.0),
            scored(2.0, 2.0),
            scored(4.0, 3.0),
            scored(5.0, 5.0),
        ];
        let fronts = non_dominated_sort(&mut pool);
        assert_eq!(fronts.len(), 1);
        crowding_distance(&mut pool, &fronts);

        assert!(pool[0].crowding_distance.is_infinite());
        assert!(pool[3].crowding_distance.is_infinite());
        // (4 - 1) / 4 + (3 - 1) / 4
        assert!((pool[1].crowding_distance - 1.25).abs() < 1e-12);
        // (5 - 2) / 4 + (5 - 2) / 4
        assert!((pool[2].crowding_distance - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_environmental_selection_truncates_by_crowding() {
        let mut pool = vec![
            scored(1.0, 1.0),
            scored(2.0, 2.0),
            scored(4.0, 3.0),
            scored(5.0, 5.0),
            scored(6.0, 0.0),
        ];
        let fronts = non_dominated_sort(&mut pool);
        crowding_distance(&mut pool, &fronts);

        let selected = environmental_selection(&pool, 3);
        let costs: Vec<f64> = selected
            .iter()
            .map(|ind| ind.objectives.unwrap().cost)
            .collect();
        assert_eq!(costs, vec![1.0, 5.0, 4.0]);
    }

    #[test]
    fn test_trial_budget() {
        let config = SearchConfig {
            population_size: 10,
            ..Default::default()
        };
        assert_eq!(config.clone().with_trial_budget(100).generations, 9);
        assert_eq!(config.clone().with_trial_budget(5).generations, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(SearchConfig::default().validate().is_ok());

        let small = SearchConfig {
            population_size: 1,
            ..Default::default()
        };
        assert!(matches!(small.validate(), Err(SearchError::InvalidConfiguration(_))));

        let rate = SearchConfig {
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert!(rate.validate().is_err());

        let bounds = SearchConfig {
            length_bounds: LengthBounds::new(5, 3),
            ..Default::default()
        };
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn test_failed_individuals_never_win_tournaments() {
        let (catalog, corpus) = fixture();
        let mut optimizer = NSGA2::new(SearchConfig::default(), &catalog, &corpus).unwrap();

        let mut population = vec![
            Individual::new(Recipe::from_names(&["B", "X", "B"])),
            scored(1.0, 1.0),
            Individual::new(Recipe::from_names(&["B", "Y", "B"])),
            scored(2.0, 2.0),
        ];
        let fronts = non_dominated_sort(&mut population);
        crowding_distance(&mut population, &fronts);
        optimizer.population = population;

        for _ in 0..1000 {
            let winner = optimizer.tournament_select();
            assert!(optimizer.population[winner].is_evaluated());
        }
    }

    #[test]
    fn test_all_failed_population_still_selects() {
        let (catalog, corpus) = fixture();
        let mut optimizer = NSGA2::new(SearchConfig::default(), &catalog, &corpus).unwrap();

        let mut population = vec![
            Individual::new(Recipe::from_names(&["B", "X", "B"])),
            Individual::new(Recipe::from_names(&["B", "Y", "B"])),
        ];
        let fronts = non_dominated_sort(&mut population);
        crowding_distance(&mut population, &fronts);
        optimizer.population = population;

        for _ in 0..50 {
            assert!(optimizer.tournament_select() < 2);
        }
    }

    #[test]
    fn test_new_keeps_config() {
        let (catalog, corpus) = fixture();
        let config = SearchConfig {
            population_size: 12,
            seed: 9,
            ..Default::default()
        };
        let optimizer = NSGA2::new(config, &catalog, &corpus).unwrap();
        assert_eq!(optimizer.config().population_size, 12);
        assert_eq!(optimizer.config().seed, 9);
    }
}
