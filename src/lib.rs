//! Multi-objective menu search.
//!
//! Recipes are `[boundary, filler*, boundary]` item sequences. NSGA-II looks
//! for the Pareto front between the weighted cost of a recipe (minimized) and
//! its weighted distance to the nearest existing menu (maximized).
//!
//! Author: menu-pareto developers
//! License: MIT
//! Version: 0.3.0

pub mod catalog;
pub mod config;
pub mod error;
pub mod genome;
pub mod io;
pub mod nsga2;
pub mod objective;
pub mod report;


pub use catalog::{Catalog, Item, ReferenceCorpus, Role, Weights};
pub use error::{Result, SearchError};
pub use genome::{CutPolicy, GenomeModel, LengthBounds, Recipe};
pub use nsga2::{Individual, SearchConfig, SearchResult, NSGA2};
pub use objective::{Evaluator, ObjectiveVector};
pub use report::{hypervolume_2d, ParetoReport, ScoredRecipe};
