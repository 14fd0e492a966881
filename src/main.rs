use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use menu_pareto::config;
use menu_pareto::io::{self, CsvWriter};
use menu_pareto::nsga2::{Diagnostic, GenerationStats, SearchConfig, NSGA2};
use menu_pareto::objective::{self, Evaluator, ObjectiveVector};
use menu_pareto::report::{hypervolume_2d, ParetoReport, ScoredRecipe};
use menu_pareto::{Catalog, GenomeModel, Recipe, ReferenceCorpus};

const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Parser, Debug)]
#[command(name = "menu-pareto")]
#[command(version)]
#[command(about = "NSGA-II search for cost/uniqueness Pareto-optimal menu recipes")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML run file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output CSV path
    #[arg(short, long, global = true)]
    out: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the multi-objective search
    Optimize {
        /// Population size (overrides the run file)
        #[arg(long)]
        pop_size: Option<usize>,
        /// Number of generations (overrides the run file)
        #[arg(long)]
        generations: Option<usize>,
        /// Random seed (overrides the run file)
        #[arg(long)]
        seed: Option<u64>,
        /// Also write a JSON result bundle
        #[arg(long)]
        json: bool,
    },
    /// Score one recipe given as item names, first and last being boundary items
    Evaluate {
        #[arg(required = true, num_args = 2..)]
        items: Vec<String>,
    },
    /// Validate a run file and its data files
    Validate,
    /// Print version information
    Version,
}

#[derive(Serialize)]
struct Manifest {
    schema_version: String,
    version: String,
    config_hash: String,
    platform: String,
}

#[derive(Serialize)]
struct PoolEntry {
    recipe: Recipe,
    objectives: Option<ObjectiveVector>,
    rank: usize,
    crowding_distance: Option<f64>,
}

#[derive(Serialize)]
struct OptimizationOutput {
    manifest: Manifest,
    config: SearchConfig,
    uniqueness_threshold: Option<f64>,
    pareto_front: Vec<ScoredRecipe>,
    pool: Vec<PoolEntry>,
    hypervolume: f64,
    hypervolume_reference: [f64; 2],
    history: Vec<GenerationStats>,
    diagnostics: Vec<Diagnostic>,
    wall_time_ms: f64,
}

fn compute_hash(data: &str) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn create_manifest(cfg_text: &str) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_hash: compute_hash(cfg_text),
        platform: std::env::consts::OS.to_string(),
    }
}

/// Run file plus the catalog and corpus it points at
struct Loaded {
    cfg: config::Root,
    cfg_text: String,
    catalog: Catalog,
    corpus: ReferenceCorpus,
}

fn load(cfg_path: &str) -> Result<Loaded> {
    let cfg_text = fs::read_to_string(cfg_path)
        .with_context(|| format!("reading run file {}", cfg_path))?;
    let cfg: config::Root = toml::from_str(&cfg_text)
        .with_context(|| format!("parsing run file {}", cfg_path))?;
    cfg.validate()?;

    let base = Path::new(cfg_path).parent().unwrap_or_else(|| Path::new("."));
    let catalog = io::load_catalog(&base.join(&cfg.data.catalog))?;
    let corpus = io::load_corpus(&base.join(&cfg.data.corpus))?;

    Ok(Loaded {
        cfg,
        cfg_text,
        catalog,
        corpus,
    })
}

fn run_optimize(loaded: &Loaded, search: SearchConfig, out_path: &Path, json_output: bool) -> Result<()> {
    let start = Instant::now();

    let mut optimizer = NSGA2::new(search, &loaded.catalog, &loaded.corpus)?;
    let result = optimizer.optimize();
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let threshold = loaded.cfg.report.uniqueness_threshold;
    let report = ParetoReport::new(&result.front, threshold);

    let front_objectives: Vec<ObjectiveVector> =
        result.front.iter().filter_map(|ind| ind.objectives).collect();
    let reference = match loaded.cfg.report.hypervolume_reference {
        Some([cost, uniqueness]) => ObjectiveVector::new(cost, uniqueness),
        None => ObjectiveVector::new(
            result
                .pool
                .iter()
                .filter_map(|ind| ind.objectives.map(|o| o.cost))
                .fold(0.0, f64::max),
            0.0,
        ),
    };
    let hv = hypervolume_2d(&front_objectives, reference);

    eprintln!("[menu-pareto] optimization complete");
    eprintln!("  Generations: {}, Pool: {}", result.generations, result.pool.len());
    eprintln!("  Pareto front size: {} ({} after filter)", result.front.len(), report.len());
    eprintln!("  Failed evaluations: {}", result.diagnostics.len());
    eprintln!("  Hypervolume (2D): {:.4}", hv);
    eprintln!("  Wall time: {:.1} ms", wall_time_ms);

    let mut w = CsvWriter::create(out_path)?;
    w.write_header()?;
    for ind in &result.front {
        w.write_row(ind)?;
    }
    w.flush()?;

    let pool_path = out_path.with_extension("pool.csv");
    let mut w = CsvWriter::create(&pool_path)?;
    w.write_header()?;
    for ind in &result.pool {
        w.write_row(ind)?;
    }
    w.flush()?;

    info!("front written to {}, pool to {}", out_path.display(), pool_path.display());

    eprintln!();
    eprintln!("  Pareto solutions (by uniqueness, cost):");
    eprintln!("  {:>10} {:>10}  {}", "Uniqueness", "Cost", "Recipe");
    eprintln!("  {}", "-".repeat(60));
    for entry in report.scored() {
        eprintln!("  {:>10.3} {:>10.3}  {}", entry.uniqueness, entry.cost, entry.recipe);
    }

    if json_output {
        let json_path = out_path.with_extension("json");
        let output = OptimizationOutput {
            manifest: create_manifest(&loaded.cfg_text),
            config: optimizer.config().clone(),
            uniqueness_threshold: threshold,
            pareto_front: report.scored().to_vec(),
            pool: result
                .pool
                .iter()
                .map(|ind| PoolEntry {
                    recipe: ind.genome.clone(),
                    objectives: ind.objectives,
                    rank: ind.rank,
                    crowding_distance: Some(ind.crowding_distance).filter(|d| d.is_finite()),
                })
                .collect(),
            hypervolume: hv,
            hypervolume_reference: [reference.cost, reference.uniqueness],
            history: result.history,
            diagnostics: result.diagnostics,
            wall_time_ms,
        };
        fs::write(&json_path, serde_json::to_string_pretty(&output)?)?;
        eprintln!("[menu-pareto] JSON results: {}", json_path.display());
    }

    Ok(())
}

fn run_evaluate(loaded: &Loaded, items: Vec<String>) -> Result<()> {
    let recipe = Recipe::new(items);
    let model = GenomeModel::new(&loaded.catalog, loaded.cfg.search.length_bounds)?;
    if !model.is_valid(&recipe) {
        eprintln!("[menu-pareto] WARNING: {} violates length or role rules", recipe);
    }

    let evaluator = Evaluator::new(&loaded.catalog, &loaded.corpus)?;
    let scores = evaluator.evaluate(&recipe)?;

    let nearest = loaded
        .corpus
        .iter()
        .map(|menu| -> menu_pareto::Result<(&Recipe, f64)> {
            Ok((menu, objective::weighted_diff_distance(&recipe, menu, &loaded.catalog)?))
        })
        .collect::<menu_pareto::Result<Vec<_>>>()?
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1));

    eprintln!("[menu-pareto] {}", recipe);
    eprintln!("  cost:       {:.4}", scores.cost);
    eprintln!("  uniqueness: {:.4}", scores.uniqueness);
    if let Some((menu, d)) = nearest {
        eprintln!("  nearest:    {} (distance {:.4})", menu, d);
    }
    Ok(())
}

fn validate_config(loaded: &Loaded, cfg_path: &str) -> Result<()> {
    let unknown = loaded.corpus.unknown_items(&loaded.catalog);
    if !unknown.is_empty() {
        bail!("corpus uses items missing from the catalog: {}", unknown.join(", "));
    }
    if loaded.corpus.is_empty() {
        bail!("corpus contains no menus");
    }

    let search = loaded.cfg.search_config();
    eprintln!("[menu-pareto] config valid: {}", cfg_path);
    eprintln!(
        "  search: population={}, generations={}, length=[{},{}], seed={}",
        search.population_size,
        search.generations,
        search.length_bounds.min,
        search.length_bounds.max,
        search.seed
    );
    eprintln!(
        "  rates: crossover={}, mutation={}, length_mutation={}, cut={:?}",
        search.crossover_rate, search.mutation_rate, search.length_mutation_rate, search.crossover_cut
    );
    eprintln!(
        "  data: {} items ({} boundary, {} filler), {} reference menus",
        loaded.catalog.len(),
        loaded.catalog.names(menu_pareto::Role::Boundary).len(),
        loaded.catalog.names(menu_pareto::Role::Filler).len(),
        loaded.corpus.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            eprintln!("menu-pareto {} (schema {})", env!("CARGO_PKG_VERSION"), SCHEMA_VERSION);
            Ok(())
        }
        Commands::Validate => {
            let cfg_path = args.config.context("--config required for validate")?;
            let loaded = load(&cfg_path)?;
            validate_config(&loaded, &cfg_path)
        }
        Commands::Evaluate { items } => {
            let cfg_path = args.config.context("--config required")?;
            let loaded = load(&cfg_path)?;
            run_evaluate(&loaded, items)
        }
        Commands::Optimize { pop_size, generations, seed, json } => {
            let cfg_path = args.config.context("--config required")?;
            let out_path = PathBuf::from(
                args.out.unwrap_or_else(|| "results/pareto_front.csv".to_string()),
            );
            let mut loaded = load(&cfg_path)?;

            loaded.cfg.override_search(pop_size, generations, seed);
            loaded.cfg.validate()?;
            let search = loaded.cfg.search_config();

            run_optimize(&loaded, search, &out_path, json)
        }
    }
}
