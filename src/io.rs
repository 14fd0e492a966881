use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::catalog::{Catalog, ReferenceCorpus, Weights};
use crate::genome::Recipe;
use crate::nsga2::Individual;

/// Data file syntax, picked from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => bail!("unsupported data file extension: {}", path.display()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    boundary: BTreeMap<String, Weights>,
    filler: BTreeMap<String, Weights>,
}

#[derive(Debug, Deserialize)]
struct CorpusFile {
    menus: Vec<Vec<String>>,
}

fn parse<T: for<'de> Deserialize<'de>>(text: &str, format: Format) -> Result<T> {
    Ok(match format {
        Format::Toml => toml::from_str(text)?,
        Format::Json => serde_json::from_str(text)?,
    })
}

pub fn parse_catalog(text: &str, format: Format) -> Result<Catalog> {
    let file: CatalogFile = parse(text, format)?;
    Ok(Catalog::new(&file.boundary, &file.filler)?)
}

pub fn parse_corpus(text: &str, format: Format) -> Result<ReferenceCorpus> {
    let file: CorpusFile = parse(text, format)?;
    Ok(ReferenceCorpus::new(
        file.menus.into_iter().map(Recipe::new).collect(),
    ))
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    parse_catalog(&text, Format::from_path(path)?)
        .with_context(|| format!("parsing catalog {}", path.display()))
}

pub fn load_corpus(path: &Path) -> Result<ReferenceCorpus> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading corpus {}", path.display()))?;
    parse_corpus(&text, Format::from_path(path)?)
        .with_context(|| format!("parsing corpus {}", path.display()))
}

pub struct CsvWriter<W: Write = BufWriter<File>> {
    w: W,
}

impl CsvWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let f = File::create(path)?;
        Ok(Self { w: BufWriter::new(f) })
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn from_writer(w: W) -> Self {
        Self { w }
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(self.w, "rank,crowding,cost,uniqueness,length,recipe")?;
        Ok(())
    }

    /// Infinite crowding is written as -1, failed evaluations leave the
    /// objective columns empty
    pub fn write_row(&mut self, ind: &Individual) -> Result<()> {
        let crowding = if ind.crowding_distance.is_infinite() {
            -1.0
        } else {
            ind.crowding_distance
        };
        let (cost, uniqueness) = match ind.objectives {
            Some(o) => (format!("{:.6}", o.cost), format!("{:.6}", o.uniqueness)),
            None => (String::new(), String::new()),
        };
        writeln!(
            self.w,
            "{},{:.6},{},{},{},{}",
            ind.rank,
            crowding,
            cost,
            uniqueness,
            ind.genome.len(),
            ind.genome.items().join(";")
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}
