use crate::config::Config;
use crate::error::Result;
use crate::normalize::normalize;
use crate::reference::ReferenceTables;
use crate::types::{Category, Dataset, RawTable};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads one CSV file into a `RawTable`. Headers are trimmed and blank cells
/// become `None`.
pub fn read_csv_file(path: &Path) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: Vec<Option<String>> = record
            .iter()
            .take(headers.len())
            .map(|cell| {
                if cell.trim().is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        row.resize(headers.len(), None);
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Every `*.csv` directly under `dir`, in name order. Glob metacharacters in
/// `dir` itself match literally.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.csv", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("unreadable directory entry: {}", e);
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Concatenates every readable CSV in `dir`. A missing directory, an empty
/// one, or one where no file parses yields an empty table; unreadable files
/// are skipped.
pub fn load_folder(dir: &Path) -> RawTable {
    let files = match discover_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("cannot list {}: {}", dir.display(), e);
            return RawTable::default();
        }
    };
    if files.is_empty() {
        warn!("no CSV files under {}", dir.display());
    }

    let mut table = RawTable::default();
    let mut loaded = 0usize;
    for file in &files {
        match read_csv_file(file) {
            Ok(part) => {
                debug!("{}: {} rows", file.display(), part.rows.len());
                table.append(part);
                loaded += 1;
            }
            Err(e) => warn!("skipping {}: {}", file.display(), e),
        }
    }
    info!(
        "{}: {} of {} files loaded, {} rows",
        dir.display(),
        loaded,
        files.len(),
        table.rows.len()
    );
    table
}

pub fn load_category(config: &Config, category: Category) -> RawTable {
    load_folder(&config.category_dir(category))
}

/// Loads and normalizes all three categories.
pub fn load_dataset(config: &Config, reference: &ReferenceTables) -> Result<Dataset> {
    let load = |category: Category| {
        let raw = load_category(config, category);
        normalize(raw, category, &config.schema, reference)
    };
    Ok(Dataset {
        enrolment: load(Category::Enrolment)?,
        demographic: load(Category::Demographic)?,
        biometric: load(Category::Biometric)?,
    })
}
