// CSV input discovery and loading

use std::io::Read;
use std::path::{Path, PathBuf};

use verdict_analysis::{AnalysisError, RecordStore};

/// All `*.csv` files directly inside `dir`, sorted by path.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
    if !dir.is_dir() {
        return Err(AnalysisError::NoInputs(format!(
            "input directory '{}' does not exist",
            dir.display()
        )));
    }

    let pattern = format!("{}/*.csv", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| AnalysisError::Io(format!("bad input pattern '{pattern}': {e}")))?
        .map(|entry| {
            entry.map_err(|e| AnalysisError::Io(format!("cannot list {}: {e}", e.path().display())))
        })
        .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|p| p.is_file());
    paths.sort();

    if paths.is_empty() {
        return Err(AnalysisError::NoInputs(format!(
            "no CSV files in '{}'",
            dir.display()
        )));
    }
    Ok(paths)
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, AnalysisError> {
    let io_err = |e: std::io::Error| AnalysisError::Io(format!("{}: {e}", path.display()));
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            log::warn!("{}: not UTF-8, decoded as Windows-1252", path.display());
            Ok(decoded.into_owned())
        }
    }
}

/// Load every CSV in `dir` into one store, in sorted path order.
pub fn load_dir(dir: &Path) -> Result<RecordStore, AnalysisError> {
    let mut store = RecordStore::new();
    for path in discover_inputs(dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content = read_file_as_utf8(&path)?;
        let added = store.extend_from_csv(&name, &content)?;
        log::info!("loaded {added} records from {name}");
    }

    if store.is_empty() {
        return Err(AnalysisError::EmptyInput(format!(
            "CSV files in '{}' contain no records",
            dir.display()
        )));
    }
    Ok(store)
}
