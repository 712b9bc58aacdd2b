//! Catalog of on-disk raster files.
//!
//! A parameter's dataset is laid out as `<root>/<parameter>/<year>/*_<YYYYMMDD>.<ext>`, one
//! file per day, partitioned by year directory.

use crate::error::QueryError;
use crate::models::{SkipReason, SkippedFile};

use time::macros::format_description;
use time::Date;
use tracing::{debug, info, warn};

use std::path::{Path, PathBuf};

/// A raster file selected from the catalog
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogEntry {
    /// Path to the file
    pub path: PathBuf,
    /// Date encoded in the file name
    pub date: Date,
}

/// Files selected for a query, plus those rejected for an unparseable date
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedFiles {
    /// Selected files, in lexicographic path order
    pub files: Vec<CatalogEntry>,
    /// Files whose name carries no valid date
    pub skipped: Vec<SkippedFile>,
}

/// Normalise a parameter name to its dataset directory name.
///
/// Lower-cases the name and replaces spaces with underscores.
pub fn normalize_parameter(parameter: &str) -> String {
    parameter.trim().to_lowercase().replace(' ', "_")
}

/// Returns the dataset directory of a parameter.
pub fn parameter_dir(root: &Path, parameter: &str) -> PathBuf {
    root.join(normalize_parameter(parameter))
}

/// Parse the date token at the end of a file stem, e.g. `sst_daily_20200601`.
///
/// The token after the last underscore (or the whole stem, if there is none) must be exactly
/// eight digits forming a valid `YYYYMMDD` date.
pub fn parse_file_date(stem: &str) -> Option<Date> {
    let token = stem.rsplit('_').next()?;
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Date::parse(token, format_description!("[year][month][day]")).ok()
}

/// Resolve the files of a parameter dated within `[start, end]`, inclusive.
///
/// # Arguments
///
/// * `root`: Root directory holding one directory per parameter
/// * `parameter`: Parameter name, normalised with [normalize_parameter]
/// * `start`: First date of the range
/// * `end`: Last date of the range
/// * `extension`: File extension of raster files, without the dot
///
/// # Errors
///
/// Fails with [QueryError::DatasetNotFound] if the parameter directory does not exist. A
/// missing year directory is not an error.
#[tracing::instrument(level = "DEBUG", skip(root))]
pub fn resolve_files(
    root: &Path,
    parameter: &str,
    start: Date,
    end: Date,
    extension: &str,
) -> Result<ResolvedFiles, QueryError> {
    let dataset_dir = parameter_dir(root, parameter);
    if !dataset_dir.is_dir() {
        return Err(QueryError::DatasetNotFound {
            parameter: parameter.to_string(),
        });
    }

    let mut resolved = ResolvedFiles::default();
    for year in start.year()..=end.year() {
        let year_dir = dataset_dir.join(year.to_string());
        if !year_dir.is_dir() {
            warn!("Directory does not exist: {}", year_dir.display());
            continue;
        }
        let before = resolved.files.len();
        scan_year_dir(&year_dir, start, end, extension, &mut resolved)?;
        debug!(
            "Selected {} files from {}",
            resolved.files.len() - before,
            year_dir.display()
        );
    }
    resolved.files.sort_by(|a, b| a.path.cmp(&b.path));
    resolved.skipped.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "Selected {} files for time range {} to {}",
        resolved.files.len(),
        start,
        end
    );
    Ok(resolved)
}

/// Add the matching files of one year directory to `resolved`.
fn scan_year_dir(
    year_dir: &Path,
    start: Date,
    end: Date,
    extension: &str,
    resolved: &mut ResolvedFiles,
) -> Result<(), QueryError> {
    for entry in std::fs::read_dir(year_dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
        match parse_file_date(stem) {
            Some(date) if start <= date && date <= end => {
                resolved.files.push(CatalogEntry { path, date })
            }
            Some(_) => (),
            None => {
                warn!("Could not parse date from filename: {}", path.display());
                resolved
                    .skipped
                    .push(SkippedFile::new(path, SkipReason::UnparseableDate));
            }
        }
    }
    Ok(())
}
