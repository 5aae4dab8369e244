//! Utility functions for output naming and path handling

use crate::config::FileCollisionAction;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Label used when the caller supplies none (or only unusable characters)
pub const DEFAULT_LABEL: &str = "export";

/// Get a unique path for a file, handling collisions according to the specified action
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `action` - How to handle file collisions
///
/// # Returns
///
/// Returns the final path to use. For Rename action, this may have a suffix added.
/// For Skip action, returns an `AlreadyExists` error if the file already exists.
/// For Overwrite action, returns the original path unchanged.
///
/// # Examples
///
/// ```
/// use hwdb_jobs::utils::get_unique_path;
/// use hwdb_jobs::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/sipm_20250101_120000.csv");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If the file exists, returns /tmp/sipm_20250101_120000 (1).csv
/// // If that exists too, returns /tmp/sipm_20250101_120000 (2).csv, etc.
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> io::Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!(
                        "{} already exists and collision action is skip",
                        path.display()
                    ),
                ));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot extract file stem from {}", path.display()),
                )
            })?;

            let extension = path.extension().and_then(|e| e.to_str());

            let parent = path.parent().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot extract parent directory of {}", path.display()),
                )
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "could not find a unique filename for {} after {} attempts",
                    path.display(),
                    MAX_RENAME_ATTEMPTS
                ),
            ))
        }
    }
}

/// Make a caller-supplied label safe to embed in a filename
///
/// Path separators and characters that are reserved on common filesystems
/// become `_`; surrounding whitespace and dots are trimmed. An empty result
/// falls back to [`DEFAULT_LABEL`].
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    let cleaned = sanitize_file_name(label);
    if cleaned.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        cleaned
    }
}

/// Replace characters that cannot appear in a single path component
///
/// Returns an empty string if nothing usable is left.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    replaced
        .trim()
        .trim_matches('.')
        .trim()
        .to_string()
}

/// Build `{label}_{YYYYmmdd_HHMMSS}.{extension}`
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use hwdb_jobs::utils::timestamped_file_name;
///
/// let at = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
/// assert_eq!(timestamped_file_name("sipm", at, "csv"), "sipm_20250314_092653.csv");
/// ```
#[must_use]
pub fn timestamped_file_name(label: &str, at: DateTime<Local>, extension: &str) -> String {
    format!("{}_{}.{}", label, at.format("%Y%m%d_%H%M%S"), extension)
}

/// Path of the companion filter metadata file for an output document
///
/// `dir/sipm_20250314_092653.csv` becomes `dir/sipm_20250314_092653_filters.json`.
#[must_use]
pub fn companion_metadata_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(DEFAULT_LABEL);
    output.with_file_name(format!("{stem}_filters.json"))
}

/// Drop blank and repeated identifiers, keeping first-seen order
#[must_use]
pub fn dedup_identifiers(identifiers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(identifiers.len());
    identifiers
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
