use glob::Pattern;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::error::Error;

/// Side suffixes, checked in order: long-form separators, short forms, then
/// stream-type names.
const SIDE_SUFFIXES: [&str; 6] = [" - esq", " - dir", "_esq", "_dir", "_screen", "_camera"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub base_key: String,
    pub size: u64,
}

impl ScannedFile {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / 1024.0 / 1024.0
    }
}

/// Base key → files sharing it.
#[derive(Debug, Default)]
pub struct FileScan {
    groups: BTreeMap<String, Vec<ScannedFile>>,
}

impl FileScan {
    pub fn get(&self, base_key: &str) -> &[ScannedFile] {
        self.groups
            .get(base_key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ScannedFile>)> {
        self.groups.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn total_files(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn insert(&mut self, file: ScannedFile) {
        self.groups
            .entry(file.base_key.clone())
            .or_default()
            .push(file);
    }
}

/// Recover the session key from a file stem by removing its side suffix.
/// Unrecognised stems are returned unchanged.
pub fn strip_side_suffix(stem: &str) -> &str {
    SIDE_SUFFIXES
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(stem)
}

pub fn compile_ignore_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Non-hidden regular files directly inside `dir` with the given extension
/// (case-insensitive), sorted by file name.
pub fn list_media_files(
    dir: &Path,
    extension: &str,
    ignore_patterns: &[Pattern],
) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| {
            Error::Other(format!(
                "Error reading entry in directory {}: {}",
                dir.display(),
                err
            ))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        let matches_extension = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches_extension {
            continue;
        }

        if ignore_patterns.iter().any(|p| p.matches(&name)) {
            debug!("Ignoring {}", name);
            continue;
        }

        files.push(entry.into_path());
    }

    Ok(files)
}

/// Group the media files in `dir` by base key. A missing directory is an
/// empty scan.
pub fn scan_media_files(
    dir: &Path,
    extension: &str,
    ignore_patterns: &[Pattern],
) -> Result<FileScan, Error> {
    let mut scan = FileScan::default();
    if !dir.is_dir() {
        return Ok(scan);
    }

    for path in list_media_files(dir, extension, ignore_patterns)? {
        let size = path.metadata()?.len();
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_key = strip_side_suffix(&stem).to_string();

        scan.insert(ScannedFile {
            path,
            file_name,
            base_key,
            size,
        });
    }

    debug!(
        "Scanned {} files into {} base keys",
        scan.total_files(),
        scan.group_count()
    );
    Ok(scan)
}
