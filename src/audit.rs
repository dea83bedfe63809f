//! Track-bucketed naming audit.
//!
//! Works on a disposable `<dir>_copy` sibling: files are copied in, moved into
//! one sub-directory per track, compared pairwise against the spreadsheet,
//! and the copy is removed again. The source directory is never modified.

use deunicode::deunicode;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::key::legacy_title;
use crate::record::SessionRecord;

pub const EMPTY_TRACK: &str = "empty";

lazy_static! {
    static ref TRACK_SEGMENT: Regex = Regex::new(r"-(.*?)-").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub track: String,
    pub found: String,
    pub expected: String,
}

/// Spreadsheet fields as they appear in legacy file names, accent-folded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExpectedName {
    discipline: String,
    track: String,
    date: String,
    title: String,
}

impl ExpectedName {
    fn from_record(record: &SessionRecord) -> Self {
        Self {
            discipline: deunicode(&record.discipline),
            track: track_name(&deunicode(&record.track)),
            date: record.date.month_day(),
            title: deunicode(&legacy_title(&record.title)),
        }
    }

    fn pattern(&self) -> Result<Regex, Error> {
        let expr = format!(
            r"^{} - {} - {} - {} - (esq|dir)\b",
            regex::escape(&self.discipline),
            regex::escape(&self.track),
            regex::escape(&self.date),
            regex::escape(&self.title),
        );
        Regex::new(&expr).map_err(|e| Error::Other(e.to_string()))
    }

    fn display(&self) -> String {
        format!(
            "{} - {} - {} - {} - esq|dir",
            self.discipline, self.track, self.date, self.title
        )
    }
}

fn track_name(track: &str) -> String {
    if track.is_empty() {
        EMPTY_TRACK.to_string()
    } else {
        track.to_string()
    }
}

/// Track segment of a legacy file name: the text between the first two
/// dashes, trimmed and transliterated to ASCII so it keys the same bucket as
/// the spreadsheet track. Names without one land in [`EMPTY_TRACK`].
pub fn extract_track(file_name: &str) -> String {
    let segment = TRACK_SEGMENT
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == ' ' || c == '-'))
        .unwrap_or_default();
    track_name(&deunicode(segment))
}

/// Records grouped by track, each group ordered by (MM-DD date, title).
pub fn group_records(records: &[SessionRecord]) -> BTreeMap<String, Vec<SessionRecord>> {
    let mut groups: BTreeMap<String, Vec<SessionRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(track_name(&deunicode(&record.track)))
            .or_default()
            .push(record.clone());
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| {
            a.date
                .month_day()
                .cmp(&b.date.month_day())
                .then_with(|| a.title.cmp(&b.title))
        });
    }
    groups
}

/// Compare one track's files, naturally sorted, against its ordered records.
/// Each record covers two consecutive files; files past the last record are
/// not checked.
pub fn audit_bucket(track: &str, records: &[SessionRecord], files: &[String]) -> Result<Vec<Mismatch>, Error> {
    let mut sorted: Vec<&String> = files.iter().collect();
    sorted.sort_by(|a, b| natord::compare(a, b));

    let mut mismatches = Vec::new();
    for (i, file) in sorted.iter().enumerate() {
        let Some(record) = records.get(i / 2) else {
            break;
        };
        let expected = ExpectedName::from_record(record);
        let found = deunicode(file);
        if !expected.pattern()?.is_match(&found) {
            mismatches.push(Mismatch {
                track: track.to_string(),
                found,
                expected: expected.display(),
            });
        }
    }
    Ok(mismatches)
}

/// Scratch copy of the audited directory, removed on drop.
pub struct ScratchCopy {
    root: PathBuf,
}

impl ScratchCopy {
    /// Copy the `extension` files of `source` into `<source>_copy`.
    pub fn create(source: &Path, extension: &str) -> Result<Self, Error> {
        let source = fs::canonicalize(source)?;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Other(format!("Cannot copy {}", source.display())))?;
        let parent = source
            .parent()
            .ok_or_else(|| Error::Other(format!("Cannot copy {}", source.display())))?;
        let root = parent.join(format!("{name}_copy"));

        if root.exists() {
            return Err(Error::DirectoryExists(root));
        }
        fs::create_dir(&root)?;
        let scratch = Self { root };

        for entry in fs::read_dir(&source)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            let matches_extension = Path::new(&file_name)
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(extension));
            if !entry.file_type()?.is_file() || name.starts_with('.') || !matches_extension {
                continue;
            }
            fs::copy(entry.path(), scratch.root.join(&file_name))?;
        }
        debug!("Copied {} into {}", source.display(), scratch.root.display());

        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Move every top-level file into a sub-directory named after its track.
    pub fn bucket_by_track(&self) -> Result<BTreeMap<String, Vec<String>>, Error> {
        let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push((entry.path(), entry.file_name().to_string_lossy().into_owned()));
            }
        }

        for (path, name) in files {
            let track = extract_track(&name);
            let bucket = self.root.join(&track);
            if !bucket.exists() {
                fs::create_dir(&bucket)?;
            }
            fs::rename(&path, bucket.join(&name))?;
            buckets.entry(track).or_default().push(name);
        }

        Ok(buckets)
    }
}

impl Drop for ScratchCopy {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!("Failed to remove {}: {}", self.root.display(), e);
        }
    }
}

/// Audit `dir` against the spreadsheet without changing it.
pub fn run_audit(records: &[SessionRecord], dir: &Path, extension: &str) -> Result<Vec<Mismatch>, Error> {
    let scratch = ScratchCopy::create(dir, extension)?;
    let buckets = scratch.bucket_by_track()?;
    debug!(
        "{} track buckets in {}",
        buckets.len(),
        scratch.path().display()
    );
    let groups = group_records(records);

    let mut mismatches = Vec::new();
    for (track, track_records) in &groups {
        let files = buckets.get(track).map(Vec::as_slice).unwrap_or_default();
        info!("Checking {}...", track);
        mismatches.extend(audit_bucket(track, track_records, files)?);
    }

    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::NormalizedDate;
    use chrono::NaiveDate;

    fn row(track: &str, day: u32, title: &str) -> SessionRecord {
        SessionRecord {
            discipline: "Matemática".to_string(),
            semester: String::new(),
            track: track.to_string(),
            date_raw: format!("{day}/fev"),
            date: NormalizedDate::Parsed(NaiveDate::from_ymd_opt(2025, 2, day).unwrap()),
            professor: String::new(),
            title: title.to_string(),
            url: String::new(),
            line: 0,
        }
    }

    #[test]
    fn test_extract_track() {
        assert_eq!(extract_track("Matematica - A - 02-10 - Aula - esq.mp4"), "A");
        assert_eq!(extract_track("Matematica -  - 02-10 - Aula - esq.mp4"), EMPTY_TRACK);
        assert_eq!(extract_track("no dashes.mp4"), EMPTY_TRACK);
        assert_eq!(extract_track("Física - Única - 02-10 - Funções - esq.mp4"), "Unica");
    }

    #[test]
    fn test_group_records_sorted_by_date_then_title() {
        let records = vec![row("A", 12, "B"), row("A", 10, "Z"), row("A", 12, "A"), row("", 1, "x")];
        let groups = group_records(&records);
        let titles: Vec<&str> = groups["A"].iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Z", "A", "B"]);
        assert_eq!(groups[EMPTY_TRACK].len(), 1);
    }

    #[test]
    fn test_audit_bucket_reports_mismatch_only() {
        let records = vec![row("A", 10, "Funções"), row("A", 11, "Razão: proporção")];
        let files = vec![
            "Matematica - A - 02-10 - Funcoes - esq.mp4".to_string(),
            "Matematica - A - 02-10 - Funcoes - dir.mp4".to_string(),
            "Matematica - A - 02-11 - Razao - proporcao - esq.mp4".to_string(),
            "Matematica - A - 02-12 - Errado - dir.mp4".to_string(),
        ];
        let mismatches = audit_bucket("A", &records, &files).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].found, "Matematica - A - 02-12 - Errado - dir.mp4");
        assert_eq!(
            mismatches[0].expected,
            "Matematica - A - 02-11 - Razao - proporcao - esq|dir"
        );
    }

    #[test]
    fn test_audit_bucket_ignores_files_past_last_record() {
        let records = vec![row("A", 10, "Funções")];
        let files = vec![
            "Matematica - A - 02-10 - Funcoes - esq.mp4".to_string(),
            "Matematica - A - 02-10 - Funcoes - dir.mp4".to_string(),
            "zzz extra.mp4".to_string(),
        ];
        assert!(audit_bucket("A", &records, &files).unwrap().is_empty());
    }
}
