//! Positional batch renamer.
//!
//! The sorted directory listing is paired two files per spreadsheet row:
//! the first of each pair becomes `esq`, the second `dir`. There is no key
//! matching, so re-running after a partial rename corrupts the pairing.

use glob::Pattern;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Error;
use crate::key::{legacy_file_name, Side};
use crate::record::SessionRecord;
use crate::scanner::list_media_files;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameMove {
    pub from: PathBuf,
    pub to: PathBuf,
    pub side: Side,
    /// Index of the spreadsheet row the file was paired with.
    pub row: usize,
}

#[derive(Debug, Default)]
pub struct RenamePlan {
    pub moves: Vec<RenameMove>,
}

/// Pair sorted media files with rows. Fails before anything is renamed unless
/// there are exactly two files per row.
pub fn plan_renames(
    records: &[SessionRecord],
    dir: &Path,
    extension: &str,
    ignore_patterns: &[Pattern],
) -> Result<RenamePlan, Error> {
    let files = list_media_files(dir, extension, ignore_patterns)?;
    let expected = records.len() * 2;
    if files.len() != expected {
        return Err(Error::CountMismatch {
            files: files.len(),
            expected,
        });
    }

    let moves = files
        .into_iter()
        .enumerate()
        .map(|(i, from)| {
            let row = i / 2;
            let side = if i % 2 == 0 { Side::Esq } else { Side::Dir };
            let to = dir.join(legacy_file_name(&records[row], side, extension));
            RenameMove {
                from,
                to,
                side,
                row,
            }
        })
        .collect();

    Ok(RenamePlan { moves })
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Reject plans whose targets collide with each other or with files the
    /// plan does not itself move away.
    pub fn validate(&self) -> Result<(), Error> {
        let sources: HashSet<&Path> = self.moves.iter().map(|m| m.from.as_path()).collect();
        let mut targets: HashSet<&Path> = HashSet::new();

        for mv in &self.moves {
            if !targets.insert(mv.to.as_path()) {
                return Err(Error::TargetExists(mv.to.clone()));
            }
            if mv.to.exists() && !sources.contains(mv.to.as_path()) {
                return Err(Error::TargetExists(mv.to.clone()));
            }
        }
        Ok(())
    }

    /// Perform the renames in order. A target that is still occupied by a
    /// later source is renamed through a temporary name first.
    pub fn apply(&self) -> Result<usize, Error> {
        self.validate()?;

        let pending: HashSet<&Path> = self.moves.iter().map(|m| m.from.as_path()).collect();
        let mut staged: Vec<(PathBuf, &RenameMove)> = Vec::new();
        let mut renamed = 0;

        for (i, mv) in self.moves.iter().enumerate() {
            if mv.from == mv.to {
                continue;
            }
            if pending.contains(mv.to.as_path()) {
                let temp = mv.from.with_extension(format!("recsync-{i}.tmp"));
                debug!("Staging {} -> {}", mv.from.display(), temp.display());
                fs::rename(&mv.from, &temp)?;
                staged.push((temp, mv));
                continue;
            }
            debug!("Renaming {} -> {}", mv.from.display(), mv.to.display());
            fs::rename(&mv.from, &mv.to)?;
            renamed += 1;
        }

        for (temp, mv) in staged {
            fs::rename(&temp, &mv.to)?;
            renamed += 1;
        }

        info!("Renamed {} files", renamed);
        Ok(renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::NormalizedDate;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn row(title: &str, day: u32) -> SessionRecord {
        SessionRecord {
            discipline: "Bio".to_string(),
            semester: String::new(),
            track: "A".to_string(),
            date_raw: format!("{day}/fev"),
            date: NormalizedDate::Parsed(NaiveDate::from_ymd_opt(2025, 2, day).unwrap()),
            professor: String::new(),
            title: title.to_string(),
            url: String::new(),
            line: day as usize,
        }
    }

    #[test]
    fn test_plan_alternates_sides_per_pair() {
        let dir = tempdir().unwrap();
        for name in ["c.mp4", "a.mp4", "d.mp4", "b.mp4"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let records = vec![row("Células", 10), row("Tecidos", 11)];
        let plan = plan_renames(&records, dir.path(), "mp4", &[]).unwrap();

        let summary: Vec<(String, Side, usize)> = plan
            .moves
            .iter()
            .map(|m| {
                (
                    m.from.file_name().unwrap().to_string_lossy().into_owned(),
                    m.side,
                    m.row,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a.mp4".to_string(), Side::Esq, 0),
                ("b.mp4".to_string(), Side::Dir, 0),
                ("c.mp4".to_string(), Side::Esq, 1),
                ("d.mp4".to_string(), Side::Dir, 1),
            ]
        );
        assert!(plan.moves[3]
            .to
            .ends_with("Bio - A - 02-11 - Tecidos - dir.mp4"));
    }

    #[test]
    fn test_count_mismatch_fails_before_renaming() {
        let dir = tempdir().unwrap();
        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let records = vec![row("Células", 10), row("Tecidos", 11)];
        let err = plan_renames(&records, dir.path(), "mp4", &[]).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { files: 3, expected: 4 }));
        assert!(dir.path().join("a.mp4").exists());
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let dir = tempdir().unwrap();
        for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let records = vec![row("Células", 10), row("Células", 10)];
        let plan = plan_renames(&records, dir.path(), "mp4", &[]).unwrap();
        assert!(matches!(plan.apply(), Err(Error::TargetExists(_))));
        assert!(dir.path().join("a.mp4").exists());
    }
}
