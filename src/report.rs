//! Report tables and console summary for the reconciliation.

use colored::*;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::record::{SessionRecord, DELIMITER};
use crate::reconcile::ReconciliationResult;

pub const MISSING_ALL_FILE: &str = "check_missing_all.csv";
pub const MISSING_PAIR_FILE: &str = "check_missing_pair.csv";
pub const ORPHAN_FILE: &str = "check_orphan_files.csv";

pub const RECORD_HEADERS: [&str; 8] = [
    "Disciplina",
    "Semestre",
    "Data",
    "Professor",
    "Frente",
    "Conteúdo / Link da aula",
    "Link",
    "Expected Name",
];

const RULE_WIDTH: usize = 70;
const TITLE_PREVIEW: usize = 60;

#[derive(Debug, Default)]
pub struct ReportPaths {
    pub missing_all: Option<PathBuf>,
    pub missing_pair: Option<PathBuf>,
    pub orphans: Option<PathBuf>,
}

pub fn semicolon_writer(path: &Path) -> Result<Writer<File>, Error> {
    Ok(WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?)
}

/// The record's columns in input order followed by its expected key.
pub fn record_row(record: &SessionRecord) -> Vec<String> {
    vec![
        record.discipline.clone(),
        record.semester.clone(),
        record.date_raw.clone(),
        record.professor.clone(),
        record.track.clone(),
        record.title.clone(),
        record.url.clone(),
        record.key().to_string(),
    ]
}

/// Write one table per non-empty category into `dir`.
pub fn write_reports(result: &ReconciliationResult, dir: &Path) -> Result<ReportPaths, Error> {
    let mut paths = ReportPaths::default();

    if !result.missing.is_empty() {
        let path = dir.join(MISSING_ALL_FILE);
        let mut wtr = semicolon_writer(&path)?;
        wtr.write_record(RECORD_HEADERS)?;
        for record in &result.missing {
            wtr.write_record(record_row(record))?;
        }
        wtr.flush()?;
        paths.missing_all = Some(path);
    }

    if !result.partial.is_empty() {
        let path = dir.join(MISSING_PAIR_FILE);
        let mut wtr = semicolon_writer(&path)?;
        let mut headers = RECORD_HEADERS.to_vec();
        headers.push("Existing File");
        wtr.write_record(&headers)?;
        for partial in &result.partial {
            let mut row = record_row(&partial.record);
            row.push(partial.existing.file_name.clone());
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        paths.missing_pair = Some(path);
    }

    if !result.orphans.is_empty() {
        let path = dir.join(ORPHAN_FILE);
        let mut wtr = semicolon_writer(&path)?;
        wtr.write_record(["Filename", "Size (MB)"])?;
        for file in &result.orphans {
            wtr.write_record([file.file_name.clone(), format!("{:.1}", file.size_mb())])?;
        }
        wtr.flush()?;
        paths.orphans = Some(path);
    }

    Ok(paths)
}

pub fn print_rule(c: char) {
    println!("{}", c.to_string().repeat(RULE_WIDTH));
}

fn print_heading(title: &str) {
    println!();
    print_rule('-');
    println!("{}", title.bold());
    print_rule('-');
}

fn preview(text: &str) -> String {
    if text.chars().count() > TITLE_PREVIEW {
        let head: String = text.chars().take(TITLE_PREVIEW).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

pub fn print_summary(result: &ReconciliationResult) {
    println!();
    print_rule('=');
    println!("{}", "RESULTS".bold());
    print_rule('=');
    println!();
    println!(
        "{} Complete (both files): {}",
        "✓".green(),
        result.complete.len()
    );
    println!(
        "{} Missing pair (one file): {}",
        "⚠".yellow(),
        result.partial.len()
    );
    println!("{} Missing all files: {}", "✗".red(), result.missing.len());
    println!(
        "{} Orphan files (no CSV entry): {}",
        "?".cyan(),
        result.orphans.len()
    );

    if !result.missing.is_empty() {
        print_heading("MISSING ALL FILES:");
        for record in &result.missing {
            println!(
                "  • {} - {} - {}",
                record.discipline, record.track, record.date_raw
            );
            println!("    {}", preview(&record.title));
            println!("    Expected: {}_*.mp4", record.key());
        }
    }

    if !result.partial.is_empty() {
        print_heading("MISSING PAIR (only one file):");
        for partial in &result.partial {
            let record = &partial.record;
            println!(
                "  • {} - {} - {}",
                record.discipline, record.track, record.date_raw
            );
            println!("    Has: {}", partial.existing.file_name);
        }
    }

    if !result.orphans.is_empty() {
        print_heading("ORPHAN FILES (no CSV entry):");
        for file in &result.orphans {
            println!("  • {} ({:.1} MB)", file.file_name, file.size_mb());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_titles() {
        let long = "a".repeat(80);
        let shown = preview(&long);
        assert_eq!(shown.len(), TITLE_PREVIEW + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_no_reports_for_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_reports(&ReconciliationResult::default(), dir.path()).unwrap();
        assert!(paths.missing_all.is_none());
        assert!(paths.missing_pair.is_none());
        assert!(paths.orphans.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
