use chrono::NaiveDate;
use recsync::audit::{run_audit, ScratchCopy};
use recsync::date::YearPolicy;
use recsync::{DateNormalizer, Error, LoadOptions, RecordLoader, SessionRecord};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CSV: &str = "Data;Disciplina;Frente;Conteúdo;Professor
10/fev;Matemática;A;Funções;Ana
11/fev;Matemática;A;Razão: proporção;Ana
10/fev;Matemática;B;Geometria;Bia
";

fn records() -> Vec<SessionRecord> {
    RecordLoader::new(
        DateNormalizer::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            YearPolicy::Fixed(2025),
        ),
        LoadOptions::positional(),
    )
    .load_reader(CSV.as_bytes())
    .unwrap()
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), name).unwrap();
}

#[test]
fn test_audit_reports_mismatches_and_leaves_source_alone() {
    let root = tempdir().unwrap();
    let source = root.path().join("recordings");
    fs::create_dir(&source).unwrap();
    let files = [
        "Matemática - A - 02-10 - Funções - esq.mp4",
        "Matemática - A - 02-10 - Funções - dir.mp4",
        "Matemática - A - 02-11 - Razão - proporção - esq.mp4",
        "Matemática - A - 02-11 - Razão - proporção - dir.mp4",
        "Matemática - B - 02-10 - Geometria - esq.mp4",
        "Matemática - B - 02-10 - Trigonometria - dir.mp4",
    ];
    for name in files {
        touch(&source, name);
    }
    touch(&source, "notes.txt");

    let mismatches = run_audit(&records(), &source, "mp4").unwrap();

    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].track, "B");
    assert_eq!(mismatches[0].found, "Matematica - B - 02-10 - Trigonometria - dir.mp4");
    assert_eq!(mismatches[0].expected, "Matematica - B - 02-10 - Geometria - esq|dir");

    assert!(!root.path().join("recordings_copy").exists());
    let mut remaining: Vec<String> = fs::read_dir(&source)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(remaining.len(), files.len() + 1);
}

#[test]
fn test_audit_checks_accented_tracks() {
    let root = tempdir().unwrap();
    let source = root.path().join("recordings");
    fs::create_dir(&source).unwrap();
    touch(&source, "Física - Única - 02-10 - Funções - esq.mp4");
    touch(&source, "Física - Única - 09-09 - TOTALLY WRONG - dir.mp4");

    let records = RecordLoader::new(
        DateNormalizer::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            YearPolicy::Fixed(2025),
        ),
        LoadOptions::positional(),
    )
    .load_reader("Data;Disciplina;Frente;Conteúdo;Professor\n10/fev;Física;Única;Funções;Ana\n".as_bytes())
    .unwrap();

    let mismatches = run_audit(&records, &source, "mp4").unwrap();

    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].track, "Unica");
    assert_eq!(mismatches[0].found, "Fisica - Unica - 09-09 - TOTALLY WRONG - dir.mp4");
    assert_eq!(mismatches[0].expected, "Fisica - Unica - 02-10 - Funcoes - esq|dir");
}

#[test]
fn test_audit_refuses_existing_scratch_directory() {
    let root = tempdir().unwrap();
    let source = root.path().join("recordings");
    let scratch = root.path().join("recordings_copy");
    fs::create_dir(&source).unwrap();
    fs::create_dir(&scratch).unwrap();
    touch(&scratch, "mine.mp4");

    let err = run_audit(&records(), &source, "mp4").unwrap_err();

    assert!(matches!(err, Error::DirectoryExists(_)));
    assert!(scratch.join("mine.mp4").exists());
}

#[test]
fn test_scratch_copy_buckets_by_track_and_is_removed_on_drop() {
    let root = tempdir().unwrap();
    let source = root.path().join("recordings");
    fs::create_dir(&source).unwrap();
    touch(&source, "Fisica - A - 02-10 - X - esq.mp4");
    touch(&source, "Fisica - B - 02-10 - Y - esq.mp4");
    touch(&source, "unnamed.mp4");

    let scratch_path = {
        let scratch = ScratchCopy::create(&source, "mp4").unwrap();
        let buckets = scratch.bucket_by_track().unwrap();
        assert_eq!(
            buckets.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["A", "B", "empty"]
        );
        assert!(scratch.path().join("A").join("Fisica - A - 02-10 - X - esq.mp4").exists());
        scratch.path().to_path_buf()
    };

    assert!(!scratch_path.exists());
    assert!(source.join("unnamed.mp4").exists());
}
