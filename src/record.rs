//! Spreadsheet loading.
//!
//! Column headers are matched case-insensitively against [`COLUMN_ALIASES`],
//! resolved once per file into a [`ColumnMap`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::date::{DateNormalizer, NormalizedDate};
use crate::error::Error;
use crate::key::FilenameKey;

pub const DELIMITER: u8 = b';';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Discipline,
    Semester,
    Date,
    Professor,
    Track,
    Title,
    Link,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Discipline => "disciplina",
            Field::Semester => "semestre",
            Field::Date => "data",
            Field::Professor => "professor",
            Field::Track => "frente",
            Field::Title => "conteudo",
            Field::Link => "link",
        }
    }
}

/// Accepted header spellings. Earlier entries win when several are present.
pub const COLUMN_ALIASES: &[(&str, Field)] = &[
    ("disciplina", Field::Discipline),
    ("semestre", Field::Semester),
    ("data", Field::Date),
    ("date", Field::Date),
    ("professor", Field::Professor),
    ("frente", Field::Track),
    ("conteúdo / link da aula", Field::Title),
    ("conteúdo", Field::Title),
    ("conteudo", Field::Title),
    ("title", Field::Title),
    ("link", Field::Link),
    ("url", Field::Link),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub discipline: String,
    pub semester: String,
    pub track: String,
    pub date_raw: String,
    pub date: NormalizedDate,
    pub professor: String,
    pub title: String,
    pub url: String,
    /// 1-based line in the source file, header included.
    pub line: usize,
}

impl SessionRecord {
    pub fn key(&self) -> FilenameKey {
        FilenameKey::for_session(self)
    }

    pub fn display_name(&self) -> String {
        format!("{} - {} - {}", self.discipline, self.track, self.title)
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Skip rows with an empty link instead of keeping them.
    pub require_link: bool,
    /// Rows with fewer fields than this (or than the header) are rejected.
    pub min_fields: usize,
    pub required: Vec<Field>,
    /// Column index used for a field when none of its aliases is in the
    /// header.
    pub fallback_positions: Vec<(Field, usize)>,
}

impl LoadOptions {
    /// Reconciliation and download: every kept row must carry a link.
    pub fn linked() -> Self {
        Self {
            require_link: true,
            min_fields: 0,
            required: vec![Field::Link],
            fallback_positions: Vec::new(),
        }
    }

    /// Positional renaming and audit: every row counts, link or not. Sheets
    /// with unknown headers are read by column position.
    pub fn positional() -> Self {
        Self {
            require_link: false,
            min_fields: 5,
            required: vec![Field::Date, Field::Discipline, Field::Track, Field::Title],
            fallback_positions: vec![
                (Field::Date, 0),
                (Field::Discipline, 2),
                (Field::Track, 3),
                (Field::Title, 4),
            ],
        }
    }
}

#[derive(Debug, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, Vec<usize>>,
}

impl ColumnMap {
    pub fn resolve(headers: &StringRecord) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut columns: HashMap<Field, Vec<usize>> = HashMap::new();

        for (alias, field) in COLUMN_ALIASES {
            if let Some(index) = normalized.iter().position(|h| h == alias) {
                columns.entry(*field).or_default().push(index);
            }
        }

        Self { columns }
    }

    /// Map each absent field to its fallback column, if the header has one.
    pub fn fill_missing(&mut self, fallbacks: &[(Field, usize)], header_len: usize) {
        for &(field, index) in fallbacks {
            if index < header_len && !self.columns.contains_key(&field) {
                debug!("No header for {}, using column {}", field.name(), index + 1);
                self.columns.insert(field, vec![index]);
            }
        }
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// First non-empty value among the columns mapped to `field`.
    pub fn get(&self, row: &StringRecord, field: Field) -> String {
        self.columns
            .get(&field)
            .into_iter()
            .flatten()
            .filter_map(|&index| row.get(index))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

pub struct RecordLoader {
    normalizer: DateNormalizer,
    options: LoadOptions,
}

impl RecordLoader {
    pub fn new(normalizer: DateNormalizer, options: LoadOptions) -> Self {
        Self {
            normalizer,
            options,
        }
    }

    pub fn load_path(&self, path: &Path) -> Result<Vec<SessionRecord>, Error> {
        info!("Loading CSV: {}", path.display());
        let records = self.load_reader(File::open(path)?)?;
        info!("Found {} entries", records.len());
        Ok(records)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<Vec<SessionRecord>, Error> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.len() < self.options.min_fields {
            return Err(Error::ShortRow {
                line: 1,
                expected: self.options.min_fields,
                found: headers.len(),
            });
        }

        let mut columns = ColumnMap::resolve(&headers);
        columns.fill_missing(&self.options.fallback_positions, headers.len());
        for field in &self.options.required {
            if !columns.contains(*field) {
                return Err(Error::MissingColumn(field.name()));
            }
        }

        let expected = headers.len().max(self.options.min_fields);
        let mut records = Vec::new();

        for result in csv_reader.records() {
            let row = result?;
            let line = row.position().map(|p| p.line() as usize).unwrap_or(0);

            if row.len() < expected {
                return Err(Error::ShortRow {
                    line,
                    expected,
                    found: row.len(),
                });
            }

            let url = columns.get(&row, Field::Link);
            if self.options.require_link && url.is_empty() {
                debug!("Skipping line {} without a link", line);
                continue;
            }

            let date_raw = columns.get(&row, Field::Date);
            let date = self.normalizer.normalize(&date_raw);
            if !date.is_parsed() {
                debug!("Line {}: keeping unparsed date '{}'", line, date_raw);
            }
            records.push(SessionRecord {
                discipline: columns.get(&row, Field::Discipline),
                semester: columns.get(&row, Field::Semester),
                track: columns.get(&row, Field::Track),
                date,
                date_raw,
                professor: columns.get(&row, Field::Professor),
                title: columns.get(&row, Field::Title),
                url,
                line,
            });
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::YearPolicy;
    use chrono::NaiveDate;

    fn loader(options: LoadOptions) -> RecordLoader {
        RecordLoader::new(
            DateNormalizer::new(
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                YearPolicy::Fixed(2025),
            ),
            options,
        )
    }

    const DOWNLOAD_CSV: &str = "Disciplina;Semestre;Data;Professor;Frente;Conteúdo / Link da aula;Link\n\
Matemática;2025.1;10/fev;Ana;A;Aula 1;https://zoom.us/rec/1\n\
Física;2025.1;11/fev;Bia;B;Aula 2;\n";

    #[test]
    fn test_skips_rows_without_link() {
        let records = loader(LoadOptions::linked())
            .load_reader(DOWNLOAD_CSV.as_bytes())
            .unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.discipline, "Matemática");
        assert_eq!(rec.title, "Aula 1");
        assert_eq!(rec.date.iso(), "2025-02-10");
        assert_eq!(rec.line, 2);
    }

    #[test]
    fn test_header_aliases_are_case_insensitive() {
        let csv = " DISCIPLINA ;semestre;DATA;Frente;Title;URL\nQuímica;2025.1;12/fev;C;Ligações;https://zoom.us/rec/3\n";
        let records = loader(LoadOptions::linked())
            .load_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Ligações");
        assert_eq!(records[0].url, "https://zoom.us/rec/3");
        assert_eq!(records[0].professor, "");
    }

    #[test]
    fn test_first_non_empty_alias_wins() {
        let csv = "Disciplina;Conteúdo / Link da aula;Conteudo;Link\nBio;;Células;https://x\nBio;Genética;Outro;https://y\n";
        let records = loader(LoadOptions::linked())
            .load_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(records[0].title, "Células");
        assert_eq!(records[1].title, "Genética");
    }

    #[test]
    fn test_short_row_is_fatal() {
        let csv = "Disciplina;Semestre;Data;Frente;Conteudo;Link\nBio;2025.1;10/fev\n";
        let err = loader(LoadOptions::linked())
            .load_reader(csv.as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRow {
                line: 2,
                expected: 6,
                found: 3
            }
        ));
    }

    #[test]
    fn test_positional_keeps_rows_without_link() {
        let csv = "Data;Dia;Disciplina;Frente;Conteudo\n10/fev;seg;Bio;A;Células\n11/fev;ter;Bio;A;Tecidos\n";
        let records = loader(LoadOptions::positional())
            .load_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date.month_day(), "02-11");
    }

    #[test]
    fn test_linked_requires_link_column() {
        let csv = "Disciplina;Data\nBio;10/fev\n";
        let err = loader(LoadOptions::linked())
            .load_reader(csv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn("link")));
    }

    #[test]
    fn test_positional_falls_back_to_column_order() {
        let csv = "Quando;Turma;Matéria;Frente;Assunto\n10/fev;T1;Bio;A;Células\n";
        let records = loader(LoadOptions::positional())
            .load_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.date.month_day(), "02-10");
        assert_eq!(rec.discipline, "Bio");
        assert_eq!(rec.track, "A");
        assert_eq!(rec.title, "Células");
    }

    #[test]
    fn test_named_headers_win_over_positions() {
        let csv = "Disciplina;Data;Frente;Conteudo;Professor\nBio;10/fev;A;Células;Ana\n";
        let records = loader(LoadOptions::positional())
            .load_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(records[0].discipline, "Bio");
        assert_eq!(records[0].date.month_day(), "02-10");
        assert_eq!(records[0].title, "Células");
    }

    #[test]
    fn test_positional_rejects_narrow_header() {
        let csv = "Data;Disciplina;Frente;Conteudo\n10/fev;Bio;A;Células\n";
        let err = loader(LoadOptions::positional())
            .load_reader(csv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::ShortRow { line: 1, .. }));
    }
}
