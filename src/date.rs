//! Portuguese free-text date parsing.
//!
//! Spreadsheet dates arrive as `10/fev`, `10/02/2025`, `seg 10 de fevereiro`
//! and similar. Parsing never fails loudly: anything unrecognised is carried
//! forward verbatim as [`NormalizedDate::Raw`].

use chrono::{Datelike, Local, NaiveDate};
use std::fmt;

use crate::config::AppConfig;
use deunicode::deunicode;

pub const ISO_FORMAT: &str = "%Y-%m-%d";
pub const MONTH_DAY_FORMAT: &str = "%m-%d";

const MONTHS: [(&str, u32); 24] = [
    ("janeiro", 1),
    ("fevereiro", 2),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
    ("jan", 1),
    ("fev", 2),
    ("mar", 3),
    ("abr", 4),
    ("mai", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("set", 9),
    ("out", 10),
    ("nov", 11),
    ("dez", 12),
];

const IGNORED_WORDS: [&str; 16] = [
    "de", "feira", "seg", "segunda", "ter", "terca", "qua", "quarta", "qui", "quinta", "sex",
    "sexta", "sab", "sabado", "dom", "domingo",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearPolicy {
    Fixed(i32),
    InferPast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedDate {
    Parsed(NaiveDate),
    Raw(String),
}

impl NormalizedDate {
    pub fn iso(&self) -> String {
        self.format(ISO_FORMAT)
    }

    pub fn month_day(&self) -> String {
        self.format(MONTH_DAY_FORMAT)
    }

    fn format(&self, fmt: &str) -> String {
        match self {
            NormalizedDate::Parsed(date) => date.format(fmt).to_string(),
            NormalizedDate::Raw(raw) => raw.clone(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, NormalizedDate::Parsed(_))
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iso())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    today: NaiveDate,
    year: YearPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number { value: u32, digits: usize },
    Month(u32),
}

impl DateNormalizer {
    pub fn new(today: NaiveDate, year: YearPolicy) -> Self {
        Self { today, year }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let year = match config.year {
            Some(year) => YearPolicy::Fixed(year),
            None => YearPolicy::InferPast,
        };
        Self::new(Local::now().date_naive(), year)
    }

    pub fn normalize(&self, raw: &str) -> NormalizedDate {
        match self.parse(raw) {
            Some(date) => NormalizedDate::Parsed(date),
            None => NormalizedDate::Raw(raw.to_string()),
        }
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_FORMAT) {
            return Some(date);
        }

        let tokens = tokenize(trimmed)?;
        let (day, month, year) = match tokens.as_slice() {
            [Token::Month(m)] => (1, *m, None),
            [Token::Month(m), Token::Number { value, digits: 4 }] => (1, *m, Some(*value as i32)),
            [Token::Number { value: d, .. }, Token::Month(m)] => (*d, *m, None),
            [Token::Number { value: d, .. }, Token::Month(m), Token::Number { value: y, digits }] => {
                (*d, *m, Some(expand_year(*y, *digits)?))
            }
            [Token::Number { value: y, digits: 4 }, Token::Number { value: m, .. }, Token::Number { value: d, .. }] => {
                (*d, *m, Some(*y as i32))
            }
            [Token::Number { value: m, .. }, Token::Number { value: y, digits: 4 }] => {
                (1, *m, Some(*y as i32))
            }
            [Token::Number { value: d, .. }, Token::Number { value: m, .. }] => (*d, *m, None),
            [Token::Number { value: d, .. }, Token::Number { value: m, .. }, Token::Number { value: y, digits }] => {
                (*d, *m, Some(expand_year(*y, *digits)?))
            }
            _ => return None,
        };

        match year {
            Some(year) => NaiveDate::from_ymd_opt(year, month, day),
            None => self.resolve_year(month, day),
        }
    }

    fn resolve_year(&self, month: u32, day: u32) -> Option<NaiveDate> {
        match self.year {
            YearPolicy::Fixed(year) => NaiveDate::from_ymd_opt(year, month, day),
            YearPolicy::InferPast => {
                let this_year = self.today.year();
                match NaiveDate::from_ymd_opt(this_year, month, day) {
                    Some(date) if date <= self.today => Some(date),
                    _ => NaiveDate::from_ymd_opt(this_year - 1, month, day),
                }
            }
        }
    }
}

fn expand_year(value: u32, digits: usize) -> Option<i32> {
    match digits {
        2 => Some(2000 + value as i32),
        4 => Some(value as i32),
        _ => None,
    }
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let folded = deunicode(&input.to_lowercase());
    let mut tokens = Vec::new();

    for word in folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if IGNORED_WORDS.contains(&word) {
            continue;
        }
        if word.chars().all(|c| c.is_ascii_digit()) {
            if word.len() > 4 {
                return None;
            }
            tokens.push(Token::Number {
                value: word.parse().ok()?,
                digits: word.len(),
            });
            continue;
        }
        let month = MONTHS
            .iter()
            .find(|(name, _)| *name == word)
            .map(|(_, month)| *month)?;
        tokens.push(Token::Month(month));
    }

    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_2025() -> DateNormalizer {
        DateNormalizer::new(
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            YearPolicy::Fixed(2025),
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_abbreviated_month() {
        assert_eq!(fixed_2025().parse("10/fev"), Some(ymd(2025, 2, 10)));
        assert_eq!(fixed_2025().parse("3/MAR"), Some(ymd(2025, 3, 3)));
    }

    #[test]
    fn test_full_month_with_weekday_and_filler() {
        assert_eq!(
            fixed_2025().parse("segunda-feira, 10 de março de 2024"),
            Some(ymd(2024, 3, 10))
        );
    }

    #[test]
    fn test_numeric_forms() {
        let n = fixed_2025();
        assert_eq!(n.parse("10/02"), Some(ymd(2025, 2, 10)));
        assert_eq!(n.parse("10/02/24"), Some(ymd(2024, 2, 10)));
        assert_eq!(n.parse("10.02.2023"), Some(ymd(2023, 2, 10)));
        assert_eq!(n.parse("2025-02-10"), Some(ymd(2025, 2, 10)));
    }

    #[test]
    fn test_month_only_prefers_first_day() {
        assert_eq!(fixed_2025().parse("fevereiro"), Some(ymd(2025, 2, 1)));
        assert_eq!(fixed_2025().parse("abr 2024"), Some(ymd(2024, 4, 1)));
    }

    #[test]
    fn test_infer_past_steps_back_a_year() {
        let n = DateNormalizer::new(ymd(2025, 3, 1), YearPolicy::InferPast);
        assert_eq!(n.parse("10/fev"), Some(ymd(2025, 2, 10)));
        assert_eq!(n.parse("10/dez"), Some(ymd(2024, 12, 10)));
    }

    #[test]
    fn test_unparseable_returns_raw() {
        let n = fixed_2025();
        assert_eq!(n.normalize("Aula 1"), NormalizedDate::Raw("Aula 1".to_string()));
        assert_eq!(n.normalize("31/fev"), NormalizedDate::Raw("31/fev".to_string()));
        assert_eq!(n.normalize(""), NormalizedDate::Raw(String::new()));
    }

    #[test]
    fn test_formats() {
        let date = NormalizedDate::Parsed(ymd(2025, 2, 10));
        assert_eq!(date.iso(), "2025-02-10");
        assert_eq!(date.month_day(), "02-10");
        let raw = NormalizedDate::Raw("a definir".to_string());
        assert_eq!(raw.iso(), "a definir");
        assert_eq!(raw.month_day(), "a definir");
        assert!(date.is_parsed());
        assert!(!raw.is_parsed());
    }

    #[test]
    fn test_accented_weekday_is_ignored() {
        assert_eq!(
            fixed_2025().parse("Sábado, 15 de março"),
            Some(ymd(2025, 3, 15))
        );
    }
}
