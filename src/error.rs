use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Line {line} has {found} fields, expected at least {expected}. Also check the delimiter")]
    ShortRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Number of files ({files}) and number of rows times 2 ({expected}) do not match")]
    CountMismatch { files: usize, expected: usize },

    #[error("Rename target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("Directory already exists: {}", .0.display())]
    DirectoryExists(PathBuf),

    #[error("Invalid HAR capture: {0}")]
    Har(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_row_display() {
        let err = Error::ShortRow {
            line: 4,
            expected: 5,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "Line 4 has 3 fields, expected at least 5. Also check the delimiter"
        );
    }

    #[test]
    fn test_count_mismatch_display() {
        let err = Error::CountMismatch {
            files: 5,
            expected: 6,
        };
        assert_eq!(
            err.to_string(),
            "Number of files (5) and number of rows times 2 (6) do not match"
        );
    }
}
