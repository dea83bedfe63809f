use std::fmt;

use crate::record::SessionRecord;

pub const MAX_KEY_LEN: usize = 200;
pub const DISALLOWED_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const SEPARATOR: &str = " - ";

/// Pair side of a recording. Historically left/right, now screen/camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Esq,
    Dir,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Esq => "esq",
            Side::Dir => "dir",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace characters that are invalid in file names, strip leading and
/// trailing dots and spaces, and cap the length at [`MAX_KEY_LEN`] characters.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if DISALLOWED_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = trim_dots_and_spaces(&replaced);
    if trimmed.chars().count() <= MAX_KEY_LEN {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_KEY_LEN).collect();
    truncated
        .trim_end_matches(|c| c == '.' || c == ' ')
        .to_string()
}

fn trim_dots_and_spaces(s: &str) -> &str {
    s.trim_matches(|c| c == '.' || c == ' ')
}

/// Canonical identity of a session, shared by the checker and the downloader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilenameKey(String);

impl FilenameKey {
    pub fn for_session(record: &SessionRecord) -> Self {
        let composite = [
            record.semester.as_str(),
            record.discipline.as_str(),
            record.track.as_str(),
            record.date.iso().as_str(),
            record.title.as_str(),
        ]
        .join(SEPARATOR);
        FilenameKey(sanitize_filename(&composite))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<key> - <side>.<extension>`
    pub fn file_name(&self, side_tag: &str, extension: &str) -> String {
        format!("{}{}{}.{}", self.0, SEPARATOR, side_tag, extension)
    }
}

impl fmt::Display for FilenameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FilenameKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Title with path separators and colons made file-name friendly, the way the
/// renamer has always written it.
pub fn legacy_title(title: &str) -> String {
    title.replace('/', "-").replace(':', " -")
}

/// Naming used by the positional renamer and the audit:
/// `<discipline> - <track> - <MM-DD> - <title> - <side>.<extension>`.
pub fn legacy_file_name(record: &SessionRecord, side: Side, extension: &str) -> String {
    format!(
        "{} - {} - {} - {} - {}.{}",
        record.discipline,
        record.track,
        record.date.month_day(),
        legacy_title(&record.title),
        side,
        extension
    )
}
