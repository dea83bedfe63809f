use std::collections::HashSet;

use tracing::debug;

use crate::record::SessionRecord;
use crate::scanner::{FileScan, ScannedFile};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordStatus {
    /// Two or more files share the key. A third file is not flagged.
    Complete(Vec<ScannedFile>),
    Partial(ScannedFile),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialMatch {
    pub record: SessionRecord,
    pub existing: ScannedFile,
}

#[derive(Debug, Default)]
pub struct ReconciliationResult {
    pub complete: Vec<SessionRecord>,
    pub partial: Vec<PartialMatch>,
    pub missing: Vec<SessionRecord>,
    pub orphans: Vec<ScannedFile>,
}

impl ReconciliationResult {
    pub fn record_count(&self) -> usize {
        self.complete.len() + self.partial.len() + self.missing.len()
    }

    fn with(mut self, record: &SessionRecord, status: RecordStatus) -> Self {
        match status {
            RecordStatus::Complete(_) => self.complete.push(record.clone()),
            RecordStatus::Partial(existing) => self.partial.push(PartialMatch {
                record: record.clone(),
                existing,
            }),
            RecordStatus::Missing => self.missing.push(record.clone()),
        }
        self
    }
}

pub fn classify(record: &SessionRecord, scan: &FileScan) -> RecordStatus {
    match scan.get(record.key().as_str()) {
        [] => RecordStatus::Missing,
        [single] => RecordStatus::Partial(single.clone()),
        many => RecordStatus::Complete(many.to_vec()),
    }
}

/// One-shot, read-only comparison of spreadsheet records against a scan.
pub fn reconcile(records: &[SessionRecord], scan: &FileScan) -> ReconciliationResult {
    let expected: HashSet<String> = records.iter().map(|r| r.key().as_str().to_string()).collect();

    let result = records
        .iter()
        .map(|record| (record, classify(record, scan)))
        .fold(ReconciliationResult::default(), |acc, (record, status)| {
            acc.with(record, status)
        });

    let mut orphans: Vec<ScannedFile> = scan
        .iter()
        .filter(|(base_key, _)| !expected.contains(base_key.as_str()))
        .flat_map(|(_, files)| files.iter().cloned())
        .collect();
    orphans.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(
        "Reconciled {} records: {} complete, {} partial, {} missing, {} orphan files",
        records.len(),
        result.complete.len(),
        result.partial.len(),
        result.missing.len(),
        orphans.len()
    );

    ReconciliationResult { orphans, ..result }
}
