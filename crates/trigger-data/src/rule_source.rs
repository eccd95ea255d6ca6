//! CSV rule source.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use trigger_core::error::{DataError, ParseError};

/// One condition-order row as written in the rule file.
///
/// Values stay textual here; the engine parses thresholds, flags and times
/// so that a bad cell rejects only its own row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "symbol")]
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub market: String,
    pub base: String,
    pub break_upward: String,
    pub bounce: String,
    pub trade_quantity: i64,
    pub valid_from: String,
    pub valid_until_time: String,
    pub valid_until_date: String,
    #[serde(default)]
    pub lot_size: Option<u32>,
    /// 1-based line in the source file
    #[serde(skip)]
    pub line: u64,
    /// The row as read, for audit when the rule is consumed
    #[serde(skip)]
    pub raw: String,
}

impl RuleRecord {
    /// Stable key for the consumed-rule store.
    ///
    /// An explicit `id` wins; otherwise the key is derived from the rule's
    /// content, so moving the row around the file keeps the same key.
    pub fn key(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!(
                "{}|{}|{}|{}|{}|{}|{}|{}|{}",
                self.code,
                self.market,
                self.base,
                self.break_upward,
                self.bounce,
                self.trade_quantity,
                self.valid_from,
                self.valid_until_time,
                self.valid_until_date
            ),
        }
    }
}

/// Rules read from a source, with the rows that could not be read.
#[derive(Debug, Default)]
pub struct LoadedRules {
    pub records: Vec<RuleRecord>,
    pub rejected: Vec<DataError>,
}

/// CSV rule source. Rows whose first cell or `code` starts with `#` are
/// disabled rules.
pub struct RuleSource {
    path: PathBuf,
}

impl RuleSource {
    /// Create a new rule source.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every rule in the file.
    pub fn load_all(&self) -> Result<LoadedRules, DataError> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)
            .map_err(|e| DataError::Csv(e.to_string()))?;

        let loaded = read_records(reader)?;
        debug!(
            path = %self.path.display(),
            loaded = loaded.records.len(),
            rejected = loaded.rejected.len(),
            "Rules loaded"
        );
        Ok(loaded)
    }

    /// Load rules from any reader.
    pub fn load_from_reader<R: Read>(input: R) -> Result<LoadedRules, DataError> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);
        read_records(reader)
    }
}

fn read_records<R: Read>(mut reader: csv::Reader<R>) -> Result<LoadedRules, DataError> {
    let headers = reader
        .headers()
        .map_err(|e| DataError::Csv(e.to_string()))?
        .clone();
    let code_column = headers.iter().position(|h| h == "code" || h == "symbol");

    let mut loaded = LoadedRules::default();

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                warn!(line, error = %e, "Unreadable rule row");
                loaded.rejected.push(DataError::Record {
                    line,
                    source: ParseError::InvalidRecord(e.to_string()),
                });
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if is_disabled(&row, code_column) {
            debug!(line, "Disabled rule row skipped");
            continue;
        }

        match row.deserialize::<RuleRecord>(Some(&headers)) {
            Ok(mut record) => {
                record.line = line;
                record.raw = join_row(&row);
                loaded.records.push(record);
            }
            Err(e) => {
                warn!(line, error = %e, "Rejected rule row");
                loaded.rejected.push(DataError::Record {
                    line,
                    source: ParseError::InvalidRecord(e.to_string()),
                });
            }
        }
    }

    Ok(loaded)
}

fn is_disabled(row: &StringRecord, code_column: Option<usize>) -> bool {
    let commented = |cell: Option<&str>| cell.is_some_and(|c| c.trim_start().starts_with('#'));
    commented(row.get(0)) || commented(code_column.and_then(|i| row.get(i)))
}

fn join_row(row: &StringRecord) -> String {
    row.iter().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = "\
id,code,name,market,base,break_upward,bounce,trade_quantity,valid_from,valid_until_time,valid_until_date
r1,600000,PF Bank,sh,10.5,1,0.5%,200,09:30:00,14:55:00,2024-12-31
#r2,600001,Disabled,sh,10.5,1,0.5%,200,09:30:00,14:55:00,2024-12-31
,AAPL,Apple,us@paper,-1.5%~-0.5%,0,1,-5,09:30:00,16:00:00,2024-12-31
r4,000001,Broken,sz,9,1,0.1,lots,09:30:00,14:55:00,2024-12-31
r5,#600002,Disabled,sh,10.5,1,0.5%,200,09:30:00,14:55:00,2024-12-31
r6,600003,Late,sh,11,1,0.1,oops,09:30:00,14:55:00,2024-12-31
";

    #[test]
    fn test_load_skips_commented_rows() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();

        let codes: Vec<_> = loaded.records.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["600000", "AAPL"]);
    }

    #[test]
    fn test_bad_row_rejected_alone() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();

        assert_eq!(loaded.rejected.len(), 2);
        assert!(matches!(loaded.rejected[0], DataError::Record { line: 5, .. }));
        // Disabled rows still count as physical lines
        assert!(matches!(loaded.rejected[1], DataError::Record { line: 7, .. }));
    }

    #[test]
    fn test_disabled_code_after_id_skipped() {
        let data = "\
id,code,name,market,base,break_upward,bounce,trade_quantity,valid_from,valid_until_time,valid_until_date
r2,#600001,Disabled,sh,10.5,1,0.5%,200,09:30:00,14:55:00,2024-12-31
";
        let loaded = RuleSource::load_from_reader(data.as_bytes()).unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.rejected.is_empty());
    }

    #[test]
    fn test_record_fields() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();
        let apple = &loaded.records[1];

        assert_eq!(apple.market, "us@paper");
        assert_eq!(apple.base, "-1.5%~-0.5%");
        assert_eq!(apple.trade_quantity, -5);
        assert_eq!(apple.line, 4);
        assert!(apple.raw.starts_with(",AAPL,Apple"));
    }

    #[test]
    fn test_key_prefers_id() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();

        assert_eq!(loaded.records[0].key(), "r1");
        assert_eq!(
            loaded.records[1].key(),
            "AAPL|us@paper|-1.5%~-0.5%|0|1|-5|09:30:00|16:00:00|2024-12-31"
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RuleSource::new("/nonexistent/rules.csv"),
            Err(DataError::NotFound(_))
        ));
    }
}
