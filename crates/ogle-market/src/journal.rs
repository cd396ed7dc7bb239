//! Append-only change journal.
//!
//! One JSON object per line:
//!
//! ```text
//! {"sequence":7,"checksum":"<sha256 hex>","change":{"op":"credit",...}}
//! ```
//!
//! The checksum covers the sequence number and the encoded change. Sequence
//! numbers are gapless. On recovery a damaged **final** line (a torn write,
//! including one missing its newline) is dropped; damage anywhere else is
//! corruption.

use ogle_types::{OgleError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::market::Change;

/// One journaled change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub sequence: u64,
    pub checksum: String,
    pub change: Change,
}

impl JournalRecord {
    pub fn seal(sequence: u64, change: Change) -> Result<Self> {
        Ok(Self {
            sequence,
            checksum: compute_checksum(sequence, &change)?,
            change,
        })
    }

    /// Whether the stored checksum matches the contents.
    pub fn is_intact(&self) -> Result<bool> {
        Ok(compute_checksum(self.sequence, &self.change)? == self.checksum)
    }

    /// The record as one newline-terminated journal line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

fn compute_checksum(sequence: u64, change: &Change) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(serde_json::to_vec(change)?);
    Ok(hex::encode(hasher.finalize()))
}

/// Result of reading a journal.
#[derive(Debug, Clone, Default)]
pub struct JournalContents {
    pub records: Vec<JournalRecord>,
    /// Byte length of the intact prefix.
    pub intact_len: usize,
    /// Whether a torn final line was dropped.
    pub torn_tail: bool,
}

/// Parse journal text.
///
/// # Errors
/// `JournalCorrupted` for a damaged line that is not the last one, or for a
/// sequence gap.
pub fn parse(text: &str) -> Result<JournalContents> {
    let mut contents = JournalContents::default();
    let segments: Vec<&str> = text.split_inclusive('\n').collect();
    let last = segments.len().saturating_sub(1);

    for (idx, segment) in segments.iter().enumerate() {
        let line_no = idx + 1;
        let body = segment.trim_end_matches(['\n', '\r']);
        if body.trim().is_empty() && segment.ends_with('\n') {
            contents.intact_len += segment.len();
            continue;
        }

        let parsed = if segment.ends_with('\n') {
            decode(body)
        } else {
            Err("line is not newline-terminated".to_string())
        };

        let record = match parsed {
            Ok(record) => record,
            Err(reason) if idx == last => {
                tracing::warn!(line = line_no, reason = %reason, "Dropping torn journal tail");
                contents.torn_tail = true;
                break;
            }
            Err(reason) => {
                return Err(OgleError::JournalCorrupted {
                    line: line_no,
                    reason,
                });
            }
        };

        if let Some(prev) = contents.records.last() {
            if record.sequence != prev.sequence + 1 {
                return Err(OgleError::JournalCorrupted {
                    line: line_no,
                    reason: format!(
                        "sequence {} does not follow {}",
                        record.sequence, prev.sequence
                    ),
                });
            }
        }

        contents.intact_len += segment.len();
        contents.records.push(record);
    }

    Ok(contents)
}

fn decode(line: &str) -> std::result::Result<JournalRecord, String> {
    let record: JournalRecord =
        serde_json::from_str(line).map_err(|e| format!("unparseable record: {e}"))?;
    match record.is_intact() {
        Ok(true) => Ok(record),
        Ok(false) => Err(format!("checksum mismatch for sequence {}", record.sequence)),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn records(n: u64) -> Vec<JournalRecord> {
        (1..=n)
            .map(|seq| {
                let change = Change::credit("alice", "GCR", Decimal::from(seq)).unwrap();
                JournalRecord::seal(seq, change).unwrap()
            })
            .collect()
    }

    fn render(records: &[JournalRecord]) -> String {
        records.iter().map(|r| r.to_line().unwrap()).collect()
    }

    #[test]
    fn parses_intact_journal() {
        let recs = records(3);
        let text = render(&recs);
        let contents = parse(&text).unwrap();
        assert_eq!(contents.records, recs);
        assert_eq!(contents.intact_len, text.len());
        assert!(!contents.torn_tail);
    }

    #[test]
    fn empty_journal_is_empty() {
        let contents = parse("").unwrap();
        assert!(contents.records.is_empty());
        assert_eq!(contents.intact_len, 0);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let recs = records(2);
        let intact = render(&recs);
        let partial = recs[0].to_line().unwrap();
        let text = format!("{intact}{}", &partial[..partial.len() / 2]);

        let contents = parse(&text).unwrap();
        assert_eq!(contents.records, recs);
        assert_eq!(contents.intact_len, intact.len());
        assert!(contents.torn_tail);
    }

    #[test]
    fn unterminated_final_record_counts_as_torn() {
        let recs = records(2);
        let text = render(&recs);
        let text = text.trim_end_matches('\n');
        let contents = parse(text).unwrap();
        assert_eq!(contents.records.len(), 1);
        assert!(contents.torn_tail);
    }

    #[test]
    fn corrupt_middle_line_is_an_error() {
        let recs = records(3);
        let mut lines: Vec<String> = recs.iter().map(|r| r.to_line().unwrap()).collect();
        lines[1] = lines[1].replace("alice", "mallory");
        let err = parse(&lines.concat()).unwrap_err();
        assert!(matches!(err, OgleError::JournalCorrupted { line: 2, .. }));
    }

    #[test]
    fn sequence_gap_is_an_error() {
        let recs = records(3);
        let text = render(&[recs[0].clone(), recs[2].clone()]);
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, OgleError::JournalCorrupted { line: 2, .. }));
    }

    #[test]
    fn checksum_covers_sequence() {
        let mut rec = records(1).remove(0);
        rec.sequence = 9;
        assert!(!rec.is_intact().unwrap());
    }
}
