use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::Formatter;

use super::error::StoreError;
use super::models::DatasetRecord;
use crate::ai::chat::FinalizedTranscript;

/// Lays out JSON the way Python's `json.dumps` does by default, so
/// lines appended here are byte compatible with datasets written by
/// Python tooling: `", "` and `": "` separators, and every character
/// outside printable ASCII written as a lowercase `\u` escape (astral
/// characters as surrogate pairs).
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    // Quotes, backslashes and control characters never reach this, they
    // go through `write_char_escape`
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if (' '..='~').contains(&c) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Serializes a record to a single JSON line (without the newline)
/// with `&`, `<` and `>` replaced by their `\u` escapes.
///
/// The output is pure ASCII and still valid JSON that decodes to the
/// same record, but it can be embedded in HTML without being
/// interpreted as markup.
pub fn encode_record(record: &DatasetRecord) -> Result<String, serde_json::Error> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    record.serialize(&mut ser)?;

    let json = String::from_utf8(buf)
        .map_err(|e| serde_json::Error::io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    Ok(escape_html(&json))
}

// Neither serde_json nor the formatter emit these inside escape
// sequences so a plain character replacement is safe
fn escape_html(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '&' => out.push_str("\\u0026"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub byte_size: u64,
    pub record_count: usize,
}

/// Append-only JSON lines dataset on disk.
///
/// Existing lines are never rewritten. Access is assumed to be
/// single writer, there is no locking across processes.
#[derive(Clone, Debug)]
pub struct DatasetWriter {
    path: PathBuf,
}

impl DatasetWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as one line. The line is written with a single
    /// `write_all` on a file opened in append mode and synced before
    /// returning, so readers never see half a record from us.
    pub fn append(&self, record: &DatasetRecord) -> Result<(), StoreError> {
        let mut line = encode_record(record).map_err(StoreError::Encode)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;

        tracing::info!(
            "Appended record with {} messages to {}",
            record.messages.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Converts a finalized transcript to a record and appends it.
    pub fn save(&self, transcript: &FinalizedTranscript) -> Result<DatasetRecord, StoreError> {
        let record = DatasetRecord::from(transcript);
        self.append(&record)?;
        Ok(record)
    }

    /// Size of the store and the number of newline terminated records
    /// in it. A store that doesn't exist yet is empty.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let bytes = self.read_bytes()?;
        Ok(StoreStats {
            byte_size: bytes.len() as u64,
            record_count: bytes.iter().filter(|b| **b == b'\n').count(),
        })
    }

    /// The last `n` records in the order they were written.
    ///
    /// Every line is parsed, not just the last `n`, so any corruption
    /// in the store fails the read.
    pub fn read_last_n(&self, n: usize) -> Result<Vec<DatasetRecord>, StoreError> {
        Ok(self
            .read_last_n_numbered(n)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Like `read_last_n` but pairs each record with its line number in
    /// the store, counting from 1.
    pub fn read_last_n_numbered(
        &self,
        n: usize,
    ) -> Result<Vec<(usize, DatasetRecord)>, StoreError> {
        let bytes = self.read_bytes()?;
        let body = bytes.strip_suffix(b"\n").unwrap_or(&bytes);
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = body
            .split(|b| *b == b'\n')
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_slice::<DatasetRecord>(line)
                    .map(|record| (i + 1, record))
                    .map_err(|source| {
                        tracing::error!("Corrupt record on line {} of {}", i + 1, self.path.display());
                        StoreError::CorruptStore { line: i + 1, source }
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records.split_off(records.len().saturating_sub(n)))
    }

    /// The raw bytes of the store, untouched.
    pub fn export_all(&self) -> Result<Vec<u8>, StoreError> {
        self.read_bytes()
    }

    fn read_bytes(&self) -> Result<Vec<u8>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::models::{RecordMessage, RecordRole};
    use anyhow::Result;
    use tempfile::TempDir;

    fn record(system: &str, pairs: &[(&str, &str)]) -> DatasetRecord {
        let mut messages = vec![RecordMessage::new(RecordRole::System, system)];
        for (user, assistant) in pairs {
            messages.push(RecordMessage::new(RecordRole::User, user));
            messages.push(RecordMessage::new(RecordRole::Assistant, assistant));
        }
        DatasetRecord { messages }
    }

    fn writer_in(dir: &TempDir) -> DatasetWriter {
        DatasetWriter::new(dir.path().join("conversations.jsonl"))
    }

    #[test]
    fn test_encode_record_is_byte_stable() -> Result<()> {
        let r = record("sys", &[("hi", "hello")]);
        let line = encode_record(&r)?;
        assert_eq!(
            line,
            r#"{"messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]}"#
        );
        assert_eq!(encode_record(&r)?, line);
        Ok(())
    }

    #[test]
    fn test_encode_record_escapes_html() -> Result<()> {
        let r = record("sys", &[("<script>&test</script>", "a > b")]);
        let line = encode_record(&r)?;

        assert!(line.contains(r"\u003cscript\u003e\u0026test\u003c/script\u003e"));
        assert!(line.contains(r"a \u003e b"));
        assert!(!line.contains('<'));
        assert!(!line.contains('>'));
        assert!(!line.contains('&'));

        // Still decodes to the original text
        let decoded: DatasetRecord = serde_json::from_str(&line)?;
        assert_eq!(decoded, r);
        Ok(())
    }

    #[test]
    fn test_encode_record_writes_ascii_only() -> Result<()> {
        let r = DatasetRecord {
            messages: vec![RecordMessage::new(
                RecordRole::System,
                "caf\u{e9} \u{1f600} \u{2028}",
            )],
        };
        let line = encode_record(&r)?;

        assert_eq!(
            line,
            r#"{"messages": [{"role": "system", "content": "caf\u00e9 \ud83d\ude00 \u2028"}]}"#
        );
        assert!(line.is_ascii());
        assert_eq!(serde_json::from_str::<DatasetRecord>(&line)?, r);
        Ok(())
    }

    #[test]
    fn test_encode_record_escapes_controls_and_delete() -> Result<()> {
        let r = DatasetRecord {
            messages: vec![RecordMessage::new(RecordRole::User, "a\tb\u{1f}c\u{7f}")],
        };
        assert_eq!(
            encode_record(&r)?,
            r#"{"messages": [{"role": "user", "content": "a\tb\u001fc\u007f"}]}"#
        );
        Ok(())
    }

    #[test]
    fn test_encode_record_keeps_other_escapes() -> Result<()> {
        let r = record("line one\nline \"two\"", &[("tab\there", "back\\slash")]);
        let line = encode_record(&r)?;
        assert!(!line.contains('\n'));
        assert_eq!(serde_json::from_str::<DatasetRecord>(&line)?, r);
        Ok(())
    }

    #[test]
    fn test_missing_store_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);

        assert_eq!(writer.stats()?, StoreStats::default());
        assert!(writer.read_last_n(3)?.is_empty());
        assert!(writer.export_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_append_then_read_last_one() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        let r = record("sys", &[("<b>hi</b>", "hello & welcome")]);

        writer.append(&r)?;

        assert_eq!(writer.read_last_n(1)?, vec![r]);
        Ok(())
    }

    #[test]
    fn test_append_only_adds_lines() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);

        writer.append(&record("sys", &[("one", "1")]))?;
        let first = writer.export_all()?;
        writer.append(&record("sys", &[("two", "2")]))?;
        let both = writer.export_all()?;

        assert!(both.starts_with(&first));
        assert_eq!(both.iter().filter(|b| **b == b'\n').count(), 2);
        Ok(())
    }

    #[test]
    fn test_stats_counts_records_and_bytes() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        let a = record("sys", &[("a", "b")]);
        let b = record("sys", &[("c", "d"), ("e", "f")]);

        writer.append(&a)?;
        writer.append(&b)?;

        let expected_bytes = encode_record(&a)?.len() + encode_record(&b)?.len() + 2;
        assert_eq!(
            writer.stats()?,
            StoreStats {
                byte_size: expected_bytes as u64,
                record_count: 2,
            }
        );
        Ok(())
    }

    #[test]
    fn test_read_last_n_keeps_chronological_order() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        let records: Vec<_> = (0..5)
            .map(|i| record("sys", &[(format!("q{}", i).as_str(), format!("a{}", i).as_str())]))
            .collect();
        for r in records.iter() {
            writer.append(r)?;
        }

        assert_eq!(writer.read_last_n(3)?, records[2..].to_vec());
        assert_eq!(writer.read_last_n(10)?, records);
        assert!(writer.read_last_n(0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_corrupt_line_fails_whole_read() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        writer.append(&record("sys", &[("a", "b")]))?;

        let mut file = OpenOptions::new().append(true).open(writer.path())?;
        file.write_all(b"{not json\n")?;
        drop(file);
        writer.append(&record("sys", &[("c", "d")]))?;

        let err = writer.read_last_n(1).unwrap_err();
        assert!(matches!(err, StoreError::CorruptStore { line: 2, .. }));

        // Stats and export don't parse and still work
        assert_eq!(writer.stats()?.record_count, 3);
        assert!(!writer.export_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_unterminated_garbage_is_corrupt() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        writer.append(&record("sys", &[("a", "b")]))?;

        let mut file = OpenOptions::new().append(true).open(writer.path())?;
        file.write_all(br#"{"messages":[{"role":"sys"#)?;
        drop(file);

        assert!(matches!(
            writer.read_last_n(5),
            Err(StoreError::CorruptStore { line: 2, .. })
        ));
        // Only newline terminated records count
        assert_eq!(writer.stats()?.record_count, 1);
        Ok(())
    }

    #[test]
    fn test_read_last_n_numbered_counts_unterminated_line() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        writer.append(&record("sys", &[("a", "b")]))?;
        writer.append(&record("sys", &[("c", "d")]))?;

        let last = record("sys", &[("e", "f")]);
        let mut file = OpenOptions::new().append(true).open(writer.path())?;
        file.write_all(encode_record(&last)?.as_bytes())?;
        drop(file);

        let numbered = writer.read_last_n_numbered(2)?;
        assert_eq!(numbered.len(), 2);
        assert_eq!(numbered[0].0, 2);
        assert_eq!(numbered[1], (3, last));
        Ok(())
    }

    #[test]
    fn test_export_all_is_verbatim() -> Result<()> {
        let dir = TempDir::new()?;
        let writer = writer_in(&dir);
        writer.append(&record("sys", &[("x < y", "y > x")]))?;

        assert_eq!(writer.export_all()?, fs::read(writer.path())?);
        Ok(())
    }
}
