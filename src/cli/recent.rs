use anyhow::Result;

use crate::dataset::{DatasetRecord, DatasetWriter, RecordRole};

pub const DEFAULT_RECENT: usize = 3;

fn role_label(role: RecordRole) -> &'static str {
    match role {
        RecordRole::System => "System",
        RecordRole::User => "User",
        RecordRole::Assistant => "Assistant",
    }
}

/// Renders a saved conversation, `number` counts from 1 across the
/// whole dataset.
pub fn format_record(record: &DatasetRecord, number: usize) -> String {
    let mut out = format!("--- Conversation {} ---", number);
    for m in record.messages.iter() {
        out.push_str(&format!("\n{}: {}", role_label(m.role), m.content));
    }
    out
}

/// The last `count` conversations, numbered by position in the file.
pub fn format_recent(writer: &DatasetWriter, count: usize) -> Result<Vec<String>> {
    Ok(writer
        .read_last_n_numbered(count)?
        .iter()
        .map(|(number, r)| format_record(r, *number))
        .collect())
}

pub fn run(writer: &DatasetWriter, count: usize) -> Result<()> {
    let formatted = format_recent(writer, count)?;
    if formatted.is_empty() {
        println!("No saved conversations in {}", writer.path().display());
    }
    for f in formatted {
        println!("{}\n", f);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{RecordMessage, encode_record};
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn record(user: &str) -> DatasetRecord {
        DatasetRecord {
            messages: vec![
                RecordMessage::new(RecordRole::System, "sys"),
                RecordMessage::new(RecordRole::User, user),
                RecordMessage::new(RecordRole::Assistant, "ok"),
            ],
        }
    }

    #[test]
    fn test_format_record() {
        assert_eq!(
            format_record(&record("hi"), 7),
            "--- Conversation 7 ---\nSystem: sys\nUser: hi\nAssistant: ok"
        );
    }

    #[test]
    fn test_format_recent_numbers_from_end_of_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let writer = DatasetWriter::new(dir.path().join("data.jsonl"));
        for i in 0..5 {
            writer.append(&record(&format!("q{}", i)))?;
        }

        let formatted = format_recent(&writer, DEFAULT_RECENT)?;
        assert_eq!(formatted.len(), 3);
        assert!(formatted[0].starts_with("--- Conversation 3 ---"));
        assert!(formatted[0].contains("User: q2"));
        assert!(formatted[2].starts_with("--- Conversation 5 ---"));
        Ok(())
    }

    #[test]
    fn test_format_recent_counts_line_without_newline() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let writer = DatasetWriter::new(dir.path().join("data.jsonl"));
        writer.append(&record("q0"))?;
        let mut file = OpenOptions::new().append(true).open(writer.path())?;
        file.write_all(encode_record(&record("q1"))?.as_bytes())?;
        drop(file);

        let formatted = format_recent(&writer, DEFAULT_RECENT)?;
        assert_eq!(formatted.len(), 2);
        assert!(formatted[0].starts_with("--- Conversation 1 ---"));
        assert!(formatted[1].starts_with("--- Conversation 2 ---"));
        assert!(formatted[1].contains("User: q1"));
        Ok(())
    }
}
