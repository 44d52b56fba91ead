use anyhow::Result;

use crate::dataset::{DatasetWriter, StoreStats};

pub fn format_stats(stats: &StoreStats) -> String {
    format!(
        "File Size: {} bytes\nNumber of Conversations: {}",
        stats.byte_size, stats.record_count
    )
}

pub fn run(writer: &DatasetWriter) -> Result<()> {
    let stats = writer.stats()?;
    println!("{}", writer.path().display());
    println!("{}", format_stats(&stats));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats() {
        let stats = StoreStats {
            byte_size: 1234,
            record_count: 5,
        };
        assert_eq!(
            format_stats(&stats),
            "File Size: 1234 bytes\nNumber of Conversations: 5"
        );
    }
}
