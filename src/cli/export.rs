use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::dataset::DatasetWriter;

/// Copies the dataset byte for byte, to `out` or stdout.
pub fn run(writer: &DatasetWriter, out: Option<PathBuf>) -> Result<()> {
    let bytes = writer.export_all()?;

    match out {
        Some(path) => {
            fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Exported {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
