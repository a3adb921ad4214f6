//! Offline commands: structure validation and local merges. Neither touches
//! the remote store or requires configuration.

use std::path::Path;

use anyhow::Context;
use festmap_core::{canonical_json_bytes, merge, parse_map_document, MergeStats};
use festmap_sync::validate_submission;

async fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Validates `file` and prints a summary.
///
/// # Errors
///
/// Returns the first structural problem found, or a read failure.
pub(crate) async fn run_validate(file: &Path) -> anyhow::Result<()> {
    let bytes = read_file(file).await?;
    let document = validate_submission(&bytes)
        .with_context(|| format!("{} is not a valid map", file.display()))?;

    println!(
        "{}: valid, {} locations in {} categories",
        file.display(),
        document.total_locations(),
        document.locations.len()
    );
    Ok(())
}

/// Merges `incoming` into `canonical` and writes the result to `output`, or
/// stdout when no output file is given.
///
/// # Errors
///
/// Returns an error if either input is unreadable or invalid, or the output
/// cannot be written.
pub(crate) async fn run_merge(
    canonical: &Path,
    incoming: &Path,
    output: Option<&Path>,
) -> anyhow::Result<MergeStats> {
    let canonical_doc = parse_map_document(&read_file(canonical).await?)
        .with_context(|| format!("{} is not a valid map", canonical.display()))?;
    let incoming_doc = validate_submission(&read_file(incoming).await?)
        .with_context(|| format!("{} is not a valid map", incoming.display()))?;

    let result = merge(&canonical_doc, &incoming_doc);
    let bytes = canonical_json_bytes(&result.document)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "merged: {} new, {} updated, {} total -> {}",
                result.stats.new_locations,
                result.stats.updated_locations,
                result.document.metadata.total_locations,
                path.display()
            );
        }
        None => {
            println!("{}", String::from_utf8_lossy(&bytes).trim_end());
            eprintln!(
                "merged: {} new, {} updated, {} total",
                result.stats.new_locations,
                result.stats.updated_locations,
                result.document.metadata.total_locations
            );
        }
    }

    Ok(result.stats)
}
