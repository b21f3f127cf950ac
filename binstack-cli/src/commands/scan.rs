//! Scan command - locate a serialized buffer in a raw dump and recover it.

use super::inspect::describe_record;
use anyhow::{Context, Result};
use binstack_core::serialize::{RecoveryPolicy, SerializedView, find_serialized_buffer};
use std::path::Path;

/// Run the scan command.
pub fn run(path: &Path, prefer_reported: bool) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let range = find_serialized_buffer(&raw)
        .with_context(|| format!("No serialized buffer in {}", path.display()))?;
    tracing::info!(path = %path.display(), start = range.start, end = range.end, "Buffer located");

    let view = SerializedView::new(&raw[range.clone()]);
    let policy = if prefer_reported {
        RecoveryPolicy::PreferReported
    } else {
        RecoveryPolicy::PreferRecovered
    };

    println!("Scan");
    println!("====");
    println!("Dump:        {} ({} bytes)", path.display(), raw.len());
    println!("Buffer:      bytes {}..{}", range.start, range.end);
    println!("Valid:       {}", view.is_valid());
    println!("Policy:      {:?}", policy);
    println!();

    let mut recovered = 0;
    let mut disagreeing = 0;
    let mut unreadable = 0;
    for found in view.reconstruct(policy) {
        match found {
            Ok(found) => {
                recovered += 1;
                let marker = if found.lengths_agree() {
                    " "
                } else {
                    disagreeing += 1;
                    "!"
                };
                println!("{} {}", marker, describe_record(found.record()));
            }
            Err(e) => {
                unreadable += 1;
                println!("? {}", e);
            }
        }
    }

    println!();
    println!(
        "{} records recovered, {} with mismatched lengths, {} unreadable",
        recovered, disagreeing, unreadable
    );
    Ok(())
}
