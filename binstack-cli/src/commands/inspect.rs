//! Inspect command - show an array file's header and the records inside it.

use anyhow::{Context, Result};
use binstack_core::serialize::{Record, RecoveryPolicy, record_type};
use binstack_core::ArrayFile;
use std::path::Path;

/// One-line summary of a record's contents.
pub fn describe_record(record: &Record<'_>) -> String {
    let detail = match record.type_name() {
        record_type::ARRAY => match record.decode_array() {
            Ok(array) => array.to_string(),
            Err(e) => format!("undecodable: {}", e),
        },
        record_type::STRING => match record.as_string() {
            Ok(text) => format!("{:?}", text),
            Err(e) => format!("undecodable: {}", e),
        },
        record_type::BINARY_IMAGE => match record.decode_binary_image() {
            Ok(image) => format!("{}x{} binary image", image.height(), image.width()),
            Err(e) => format!("undecodable: {}", e),
        },
        _ => format!("{} payload bytes", record.payload().len()),
    };

    format!(
        "{:>10}  {:<16} {:<24} {}",
        record.offset().to_string(),
        record.type_name(),
        record.object_name(),
        detail
    )
}

/// Run the inspect command.
pub fn run(path: &Path, recover: bool) -> Result<()> {
    tracing::info!(path = %path.display(), recover, "Inspecting array file");

    let contents = ArrayFile::default()
        .inspect(path)
        .with_context(|| format!("Failed to read array file: {}", path.display()))?;

    println!("Array File");
    println!("==========");
    println!("Path:        {}", path.display());
    println!("File size:   {} bytes", contents.file_len);
    if contents.header.compressed {
        println!("Compression: {}", contents.header.compressor);
    } else {
        println!("Compression: none");
    }
    println!("Framed size: {} bytes", contents.framed.len());

    let view = contents
        .view()
        .context("No serialized buffer inside the file")?;
    println!("Valid:       {}", view.is_valid());
    println!();

    println!("Records");
    println!("-------");
    if recover {
        for (i, found) in view.reconstruct(RecoveryPolicy::PreferRecovered).enumerate() {
            match found {
                Ok(found) => {
                    println!("[{}] {}", i, describe_record(found.record()));
                    if !found.lengths_agree() {
                        println!(
                            "    length word says {} bytes, guards say {}",
                            found.reported_len(),
                            found.recovered_len()
                        );
                    }
                }
                Err(e) => println!("[{}] unreadable: {}", i, e),
            }
        }
    } else {
        for (i, record) in view.records().enumerate() {
            match record {
                Ok(record) => println!("[{}] {}", i, describe_record(&record)),
                Err(e) => {
                    println!("[{}] {}", i, e);
                    println!();
                    println!("Use --recover (-r) to scan past damaged records.");
                    break;
                }
            }
        }
    }

    Ok(())
}
