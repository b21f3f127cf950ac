//! RLE command - run the binary run-length codec over a file.

use anyhow::{Context, Result};
use binstack_core::rle;
use std::path::Path;

/// Run the rle command.
pub fn run(input: &Path, output: &Path, decode: bool) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let result = if decode {
        rle::decode_to_vec(&data)
    } else {
        rle::encode_to_vec(&data)
    };

    std::fs::write(output, &result)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        decode,
        "RLE complete"
    );
    println!(
        "{} {} bytes -> {} bytes",
        if decode { "Decoded" } else { "Encoded" },
        data.len(),
        result.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("mask.raw");
        let packed = dir.path().join("mask.rle");
        let unpacked = dir.path().join("mask.out");

        let mut mask = vec![0u8; 500];
        mask[100..300].fill(255);
        std::fs::write(&raw, &mask).unwrap();

        run(&raw, &packed, false).unwrap();
        run(&packed, &unpacked, true).unwrap();

        let back = std::fs::read(&unpacked).unwrap();
        let expected: Vec<u8> = mask.iter().map(|&b| u8::from(b != 0)).collect();
        assert_eq!(back, expected);
        assert!(std::fs::metadata(&packed).unwrap().len() < 10);
    }
}
