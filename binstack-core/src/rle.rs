//! Run-length codec for binary (two-color) images.
//!
//! Each output byte is one run: bit 7 is the color, bits 0..7 hold the run
//! length minus one, so a run covers 1..=127 pixels. Runs alternate color
//! except where a long run is split at the cap.
//!
//! Input pixels are binary in the sense of zero versus non-zero; decoding
//! always produces 0 or 1.

use crate::error::{BinstackError, Result};

/// Longest run a single byte can describe.
pub const MAX_RUN_LENGTH: usize = 127;

fn emit(output: &mut [u8], written: &mut usize, color: u8, count: usize) -> Result<()> {
    let available = output.len();
    let slot = output
        .get_mut(*written)
        .ok_or(BinstackError::OutOfMemory {
            requested: *written + 1,
            available,
        })?;
    *slot = (color << 7) | (count - 1) as u8;
    *written += 1;
    Ok(())
}

/// Encode `input` into `output`, returning the number of bytes written.
///
/// Fails with [`BinstackError::OutOfMemory`] if `output` is too small; bytes
/// past `output.len()` are never touched. An empty input encodes to zero
/// bytes.
pub fn encode_run_length_binary(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut pixels = input.iter().map(|&b| u8::from(b != 0));
    let Some(mut color) = pixels.next() else {
        return Ok(0);
    };

    let mut written = 0;
    let mut count = 1;
    for pixel in pixels {
        if pixel == color && count < MAX_RUN_LENGTH {
            count += 1;
            continue;
        }
        emit(output, &mut written, color, count)?;
        color = pixel;
        count = 1;
    }
    emit(output, &mut written, color, count)?;

    Ok(written)
}

/// Decode `input` into `output`, returning the number of pixels written.
///
/// Fails with [`BinstackError::OutOfMemory`] as soon as a run does not fit.
pub fn decode_run_length_binary(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let available = output.len();
    let mut written = 0;
    for &byte in input {
        let color = byte >> 7;
        let count = usize::from(byte & 0x7F) + 1;
        let run = output
            .get_mut(written..written + count)
            .ok_or(BinstackError::OutOfMemory {
                requested: written + count,
                available,
            })?;
        run.fill(color);
        written += count;
    }
    Ok(written)
}

/// Number of pixels `input` decodes to.
pub fn decoded_len(input: &[u8]) -> usize {
    input.iter().map(|&b| usize::from(b & 0x7F) + 1).sum()
}

/// Encode into a freshly allocated buffer.
pub fn encode_to_vec(input: &[u8]) -> Vec<u8> {
    // Every run covers at least one pixel.
    let mut output = vec![0u8; input.len()];
    let written = encode_run_length_binary(input, &mut output).unwrap_or(0);
    output.truncate(written);
    output
}

/// Decode into a freshly allocated buffer.
pub fn decode_to_vec(input: &[u8]) -> Vec<u8> {
    let mut output = vec![0u8; decoded_len(input)];
    let written = decode_run_length_binary(input, &mut output).unwrap_or(0);
    output.truncate(written);
    output
}
