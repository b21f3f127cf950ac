//! Integration tests for the binary run-length codec.

use binstack_core::rle::{
    MAX_RUN_LENGTH, decode_run_length_binary, decode_to_vec, encode_run_length_binary,
    encode_to_vec,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A binary signal with runs of random length.
fn random_runs(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut color = rng.gen_range(0..2u8);
    while out.len() < len {
        let run = rng.gen_range(1..300).min(len - out.len());
        out.extend(std::iter::repeat(color).take(run));
        color ^= 1;
    }
    out
}

#[test]
fn test_random_round_trips() {
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..200 {
        let len = rng.gen_range(0..10_000);
        let input = random_runs(&mut rng, len);
        let encoded = encode_to_vec(&input);
        assert_eq!(decode_to_vec(&encoded), input);
    }
}

#[test]
fn test_cap_boundaries() {
    for len in [126, 127, 128, 254, 255] {
        let input = vec![1u8; len];
        let encoded = encode_to_vec(&input);
        assert_eq!(encoded.len(), len.div_ceil(MAX_RUN_LENGTH));
        assert_eq!(decode_to_vec(&encoded), input);
    }
}

#[test]
fn test_exact_output_capacity() {
    let mut rng = StdRng::seed_from_u64(5);
    let input = random_runs(&mut rng, 1000);
    let needed = encode_to_vec(&input).len();

    let mut exact = vec![0u8; needed];
    assert_eq!(encode_run_length_binary(&input, &mut exact).unwrap(), needed);

    let mut short = vec![0u8; needed - 1];
    assert!(encode_run_length_binary(&input, &mut short).is_err());

    let mut pixels = vec![0u8; input.len()];
    assert_eq!(decode_run_length_binary(&exact, &mut pixels).unwrap(), input.len());
    let mut too_few = vec![0u8; input.len() - 1];
    assert!(decode_run_length_binary(&exact, &mut too_few).is_err());
}
