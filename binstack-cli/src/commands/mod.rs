//! CLI command implementations.

pub mod inspect;
pub mod rle;
pub mod scan;
