//! Core types for binstack.
//!
//! - alignment helpers shared by the allocator and the record encoders
//! - `StackId`: diagnostic identifier supplied when a stack is built
//! - `StackOffset` / `Segment`: offset-based handles into a stack buffer

mod align;
mod ids;
mod pointer;

pub use align::{MEMORY_ALIGNMENT, is_aligned, round_down, round_up};
pub use ids::StackId;
pub use pointer::{Segment, StackOffset};
