//! Diagnostic identifiers.

use std::fmt;

/// Identifier of a memory stack, used only in diagnostics.
///
/// Ids are handed out by whoever builds the stack (see
/// [`StackConfig::with_id`](crate::stack::StackConfig::with_id)); there is no
/// process-wide counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StackId(u32);

impl StackId {
    /// Create a new stack ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack_{}", self.0)
    }
}

impl From<u32> for StackId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
