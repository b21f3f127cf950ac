//! Strided selections over an array.

use super::array::Array;
use super::element::Element;
use super::encoded::EncodedArraySlice;
use crate::error::{BinstackError, Result};

/// `size` indices starting at `start`, `increment` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinearSequence {
    start: i32,
    increment: i32,
    size: i32,
}

impl LinearSequence {
    /// Build a sequence. Nothing is validated until it is bound to an axis.
    pub const fn new(start: i32, increment: i32, size: i32) -> Self {
        Self {
            start,
            increment,
            size,
        }
    }

    /// Every index of an axis of length `len`.
    pub fn full(len: usize) -> Self {
        Self::new(0, 1, len as i32)
    }

    /// First index.
    pub const fn start(&self) -> i32 {
        self.start
    }

    /// Step between indices.
    pub const fn increment(&self) -> i32 {
        self.increment
    }

    /// Number of indices.
    pub const fn size(&self) -> i32 {
        self.size
    }

    /// The `i`th index.
    pub fn get(&self, i: usize) -> i64 {
        i64::from(self.start) + i as i64 * i64::from(self.increment)
    }

    /// Check every index lies in `0..len`.
    pub fn check_within(&self, axis: &'static str, len: usize) -> Result<()> {
        let invalid = |cause: String| BinstackError::InvalidParameter { name: axis, cause };

        if self.size < 0 {
            return Err(invalid(format!("negative size {}", self.size)));
        }
        if self.size == 0 {
            return Ok(());
        }

        let first = self.get(0);
        let last = self.get(self.size as usize - 1);
        for index in [first, last] {
            if index < 0 || index >= len as i64 {
                return Err(invalid(format!(
                    "index {} is outside an axis of length {}",
                    index, len
                )));
            }
        }
        Ok(())
    }

    /// The indices, assuming [`check_within`](Self::check_within) passed.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size.max(0) as usize).map(|i| self.get(i) as usize)
    }
}

/// A row sequence and a column sequence over an owned array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySlice<T> {
    array: Array<T>,
    y: LinearSequence,
    x: LinearSequence,
}

impl<T: Element> ArraySlice<T> {
    /// Select rows `y` and columns `x` of `array`.
    pub fn new(array: Array<T>, y: LinearSequence, x: LinearSequence) -> Result<Self> {
        y.check_within("y", array.height())?;
        x.check_within("x", array.width())?;
        Ok(Self { array, y, x })
    }

    /// The whole array.
    pub fn full(array: Array<T>) -> Self {
        let y = LinearSequence::full(array.height());
        let x = LinearSequence::full(array.width());
        Self { array, y, x }
    }

    /// The underlying array.
    pub fn array(&self) -> &Array<T> {
        &self.array
    }

    /// Row selection.
    pub fn y(&self) -> LinearSequence {
        self.y
    }

    /// Column selection.
    pub fn x(&self) -> LinearSequence {
        self.x
    }

    /// The header describing this slice.
    pub fn encoded_header(&self) -> Result<EncodedArraySlice> {
        Ok(EncodedArraySlice {
            array: self.array.encoded_header()?,
            y: self.y,
            x: self.x,
        })
    }

    /// Copy the selected elements into a new dense array.
    pub fn materialize(&self) -> Result<Array<T>> {
        let mut values = Vec::with_capacity(self.y.size().max(0) as usize * self.x.size().max(0) as usize);
        for y in self.y.indices() {
            for x in self.x.indices() {
                let value = self.array.get(y, x).ok_or_else(|| BinstackError::InvalidParameter {
                    name: "slice",
                    cause: format!("({}, {}) is outside the array", y, x),
                })?;
                values.push(value.clone());
            }
        }
        Array::from_vec(self.y.size() as usize, self.x.size() as usize, values)
            .map(|a| a.with_flags(self.array.flags()))
    }
}
