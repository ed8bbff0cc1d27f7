use std::fmt::{Debug, Formatter};

use crate::error::OptimizerError;

/// The maximum size of an arena. Offsets are 32-bit.
pub const MAX_ARENA_SIZE: usize = 1 << 32;

const INITIAL_CAPACITY: usize = 4096;
const RESERVED: usize = 8;

/// A growable byte buffer with a bump pointer. Allocated regions are addressed by offsets
/// relative to the start of the buffer so they remain valid when the buffer grows.
/// Memory is never freed or reused while the arena is alive.
///
/// Offset `0` is never returned by [alloc](Self::alloc) and can be used as a null value.
pub struct Arena {
    buf: Vec<u8>,
    limit: usize,
}

impl Arena {
    /// Creates an arena that can grow up to [MAX_ARENA_SIZE] bytes.
    pub fn new() -> Self {
        Arena::with_limit(MAX_ARENA_SIZE)
    }

    /// Creates an arena that can grow up to `limit` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is greater than [MAX_ARENA_SIZE].
    pub fn with_limit(limit: usize) -> Self {
        assert!(limit <= MAX_ARENA_SIZE, "arena limit exceeds {} bytes", MAX_ARENA_SIZE);
        let mut buf = Vec::with_capacity(INITIAL_CAPACITY.min(limit.max(RESERVED)));
        buf.resize(RESERVED, 0);
        Arena { buf, limit }
    }

    /// Allocates `size` bytes aligned to `align` and returns the offset of the allocated region.
    /// When the capacity of the buffer is exceeded the buffer doubles.
    ///
    /// Returns an internal error when the arena has been exhausted.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    pub fn alloc(&mut self, size: usize, align: usize) -> Result<u32, OptimizerError> {
        assert!(align.is_power_of_two(), "alignment must be a power of two: {}", align);

        let offset = (self.buf.len() + align - 1) & !(align - 1);
        let end = offset + size;
        if end > self.limit {
            return Err(OptimizerError::internal(format!(
                "Arena has been exhausted. Limit: {} bytes, requested: {} bytes",
                self.limit, end
            )));
        }

        if end > self.buf.capacity() {
            let new_capacity = (self.buf.capacity() * 2).max(end).min(self.limit);
            self.buf.reserve_exact(new_capacity - self.buf.len());
        }
        self.buf.resize(end, 0);

        Ok(offset as u32)
    }

    /// Allocates a region for the given words and copies them into it.
    pub fn alloc_words(&mut self, words: &[u32]) -> Result<u32, OptimizerError> {
        let offset = self.alloc(words.len() * 4, 4)?;
        for (i, w) in words.iter().enumerate() {
            self.write_u32(offset + (i * 4) as u32, *w);
        }
        Ok(offset)
    }

    /// Writes a word at the given offset.
    ///
    /// # Panics
    ///
    /// Panics if the region has not been allocated.
    pub fn write_u32(&mut self, offset: u32, value: u32) {
        let start = self.checked_offset(offset, 4);
        self.buf[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads a word at the given offset.
    ///
    /// # Panics
    ///
    /// Panics if the region has not been allocated.
    pub fn read_u32(&self, offset: u32) -> u32 {
        let start = self.checked_offset(offset, 4);
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[start..start + 4]);
        u32::from_le_bytes(bytes)
    }

    /// Returns `true` if `size` bytes at the given offset belong to allocated memory.
    pub fn contains(&self, offset: u32, size: usize) -> bool {
        let offset = offset as usize;
        offset >= RESERVED && offset + size <= self.buf.len()
    }

    /// The number of bytes in use (including the reserved prefix).
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// The number of bytes the arena can hold without growing.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    fn checked_offset(&self, offset: u32, size: usize) -> usize {
        assert!(self.contains(offset, size), "Arena offset is invalid: {}", offset);
        offset as usize
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

impl Debug for Arena {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .field("limit", &self.limit)
            .finish()
    }
}
