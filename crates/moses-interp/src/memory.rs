//! Memory model for the interpreter.
//!
//! Every `alloca`, global variable and materialized aggregate constant gets
//! its own allocation. Addresses are never reused, so a pointer into a
//! released allocation stays invalid.

use alloc::{collections::BTreeMap, vec, vec::Vec};

use crate::error::{MemoryAccessKind, Trap};

/// First address handed out; everything below it is invalid.
pub const HEAP_START: u64 = 0x1000;

/// Bytes left unmapped between two allocations.
const GUARD: u64 = 8;

/// Default cap on live allocated bytes.
pub const DEFAULT_MEMORY_LIMIT: u64 = 64 << 20;

/// Byte-addressed memory made of independent allocations.
#[derive(Debug, Clone)]
pub struct Memory {
    allocations: BTreeMap<u64, Vec<u8>>,
    next: u64,
    in_use: u64,
    limit: u64,
}

impl Memory {
    /// Create an empty memory with the default limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MEMORY_LIMIT)
    }

    /// Create an empty memory holding at most `limit` live bytes.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            allocations: BTreeMap::new(),
            next: HEAP_START,
            in_use: 0,
            limit,
        }
    }

    /// Allocate `size` zeroed bytes and return the base address.
    ///
    /// Traps with `OutOfMemory` when the live total would exceed the limit
    /// or the address space is exhausted.
    pub fn allocate(&mut self, size: u64) -> Result<u64, Trap> {
        let out_of_memory = Trap::OutOfMemory { requested: size };
        if size > self.limit - self.in_use {
            return Err(out_of_memory);
        }
        let len = usize::try_from(size).map_err(|_| out_of_memory.clone())?;
        let base = self.next;
        let next = base
            .checked_add(size)
            .and_then(|end| end.checked_add(GUARD + 7))
            .ok_or(out_of_memory)?
            & !7;
        self.allocations.insert(base, vec![0; len]);
        self.in_use += size;
        self.next = next;
        Ok(base)
    }

    /// Release the allocation starting at `base`.
    ///
    /// Returns false if there was none.
    pub fn free(&mut self, base: u64) -> bool {
        match self.allocations.remove(&base) {
            Some(bytes) => {
                self.in_use -= bytes.len() as u64;
                true
            }
            None => false,
        }
    }

    /// Check whether an allocation starts at `base`.
    pub fn is_live(&self, base: u64) -> bool {
        self.allocations.contains_key(&base)
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Total bytes held by live allocations.
    pub fn bytes_in_use(&self) -> u64 {
        self.in_use
    }

    /// Cap on live bytes
    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn locate(&self, address: u64, size: u64, kind: MemoryAccessKind) -> Result<(u64, usize), Trap> {
        if address == 0 {
            return Err(Trap::NullPointer { kind });
        }
        let invalid = Trap::InvalidMemoryAccess {
            address,
            size,
            kind,
        };
        let (base, bytes) = self.allocations.range(..=address).next_back().ok_or(invalid.clone())?;
        let offset = address - base;
        match offset.checked_add(size) {
            Some(end) if end <= bytes.len() as u64 => {}
            _ => return Err(invalid),
        }
        Ok((*base, offset as usize))
    }

    /// Read `len` bytes.
    pub fn read_bytes(&self, address: u64, len: u64) -> Result<&[u8], Trap> {
        let (base, offset) = self.locate(address, len, MemoryAccessKind::Read)?;
        let bytes = &self.allocations[&base];
        Ok(&bytes[offset..offset + len as usize])
    }

    /// Write `data` starting at `address`.
    pub fn write_bytes(&mut self, address: u64, data: &[u8]) -> Result<(), Trap> {
        let (base, offset) = self.locate(address, data.len() as u64, MemoryAccessKind::Write)?;
        if let Some(bytes) = self.allocations.get_mut(&base) {
            bytes[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    /// Read a little-endian machine word.
    pub fn read_word(&self, address: u64) -> Result<i64, Trap> {
        let bytes = self.read_bytes(address, 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(word))
    }

    /// Write a little-endian machine word.
    pub fn write_word(&mut self, address: u64, value: i64) -> Result<(), Trap> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Copy `len` bytes from `src` to `dst`; the ranges may overlap.
    pub fn copy(&mut self, dst: u64, src: u64, len: u64) -> Result<(), Trap> {
        if len == 0 {
            return Ok(());
        }
        let data = self.read_bytes(src, len)?.to_vec();
        self.write_bytes(dst, &data)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
