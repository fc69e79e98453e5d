//! The emulated device address space.
//!
//! Allocations receive addresses in a private range that never overlaps
//! host pointers. Every access is resolved against the live allocation map,
//! so use-after-free and out-of-bounds accesses surface as errors instead of
//! undefined behaviour.

use hplgpu_core::{DeviceBuffer, DevicePtr, Error, Result};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// First address handed out.
const BASE_ADDRESS: u64 = 0x7f00_0000_0000;

/// Allocation alignment, matching what vendor allocators guarantee.
const ALIGNMENT: u64 = 256;

/// Unmapped bytes left after every allocation so neighbours never touch.
const GUARD_BYTES: u64 = 4096;

struct AddressSpace {
    next: u64,
    blocks: BTreeMap<u64, Vec<u8>>,
    live_bytes: usize,
    total_allocations: u64,
}

/// Device memory of one emulated accelerator.
pub struct DeviceMemory {
    capacity: usize,
    space: RwLock<AddressSpace>,
}

impl DeviceMemory {
    /// Create an empty address space that can hold `capacity` live bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            space: RwLock::new(AddressSpace {
                next: BASE_ADDRESS,
                blocks: BTreeMap::new(),
                live_bytes: 0,
                total_allocations: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate a zero-filled block.
    pub fn allocate(&self, bytes: usize) -> Result<DeviceBuffer> {
        if bytes == 0 {
            return Ok(DeviceBuffer::from_raw_parts(DevicePtr::NULL, 0));
        }

        let mut space = self.lock_write()?;
        if space.live_bytes + bytes > self.capacity {
            return Err(Error::Allocation {
                bytes,
                reason: format!(
                    "out of device memory ({} of {} bytes in use)",
                    space.live_bytes, self.capacity
                ),
            });
        }

        let addr = space.next;
        space.next = (addr + bytes as u64 + GUARD_BYTES).next_multiple_of(ALIGNMENT);
        space.blocks.insert(addr, vec![0u8; bytes]);
        space.live_bytes += bytes;
        space.total_allocations += 1;

        Ok(DeviceBuffer::from_raw_parts(DevicePtr::from_raw(addr), bytes))
    }

    /// Release a block. Null buffers are ignored.
    pub fn release(&self, buffer: DeviceBuffer) -> Result<()> {
        let (ptr, _) = buffer.into_raw_parts();
        if ptr.is_null() {
            return Ok(());
        }

        let mut space = self.lock_write()?;
        let removed = space.blocks.remove(&ptr.addr());
        match removed {
            Some(block) => {
                space.live_bytes -= block.len();
                Ok(())
            }
            None => Err(Error::InvalidPointer(ptr.addr())),
        }
    }

    /// Copy `dst.len()` bytes out of device memory.
    pub fn read(&self, src: DevicePtr, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let space = self.lock_read()?;
        let (base, block) = resolve(&space.blocks, src, dst.len())?;
        let start = (src.addr() - base) as usize;
        dst.copy_from_slice(&block[start..start + dst.len()]);
        Ok(())
    }

    /// Copy `src` into device memory.
    pub fn write(&self, dst: DevicePtr, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let mut space = self.lock_write()?;
        let (base, _) = resolve(&space.blocks, dst, src.len())?;
        let start = (dst.addr() - base) as usize;
        let block = space
            .blocks
            .get_mut(&base)
            .ok_or(Error::InvalidPointer(dst.addr()))?;
        block[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Copy within device memory. Overlapping ranges behave like `memmove`.
    pub fn copy_within(&self, dst: DevicePtr, src: DevicePtr, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        let mut staging = vec![0u8; bytes];
        self.read(src, &mut staging)?;
        self.write(dst, &staging)
    }

    /// Read `count` doubles starting at `src`.
    pub fn read_f64(&self, src: DevicePtr, count: usize) -> Result<Vec<f64>> {
        let mut bytes = vec![0u8; count * std::mem::size_of::<f64>()];
        self.read(src, &mut bytes)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Write doubles starting at `dst`.
    pub fn write_f64(&self, dst: DevicePtr, values: &[f64]) -> Result<()> {
        self.write(dst, bytemuck::cast_slice(values))
    }

    /// Store `values[i]` at `dst + i` doubles for each `i` in `indices`.
    ///
    /// The rest of the span is left as it is on the device, so routines whose
    /// strided operands interleave inside one allocation do not overwrite each
    /// other's elements.
    pub fn scatter_f64(
        &self,
        dst: DevicePtr,
        values: &[f64],
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        const WIDTH: usize = std::mem::size_of::<f64>();
        let src: &[u8] = bytemuck::cast_slice(values);

        let mut space = self.lock_write()?;
        let (base, _) = resolve(&space.blocks, dst, src.len())?;
        let start = (dst.addr() - base) as usize;
        let block = space
            .blocks
            .get_mut(&base)
            .ok_or(Error::InvalidPointer(dst.addr()))?;
        let span = &mut block[start..start + src.len()];
        for i in indices {
            let at = i * WIDTH;
            span[at..at + WIDTH].copy_from_slice(&src[at..at + WIDTH]);
        }
        Ok(())
    }

    /// Number of allocations currently live.
    pub fn live_allocations(&self) -> usize {
        self.space.read().map(|s| s.blocks.len()).unwrap_or(0)
    }

    /// Bytes currently allocated.
    pub fn live_bytes(&self) -> usize {
        self.space.read().map(|s| s.live_bytes).unwrap_or(0)
    }

    /// Allocations made over the lifetime of this address space.
    pub fn total_allocations(&self) -> u64 {
        self.space.read().map(|s| s.total_allocations).unwrap_or(0)
    }

    fn lock_read(&self) -> Result<std::sync::RwLockReadGuard<'_, AddressSpace>> {
        self.space
            .read()
            .map_err(|_| Error::Transfer("device address space poisoned".to_string()))
    }

    fn lock_write(&self) -> Result<std::sync::RwLockWriteGuard<'_, AddressSpace>> {
        self.space
            .write()
            .map_err(|_| Error::Transfer("device address space poisoned".to_string()))
    }
}

/// Find the block containing `[ptr, ptr + len)`.
fn resolve(blocks: &BTreeMap<u64, Vec<u8>>, ptr: DevicePtr, len: usize) -> Result<(u64, &[u8])> {
    let addr = ptr.addr();
    let (&base, block) = blocks
        .range(..=addr)
        .next_back()
        .ok_or(Error::InvalidPointer(addr))?;

    let offset = addr - base;
    if offset >= block.len() as u64 {
        return Err(Error::InvalidPointer(addr));
    }
    if offset + len as u64 > block.len() as u64 {
        return Err(Error::OutOfBounds { addr, len });
    }
    Ok((base, block.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_zeroed_and_disjoint() {
        let mem = DeviceMemory::new(1 << 20);
        let a = mem.allocate(64).unwrap();
        let b = mem.allocate(64).unwrap();
        assert!(b.ptr().addr() >= a.ptr().addr() + 64);
        assert_eq!(a.ptr().addr() % ALIGNMENT, 0);
        assert_eq!(mem.read_f64(a.ptr(), 8).unwrap(), vec![0.0; 8]);
        mem.release(a).unwrap();
        mem.release(b).unwrap();
        assert_eq!(mem.live_allocations(), 0);
    }

    #[test]
    fn interior_pointers_resolve() {
        let mem = DeviceMemory::new(1 << 20);
        let buf = mem.allocate(8 * 8).unwrap();
        mem.write_f64(buf.ptr().add::<f64>(3), &[1.5, 2.5]).unwrap();
        let all = mem.read_f64(buf.ptr(), 8).unwrap();
        assert_eq!(&all[2..6], &[0.0, 1.5, 2.5, 0.0]);
        mem.release(buf).unwrap();
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mem = DeviceMemory::new(1 << 20);
        let buf = mem.allocate(16).unwrap();
        let err = mem.read_f64(buf.ptr().add::<f64>(1), 2).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
        mem.release(buf).unwrap();
    }

    #[test]
    fn freed_memory_is_unreachable() {
        let mem = DeviceMemory::new(1 << 20);
        let buf = mem.allocate(16).unwrap();
        let ptr = buf.ptr();
        mem.release(buf).unwrap();
        assert!(matches!(
            mem.read_f64(ptr, 1).unwrap_err(),
            Error::InvalidPointer(_)
        ));
        let stale = DeviceBuffer::from_raw_parts(ptr, 16);
        assert!(mem.release(stale).is_err());
    }

    #[test]
    fn scatter_leaves_gaps_untouched() {
        let mem = DeviceMemory::new(1 << 20);
        let buf = mem.allocate(6 * 8).unwrap();
        mem.write_f64(buf.ptr(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let update = [-1.0, 9.0, 9.0, 9.0, -5.0];
        mem.scatter_f64(buf.ptr(), &update, [0, 4]).unwrap();
        assert_eq!(
            mem.read_f64(buf.ptr(), 6).unwrap(),
            vec![-1.0, 2.0, 3.0, 4.0, -5.0, 6.0]
        );
        mem.release(buf).unwrap();
    }

    #[test]
    fn capacity_is_enforced() {
        let mem = DeviceMemory::new(100);
        let a = mem.allocate(80).unwrap();
        assert_eq!(mem.live_bytes(), 80);
        assert!(matches!(
            mem.allocate(40).unwrap_err(),
            Error::Allocation { bytes: 40, .. }
        ));
        mem.release(a).unwrap();
        let b = mem.allocate(40).unwrap();
        mem.release(b).unwrap();
        assert_eq!(mem.live_bytes(), 0);
        assert_eq!(mem.total_allocations(), 2);
    }

    #[test]
    fn zero_sized_allocation_is_null() {
        let mem = DeviceMemory::new(100);
        let buf = mem.allocate(0).unwrap();
        assert!(buf.ptr().is_null());
        mem.release(buf).unwrap();
        assert_eq!(mem.total_allocations(), 0);
    }
}
