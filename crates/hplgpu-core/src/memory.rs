//! Device addresses, owned device allocations and transfer directions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw address in device memory.
///
/// Pointers are plain addresses: they can be offset, copied and may alias,
/// exactly like the pointers a vendor runtime hands out. Ownership lives in
/// [`DeviceBuffer`], not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevicePtr(u64);

impl DevicePtr {
    /// The null device pointer.
    pub const NULL: DevicePtr = DevicePtr(0);

    /// Wrap a raw device address.
    pub const fn from_raw(addr: u64) -> Self {
        Self(addr)
    }

    /// The raw device address.
    pub const fn addr(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset by `bytes`.
    pub const fn byte_add(self, bytes: usize) -> Self {
        Self(self.0 + bytes as u64)
    }

    /// Offset by `count` elements of `T`.
    pub const fn add<T>(self, count: usize) -> Self {
        self.byte_add(count * std::mem::size_of::<T>())
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// An owned block of device memory.
///
/// Not `Clone`: the allocating owner is the only one that can hand the
/// buffer back to the accelerator, and giving it back consumes the handle.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "device memory is only released by handing the buffer back"]
pub struct DeviceBuffer {
    ptr: DevicePtr,
    bytes: usize,
}

impl DeviceBuffer {
    /// Adopt a fresh allocation. Only accelerators should call this.
    pub fn from_raw_parts(ptr: DevicePtr, bytes: usize) -> Self {
        Self { ptr, bytes }
    }

    /// Base address of the allocation.
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.bytes
    }

    /// Number of whole `T` elements that fit.
    pub fn len_of<T>(&self) -> usize {
        self.bytes / std::mem::size_of::<T>()
    }

    /// Give up ownership, returning the base pointer and size.
    pub fn into_raw_parts(self) -> (DevicePtr, usize) {
        (self.ptr, self.bytes)
    }
}

/// Direction of a memory transfer.
///
/// The discriminants match the vendor runtimes' copy-kind enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransferKind {
    HostToHost = 0,
    HostToDevice = 1,
    DeviceToHost = 2,
    DeviceToDevice = 3,
    /// Let the endpoints decide.
    Default = 4,
}

impl TransferKind {
    pub const ALL: [TransferKind; 5] = [
        TransferKind::HostToHost,
        TransferKind::HostToDevice,
        TransferKind::DeviceToHost,
        TransferKind::DeviceToDevice,
        TransferKind::Default,
    ];

    /// Short label used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            TransferKind::HostToHost => "H2H",
            TransferKind::HostToDevice => "H2D",
            TransferKind::DeviceToHost => "D2H",
            TransferKind::DeviceToDevice => "D2D",
            TransferKind::Default => "DEFAULT",
        }
    }

    /// The concrete direction implied by where source and destination live.
    pub fn from_endpoints(src_on_device: bool, dst_on_device: bool) -> Self {
        match (src_on_device, dst_on_device) {
            (false, false) => TransferKind::HostToHost,
            (false, true) => TransferKind::HostToDevice,
            (true, false) => TransferKind::DeviceToHost,
            (true, true) => TransferKind::DeviceToDevice,
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Elements touched by a strided vector of length `n`.
pub fn vector_span(n: usize, inc: usize) -> usize {
    if n == 0 { 0 } else { 1 + (n - 1) * inc }
}

/// Elements touched by a column-major `rows x cols` view with leading dimension `ld`.
pub fn matrix_span(rows: usize, cols: usize, ld: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        ld * (cols - 1) + rows
    }
}
