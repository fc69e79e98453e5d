//! CUDA device selection, stream-ordered memory and transfers.

use cudarc::cublas::CudaBlas;
use cudarc::driver::safe::{CudaContext, CudaStream};
use cudarc::driver::sys::{CUdevice_attribute, CUresult};
use hplgpu_core::{
    Accelerator, DeviceBuffer, DevicePtr, DeviceProperties, Error, LaunchConfig, Result, Trans,
};
use std::ffi::c_void;
use std::sync::Arc;

use crate::blas::CudaBlasHandle;
use crate::error::{check_transfer, log_driver_error};
use crate::rng::CudaGenerator;

/// One CUDA device with its context and the stream all work is queued on.
pub struct CudaAccelerator {
    ordinal: usize,
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    /// Handle used by the layout copies, separate from the caller's handle.
    layout: CudaBlasHandle,
}

impl CudaAccelerator {
    /// The stream every operation is queued on.
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    fn bind(&self) -> Result<()> {
        self.context
            .bind_to_thread()
            .map_err(|e| Error::DeviceInit(format!("Failed to bind CUDA context: {:?}", e)))
    }

    fn attribute(&self, attr: CUdevice_attribute) -> Result<u32> {
        let device = cudarc::driver::result::device::get(self.ordinal as i32).map_err(|e| {
            Error::DeviceInit(format!("Failed to get CUDA device {}: {:?}", self.ordinal, e))
        })?;
        let value = unsafe { cudarc::driver::result::device::get_attribute(device, attr) }
            .map_err(|e| Error::DeviceInit(format!("Failed to query {:?}: {:?}", attr, e)))?;
        Ok(value.max(0) as u32)
    }

    fn sync_stream(&self) -> Result<()> {
        self.stream
            .synchronize()
            .map_err(|e| Error::Transfer(format!("Stream synchronization failed: {:?}", e)))
    }
}

impl Accelerator for CudaAccelerator {
    type Blas = CudaBlasHandle;
    type Generator = CudaGenerator;

    const PLATFORM: &'static str = "CUDA";

    fn device_count() -> Result<usize> {
        cudarc::driver::result::init()
            .map_err(|e| Error::DeviceInit(format!("CUDA driver initialization failed: {:?}", e)))?;
        let count = cudarc::driver::result::device::get_count()
            .map_err(|e| Error::DeviceInit(format!("Failed to count CUDA devices: {:?}", e)))?;
        Ok(count.max(0) as usize)
    }

    fn open(ordinal: usize) -> Result<Self> {
        let count = Self::device_count()?;
        if count == 0 {
            return Err(Error::NoDevice);
        }
        if ordinal >= count {
            return Err(Error::InvalidDevice { ordinal, count });
        }

        let context = CudaContext::new(ordinal).map_err(|e| {
            Error::DeviceInit(format!(
                "Failed to create CUDA context for device {}: {:?}",
                ordinal, e
            ))
        })?;
        context
            .bind_to_thread()
            .map_err(|e| Error::DeviceInit(format!("Failed to bind CUDA context: {:?}", e)))?;
        let stream = context
            .new_stream()
            .map_err(|e| Error::DeviceInit(format!("Failed to create CUDA stream: {:?}", e)))?;
        let layout = CudaBlas::new(stream.clone())
            .map_err(|e| Error::DeviceInit(format!("Failed to initialize cuBLAS: {:?}", e)))?;

        log::debug!("Opened CUDA device {} of {}", ordinal, count);
        Ok(Self {
            ordinal,
            context,
            stream,
            layout: CudaBlasHandle::new(layout),
        })
    }

    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn properties(&self) -> Result<DeviceProperties> {
        use CUdevice_attribute::*;

        self.bind()?;
        let device = cudarc::driver::result::device::get(self.ordinal as i32).map_err(|e| {
            Error::DeviceInit(format!("Failed to get CUDA device {}: {:?}", self.ordinal, e))
        })?;
        let name = cudarc::driver::result::device::get_name(device)
            .map_err(|e| Error::DeviceInit(format!("Failed to query device name: {:?}", e)))?;
        let (_, total) = cudarc::driver::result::mem_get_info()
            .map_err(|e| Error::DeviceInit(format!("Failed to get memory info: {:?}", e)))?;

        Ok(DeviceProperties {
            name,
            total_global_mem: total as u64,
            shared_mem_per_block: self.attribute(CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK)?
                as u64,
            regs_per_block: self.attribute(CU_DEVICE_ATTRIBUTE_MAX_REGISTERS_PER_BLOCK)?,
            warp_size: self.attribute(CU_DEVICE_ATTRIBUTE_WARP_SIZE)?,
            max_threads_per_block: self.attribute(CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?,
            max_threads_dim: [
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z)?,
            ],
            max_grid_size: [
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_X)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Y)?,
                self.attribute(CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Z)?,
            ],
            total_const_mem: self.attribute(CU_DEVICE_ATTRIBUTE_TOTAL_CONSTANT_MEMORY)? as u64,
            major: self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?,
            minor: self.attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?,
            memory_clock_rate: self.attribute(CU_DEVICE_ATTRIBUTE_MEMORY_CLOCK_RATE)?,
            multiprocessor_count: self.attribute(CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?,
            pci_bus_id: self.attribute(CU_DEVICE_ATTRIBUTE_PCI_BUS_ID)?,
        })
    }

    fn create_blas(&self) -> Result<CudaBlasHandle> {
        self.bind()?;
        let blas = CudaBlas::new(self.stream.clone())
            .map_err(|e| Error::DeviceInit(format!("Failed to initialize cuBLAS: {:?}", e)))?;
        Ok(CudaBlasHandle::new(blas))
    }

    fn destroy_blas(&self, blas: CudaBlasHandle) -> Result<()> {
        self.sync_stream()?;
        drop(blas);
        Ok(())
    }

    fn malloc(&self, bytes: usize) -> Result<DeviceBuffer> {
        if bytes == 0 {
            return Ok(DeviceBuffer::from_raw_parts(DevicePtr::NULL, 0));
        }
        self.bind()?;
        let mut ptr: u64 = 0;
        let result =
            unsafe { cudarc::driver::sys::cuMemAllocAsync(&mut ptr, bytes, self.stream.cu_stream()) };
        if result != CUresult::CUDA_SUCCESS {
            return Err(Error::Allocation {
                bytes,
                reason: format!("{:?}", result),
            });
        }
        Ok(DeviceBuffer::from_raw_parts(DevicePtr::from_raw(ptr), bytes))
    }

    fn free(&self, buffer: DeviceBuffer) -> Result<()> {
        let (ptr, _) = buffer.into_raw_parts();
        if ptr.is_null() {
            return Ok(());
        }
        self.bind()?;
        let result = unsafe { cudarc::driver::sys::cuMemFreeAsync(ptr.addr(), self.stream.cu_stream()) };
        if result != CUresult::CUDA_SUCCESS {
            log_driver_error("cuMemFreeAsync", ptr.addr(), result);
            return Err(Error::InvalidPointer(ptr.addr()));
        }
        Ok(())
    }

    fn copy_host_to_device(&self, dst: DevicePtr, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        self.bind()?;
        let result = unsafe {
            cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                dst.addr(),
                src.as_ptr() as *const c_void,
                src.len(),
                self.stream.cu_stream(),
            )
        };
        check_transfer(result, "host-to-device copy", src.len())?;
        // The source slice may be dropped as soon as we return.
        self.sync_stream()
    }

    fn copy_device_to_host(&self, dst: &mut [u8], src: DevicePtr) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        self.bind()?;
        let result = unsafe {
            cudarc::driver::sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut c_void,
                src.addr(),
                dst.len(),
                self.stream.cu_stream(),
            )
        };
        check_transfer(result, "device-to-host copy", dst.len())?;
        self.sync_stream()
    }

    fn copy_device_to_device(&self, dst: DevicePtr, src: DevicePtr, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.bind()?;
        let result = unsafe {
            cudarc::driver::sys::cuMemcpyDtoDAsync_v2(
                dst.addr(),
                src.addr(),
                bytes,
                self.stream.cu_stream(),
            )
        };
        check_transfer(result, "device-to-device copy", bytes)?;
        self.sync_stream()
    }

    fn synchronize(&self) -> Result<()> {
        self.bind()?;
        cudarc::driver::result::ctx::synchronize()
            .map_err(|e| Error::Launch(format!("Device synchronization failed: {:?}", e)))
    }

    fn create_generator(&self, seed: u64) -> Result<CudaGenerator> {
        self.bind()?;
        CudaGenerator::new(self.stream.clone(), seed)
    }

    fn lacpy(
        &self,
        launch: &LaunchConfig,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        if !launch.covers(m, n) {
            return Err(Error::Launch(format!(
                "grid {:?} does not cover {}x{}",
                launch.grid, m, n
            )));
        }
        self.bind()?;
        // With beta = 0 the second operand is never read; pass B itself.
        self.layout
            .dgeam(Trans::NoTrans, Trans::NoTrans, m, n, 1.0, a, lda, 0.0, b, ldb, b, ldb)
    }

    fn latcpy(
        &self,
        launch: &LaunchConfig,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        if !launch.covers(m, n) {
            return Err(Error::Launch(format!(
                "grid {:?} does not cover {}x{}",
                launch.grid, m, n
            )));
        }
        self.bind()?;
        self.layout
            .dgeam(Trans::Trans, Trans::NoTrans, n, m, 1.0, a, lda, 0.0, b, ldb, b, ldb)
    }
}
