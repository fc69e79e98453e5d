//! cuRAND Philox4x32-10 generator.

use cudarc::curand::sys::{self, curandGenerator_t, curandRngType_t};
use cudarc::driver::CudaStream;
use hplgpu_core::{DevicePtr, NormalGenerator, Result};
use std::sync::Arc;

use crate::error::{check_rand, check_transfer, log_driver_error};

/// A seeded cuRAND generator queued on the accelerator's stream.
///
/// The generator is destroyed on drop.
pub struct CudaGenerator {
    generator: curandGenerator_t,
    stream: Arc<CudaStream>,
}

impl CudaGenerator {
    pub(crate) fn new(stream: Arc<CudaStream>, seed: u64) -> Result<Self> {
        let mut generator: curandGenerator_t = std::ptr::null_mut();
        unsafe {
            check_rand(
                sys::curandCreateGenerator(
                    &mut generator,
                    curandRngType_t::CURAND_RNG_PSEUDO_PHILOX4_32_10,
                ),
                "curandCreateGenerator",
            )?;
        }
        // From here on Drop owns the handle.
        let rng = Self { generator, stream };
        unsafe {
            check_rand(
                sys::curandSetPseudoRandomGeneratorSeed(rng.generator, seed),
                "curandSetPseudoRandomGeneratorSeed",
            )?;
            check_rand(
                sys::curandSetStream(rng.generator, rng.stream.cu_stream() as _),
                "curandSetStream",
            )?;
        }
        Ok(rng)
    }
}

impl NormalGenerator for CudaGenerator {
    fn generate_normal(
        &mut self,
        out: DevicePtr,
        count: usize,
        mean: f64,
        stddev: f64,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if count % 2 == 0 {
            let status = unsafe {
                sys::curandGenerateNormalDouble(
                    self.generator,
                    out.addr() as *mut f64,
                    count,
                    mean,
                    stddev,
                )
            };
            return check_rand(status, "curandGenerateNormalDouble");
        }

        // cuRAND produces normals in pairs; draw one extra into scratch and
        // copy back exactly `count`.
        let padded = count + 1;
        let bytes = padded * std::mem::size_of::<f64>();
        let cu_stream = self.stream.cu_stream();
        let mut scratch: u64 = 0;
        unsafe {
            let result = cudarc::driver::sys::cuMemAllocAsync(&mut scratch, bytes, cu_stream);
            check_transfer(result, "cuMemAllocAsync", bytes)?;
        }

        let generated = unsafe {
            check_rand(
                sys::curandGenerateNormalDouble(
                    self.generator,
                    scratch as *mut f64,
                    padded,
                    mean,
                    stddev,
                ),
                "curandGenerateNormalDouble",
            )
        };
        let copied = generated.and_then(|()| unsafe {
            let len = count * std::mem::size_of::<f64>();
            let result =
                cudarc::driver::sys::cuMemcpyDtoDAsync_v2(out.addr(), scratch, len, cu_stream);
            check_transfer(result, "cuMemcpyDtoDAsync", len)
        });

        unsafe {
            let result = cudarc::driver::sys::cuMemFreeAsync(scratch, cu_stream);
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                log_driver_error("cuMemFreeAsync", scratch, result);
            }
        }
        copied
    }
}

impl Drop for CudaGenerator {
    fn drop(&mut self) {
        let status = unsafe { sys::curandDestroyGenerator(self.generator) };
        if status != sys::curandStatus_t::CURAND_STATUS_SUCCESS {
            log::warn!("curandDestroyGenerator failed: {:?}", status);
        }
    }
}
