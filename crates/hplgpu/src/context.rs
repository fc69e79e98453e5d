//! Device handle and lifecycle.
//!
//! A [`DeviceContext`] owns the selected accelerator and its numerical-library
//! handle. Every other component borrows it, so the handle cannot be torn down
//! while a component still uses it. A device has at most one live handle per
//! process: a second `init` for it fails until the first context is released
//! or dropped.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hplgpu_core::{Accelerator, DeviceProperties, Error, Result, TransferKind};

use crate::config::BackendConfig;
use crate::diag::{self, Trace};
use crate::kernels::{ExecutionStrategy, KernelLibrary, Kernels};
use crate::layout::LayoutKernels;
use crate::matgen::MatrixGenerator;
use crate::memory::MemoryManager;
use crate::panel::PanelManager;

/// Devices with a live handle in this process, by platform and ordinal.
static LIVE_HANDLES: Mutex<BTreeSet<(&'static str, usize)>> = Mutex::new(BTreeSet::new());

fn live_handles() -> MutexGuard<'static, BTreeSet<(&'static str, usize)>> {
    LIVE_HANDLES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registration of one live handle, removed on drop.
struct HandleClaim {
    platform: &'static str,
    ordinal: usize,
}

impl HandleClaim {
    fn acquire(platform: &'static str, ordinal: usize) -> Result<Self> {
        if !live_handles().insert((platform, ordinal)) {
            return Err(Error::AlreadyInitialized { platform, ordinal });
        }
        Ok(Self { platform, ordinal })
    }
}

impl Drop for HandleClaim {
    fn drop(&mut self) {
        live_handles().remove(&(self.platform, self.ordinal));
    }
}

/// The live device and numerical-library handle.
pub struct DeviceContext<A: Accelerator> {
    accelerator: A,
    blas: Option<A::Blas>,
    claim: Option<HandleClaim>,
    properties: DeviceProperties,
    labels: [&'static str; 5],
    config: BackendConfig,
    trace: Trace,
}

impl<A: Accelerator> DeviceContext<A> {
    /// Select `config.device_id`, log its properties and create the handle.
    ///
    /// Fails with [`Error::AlreadyInitialized`] while another context holds a
    /// live handle for the same device.
    pub fn init(config: &BackendConfig) -> Result<Self> {
        let count = A::device_count()?;
        if count == 0 {
            return Err(Error::NoDevice);
        }
        if config.device_id >= count {
            return Err(Error::InvalidDevice {
                ordinal: config.device_id,
                count,
            });
        }

        let claim = HandleClaim::acquire(A::PLATFORM, config.device_id)?;
        let accelerator = A::open(config.device_id)?;
        let properties = accelerator.properties()?;
        for line in diag::property_lines(&properties) {
            log::info!(target: diag::TARGET, "{}", line);
        }

        let blas = accelerator.create_blas()?;
        let labels = TransferKind::ALL.map(TransferKind::label);

        log::info!(
            target: diag::TARGET,
            "{} device {} initialized ({} strategy)",
            A::PLATFORM,
            config.device_id,
            config.strategy
        );

        Ok(Self {
            accelerator,
            blas: Some(blas),
            claim: Some(claim),
            properties,
            labels,
            config: config.clone(),
            trace: Trace::new(A::PLATFORM),
        })
    }

    /// Destroy the numerical-library handle. A second call does nothing.
    ///
    /// The device is free for a new `init` afterwards, even if destroying the
    /// handle fails.
    pub fn release(&mut self) -> Result<()> {
        match self.blas.take() {
            Some(blas) => {
                self.claim = None;
                self.accelerator.destroy_blas(blas)?;
                log::info!(target: diag::TARGET, "{} device {} released", A::PLATFORM, self.ordinal());
                Ok(())
            }
            None => {
                log::warn!(target: diag::TARGET, "Device context released twice");
                Ok(())
            }
        }
    }

    pub fn is_released(&self) -> bool {
        self.blas.is_none()
    }

    /// Block until all queued device work has finished.
    pub fn synchronize(&self) -> Result<()> {
        self.accelerator.synchronize()
    }

    /// The numerical-library handle, or [`Error::Released`] after release.
    pub fn blas(&self) -> Result<&A::Blas> {
        self.blas.as_ref().ok_or(Error::Released)
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    pub fn ordinal(&self) -> usize {
        self.accelerator.ordinal()
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn trace(&self) -> Trace {
        self.trace
    }

    /// Human-readable label of a transfer direction.
    pub fn transfer_label(&self, kind: TransferKind) -> &'static str {
        self.labels[kind as usize]
    }

    pub fn memory(&self) -> MemoryManager<'_, A> {
        MemoryManager::new(self)
    }

    pub fn panels(&self) -> PanelManager<'_, A> {
        PanelManager::new(self)
    }

    pub fn generator(&self) -> MatrixGenerator<'_, A> {
        MatrixGenerator::new(self)
    }

    pub fn kernels<S: ExecutionStrategy>(&self) -> KernelLibrary<'_, A, S> {
        KernelLibrary::new(self)
    }

    /// Kernels under the strategy named in the configuration.
    pub fn configured_kernels(&self) -> Kernels<'_, A> {
        Kernels::new(self)
    }

    pub fn layout(&self) -> LayoutKernels<'_, A> {
        LayoutKernels::new(self)
    }
}

impl<A: Accelerator> Drop for DeviceContext<A> {
    fn drop(&mut self) {
        if let Some(blas) = self.blas.take() {
            if let Err(e) = self.accelerator.destroy_blas(blas) {
                log::warn!(target: diag::TARGET, "Failed to destroy BLAS handle on drop: {}", e);
            }
        }
    }
}

/// Host contexts for unit tests, which share the process-wide device.
#[cfg(test)]
pub(crate) mod testing {
    use std::ops::{Deref, DerefMut};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use hplgpu_backend_host::HostAccelerator;

    use super::DeviceContext;
    use crate::config::BackendConfig;

    static SERIAL: Mutex<()> = Mutex::new(());

    /// Hold the host device for the rest of the test.
    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A live host context plus the turn that keeps other tests off it.
    pub(crate) struct HostFixture {
        ctx: DeviceContext<HostAccelerator>,
        _turn: MutexGuard<'static, ()>,
    }

    pub(crate) fn host_context() -> HostFixture {
        host_context_with(&BackendConfig::default())
    }

    pub(crate) fn host_context_with(config: &BackendConfig) -> HostFixture {
        let turn = serial();
        let ctx = DeviceContext::init(config).unwrap();
        HostFixture { ctx, _turn: turn }
    }

    impl Deref for HostFixture {
        type Target = DeviceContext<HostAccelerator>;

        fn deref(&self) -> &Self::Target {
            &self.ctx
        }
    }

    impl DerefMut for HostFixture {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.ctx
        }
    }
}
