//! Philox4x32-10 counter-based generator with a Box-Muller normal transform.
//!
//! Each counter value yields four 32-bit words, which become two doubles of
//! 53-bit precision and, through Box-Muller, two normal deviates. Output
//! element `i` therefore depends only on the seed and `i`, so blocks can be
//! filled in parallel and the stream is identical however it is split.

use hplgpu_core::{DevicePtr, NormalGenerator, Result};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::sync::Arc;

use crate::memory::DeviceMemory;

const PHILOX_M4X32_0: u32 = 0xD251_1F53;
const PHILOX_M4X32_1: u32 = 0xCD9E_8D57;
const PHILOX_W32_0: u32 = 0x9E37_79B9;
const PHILOX_W32_1: u32 = 0xBB67_AE85;

/// Normal deviates produced per counter value.
const VALUES_PER_COUNTER: usize = 2;

/// Counter values per rayon task.
const COUNTERS_PER_TASK: usize = 4096;

#[inline(always)]
fn philox_round(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let prod0 = (ctr[0] as u64).wrapping_mul(PHILOX_M4X32_0 as u64);
    let prod1 = (ctr[2] as u64).wrapping_mul(PHILOX_M4X32_1 as u64);
    [
        ((prod1 >> 32) as u32) ^ ctr[1] ^ key[0],
        prod1 as u32,
        ((prod0 >> 32) as u32) ^ ctr[3] ^ key[1],
        prod0 as u32,
    ]
}

/// Ten rounds of Philox4x32 on `counter` under `key`.
pub fn philox4x32_10(counter: u64, key: u64) -> [u32; 4] {
    let mut c = [counter as u32, (counter >> 32) as u32, 0, 0];
    let mut k = [key as u32, (key >> 32) as u32];
    for _ in 0..10 {
        c = philox_round(c, k);
        k[0] = k[0].wrapping_add(PHILOX_W32_0);
        k[1] = k[1].wrapping_add(PHILOX_W32_1);
    }
    c
}

/// Map two words to a double in (0, 1].
#[inline(always)]
fn open_unit(hi: u32, lo: u32) -> f64 {
    let bits = (((hi as u64) << 32) | lo as u64) >> 11;
    (bits as f64 + 1.0) / (1u64 << 53) as f64
}

/// The two standard normal deviates for one counter value.
pub fn normal_pair(counter: u64, key: u64) -> (f64, f64) {
    let w = philox4x32_10(counter, key);
    let u1 = open_unit(w[0], w[1]);
    let u2 = open_unit(w[2], w[3]);
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * PI * u2;
    (r * theta.cos(), r * theta.sin())
}

/// Fill `out` with `mean + stddev * z` for stream positions `start..start + out.len()`.
pub fn fill_normal(out: &mut [f64], key: u64, start: u64, mean: f64, stddev: f64) {
    // Align the parallel split to whole counters so each task owns its pairs.
    let lead = (start % VALUES_PER_COUNTER as u64) as usize;
    let lead = lead.min(out.len());
    let (head, body) = out.split_at_mut(lead);
    if let Some(v) = head.first_mut() {
        let (_, z1) = normal_pair(start / VALUES_PER_COUNTER as u64, key);
        *v = mean + stddev * z1;
    }

    let first_counter = (start + lead as u64) / VALUES_PER_COUNTER as u64;
    body.par_chunks_mut(COUNTERS_PER_TASK * VALUES_PER_COUNTER)
        .enumerate()
        .for_each(|(task, chunk)| {
            let base = first_counter + (task * COUNTERS_PER_TASK) as u64;
            for (pair, values) in chunk.chunks_mut(VALUES_PER_COUNTER).enumerate() {
                let (z0, z1) = normal_pair(base + pair as u64, key);
                values[0] = mean + stddev * z0;
                if let Some(second) = values.get_mut(1) {
                    *second = mean + stddev * z1;
                }
            }
        });
}

/// A seeded Philox stream writing into emulated device memory.
pub struct HostGenerator {
    memory: Arc<DeviceMemory>,
    seed: u64,
    position: u64,
}

impl HostGenerator {
    pub(crate) fn new(memory: Arc<DeviceMemory>, seed: u64) -> Self {
        Self {
            memory,
            seed,
            position: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl NormalGenerator for HostGenerator {
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
        let mut values = vec![0.0; count];
        fill_normal(&mut values, self.seed, self.position, mean, stddev);
        self.memory.write_f64(out, &values)?;
        self.position += count as u64;
        Ok(())
    }
}
