//! Random pointer-tag generation.

use nxsan_shared::{GRANULE_BYTES, TAG_MAX};

use crate::shadow::ShadowStore;

/// Allocations at least this large never receive a tag below `GRANULE_BYTES`.
/// Small tag values alias legal short-granule shadow bytes, which would force
/// the free-time shadow walk to stop after one granule and cripple
/// use-after-free detection past it; reserving them for small allocations
/// keeps the walk unambiguous.
pub const SMALL_TAG_THRESHOLD: usize = 256;

/// Draws allocation tags from an xorshift64* stream seeded by the operating
/// system. Tag material needs no cryptographic quality, only nondeterminism
/// across runs.
#[derive(Debug)]
pub struct TagGenerator {
    state: u64,
}

impl TagGenerator {
    pub fn new() -> Self {
        Self::with_seed(os_seed())
    }

    /// A generator with a fixed stream, for tests. The state must be nonzero
    /// or xorshift degenerates, hence the low-bit pin.
    pub fn with_seed(seed: u64) -> Self {
        TagGenerator { state: seed | 1 }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// A uniformly drawn tag in `1..=TAG_MAX`.
    pub fn next_tag(&mut self) -> u8 {
        loop {
            let tag = (self.next_u64() >> 56) as u8 & TAG_MAX;
            if tag != 0 {
                return tag;
            }
        }
    }

    /// Draws a tag for the allocation `[addr, addr + size)`, re-drawing until
    /// it differs from the shadow byte before the allocation and the one after
    /// its aligned tail. Allocations past `SMALL_TAG_THRESHOLD` additionally
    /// re-draw until the tag clears the short-granule value range.
    pub fn generate(
        &mut self,
        shadow: &ShadowStore,
        addr: usize,
        size: usize,
        aligned_size: usize,
    ) -> u8 {
        let index = shadow.index_of(addr);
        let prev_tag = if index > 0 { shadow.get(index - 1) } else { 0 };
        let tail = addr + aligned_size;
        let next_tag = if shadow.ptr_in_heap(tail) { shadow.get(shadow.index_of(tail)) } else { 0 };
        let avoid_small = size >= SMALL_TAG_THRESHOLD;

        loop {
            let tag = self.next_tag();
            if tag == prev_tag || tag == next_tag {
                continue;
            }
            if avoid_small && (tag as usize) < GRANULE_BYTES {
                continue;
            }
            return tag;
        }
    }
}

fn os_seed() -> u64 {
    let mut seed: u64 = 0;
    #[cfg(target_os = "linux")]
    {
        let rc = unsafe {
            libc::getrandom(
                (&raw mut seed).cast::<core::ffi::c_void>(),
                core::mem::size_of::<u64>(),
                0,
            )
        };
        if rc == core::mem::size_of::<u64>() as isize {
            return seed;
        }
    }
    // getrandom can be unavailable on exotic kernels; timing bits are an
    // acceptable fallback for tag material.
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    seed ^ ((ts.tv_sec as u64).rotate_left(32) ^ ts.tv_nsec as u64)
}

impl Default for TagGenerator {
    fn default() -> Self {
        TagGenerator::new()
    }
}
