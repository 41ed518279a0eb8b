//! Shared test fixtures: statically allocated bump arenas standing in for the
//! tracked heap, so allocations land at deterministic in-bounds addresses
//! regardless of where the platform allocator would place them.

use core::cell::UnsafeCell;
use core::ffi::c_void;
use core::sync::atomic::{AtomicUsize, Ordering};

use nxsan_shared::GRANULE_BYTES;

use crate::global::Runtime;
use crate::hooks::{DEFAULT_HOOKS, NxsanAllocHooks, NxsanHooks};

const ARENA_LEN: usize = 1 << 20;

#[repr(C, align(16))]
struct Arena<const LEN: usize>(UnsafeCell<[u8; LEN]>);

// SAFETY: the bump cursor hands every granule to at most one caller.
unsafe impl<const LEN: usize> Sync for Arena<LEN> {}

static ARENA: Arena<ARENA_LEN> = Arena(UnsafeCell::new([0; ARENA_LEN]));

// Granule offset of the next free byte. Allocations are never recycled, so
// concurrently running tests cannot hand out overlapping memory. The first
// granule stays unused to keep allocations off the heap base (the free-time
// sanity trap).
static CURSOR: AtomicUsize = AtomicUsize::new(GRANULE_BYTES);

pub fn arena_base() -> usize {
    ARENA.0.get() as usize
}

pub fn arena_len() -> usize {
    ARENA_LEN
}

unsafe extern "C" fn arena_aligned_alloc(_align: usize, size: usize) -> *mut c_void {
    if size == 0 || size > ARENA_LEN {
        return core::ptr::null_mut();
    }
    let step = (size + GRANULE_BYTES - 1) & !(GRANULE_BYTES - 1);
    let offset = CURSOR.fetch_add(step, Ordering::SeqCst);
    if offset + step > ARENA_LEN {
        return core::ptr::null_mut();
    }
    (arena_base() + offset) as *mut c_void
}

// The arena never reuses granules, so free is a no-op.
unsafe extern "C" fn arena_free(_ptr: *mut c_void) {}

/// Hooks that allocate from the shared arena; shadow mapping and abort fall
/// through to libc.
pub fn arena_hooks() -> NxsanHooks {
    NxsanHooks {
        alloc: NxsanAllocHooks { aligned_alloc: arena_aligned_alloc, free: arena_free },
        ..DEFAULT_HOOKS
    }
}

/// A runtime tracking the shared arena.
pub fn arena_runtime() -> Runtime {
    Runtime::new(arena_hooks(), arena_base(), ARENA_LEN).expect("failed to create test runtime")
}

/// A runtime whose tracked heap starts at address zero and extends over the
/// arena, making the null-page and heap-base paths reachable.
pub fn null_based_runtime() -> Runtime {
    Runtime::new(arena_hooks(), 0, arena_base() + ARENA_LEN)
        .expect("failed to create null-based test runtime")
}

// A block outside every tracked heap, for exercising the alloc-oob path.
static OUTSIDE_BLOCK: Arena<64> = Arena(UnsafeCell::new([0; 64]));

unsafe extern "C" fn outside_aligned_alloc(_align: usize, _size: usize) -> *mut c_void {
    OUTSIDE_BLOCK.0.get().cast::<c_void>()
}

/// A runtime over the shared arena whose backing allocator misbehaves by
/// returning memory outside the tracked heap.
pub fn oob_runtime() -> Runtime {
    let hooks = NxsanHooks {
        alloc: NxsanAllocHooks { aligned_alloc: outside_aligned_alloc, free: arena_free },
        ..DEFAULT_HOOKS
    };
    Runtime::new(hooks, arena_base(), ARENA_LEN).expect("failed to create oob test runtime")
}

// A private arena for the single test that asserts on physical adjacency of
// successive allocations; the shared arena interleaves under parallel tests.
const EXCLUSIVE_LEN: usize = 1 << 12;
static EXCLUSIVE_ARENA: Arena<EXCLUSIVE_LEN> = Arena(UnsafeCell::new([0; EXCLUSIVE_LEN]));
static EXCLUSIVE_CURSOR: AtomicUsize = AtomicUsize::new(GRANULE_BYTES);

unsafe extern "C" fn exclusive_aligned_alloc(_align: usize, size: usize) -> *mut c_void {
    if size == 0 || size > EXCLUSIVE_LEN {
        return core::ptr::null_mut();
    }
    let step = (size + GRANULE_BYTES - 1) & !(GRANULE_BYTES - 1);
    let offset = EXCLUSIVE_CURSOR.fetch_add(step, Ordering::SeqCst);
    if offset + step > EXCLUSIVE_LEN {
        return core::ptr::null_mut();
    }
    (EXCLUSIVE_ARENA.0.get() as usize + offset) as *mut c_void
}

/// A runtime over a dedicated arena with strictly contiguous allocations.
/// Only one test may use it.
pub fn exclusive_runtime() -> Runtime {
    let hooks = NxsanHooks {
        alloc: NxsanAllocHooks { aligned_alloc: exclusive_aligned_alloc, free: arena_free },
        ..DEFAULT_HOOKS
    };
    Runtime::new(hooks, EXCLUSIVE_ARENA.0.get() as usize, EXCLUSIVE_LEN)
        .expect("failed to create exclusive test runtime")
}
