use core::ffi::c_void;

use libc::off_t;

pub static NXSAN_PROT_FLAGS: i32 = libc::PROT_READ | libc::PROT_WRITE;
pub static NXSAN_MAP_FLAGS: i32 = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;

pub type AlignedAlloc = unsafe extern "C" fn(usize, usize) -> *mut c_void;
pub type Free = unsafe extern "C" fn(*mut c_void);
pub type MMap = unsafe extern "C" fn(*mut c_void, usize, i32, i32, i32, off_t) -> *mut c_void;
pub type MUnmap = unsafe extern "C" fn(*mut c_void, usize) -> i32;
pub type Abort = unsafe extern "C" fn() -> !;

/// The set of platform entry points the runtime is allowed to call: aligned
/// allocation for user memory, anonymous mappings for the shadow table, and
/// the abort used by the error reporter.
///
/// Embedders may substitute their own table through `init_runtime`. The
/// allocation hooks must place allocations inside the tracked heap region;
/// the runtime cannot tag memory it does not shadow.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NxsanHooks {
    pub alloc: NxsanAllocHooks,
    pub mmap_ptr: MMap,
    pub munmap_ptr: MUnmap,
    pub abort: Abort,
}

/// Allocation entry points backing `__nxsan_malloc` and `__nxsan_free`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NxsanAllocHooks {
    pub aligned_alloc: AlignedAlloc,
    pub free: Free,
}

unsafe extern "C" fn default_abort() -> ! {
    unsafe { libc::abort() }
}

pub static DEFAULT_HOOKS: NxsanHooks = NxsanHooks {
    alloc: NxsanAllocHooks { aligned_alloc: libc::aligned_alloc, free: libc::free },
    mmap_ptr: libc::mmap,
    munmap_ptr: libc::munmap,
    abort: default_abort,
};
