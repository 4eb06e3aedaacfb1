//! Allocation wrapper that feeds memory instruments.

use std::alloc::{GlobalAlloc, Layout};
use std::cell::{Cell, OnceCell};
use std::fmt;
use std::sync::atomic::{self, AtomicI64, AtomicU64};
use std::sync::{Arc, LazyLock, Mutex};

use crate::ERR_POISONED_LOCK;

/// Bytes currently allocated and the highest value they reached since the last restart.
///
/// The current value can go negative for a single thread that frees memory allocated by
/// another thread.
#[derive(Debug)]
struct LiveBytes {
    current: AtomicI64,
    peak: AtomicI64,
}

impl LiveBytes {
    #[inline]
    const fn new() -> Self {
        Self {
            current: AtomicI64::new(0),
            peak: AtomicI64::new(0),
        }
    }

    #[inline]
    fn grow(&self, bytes: i64) {
        let current = self
            .current
            .fetch_add(bytes, atomic::Ordering::Relaxed)
            .wrapping_add(bytes);
        self.peak.fetch_max(current, atomic::Ordering::Relaxed);
    }

    #[inline]
    fn shrink(&self, bytes: i64) {
        self.current.fetch_sub(bytes, atomic::Ordering::Relaxed);
    }

    /// Returns the current value and the peak. With `restart_peak`, the peak starts over
    /// from the current value for the next reading.
    #[inline]
    fn read(&self, restart_peak: bool) -> (i64, i64) {
        let current = self.current.load(atomic::Ordering::Relaxed);

        let peak = if restart_peak {
            self.peak.swap(current, atomic::Ordering::Relaxed)
        } else {
            self.peak.load(atomic::Ordering::Relaxed)
        };

        (current, peak.max(current))
    }
}

// Live bytes of the whole process. The only shared state touched on each allocation, as
// a process-wide peak cannot be derived from per-thread peaks.
static PROCESS_LIVE: LiveBytes = LiveBytes::new();

/// Apart from `PROCESS_LIVE`, only the per-thread counters are updated on each
/// allocation. A global registry of all counters (including those of threads that have
/// since exited) allows summation for process-wide readings.
#[derive(Debug)]
pub(crate) struct PerThreadCounters {
    allocated: AtomicU64,
    freed: AtomicU64,
    live: LiveBytes,
}

impl PerThreadCounters {
    #[inline]
    const fn new() -> Self {
        Self {
            allocated: AtomicU64::new(0),
            freed: AtomicU64::new(0),
            live: LiveBytes::new(),
        }
    }

    #[inline]
    fn register_allocation(&self, bytes: u64) {
        // Relaxed is sufficient: we only need atomicity, not ordering w.r.t. other memory ops.
        self.allocated.fetch_add(bytes, atomic::Ordering::Relaxed);

        let signed = signed_size(bytes);
        self.live.grow(signed);
        PROCESS_LIVE.grow(signed);
    }

    #[inline]
    fn register_deallocation(&self, bytes: u64) {
        self.freed.fetch_add(bytes, atomic::Ordering::Relaxed);

        let signed = signed_size(bytes);
        self.live.shrink(signed);
        PROCESS_LIVE.shrink(signed);
    }

    #[inline]
    fn totals(&self, restart_peak: bool) -> AllocationTotals {
        let (live, peak) = self.live.read(restart_peak);

        AllocationTotals {
            allocated: self.allocated.load(atomic::Ordering::Relaxed),
            freed: self.freed.load(atomic::Ordering::Relaxed),
            live,
            peak,
        }
    }
}

#[inline]
fn signed_size(bytes: u64) -> i64 {
    i64::try_from(bytes).expect("allocation sizes never exceed isize::MAX")
}

// Holds Arc references so counters outlive their threads.
static REGISTRY: LazyLock<Mutex<Vec<Arc<PerThreadCounters>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

thread_local! {
    // A raw pointer instead of an Arc, so that no Drop logic runs during TLS teardown while
    // the global allocator is still active. The Arc lives in REGISTRY, which is never
    // cleared, so the pointee outlives every thread.
    static TLS_COUNTER_PTR: OnceCell<*const PerThreadCounters> = const { OnceCell::new() };

    // Set while this thread's counters are being created. Creating them allocates, and
    // recording those allocations would recurse into the allocator.
    static TLS_INIT_GUARD: Cell<bool> = const { Cell::new(false) };
}

#[inline]
fn thread_counters() -> &'static PerThreadCounters {
    TLS_COUNTER_PTR.with(|cell| {
        if let Some(ptr) = cell.get() {
            // SAFETY: pointer originates from an Arc stored in REGISTRY, which retains
            // ownership for the program lifetime.
            return unsafe { &**ptr };
        }

        TLS_INIT_GUARD.set(true);

        let arc = Arc::new(PerThreadCounters::new());
        let ptr = Arc::as_ptr(&arc);
        REGISTRY.lock().expect(ERR_POISONED_LOCK).push(arc);
        _ = cell.set(ptr);

        TLS_INIT_GUARD.set(false);

        // SAFETY: pointer obtained from Arc::as_ptr for an Arc stored in REGISTRY; the
        // lifetime extends for the program duration.
        unsafe { &*ptr }
    })
}

/// Allocation counters at one point in time.
///
/// The allocated and freed counters only ever grow (modulo wrapping after 2^64 bytes), so
/// the difference between two readings is the activity in between. Live bytes and their
/// peak are absolute levels instead.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AllocationTotals {
    allocated: u64,
    freed: u64,
    live: i64,
    peak: i64,
}

impl AllocationTotals {
    /// Creates totals from raw counter values, with no live bytes.
    #[must_use]
    pub const fn new(allocated: u64, freed: u64) -> Self {
        Self {
            allocated,
            freed,
            live: 0,
            peak: 0,
        }
    }

    /// Replaces the live bytes and their peak.
    #[must_use]
    pub const fn with_live(self, live: i64, peak: i64) -> Self {
        Self { live, peak, ..self }
    }

    /// Total bytes ever allocated.
    #[must_use]
    pub const fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Total bytes ever freed.
    #[must_use]
    pub const fn freed(&self) -> u64 {
        self.freed
    }

    /// Bytes allocated and not yet freed.
    #[must_use]
    pub const fn live(&self) -> i64 {
        self.live
    }

    /// The highest value of [`live()`](Self::live) since the peak was last restarted.
    #[must_use]
    pub const fn peak(&self) -> i64 {
        self.peak
    }
}

/// Sums the counters of every thread that has ever allocated through [`Allocator`].
///
/// With `restart_peak`, the process-wide peak starts over from the current live bytes.
pub(crate) fn process_totals(restart_peak: bool) -> AllocationTotals {
    let registry = REGISTRY.lock().expect(ERR_POISONED_LOCK);

    let (live, peak) = PROCESS_LIVE.read(restart_peak);

    registry
        .iter()
        .map(|counters| counters.totals(false))
        .fold(AllocationTotals::default(), |sum, totals| {
            AllocationTotals::new(
                sum.allocated.wrapping_add(totals.allocated),
                sum.freed.wrapping_add(totals.freed),
            )
        })
        .with_live(live, peak)
}

/// The counters of the current thread.
///
/// With `restart_peak`, the thread's peak starts over from its current live bytes.
pub(crate) fn thread_totals(restart_peak: bool) -> AllocationTotals {
    thread_counters().totals(restart_peak)
}

fn track(size: usize, register: impl FnOnce(&PerThreadCounters, u64)) {
    let size: u64 = size.try_into().expect("usize always fits into u64");

    if TLS_INIT_GUARD.get() {
        // Allocations made while creating the counters themselves are not recorded.
        return;
    }

    register(thread_counters(), size);
}

// Test helper for unit tests, which do not hook the global allocator.
#[cfg(test)]
pub(crate) fn register_fake_allocation(allocated: u64, freed: u64) {
    let counters = thread_counters();
    counters.register_allocation(allocated);
    counters.register_deallocation(freed);
}

/// A memory allocator that counts allocations and deallocations for
/// [`AllocationMeter`](crate::AllocationMeter).
///
/// This allocator wraps any [`GlobalAlloc`] implementation, delegating the actual work to
/// it. Memory instruments read zero unless this allocator is installed as the global
/// allocator.
///
/// # Examples
///
/// ```rust
/// use time_and_space::Allocator;
///
/// #[global_allocator]
/// static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
/// ```
pub struct Allocator<A: GlobalAlloc> {
    inner: A,
}

impl<A: GlobalAlloc> fmt::Debug for Allocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("inner", &"<allocator>")
            .finish()
    }
}

impl Allocator<std::alloc::System> {
    /// Creates a new tracking allocator using the system's default allocator.
    #[must_use]
    #[inline]
    pub const fn system() -> Self {
        Self {
            inner: std::alloc::System,
        }
    }
}

impl<A: GlobalAlloc> Allocator<A> {
    /// Creates a new tracking allocator that delegates to the provided allocator.
    #[must_use]
    #[inline]
    pub const fn new(allocator: A) -> Self {
        Self { inner: allocator }
    }
}

// SAFETY: We delegate all allocation operations to the underlying allocator,
// which already implements GlobalAlloc safely, while adding tracking functionality.
unsafe impl<A: GlobalAlloc> GlobalAlloc for Allocator<A> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        track(layout.size(), PerThreadCounters::register_allocation);

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.alloc(layout) }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        track(layout.size(), PerThreadCounters::register_deallocation);

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        track(layout.size(), PerThreadCounters::register_allocation);

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.alloc_zeroed(layout) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        track(layout.size(), PerThreadCounters::register_deallocation);
        track(new_size, PerThreadCounters::register_allocation);

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.realloc(ptr, layout, new_size) }
    }
}
