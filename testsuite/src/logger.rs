//! defmt global logger writing frames to semihosting stdout.
//!
//! xtask decodes whatever QEMU prints on stdout with the ELF's defmt table.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering, compiler_fence};

use cortex_m_semihosting::hio::{self, HostStream};
use critical_section::RestoreState;
use defmt::Encoder;

#[defmt::global_logger]
struct Logger;

struct LoggerState {
    stdout: UnsafeCell<Option<HostStream>>,
    cs_state: UnsafeCell<RestoreState>,
    encoder: UnsafeCell<Encoder>,
    /// 0 = idle, 1 = logging, 2+ = a nested log from a fault or panic handler,
    /// which is dropped.
    depth: AtomicUsize,
}

// SAFETY: Every field but `depth` is only touched between `acquire` and
// `release`, which hold a critical section. `depth` is atomic.
unsafe impl Sync for LoggerState {}

static STATE: LoggerState = LoggerState {
    stdout: UnsafeCell::new(None),
    cs_state: UnsafeCell::new(RestoreState::invalid()),
    encoder: UnsafeCell::new(Encoder::new()),
    depth: AtomicUsize::new(0),
};

/// # Safety
///
/// Must be called from within a critical section.
unsafe fn write_stdout(bytes: &[u8]) {
    // SAFETY: Caller guarantees we're in a critical section.
    let handle = unsafe { &mut *STATE.stdout.get() };

    // Open once; reopening would truncate what was already written.
    if handle.is_none() {
        *handle = hio::hstdout().ok();
    }
    if let Some(stdout) = handle {
        let _ = stdout.write_all(bytes);
    }
}

// SAFETY: `acquire` enters a critical section that `release` leaves, and all
// shared state is accessed in between.
unsafe impl defmt::Logger for Logger {
    fn acquire() {
        if STATE.depth.fetch_add(1, Ordering::Acquire) > 0 {
            return;
        }

        // SAFETY: defmt balances every acquire with a release.
        let restore = unsafe { critical_section::acquire() };
        compiler_fence(Ordering::SeqCst);

        // SAFETY: We're in the critical section.
        unsafe {
            STATE.cs_state.get().write(restore);
            (*STATE.encoder.get()).start_frame(|b| write_stdout(b));
        }
    }

    unsafe fn flush() {}

    unsafe fn release() {
        if STATE.depth.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }

        // SAFETY: Still inside the critical section taken in `acquire`.
        unsafe {
            (*STATE.encoder.get()).end_frame(|b| write_stdout(b));
            compiler_fence(Ordering::SeqCst);
            critical_section::release(STATE.cs_state.get().read());
        }
        compiler_fence(Ordering::SeqCst);
    }

    unsafe fn write(bytes: &[u8]) {
        if STATE.depth.load(Ordering::Relaxed) != 1 {
            return;
        }

        // SAFETY: defmt only calls this between acquire and release.
        unsafe { (*STATE.encoder.get()).write(bytes, |b| write_stdout(b)) };
    }
}
