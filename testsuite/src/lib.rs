#![no_std]

mod logger;
pub mod uart;

use cortex_m_semihosting::debug::{self, EXIT_FAILURE, EXIT_SUCCESS};

pub use cortex_m_rt::entry;

/// Configuration the examples bring the simulated bridge up with.
pub const CONFIG: max3109::Config = max3109::Config {
    pll: 0x06,
    clock_source: 0x18,
    line_control: 0x03,
};

pub fn exit_success() -> ! {
    debug::exit(EXIT_SUCCESS);
    #[allow(clippy::empty_loop)]
    loop {}
}

pub fn exit_failure() -> ! {
    debug::exit(EXIT_FAILURE);
    #[allow(clippy::empty_loop)]
    loop {}
}

/// Exits with failure, logging `what`, unless `ok` holds.
pub fn check(ok: bool, what: &str) {
    if !ok {
        defmt::error!("check failed: {=str}", what);
        exit_failure();
    }
}

/// Unwraps a driver result, exiting with failure on error.
pub fn expect_ok<T, E: core::fmt::Debug>(result: Result<T, max3109::Error<E>>, what: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            defmt::error!("{=str}: {}", what, defmt::Display2Format(&e));
            exit_failure();
        }
    }
}
