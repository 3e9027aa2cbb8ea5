//! Raw byte output on UART0 of the LM3S6965 (QEMU only).
//!
//! Examples forward bytes the simulated bridge received here, so xtask can
//! compare the serial capture against an expected file. QEMU maps the first
//! `-serial` argument to UART0.

use core::ptr::{with_exposed_provenance, with_exposed_provenance_mut};

const UART0_BASE: usize = 0x4000_C000;

const UART_DR: usize = 0x000; // Data Register
const UART_FR: usize = 0x018; // Flag Register
const UART_FR_TXFF: u32 = 0x20; // Transmit FIFO Full

/// Writes `bytes` to UART0, waiting for FIFO space as needed.
pub fn write_bytes(bytes: &[u8]) {
    let dr = with_exposed_provenance_mut::<u32>(UART0_BASE + UART_DR);
    let fr = with_exposed_provenance::<u32>(UART0_BASE + UART_FR);
    for &byte in bytes {
        // SAFETY: Fixed MMIO addresses of the LM3S6965 UART0 block.
        unsafe {
            while fr.read_volatile() & UART_FR_TXFF != 0 {}
            dr.write_volatile(u32::from(byte));
        }
    }
}
