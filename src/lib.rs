#![no_std]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod bridge;
mod error;
pub mod init;
mod queue;
pub mod register;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod transport;
pub mod uart;

pub use bridge::{ISR_RX_DATA, LSR_RX_TIMEOUT, MAX_FIFO_LEVEL, Max3109};
pub use error::{Error, InitFailure, InitPhase, Mismatch, QueueError};
pub use init::{Config, INIT_ATTEMPTS, InitState, Progress, Sequencer};
pub use queue::{CircularQueue, SharedQueue};
pub use register::{Channel, InvalidChannel, Register, Response};
pub use transport::{SpiTransport, Transport};
pub use uart::{ByteBuffer, UartPort, UartPorts};
