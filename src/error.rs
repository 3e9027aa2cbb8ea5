use core::fmt;

use crate::register::{Channel, InvalidChannel, Register};

/// Errors returned by bridge operations.
///
/// `E` is the error type of the [`Transport`](crate::Transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The channel selector does not name either port. No transaction was
    /// issued.
    InvalidChannel,
    /// A fill level was requested from a register other than
    /// [`Register::TxFifoLvl`] or [`Register::RxFifoLvl`]. No transaction was
    /// issued.
    InvalidRegisterSelector(Register),
    /// The chip reported a FIFO fill level above
    /// [`MAX_FIFO_LEVEL`](crate::MAX_FIFO_LEVEL). The link is assumed corrupt.
    Communication {
        /// The level that was read back.
        level: u8,
    },
    /// A verification phase of the startup sequence exhausted its attempts.
    Initialization(InitFailure),
    /// The transaction primitive failed.
    Transport(E),
}

impl<E> From<InvalidChannel> for Error<E> {
    fn from(_: InvalidChannel) -> Self {
        Error::InvalidChannel
    }
}

impl<E> From<InitFailure> for Error<E> {
    fn from(f: InitFailure) -> Self {
        Error::Initialization(f)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidChannel => f.write_str("invalid channel selector"),
            Error::InvalidRegisterSelector(r) => write!(f, "{r} is not a FIFO level register"),
            Error::Communication { level } => {
                write!(f, "FIFO level {level} out of range, link corrupt")
            }
            Error::Initialization(failure) => write!(f, "initialization failed: {failure}"),
            Error::Transport(e) => write!(f, "transport error: {e:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}

/// Startup phase that can fail verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitPhase {
    /// Power-on default values did not read back.
    KnownValueReadback,
    /// The written configuration did not read back.
    ConfigureAndVerify,
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitPhase::KnownValueReadback => "known value readback",
            InitPhase::ConfigureAndVerify => "configure and verify",
        })
    }
}

/// A single failed readback check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mismatch {
    /// Channel the register was read through.
    pub channel: Channel,
    /// Register that was read.
    pub register: Register,
    /// Value the check expected, after masking.
    pub expected: u8,
    /// Value read back, after masking.
    pub observed: u8,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: expected {:#04x}, read {:#04x}",
            self.channel, self.register, self.expected, self.observed
        )
    }
}

/// Why the startup sequence gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitFailure {
    /// Phase that ran out of attempts. Later phases did not run.
    pub phase: InitPhase,
    /// Attempts made in that phase.
    pub attempts: u8,
    /// First failed check of the last attempt that completed. `None` if
    /// every attempt of the phase was cut short by a transport error.
    pub cause: Option<Mismatch>,
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed after {} attempts", self.phase, self.attempts)?;
        match &self.cause {
            Some(cause) => write!(f, " ({})", cause),
            None => f.write_str(" (transport errors)"),
        }
    }
}

/// Queue construction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// The backing storage has no room for a single element.
    ZeroCapacity,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::ZeroCapacity => f.write_str("queue storage is empty"),
        }
    }
}
