//! Register access and FIFO accessors.

use crate::error::Error;
use crate::register::{self, Channel, Register, Response};
use crate::transport::Transport;

/// Depth of each hardware FIFO. A fill level above this is never real.
pub const MAX_FIFO_LEVEL: u8 = 128;

/// [`Register::Isr`] bit set while the RX FIFO holds data.
pub const ISR_RX_DATA: u8 = 0x40;

/// [`Register::Lsr`] bit set once the receiver has been idle for the
/// configured timeout.
pub const LSR_RX_TIMEOUT: u8 = 0x01;

/// A MAX3109 dual UART behind a [`Transport`].
///
/// Every method that takes a channel accepts anything convertible to
/// [`Channel`], including raw `u8` port indices and raw `u16` command word
/// fields. Selectors that name neither port are rejected with
/// [`Error::InvalidChannel`] before anything is put on the wire.
///
/// Each register access is exactly one transaction. Nothing is cached and
/// writes are not verified, except by [`Max3109::initialize`].
pub struct Max3109<T> {
    transport: T,
}

#[inline]
fn validate<C: TryInto<Channel>, E>(channel: C) -> Result<Channel, Error<E>> {
    channel.try_into().map_err(|_| Error::InvalidChannel)
}

impl<T: Transport> Max3109<T> {
    /// Creates a driver. Nothing is sent until the first operation.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the transport.
    pub fn release(self) -> T {
        self.transport
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[inline]
    pub(crate) fn write(
        &mut self,
        channel: Channel,
        register: Register,
        value: u8,
    ) -> Result<(), Error<T::Error>> {
        let word = register::encode_write(channel, register, value);
        self.transport.transact(word).map_err(Error::Transport)?;
        Ok(())
    }

    #[inline]
    pub(crate) fn read(
        &mut self,
        channel: Channel,
        register: Register,
    ) -> Result<u8, Error<T::Error>> {
        let word = register::encode_read(channel, register);
        let response = self.transport.transact(word).map_err(Error::Transport)?;
        Ok(Response(response).value())
    }

    /// Writes `value` to `register` on `channel`.
    pub fn write_register<C: TryInto<Channel>>(
        &mut self,
        channel: C,
        register: Register,
        value: u8,
    ) -> Result<(), Error<T::Error>> {
        let channel = validate(channel)?;
        self.write(channel, register, value)
    }

    /// Reads `register` on `channel`.
    pub fn read_register<C: TryInto<Channel>>(
        &mut self,
        channel: C,
        register: Register,
    ) -> Result<u8, Error<T::Error>> {
        let channel = validate(channel)?;
        self.read(channel, register)
    }

    /// Pops one byte from the RX FIFO of `channel`.
    ///
    /// The FIFO is not checked for emptiness. Reading an empty FIFO returns
    /// whatever the hold register last contained, so callers should consult
    /// [`fifo_level`](Self::fifo_level) or
    /// [`is_receive_ready`](Self::is_receive_ready) first.
    pub fn pop_byte<C: TryInto<Channel>>(&mut self, channel: C) -> Result<u8, Error<T::Error>> {
        let channel = validate(channel)?;
        self.read(channel, Register::Thr)
    }

    /// Pushes one byte to the TX FIFO of `channel`.
    pub fn push_byte<C: TryInto<Channel>>(
        &mut self,
        channel: C,
        value: u8,
    ) -> Result<(), Error<T::Error>> {
        let channel = validate(channel)?;
        self.write(channel, Register::Thr, value)
    }

    /// Reads the TX or RX FIFO fill level of `channel`.
    ///
    /// `which` must be [`Register::TxFifoLvl`] or [`Register::RxFifoLvl`].
    /// A level above [`MAX_FIFO_LEVEL`] is reported as
    /// [`Error::Communication`].
    pub fn fifo_level<C: TryInto<Channel>>(
        &mut self,
        channel: C,
        which: Register,
    ) -> Result<u8, Error<T::Error>> {
        let channel = validate(channel)?;
        if !which.is_fifo_level() {
            return Err(Error::InvalidRegisterSelector(which));
        }

        let level = self.read(channel, which)?;
        if level > MAX_FIFO_LEVEL {
            warn!("{} {} reads {}, link corrupt", channel, which, level);
            return Err(Error::Communication { level });
        }
        Ok(level)
    }

    /// Is it safe to drain the RX FIFO of `channel`?
    ///
    /// True only when the FIFO holds data *and* the receiver has timed out, so
    /// no byte is still being shifted in. Both status registers are read on
    /// every call. The data bit in [`Register::Isr`] clears on read, so a second
    /// call while data keeps streaming in can report `false`.
    ///
    /// An invalid channel is reported as [`Error::InvalidChannel`] rather than
    /// as `false`, with no register read, so it cannot be mistaken for an idle
    /// port.
    pub fn is_receive_ready<C: TryInto<Channel>>(
        &mut self,
        channel: C,
    ) -> Result<bool, Error<T::Error>> {
        let channel = validate(channel)?;
        let has_data = self.read(channel, Register::Isr)? & ISR_RX_DATA != 0;
        let timed_out = self.read(channel, Register::Lsr)? & LSR_RX_TIMEOUT != 0;
        trace!("{} rx data {}, rx timeout {}", channel, has_data, timed_out);
        Ok(has_data && timed_out)
    }
}
