//! Moving bytes between the hardware FIFOs and software buffers.

use crate::bridge::Max3109;
use crate::error::Error;
use crate::queue::{CircularQueue, SharedQueue};
use crate::register::{Channel, Register};
use crate::transport::Transport;

/// The byte buffer contract the transfer functions rely on.
pub trait ByteBuffer {
    /// Appends `byte`. Returns `false` if there was no room.
    fn push(&mut self, byte: u8) -> bool;

    /// The byte `offset` places behind the oldest one, if staged.
    fn peek(&self, offset: usize) -> Option<u8>;

    /// Discards up to `n` of the oldest bytes.
    fn advance_tail(&mut self, n: usize);

    /// Number of staged bytes.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is staged.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteBuffer for CircularQueue<'_, u8> {
    fn push(&mut self, byte: u8) -> bool {
        CircularQueue::push(self, byte).is_ok()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        CircularQueue::peek(self, offset)
    }

    fn advance_tail(&mut self, n: usize) {
        self.advance(n);
    }

    fn len(&self) -> usize {
        CircularQueue::len(self)
    }
}

impl ByteBuffer for &SharedQueue<'_, u8> {
    fn push(&mut self, byte: u8) -> bool {
        SharedQueue::push(self, byte).is_ok()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        SharedQueue::peek(self, offset)
    }

    fn advance_tail(&mut self, n: usize) {
        self.with(|q| q.advance(n));
    }

    fn len(&self) -> usize {
        SharedQueue::len(self)
    }
}

impl<B: ByteBuffer + ?Sized> ByteBuffer for &mut B {
    fn push(&mut self, byte: u8) -> bool {
        B::push(self, byte)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        B::peek(self, offset)
    }

    fn advance_tail(&mut self, n: usize) {
        B::advance_tail(self, n)
    }

    fn len(&self) -> usize {
        B::len(self)
    }
}

/// One UART channel and the buffers that feed it.
pub struct UartPort<B> {
    channel: Channel,
    rx: B,
    tx: B,
}

impl<B: ByteBuffer> UartPort<B> {
    /// Binds receive and transmit buffers to `channel`.
    pub const fn new(channel: Channel, rx: B, tx: B) -> Self {
        Self { channel, rx, tx }
    }

    /// The channel this port drives.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Bytes received and not yet consumed.
    pub fn rx(&mut self) -> &mut B {
        &mut self.rx
    }

    /// Bytes waiting to be sent.
    pub fn tx(&mut self) -> &mut B {
        &mut self.tx
    }

    /// Returns the receive and transmit buffers.
    pub fn into_buffers(self) -> (B, B) {
        (self.rx, self.tx)
    }

    /// Drains the RX FIFO into the receive buffer.
    ///
    /// Reads the fill level once and pops exactly that many bytes. Bytes the
    /// receive buffer has no room for are dropped. Returns the number of
    /// bytes stored.
    pub fn receive<T: Transport>(
        &mut self,
        bridge: &mut Max3109<T>,
    ) -> Result<usize, Error<T::Error>> {
        let level = bridge.fifo_level(self.channel, Register::RxFifoLvl)?;
        if level == 0 {
            return Ok(0);
        }

        let mut stored = 0;
        for _ in 0..level {
            let byte = bridge.pop_byte(self.channel)?;
            if self.rx.push(byte) {
                stored += 1;
            }
        }

        let dropped = usize::from(level) - stored;
        if dropped > 0 {
            warn!("{} receive buffer full, dropped {} bytes", self.channel, dropped);
        }
        trace!("{} received {} bytes", self.channel, stored);
        Ok(stored)
    }

    /// Sends up to `n` bytes from the transmit buffer to the TX FIFO.
    ///
    /// Bytes are released from the transmit buffer only once they have been
    /// pushed, including when a transport error cuts the transfer short.
    /// The FIFO level is not consulted; keep `n` within the free space of the
    /// TX FIFO.
    pub fn transmit<T: Transport>(
        &mut self,
        bridge: &mut Max3109<T>,
        n: usize,
    ) -> Result<usize, Error<T::Error>> {
        let n = n.min(self.tx.len());
        let mut sent = 0;
        while sent < n {
            let Some(byte) = self.tx.peek(sent) else {
                break;
            };
            if let Err(e) = bridge.push_byte(self.channel, byte) {
                self.tx.advance_tail(sent);
                return Err(e);
            }
            sent += 1;
        }
        self.tx.advance_tail(sent);
        trace!("{} sent {} bytes", self.channel, sent);
        Ok(sent)
    }
}

/// A port per channel.
pub struct UartPorts<B> {
    /// UART 0.
    pub primary: UartPort<B>,
    /// UART 1.
    pub secondary: UartPort<B>,
}

impl<B: ByteBuffer> UartPorts<B> {
    /// Groups the two ports.
    pub const fn new(primary: UartPort<B>, secondary: UartPort<B>) -> Self {
        Self { primary, secondary }
    }

    /// The port driving `channel`.
    pub fn port(&mut self, channel: Channel) -> &mut UartPort<B> {
        match channel {
            Channel::Primary => &mut self.primary,
            Channel::Secondary => &mut self.secondary,
        }
    }

    /// Drains both RX FIFOs, returning bytes stored per channel.
    pub fn receive_all<T: Transport>(
        &mut self,
        bridge: &mut Max3109<T>,
    ) -> Result<[usize; 2], Error<T::Error>> {
        Ok([
            self.primary.receive(bridge)?,
            self.secondary.receive(bridge)?,
        ])
    }
}
