//! A software model of the MAX3109, for tests.
//!
//! Models enough of the chip for the driver to be exercised end to end: a
//! register file per channel with power-on defaults, the `MODE2` reset bit,
//! shared global registers, 128-byte TX and RX FIFOs, the clear-on-read RX data
//! bit in `ISR` and the RX timeout bit in `LSR`. Faults can be injected to
//! imitate a marginal link.

use core::convert::Infallible;

use crate::bridge::{ISR_RX_DATA, LSR_RX_TIMEOUT, MAX_FIFO_LEVEL};
use crate::init::{CLOCK_SOURCE_MASK, MODE2_RESET};
use crate::register::{Channel, Register};
use crate::transport::Transport;

const FIFO_DEPTH: usize = MAX_FIFO_LEVEL as usize;
const REGISTERS: usize = 32;

const fn power_on_defaults() -> [u8; REGISTERS] {
    let mut r = [0; REGISTERS];
    r[Register::Lcr as usize] = 0x05;
    r[Register::PllConfig as usize] = 0x01;
    r[Register::DivLsb as usize] = 0x01;
    r[Register::ClkSource as usize] = 0x08;
    r
}

const DEFAULTS: [u8; REGISTERS] = power_on_defaults();

struct Fifo {
    buf: [u8; FIFO_DEPTH],
    head: usize,
    len: usize,
}

impl Fifo {
    const fn new() -> Self {
        Self {
            buf: [0; FIFO_DEPTH],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) -> bool {
        if self.len == FIFO_DEPTH {
            return false;
        }
        self.buf[(self.head + self.len) % FIFO_DEPTH] = byte;
        self.len += 1;
        true
    }

    fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % FIFO_DEPTH;
        self.len -= 1;
        Some(byte)
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

/// Simulated bridge implementing [`Transport`].
pub struct SimulatedBridge {
    regs: [[u8; REGISTERS]; 2],
    writes: [[u32; REGISTERS]; 2],
    stuck: [u32; 2],
    tx: [Fifo; 2],
    rx: [Fifo; 2],
    last_rx: [u8; 2],
    rx_data: [bool; 2],
    rx_timeout: [bool; 2],
    forced_level: [[Option<u8>; 2]; 2],
    loopback: bool,
    corrupt_reads: u32,
    transactions: usize,
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBridge {
    /// A chip in its power-on state.
    pub const fn new() -> Self {
        Self {
            regs: [DEFAULTS; 2],
            writes: [[0; REGISTERS]; 2],
            stuck: [0; 2],
            tx: [Fifo::new(), Fifo::new()],
            rx: [Fifo::new(), Fifo::new()],
            last_rx: [0; 2],
            rx_data: [false; 2],
            rx_timeout: [false; 2],
            forced_level: [[None; 2]; 2],
            loopback: false,
            corrupt_reads: 0,
            transactions: 0,
        }
    }

    /// Transactions seen so far.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    /// Register contents as the chip holds them, without read side effects.
    pub fn register(&self, channel: Channel, register: Register) -> u8 {
        self.regs[Self::slot(channel, register)][register as usize]
    }

    /// Write commands addressed to `register` through `channel`, including
    /// ignored ones.
    pub fn writes(&self, channel: Channel, register: Register) -> u32 {
        self.writes[channel.index()][register as usize]
    }

    /// Bytes arriving on the receive line of `channel`. Bytes beyond the FIFO
    /// depth are lost, as on the real chip.
    pub fn receive(&mut self, channel: Channel, bytes: &[u8]) {
        let ch = channel.index();
        for &b in bytes {
            self.rx[ch].push(b);
        }
        if !bytes.is_empty() {
            self.rx_data[ch] = true;
        }
    }

    /// Moves transmitted bytes of `channel` into `out`, returning how many.
    pub fn take_transmitted(&mut self, channel: Channel, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.tx[channel.index()].pop() {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Sets the receiver timeout status of `channel`.
    pub fn set_rx_timeout(&mut self, channel: Channel, timed_out: bool) {
        self.rx_timeout[channel.index()] = timed_out;
    }

    /// Routes each channel's transmitter straight into its own receiver.
    pub fn set_loopback(&mut self, enabled: bool) {
        self.loopback = enabled;
    }

    /// Makes a FIFO level register report `level` instead of the real count.
    /// `None` restores the real count.
    pub fn force_level(&mut self, channel: Channel, register: Register, level: Option<u8>) {
        let which = match register {
            Register::TxFifoLvl => 0,
            Register::RxFifoLvl => 1,
            _ => return,
        };
        self.forced_level[channel.index()][which] = level;
    }

    /// Silently ignores every future write to `register` through `channel`.
    pub fn stick(&mut self, channel: Channel, register: Register) {
        self.stuck[channel.index()] |= 1 << register.addr();
    }

    /// The next `n` reads return zero, whatever the register holds.
    pub fn corrupt_next_reads(&mut self, n: u32) {
        self.corrupt_reads = n;
    }

    /// Global registers live in the primary channel's register file.
    fn slot(channel: Channel, register: Register) -> usize {
        if register.is_global() {
            0
        } else {
            channel.index()
        }
    }

    fn reset(&mut self) {
        self.regs = [DEFAULTS; 2];
        for ch in 0..2 {
            self.tx[ch].clear();
            self.rx[ch].clear();
            self.rx_data[ch] = false;
        }
    }

    fn write(&mut self, channel: Channel, register: Register, value: u8) {
        let ch = channel.index();
        self.writes[ch][register as usize] += 1;
        if self.stuck[ch] & (1 << register.addr()) != 0 {
            return;
        }
        if register.is_global() && channel != Channel::Primary {
            return;
        }

        match register {
            Register::Thr if self.loopback => {
                self.rx[ch].push(value);
                self.rx_data[ch] = true;
            }
            Register::Thr => {
                self.tx[ch].push(value);
            }
            Register::Mode2 if value & MODE2_RESET != 0 => {
                self.reset();
                self.regs[ch][register as usize] = value;
            }
            Register::ClkSource => {
                self.regs[0][register as usize] = value & CLOCK_SOURCE_MASK;
            }
            _ => self.regs[Self::slot(channel, register)][register as usize] = value,
        }
    }

    fn read(&mut self, channel: Channel, register: Register) -> u8 {
        let ch = channel.index();
        if self.corrupt_reads > 0 {
            self.corrupt_reads -= 1;
            return 0;
        }

        match register {
            Register::Thr => {
                if let Some(b) = self.rx[ch].pop() {
                    self.last_rx[ch] = b;
                }
                self.last_rx[ch]
            }
            Register::TxFifoLvl => self.forced_level[ch][0].unwrap_or(self.tx[ch].len as u8),
            Register::RxFifoLvl => self.forced_level[ch][1].unwrap_or(self.rx[ch].len as u8),
            Register::Isr => {
                let data = core::mem::take(&mut self.rx_data[ch]);
                if data { ISR_RX_DATA } else { 0 }
            }
            Register::Lsr => {
                if self.rx_timeout[ch] {
                    LSR_RX_TIMEOUT
                } else {
                    0
                }
            }
            _ => self.regs[Self::slot(channel, register)][register as usize],
        }
    }
}

impl Transport for SimulatedBridge {
    type Error = Infallible;

    fn transact(&mut self, word: u16) -> Result<u16, Infallible> {
        self.transactions += 1;

        let channel = if word & Channel::Secondary.bits() != 0 {
            Channel::Secondary
        } else {
            Channel::Primary
        };
        let Some(register) = Register::from_addr(((word >> 8) & 0x1F) as u8) else {
            return Ok(0);
        };

        // The high byte reports pending receive data without clearing it.
        let status = if self.rx_data.iter().any(|&d| d) {
            u16::from(ISR_RX_DATA) << 8
        } else {
            0
        };

        if word & 0x8000 != 0 {
            self.write(channel, register, word as u8);
            Ok(status)
        } else {
            Ok(status | u16::from(self.read(channel, register)))
        }
    }
}
