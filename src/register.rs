//! Register map, channel selection and the 16-bit command word codec.
//!
//! In 16-bit SPI mode every access is a single word:
//!
//! ```text
//!  15   14   13    12..8      7..0
//! W/R   0   CH   ADDR[4:0]   DATA
//! ```
//!
//! For a read the data byte is ignored on send. The response carries the
//! register value in the low byte and interrupt status in the high byte.

use core::fmt;

/// Bit 15 of a command word, set for writes.
const WRITE_BIT: u16 = 0x8000;

/// One of the two UART ports of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// UART 0.
    Primary,
    /// UART 1.
    Secondary,
}

impl Channel {
    /// Both channels, in port order.
    pub const ALL: [Channel; 2] = [Channel::Primary, Channel::Secondary];

    /// The channel field of the command word.
    #[inline]
    pub const fn bits(self) -> u16 {
        match self {
            Channel::Primary => 0x0000,
            Channel::Secondary => 0x2000,
        }
    }

    /// Port index, `0` or `1`.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::Primary => 0,
            Channel::Secondary => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Primary => "UART0",
            Channel::Secondary => "UART1",
        })
    }
}

/// A raw channel selector that does not name either port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidChannel;

/// Port index: `0` or `1`.
impl TryFrom<u8> for Channel {
    type Error = InvalidChannel;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Channel::Primary),
            1 => Ok(Channel::Secondary),
            _ => Err(InvalidChannel),
        }
    }
}

/// Command word channel field: `0x0000` or `0x2000`.
impl TryFrom<u16> for Channel {
    type Error = InvalidChannel;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            0x0000 => Ok(Channel::Primary),
            0x2000 => Ok(Channel::Secondary),
            _ => Err(InvalidChannel),
        }
    }
}

/// Chip registers reachable through the 5-bit address field.
///
/// The discriminant is the raw address; [`Register::bits`] gives it shifted into
/// command word position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    /// Transmit and receive hold register. Writes go to the TX FIFO, reads pop
    /// the RX FIFO.
    Thr = 0x00,
    IrqEn = 0x01,
    /// Interrupt status. Cleared on read.
    Isr = 0x02,
    LsrIntEn = 0x03,
    /// Line status.
    Lsr = 0x04,
    SpclChrIntEn = 0x05,
    SpclCharInt = 0x06,
    StsIntEn = 0x07,
    StsInt = 0x08,
    Mode1 = 0x09,
    Mode2 = 0x0A,
    /// Line control: word length, stop bits, parity.
    Lcr = 0x0B,
    RxTimeOut = 0x0C,
    HDplxDelay = 0x0D,
    IrDa = 0x0E,
    FlowLvl = 0x0F,
    FifoTrgLvl = 0x10,
    /// Transmit FIFO fill level.
    TxFifoLvl = 0x11,
    /// Receive FIFO fill level.
    RxFifoLvl = 0x12,
    FlowCtrl = 0x13,
    XOn1 = 0x14,
    XOn2 = 0x15,
    XOff1 = 0x16,
    XOff2 = 0x17,
    GpioConfg = 0x18,
    GpioData = 0x19,
    /// PLL configuration, shared by both channels.
    PllConfig = 0x1A,
    BrgConfig = 0x1B,
    DivLsb = 0x1C,
    DivMsb = 0x1D,
    /// Clock source, shared by both channels.
    ClkSource = 0x1E,
    /// Global interrupt status on read, global command on write.
    GlobalIrq = 0x1F,
}

impl Register {
    /// Write alias of [`Register::GlobalIrq`].
    pub const GLOBAL_COMMAND: Register = Register::GlobalIrq;

    /// Looks up a register by its raw 5-bit address.
    pub const fn from_addr(addr: u8) -> Option<Register> {
        let register = match addr {
            0x00 => Register::Thr,
            0x01 => Register::IrqEn,
            0x02 => Register::Isr,
            0x03 => Register::LsrIntEn,
            0x04 => Register::Lsr,
            0x05 => Register::SpclChrIntEn,
            0x06 => Register::SpclCharInt,
            0x07 => Register::StsIntEn,
            0x08 => Register::StsInt,
            0x09 => Register::Mode1,
            0x0A => Register::Mode2,
            0x0B => Register::Lcr,
            0x0C => Register::RxTimeOut,
            0x0D => Register::HDplxDelay,
            0x0E => Register::IrDa,
            0x0F => Register::FlowLvl,
            0x10 => Register::FifoTrgLvl,
            0x11 => Register::TxFifoLvl,
            0x12 => Register::RxFifoLvl,
            0x13 => Register::FlowCtrl,
            0x14 => Register::XOn1,
            0x15 => Register::XOn2,
            0x16 => Register::XOff1,
            0x17 => Register::XOff2,
            0x18 => Register::GpioConfg,
            0x19 => Register::GpioData,
            0x1A => Register::PllConfig,
            0x1B => Register::BrgConfig,
            0x1C => Register::DivLsb,
            0x1D => Register::DivMsb,
            0x1E => Register::ClkSource,
            0x1F => Register::GlobalIrq,
            _ => return None,
        };
        Some(register)
    }

    /// Raw 5-bit address.
    #[inline]
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// The address field of the command word.
    #[inline]
    pub const fn bits(self) -> u16 {
        (self as u16) << 8
    }

    /// Is this one of the two FIFO fill level registers?
    #[inline]
    pub const fn is_fifo_level(self) -> bool {
        matches!(self, Register::TxFifoLvl | Register::RxFifoLvl)
    }

    /// Registers shared across both channels, only writable through the
    /// primary channel.
    #[inline]
    pub const fn is_global(self) -> bool {
        matches!(
            self,
            Register::PllConfig | Register::ClkSource | Register::GlobalIrq
        )
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:#04x}", self, self.addr())
    }
}

/// Builds a write command. The channel is not validated here.
#[inline]
pub const fn encode_write(channel: Channel, register: Register, value: u8) -> u16 {
    WRITE_BIT | channel.bits() | register.bits() | value as u16
}

/// Builds a read command. The data byte is zero.
#[inline]
pub const fn encode_read(channel: Channel, register: Register) -> u16 {
    channel.bits() | register.bits()
}

/// Register value carried in the low byte of a response word.
#[inline]
pub const fn decode(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// A decoded response word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response(pub u16);

impl Response {
    /// The register value.
    #[inline]
    pub const fn value(self) -> u8 {
        decode(self.0)
    }

    /// Interrupt status bits clocked out alongside the value. Not interpreted
    /// by this crate.
    #[inline]
    pub const fn status(self) -> u8 {
        (self.0 >> 8) as u8
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_word_layout() {
        assert_eq!(encode_write(Channel::Primary, Register::Lcr, 0x03), 0x8B03);
        assert_eq!(
            encode_write(Channel::Secondary, Register::Lcr, 0x03),
            0xAB03
        );
        assert_eq!(encode_write(Channel::Primary, Register::Thr, 0xFF), 0x80FF);
        assert_eq!(
            encode_write(Channel::Secondary, Register::GlobalIrq, 0x00),
            0xBF00
        );
    }

    #[test]
    fn read_word_layout() {
        assert_eq!(encode_read(Channel::Primary, Register::RxFifoLvl), 0x1200);
        assert_eq!(encode_read(Channel::Secondary, Register::ClkSource), 0x3E00);
        assert_eq!(encode_read(Channel::Primary, Register::Thr), 0x0000);
    }

    #[test]
    fn fields_do_not_overlap() {
        for channel in Channel::ALL {
            let word = encode_write(channel, Register::GlobalIrq, 0xFF);
            assert_eq!(word & 0x4000, 0);
            assert_eq!(word & 0x2000, channel.bits());
            assert_eq!((word >> 8) & 0x1F, 0x1F);
        }
    }

    #[test]
    fn decode_keeps_low_byte_only() {
        assert_eq!(decode(0xA55A), 0x5A);
        let r = Response(0x4001);
        assert_eq!(r.value(), 0x01);
        assert_eq!(r.status(), 0x40);
    }

    #[test]
    fn channel_validation() {
        assert_eq!(Channel::try_from(0u8), Ok(Channel::Primary));
        assert_eq!(Channel::try_from(1u8), Ok(Channel::Secondary));
        for raw in 2..=u8::MAX {
            assert_eq!(Channel::try_from(raw), Err(InvalidChannel));
        }

        assert_eq!(Channel::try_from(0x0000u16), Ok(Channel::Primary));
        assert_eq!(Channel::try_from(0x2000u16), Ok(Channel::Secondary));
        for raw in [0x0001u16, 0x1000, 0x4000, 0x2001, 0x8000, 0xFFFF] {
            assert_eq!(Channel::try_from(raw), Err(InvalidChannel));
        }
    }

    #[test]
    fn address_lookup_covers_the_map() {
        for addr in 0..=0x1F {
            let register = Register::from_addr(addr).unwrap();
            assert_eq!(register.addr(), addr);
            assert_eq!(register.bits(), (addr as u16) << 8);
        }
        assert_eq!(Register::from_addr(0x20), None);
        assert_eq!(Register::from_addr(0xFF), None);
    }

    #[test]
    fn global_command_aliases_irq() {
        assert_eq!(Register::GLOBAL_COMMAND.addr(), 0x1F);
        assert!(Register::ClkSource.is_global());
        assert!(!Register::Lcr.is_global());
    }
}
