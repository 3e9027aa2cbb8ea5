//! The single-word register transaction the driver is built on.

use embedded_hal::spi::SpiDevice;

/// Performs one full-duplex 16-bit exchange with the bridge.
///
/// Implementations own chip-select framing and block until the response word
/// has been clocked in. The driver issues exactly one call per register access
/// and never retries a failed one.
pub trait Transport {
    /// Error reported by the underlying bus.
    type Error;

    /// Sends `word` and returns the word clocked in during the same exchange.
    fn transact(&mut self, word: u16) -> Result<u16, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    #[inline]
    fn transact(&mut self, word: u16) -> Result<u16, Self::Error> {
        T::transact(self, word)
    }
}

/// [`Transport`] over an `embedded-hal` SPI device configured for 16-bit
/// words.
///
/// The device asserts chip select for the duration of each transfer.
pub struct SpiTransport<D> {
    device: D,
}

impl<D> SpiTransport<D> {
    /// Wraps an SPI device.
    pub const fn new(device: D) -> Self {
        Self { device }
    }

    /// Returns the wrapped device.
    pub fn release(self) -> D {
        self.device
    }
}

impl<D: SpiDevice<u16>> Transport for SpiTransport<D> {
    type Error = D::Error;

    #[inline]
    fn transact(&mut self, word: u16) -> Result<u16, Self::Error> {
        let mut buf = [word];
        self.device.transfer_in_place(&mut buf)?;
        Ok(buf[0])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::spi::{ErrorType, Operation};

    /// Answers every word with its bitwise complement.
    struct Inverter {
        transfers: usize,
    }

    impl ErrorType for Inverter {
        type Error = Infallible;
    }

    impl SpiDevice<u16> for Inverter {
        fn transaction(&mut self, operations: &mut [Operation<'_, u16>]) -> Result<(), Infallible> {
            for op in operations {
                if let Operation::TransferInPlace(words) = op {
                    for w in words.iter_mut() {
                        *w = !*w;
                    }
                    self.transfers += 1;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn spi_device_exchanges_one_word() {
        let mut t = SpiTransport::new(Inverter { transfers: 0 });
        assert_eq!(t.transact(0x8B03), Ok(0x74FC));
        assert_eq!(t.transact(0x0000), Ok(0xFFFF));
        assert_eq!(t.release().transfers, 2);
    }
}
