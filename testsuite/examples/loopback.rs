//! @test-validate: expected
//!
//! Sends a line on each channel with the simulated chip in loopback, drains
//! both RX FIFOs back and forwards what arrived to the serial port.

#![no_std]
#![no_main]

use max3109::sim::SimulatedBridge;
use max3109::{Channel, CircularQueue, Max3109, Register, UartPort, UartPorts};
use testsuite::{CONFIG, check, entry, exit_failure, exit_success, expect_ok, uart};

const LINES: [&[u8]; 2] = [b"UART0 says hello\n", b"UART1 answers\n"];

fn queue(storage: &mut [u8]) -> CircularQueue<'_, u8> {
    match CircularQueue::new(storage) {
        Ok(q) => q,
        Err(e) => {
            defmt::error!("{}", e);
            exit_failure();
        }
    }
}

#[entry]
fn main() -> ! {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    expect_ok(bridge.initialize(&CONFIG), "init");
    bridge.transport_mut().set_loopback(true);

    let (mut rx0, mut tx0, mut rx1, mut tx1) = ([0u8; 32], [0u8; 32], [0u8; 32], [0u8; 32]);
    let mut ports = UartPorts::new(
        UartPort::new(Channel::Primary, queue(&mut rx0), queue(&mut tx0)),
        UartPort::new(Channel::Secondary, queue(&mut rx1), queue(&mut tx1)),
    );

    for (channel, line) in Channel::ALL.into_iter().zip(LINES) {
        let port = ports.port(channel);
        for &byte in line {
            check(port.tx().push(byte).is_ok(), "line fits the TX queue");
        }

        // Two bursts, the first one short.
        let first = expect_ok(port.transmit(&mut bridge, 5), "transmit");
        let rest = expect_ok(port.transmit(&mut bridge, 64), "transmit");
        defmt::info!("{} sent {} + {} bytes", channel, first, rest);
        check(first == 5, "first burst clamped to its limit");
        check(first + rest == line.len(), "whole line sent");
        check(port.tx().is_empty(), "TX queue released");
    }

    let level = expect_ok(bridge.fifo_level(Channel::Secondary, Register::RxFifoLvl), "level");
    check(usize::from(level) == LINES[1].len(), "UART1 RX FIFO holds its line");

    let received = expect_ok(ports.receive_all(&mut bridge), "receive");
    defmt::info!("received {} and {} bytes", received[0], received[1]);

    for (channel, line) in Channel::ALL.into_iter().zip(LINES) {
        let mut buf = [0u8; 32];
        let mut n = 0;
        while let Some(byte) = ports.port(channel).rx().pop() {
            buf[n] = byte;
            n += 1;
        }
        check(&buf[..n] == line, "line came back intact");
        uart::write_bytes(&buf[..n]);
    }

    exit_success();
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!("{}", defmt::Display2Format(info));
    exit_failure();
}
