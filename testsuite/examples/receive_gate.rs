//! @test-validate: exit
//!
//! Polls the receive-ready predicate the way a main loop would and drains
//! into a queue shared with "interrupt" context.

#![no_std]
#![no_main]

use max3109::sim::SimulatedBridge;
use max3109::{Channel, CircularQueue, Max3109, Register, SharedQueue, UartPort};
use testsuite::{CONFIG, check, entry, exit_failure, exit_success, expect_ok};

#[entry]
fn main() -> ! {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    expect_ok(bridge.initialize(&CONFIG), "init");

    let mut rx_storage = [0u8; 4];
    let mut tx_storage = [0u8; 1];
    let (Ok(rx_queue), Ok(tx_queue)) = (
        CircularQueue::new(&mut rx_storage),
        CircularQueue::new(&mut tx_storage),
    ) else {
        defmt::error!("queue storage rejected");
        exit_failure();
    };
    let rx = SharedQueue::new(rx_queue);
    let tx = SharedQueue::new(tx_queue);
    let mut port = UartPort::new(Channel::Primary, &rx, &tx);

    // Bytes still arriving: data is there but the line has not gone idle.
    bridge.transport_mut().receive(Channel::Primary, b"ab");
    let ready = expect_ok(bridge.is_receive_ready(Channel::Primary), "ready");
    check(!ready, "not ready before the receiver times out");

    // The data bit was consumed by the read above, so even once idle the
    // predicate stays false. The FIFO level still tells the truth.
    bridge.transport_mut().set_rx_timeout(Channel::Primary, true);
    let ready = expect_ok(bridge.is_receive_ready(Channel::Primary), "ready");
    check(!ready, "data bit cleared on read");
    let level = expect_ok(bridge.fifo_level(Channel::Primary, Register::RxFifoLvl), "level");
    check(level == 2, "two bytes waiting");
    check(expect_ok(port.receive(&mut bridge), "receive") == 2, "two bytes stored");

    // More than the queue can take arrives on an idle line.
    bridge.transport_mut().receive(Channel::Primary, b"cdefg");
    let mut polls = 0;
    while !expect_ok(bridge.is_receive_ready(Channel::Primary), "ready") {
        polls += 1;
        check(polls < 10, "receive ready eventually");
    }
    let stored = expect_ok(port.receive(&mut bridge), "receive");
    defmt::info!("stored {} bytes after {} polls", stored, polls);
    check(stored == 2, "only the free slots filled");
    check(rx.len() == 4, "queue full");
    let level = expect_ok(bridge.fifo_level(Channel::Primary, Register::RxFifoLvl), "level");
    check(level == 0, "overflow drained from the FIFO anyway");

    for expected in *b"abcd" {
        check(rx.pop() == Some(expected), "bytes in arrival order");
    }
    check(rx.pop().is_none(), "queue drained");

    // Other port untouched, and a bogus selector never reaches the bus.
    check(
        !expect_ok(bridge.is_receive_ready(Channel::Secondary), "ready"),
        "UART1 idle",
    );
    let before = bridge.transport().transactions();
    check(bridge.is_receive_ready(2u8).is_err(), "port 2 rejected");
    check(bridge.is_receive_ready(0x4000u16).is_err(), "field 0x4000 rejected");
    check(bridge.transport().transactions() == before, "no traffic for bad selectors");

    exit_success();
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!("{}", defmt::Display2Format(info));
    exit_failure();
}
