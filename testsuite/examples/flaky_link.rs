//! @test-validate: exit
//!
//! Startup and FIFO levels over a link that drops reads or a chip that
//! ignores writes.

#![no_std]
#![no_main]

use max3109::init::{INIT_ATTEMPTS, KNOWN_VALUE_MASK};
use max3109::sim::SimulatedBridge;
use max3109::{Channel, Error, InitPhase, InitState, Max3109, Register, Sequencer};
use testsuite::{CONFIG, check, entry, exit_failure, exit_success, expect_ok};

#[entry]
fn main() -> ! {
    recovers_from_one_bad_readback();
    gives_up_on_stuck_register();
    gives_up_on_dead_link();
    rejects_impossible_fifo_level();
    exit_success();
}

fn recovers_from_one_bad_readback() {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    bridge.transport_mut().corrupt_next_reads(1);

    let mut seq = Sequencer::new(CONFIG);
    expect_ok(seq.run(&mut bridge), "init over a flaky link");

    let Some(mismatch) = seq.last_mismatch() else {
        defmt::error!("corrupted read went unnoticed");
        exit_failure();
    };
    defmt::info!("recovered after {}", mismatch);
    check(mismatch.register == Register::DivLsb, "first read was corrupted");
    check(mismatch.expected == KNOWN_VALUE_MASK, "known value expected");
    check(mismatch.observed == 0, "corrupted read observed");
    check(seq.state() == InitState::Done, "sequencer finished");
    // One extra readback attempt of four reads.
    check(bridge.transport().transactions() == 20, "20 transactions");
}

fn gives_up_on_stuck_register() {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    bridge.transport_mut().stick(Channel::Secondary, Register::Lcr);

    match bridge.initialize(&CONFIG) {
        Err(Error::Initialization(failure)) => {
            defmt::info!("{}", failure);
            check(failure.phase == InitPhase::ConfigureAndVerify, "config phase failed");
            check(failure.attempts == INIT_ATTEMPTS, "every attempt used");
            let blamed = failure.cause.map(|m| (m.channel, m.register));
            check(blamed == Some((Channel::Secondary, Register::Lcr)), "UART1 LCR blamed");
        }
        _ => {
            defmt::error!("stuck LCR went unnoticed");
            exit_failure();
        }
    }
    check(
        bridge.transport().writes(Channel::Secondary, Register::Lcr) == u32::from(INIT_ATTEMPTS),
        "LCR rewritten on every attempt",
    );
}

fn gives_up_on_dead_link() {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    bridge.transport_mut().corrupt_next_reads(u32::MAX);

    let mut seq = Sequencer::new(CONFIG);
    let result = seq.run(&mut bridge);
    check(
        matches!(
            result,
            Err(Error::Initialization(f)) if f.phase == InitPhase::KnownValueReadback
        ),
        "readback phase failed",
    );
    check(matches!(seq.state(), InitState::Failed(_)), "sequencer failed");

    // Reset plus three readback attempts; configuration never written.
    check(bridge.transport().transactions() == 16, "16 transactions");
    check(
        bridge.transport().writes(Channel::Primary, Register::ClkSource) == 0,
        "configuration skipped",
    );

    // Failed stays failed without touching the bus.
    check(seq.run(&mut bridge).is_err(), "still failed");
    check(bridge.transport().transactions() == 16, "no traffic after failure");
}

fn rejects_impossible_fifo_level() {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    bridge
        .transport_mut()
        .force_level(Channel::Primary, Register::RxFifoLvl, Some(0xC3));

    let result = bridge.fifo_level(Channel::Primary, Register::RxFifoLvl);
    check(
        result == Err(Error::Communication { level: 0xC3 }),
        "level above FIFO depth rejected",
    );
    check(
        bridge.fifo_level(Channel::Primary, Register::Lcr)
            == Err(Error::InvalidRegisterSelector(Register::Lcr)),
        "non-level selector rejected",
    );
    check(bridge.fifo_level(7u8, Register::RxFifoLvl) == Err(Error::InvalidChannel), "bad channel");
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!("{}", defmt::Display2Format(info));
    exit_failure();
}
