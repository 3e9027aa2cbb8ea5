//! @test-validate: exit
//!
//! Steps the startup sequence against a healthy simulated chip and checks
//! the state it leaves behind.

#![no_std]
#![no_main]

use max3109::init::CLOCK_SOURCE_MASK;
use max3109::sim::SimulatedBridge;
use max3109::{Channel, InitState, Max3109, Progress, Register, Sequencer};
use testsuite::{CONFIG, check, entry, exit_failure, exit_success, expect_ok};

#[entry]
fn main() -> ! {
    let mut bridge = Max3109::new(SimulatedBridge::new());
    let mut seq = Sequencer::new(CONFIG);

    let mut pending = 0;
    while expect_ok(seq.step(&mut bridge), "step") == Progress::Pending {
        defmt::info!("step {}: {}, attempts {}", pending, seq.state(), seq.attempts());
        pending += 1;
    }

    let transactions = bridge.transport().transactions();
    defmt::info!("initialized, {} transactions", transactions);
    check(seq.state() == InitState::Done, "sequencer finished");
    check(pending == 2, "reset and readback each took one step");
    check(seq.last_mismatch().is_none(), "no mismatch on a healthy chip");
    check(transactions == 16, "16 transactions");

    // Further steps are free.
    check(
        expect_ok(seq.step(&mut bridge), "step after done") == Progress::Complete,
        "done stays done",
    );
    check(bridge.transport().transactions() == transactions, "no traffic after done");

    for channel in Channel::ALL {
        let lcr = expect_ok(bridge.read_register(channel, Register::Lcr), "read LCR");
        check(lcr == CONFIG.line_control, "LCR applied on both channels");
        let pll = expect_ok(bridge.read_register(channel, Register::PllConfig), "read PLL");
        check(pll == CONFIG.pll, "PLL shared by both channels");
    }
    let clock = expect_ok(
        bridge.read_register(Channel::Primary, Register::ClkSource),
        "read CLKSource",
    );
    check(clock == CONFIG.clock_source & CLOCK_SOURCE_MASK, "CLKSource masked");
    check(
        bridge.transport().writes(Channel::Secondary, Register::PllConfig) == 0,
        "globals only written through UART0",
    );

    exit_success();
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!("{}", defmt::Display2Format(info));
    exit_failure();
}
