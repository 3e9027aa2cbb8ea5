//! The startup sequence.
//!
//! Startup runs as a small state machine so each phase can be stepped and
//! inspected on its own:
//!
//! 1. **Reset.** Pulse the reset bit of `MODE2` on both channels. Not verified.
//! 2. **Known value readback.** `DIVLSB` and `PLLConfig` power up as `0x01` on
//!    both channels. All four must read back with that bit set. This is a link
//!    self-test before anything is configured.
//! 3. **Configure and verify.** Write `CLKSource` and `PLLConfig` (shared,
//!    primary channel only) and `LCR` on each channel, then read each back.
//!    `CLKSource` is compared under [`CLOCK_SOURCE_MASK`].
//!
//! Phases 2 and 3 each get [`INIT_ATTEMPTS`] attempts. Every check of an
//! attempt is performed even after one has failed; the attempt passes only if
//! all of them do. Running out of attempts in phase 2 means phase 3 never runs.

use crate::bridge::Max3109;
use crate::error::{Error, InitFailure, InitPhase, Mismatch};
use crate::register::{Channel, Register};
use crate::transport::Transport;

/// Attempts allowed for each verification phase.
pub const INIT_ATTEMPTS: u8 = 3;

/// `CLKSource` bits that read back as written.
pub const CLOCK_SOURCE_MASK: u8 = 0x8C;

/// Bit that `DIVLSB` and `PLLConfig` hold after reset.
pub const KNOWN_VALUE_MASK: u8 = 0x01;

/// `MODE2` bit that resets the chip and its FIFOs.
pub const MODE2_RESET: u8 = 0x01;

const KNOWN_VALUE_REGISTERS: [Register; 2] = [Register::DivLsb, Register::PllConfig];

/// Startup configuration.
///
/// The values are written verbatim; computing them for a given crystal and
/// baud rate is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// `PLLConfig`, shared by both channels.
    pub pll: u8,
    /// `CLKSource`, shared by both channels.
    pub clock_source: u8,
    /// `LCR`, applied to both channels.
    pub line_control: u8,
}

/// Where a [`Sequencer`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitState {
    /// Nothing sent yet.
    Reset,
    /// Checking power-on defaults.
    KnownValueReadback,
    /// Writing and verifying the configuration.
    ConfigureAndVerify,
    /// Configuration verified.
    Done,
    /// A phase ran out of attempts.
    Failed(InitFailure),
}

/// Outcome of a successful [`Sequencer::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// More steps are needed.
    Pending,
    /// The chip is configured.
    Complete,
}

/// Drives the startup sequence one phase attempt at a time.
#[derive(Debug, Clone)]
pub struct Sequencer {
    config: Config,
    state: InitState,
    /// Attempts started in the current phase. Never exceeds
    /// [`INIT_ATTEMPTS`] outside of [`InitState::Failed`].
    attempts: u8,
    last_mismatch: Option<Mismatch>,
    /// First mismatch of the last completed attempt of the current phase.
    phase_mismatch: Option<Mismatch>,
}

impl Sequencer {
    /// A sequencer that has not sent anything yet.
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            state: InitState::Reset,
            attempts: 0,
            last_mismatch: None,
            phase_mismatch: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> InitState {
        self.state
    }

    /// Attempts made in the current phase.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// The most recent failed check, if any.
    pub fn last_mismatch(&self) -> Option<Mismatch> {
        self.last_mismatch
    }

    /// Runs the reset, or one attempt of the current verification phase.
    ///
    /// A failed attempt with attempts left returns `Ok(Progress::Pending)`.
    /// Once a phase is out of attempts the sequencer stays failed and keeps
    /// returning [`Error::Initialization`] without touching the bus.
    ///
    /// Transport errors are returned as they happen and the interrupted
    /// attempt still counts. If it was the last one, the sequencer is failed
    /// by the time the transport error is returned.
    pub fn step<T: Transport>(
        &mut self,
        bridge: &mut Max3109<T>,
    ) -> Result<Progress, Error<T::Error>> {
        match self.state {
            InitState::Reset => {
                reset(bridge)?;
                self.enter(InitState::KnownValueReadback);
                Ok(Progress::Pending)
            }
            InitState::KnownValueReadback => {
                let phase = InitPhase::KnownValueReadback;
                self.attempts += 1;
                let checked = check_known_values(bridge);
                match checked.map_err(|e| self.interrupted(phase, e))? {
                    None => {
                        debug!("known values read back on attempt {}", self.attempts);
                        self.enter(InitState::ConfigureAndVerify);
                        Ok(Progress::Pending)
                    }
                    Some(m) => self.attempt_failed(phase, m),
                }
            }
            InitState::ConfigureAndVerify => {
                let phase = InitPhase::ConfigureAndVerify;
                self.attempts += 1;
                let config = self.config;
                let verified = write_config(bridge, &config)
                    .and_then(|()| verify_config(bridge, &config));
                match verified.map_err(|e| self.interrupted(phase, e))? {
                    None => {
                        info!("configuration verified on attempt {}", self.attempts);
                        self.state = InitState::Done;
                        Ok(Progress::Complete)
                    }
                    Some(m) => self.attempt_failed(phase, m),
                }
            }
            InitState::Done => Ok(Progress::Complete),
            InitState::Failed(failure) => Err(Error::Initialization(failure)),
        }
    }

    /// Steps until the sequence completes or fails.
    pub fn run<T: Transport>(&mut self, bridge: &mut Max3109<T>) -> Result<(), Error<T::Error>> {
        while self.step(bridge)? == Progress::Pending {}
        Ok(())
    }

    fn enter(&mut self, state: InitState) {
        self.state = state;
        self.attempts = 0;
        self.phase_mismatch = None;
    }

    fn attempt_failed<E>(
        &mut self,
        phase: InitPhase,
        cause: Mismatch,
    ) -> Result<Progress, Error<E>> {
        warn!(
            "{} attempt {}/{}: {} {} read {:#x}, expected {:#x}",
            phase,
            self.attempts,
            INIT_ATTEMPTS,
            cause.channel,
            cause.register,
            cause.observed,
            cause.expected
        );
        self.last_mismatch = Some(cause);
        self.phase_mismatch = Some(cause);
        if self.attempts < INIT_ATTEMPTS {
            return Ok(Progress::Pending);
        }
        Err(Error::Initialization(self.give_up(phase)))
    }

    fn interrupted<E>(&mut self, phase: InitPhase, e: Error<E>) -> Error<E> {
        warn!(
            "{} attempt {}/{}: transport error",
            phase, self.attempts, INIT_ATTEMPTS
        );
        if self.attempts >= INIT_ATTEMPTS {
            self.give_up(phase);
        }
        e
    }

    fn give_up(&mut self, phase: InitPhase) -> InitFailure {
        let failure = InitFailure {
            phase,
            attempts: self.attempts,
            cause: self.phase_mismatch,
        };
        error!("{} gave up after {} attempts", phase, self.attempts);
        self.state = InitState::Failed(failure);
        failure
    }
}

impl<T: Transport> Max3109<T> {
    /// Resets the chip, checks the link and applies `config`.
    ///
    /// Succeeds only if both verification phases pass within
    /// [`INIT_ATTEMPTS`] attempts each.
    pub fn initialize(&mut self, config: &Config) -> Result<(), Error<T::Error>> {
        Sequencer::new(*config).run(self)
    }
}

fn reset<T: Transport>(bridge: &mut Max3109<T>) -> Result<(), Error<T::Error>> {
    debug!("resetting bridge");
    for value in [MODE2_RESET, 0x00] {
        for channel in Channel::ALL {
            bridge.write(channel, Register::Mode2, value)?;
        }
    }
    Ok(())
}

/// Compares one readback, keeping the first mismatch of the attempt.
fn compare(
    first: &mut Option<Mismatch>,
    channel: Channel,
    register: Register,
    expected: u8,
    observed: u8,
) {
    if expected != observed && first.is_none() {
        *first = Some(Mismatch {
            channel,
            register,
            expected,
            observed,
        });
    }
}

fn check_known_values<T: Transport>(
    bridge: &mut Max3109<T>,
) -> Result<Option<Mismatch>, Error<T::Error>> {
    let mut first = None;
    for channel in Channel::ALL {
        for register in KNOWN_VALUE_REGISTERS {
            let observed = bridge.read(channel, register)? & KNOWN_VALUE_MASK;
            compare(&mut first, channel, register, KNOWN_VALUE_MASK, observed);
        }
    }
    Ok(first)
}

fn write_config<T: Transport>(
    bridge: &mut Max3109<T>,
    config: &Config,
) -> Result<(), Error<T::Error>> {
    bridge.write(Channel::Primary, Register::ClkSource, config.clock_source)?;
    bridge.write(Channel::Primary, Register::PllConfig, config.pll)?;
    for channel in Channel::ALL {
        bridge.write(channel, Register::Lcr, config.line_control)?;
    }
    Ok(())
}

fn verify_config<T: Transport>(
    bridge: &mut Max3109<T>,
    config: &Config,
) -> Result<Option<Mismatch>, Error<T::Error>> {
    let mut first = None;

    let clock = bridge.read(Channel::Primary, Register::ClkSource)? & CLOCK_SOURCE_MASK;
    compare(
        &mut first,
        Channel::Primary,
        Register::ClkSource,
        config.clock_source & CLOCK_SOURCE_MASK,
        clock,
    );
    let pll = bridge.read(Channel::Primary, Register::PllConfig)?;
    compare(&mut first, Channel::Primary, Register::PllConfig, config.pll, pll);
    for channel in Channel::ALL {
        let lcr = bridge.read(channel, Register::Lcr)?;
        compare(&mut first, channel, Register::Lcr, config.line_control, lcr);
    }
    Ok(first)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimulatedBridge;

    const CONFIG: Config = Config {
        pll: 0x06,
        clock_source: 0x0A,
        line_control: 0x03,
    };

    fn bridge() -> Max3109<SimulatedBridge> {
        Max3109::new(SimulatedBridge::new())
    }

    /// Refuses the next `fail` exchanges, then forwards to the simulated
    /// chip. Counts every exchange offered to it.
    struct Flaky {
        sim: SimulatedBridge,
        fail: usize,
        calls: usize,
    }

    impl Transport for Flaky {
        type Error = ();

        fn transact(&mut self, word: u16) -> Result<u16, ()> {
            self.calls += 1;
            if self.fail > 0 {
                self.fail -= 1;
                return Err(());
            }
            let Ok(response) = self.sim.transact(word);
            Ok(response)
        }
    }

    fn flaky() -> Max3109<Flaky> {
        Max3109::new(Flaky {
            sim: SimulatedBridge::new(),
            fail: 0,
            calls: 0,
        })
    }

    #[test]
    fn healthy_chip_configures_first_time() {
        let mut b = bridge();
        assert_eq!(b.initialize(&CONFIG), Ok(()));

        let sim = b.transport();
        // 4 reset writes, 4 readbacks, 4 config writes, 4 verify reads.
        assert_eq!(sim.transactions(), 16);
        assert_eq!(sim.register(Channel::Primary, Register::PllConfig), 0x06);
        assert_eq!(sim.register(Channel::Primary, Register::Lcr), 0x03);
        assert_eq!(sim.register(Channel::Secondary, Register::Lcr), 0x03);
        assert_eq!(sim.writes(Channel::Secondary, Register::ClkSource), 0);
        assert_eq!(sim.writes(Channel::Secondary, Register::PllConfig), 0);
    }

    #[test]
    fn reset_pulses_mode2_on_both_channels() {
        let mut b = bridge();
        let mut seq = Sequencer::new(CONFIG);
        assert_eq!(seq.step(&mut b), Ok(Progress::Pending));
        assert_eq!(seq.state(), InitState::KnownValueReadback);

        let sim = b.transport();
        assert_eq!(sim.transactions(), 4);
        for channel in Channel::ALL {
            assert_eq!(sim.writes(channel, Register::Mode2), 2);
            assert_eq!(sim.register(channel, Register::Mode2), 0x00);
        }
    }

    #[test]
    fn known_values_pass_on_last_attempt() {
        let mut b = bridge();
        b.transport_mut().corrupt_next_reads(8);
        assert_eq!(b.initialize(&CONFIG), Ok(()));
        assert_eq!(b.transport().transactions(), 4 + 3 * 4 + 8);
    }

    #[test]
    fn known_values_exhausted_skips_configuration() {
        let mut b = bridge();
        b.transport_mut().corrupt_next_reads(12);

        let expected = InitFailure {
            phase: InitPhase::KnownValueReadback,
            attempts: INIT_ATTEMPTS,
            cause: Some(Mismatch {
                channel: Channel::Primary,
                register: Register::DivLsb,
                expected: KNOWN_VALUE_MASK,
                observed: 0,
            }),
        };
        assert_eq!(b.initialize(&CONFIG), Err(Error::Initialization(expected)));

        let sim = b.transport();
        assert_eq!(sim.writes(Channel::Primary, Register::ClkSource), 0);
        assert_eq!(sim.writes(Channel::Primary, Register::Lcr), 0);
        assert_eq!(sim.writes(Channel::Secondary, Register::Lcr), 0);
    }

    #[test]
    fn single_bad_read_fails_the_whole_attempt() {
        let mut b = bridge();
        let mut seq = Sequencer::new(CONFIG);
        seq.step(&mut b).unwrap();

        b.transport_mut().corrupt_next_reads(1);
        assert_eq!(seq.step(&mut b), Ok(Progress::Pending));
        assert_eq!(seq.state(), InitState::KnownValueReadback);
        assert_eq!(seq.attempts(), 1);
        // The remaining three reads of the attempt still went out.
        assert_eq!(b.transport().transactions(), 8);

        assert_eq!(seq.step(&mut b), Ok(Progress::Pending));
        assert_eq!(seq.state(), InitState::ConfigureAndVerify);
        assert_eq!(seq.attempts(), 0);
    }

    #[test]
    fn configuration_retried_after_bad_readback() {
        let mut b = bridge();
        let mut seq = Sequencer::new(CONFIG);
        seq.step(&mut b).unwrap();
        seq.step(&mut b).unwrap();
        assert_eq!(seq.state(), InitState::ConfigureAndVerify);

        // Writes are not reads: the first verify read comes back zero.
        b.transport_mut().corrupt_next_reads(1);
        assert_eq!(seq.step(&mut b), Ok(Progress::Pending));
        assert_eq!(
            seq.last_mismatch(),
            Some(Mismatch {
                channel: Channel::Primary,
                register: Register::ClkSource,
                expected: 0x08,
                observed: 0x00,
            })
        );
        assert_eq!(seq.step(&mut b), Ok(Progress::Complete));
        assert_eq!(seq.state(), InitState::Done);
        assert_eq!(b.transport().writes(Channel::Primary, Register::Lcr), 2);
    }

    #[test]
    fn stuck_register_exhausts_configuration() {
        let mut b = bridge();
        b.transport_mut().stick(Channel::Secondary, Register::Lcr);

        let expected = InitFailure {
            phase: InitPhase::ConfigureAndVerify,
            attempts: INIT_ATTEMPTS,
            cause: Some(Mismatch {
                channel: Channel::Secondary,
                register: Register::Lcr,
                expected: 0x03,
                observed: 0x05,
            }),
        };
        assert_eq!(b.initialize(&CONFIG), Err(Error::Initialization(expected)));
        assert_eq!(
            b.transport().writes(Channel::Secondary, Register::Lcr),
            u32::from(INIT_ATTEMPTS)
        );
    }

    #[test]
    fn clock_source_compared_under_mask() {
        let mut b = bridge();
        let config = Config {
            clock_source: 0xFF,
            ..CONFIG
        };
        assert_eq!(b.initialize(&config), Ok(()));
        assert_eq!(
            b.transport().register(Channel::Primary, Register::ClkSource),
            CLOCK_SOURCE_MASK
        );
    }

    #[test]
    fn failed_sequencer_stays_failed() {
        let mut b = bridge();
        b.transport_mut().corrupt_next_reads(12);
        let mut seq = Sequencer::new(CONFIG);
        let err = seq.run(&mut b).unwrap_err();

        let sent = b.transport().transactions();
        assert_eq!(seq.step(&mut b), Err(err));
        assert_eq!(b.transport().transactions(), sent);
        assert!(matches!(seq.state(), InitState::Failed(_)));
    }

    #[test]
    fn done_sequencer_sends_nothing() {
        let mut b = bridge();
        let mut seq = Sequencer::new(CONFIG);
        seq.run(&mut b).unwrap();
        let sent = b.transport().transactions();
        assert_eq!(seq.step(&mut b), Ok(Progress::Complete));
        assert_eq!(b.transport().transactions(), sent);
    }

    #[test]
    fn transport_errors_use_up_readback_attempts() {
        let mut b = flaky();
        let mut seq = Sequencer::new(CONFIG);
        assert_eq!(seq.step(&mut b), Ok(Progress::Pending));
        b.transport_mut().fail = usize::MAX;

        for attempt in 1..=INIT_ATTEMPTS {
            assert_eq!(seq.step(&mut b), Err(Error::Transport(())));
            assert_eq!(seq.attempts(), attempt);
        }
        let expected = InitFailure {
            phase: InitPhase::KnownValueReadback,
            attempts: INIT_ATTEMPTS,
            cause: None,
        };
        assert_eq!(seq.state(), InitState::Failed(expected));

        // Each attempt stopped at its first read; no fourth attempt follows.
        let sent = b.transport().calls;
        assert_eq!(sent, 4 + 3);
        for _ in 0..300 {
            assert_eq!(seq.step(&mut b), Err(Error::Initialization(expected)));
        }
        assert_eq!(b.transport().calls, sent);
    }

    #[test]
    fn transport_errors_keep_earlier_mismatch() {
        let mut b = flaky();
        let mut seq = Sequencer::new(CONFIG);
        seq.step(&mut b).unwrap();

        b.transport_mut().sim.corrupt_next_reads(1);
        assert_eq!(seq.step(&mut b), Ok(Progress::Pending));
        b.transport_mut().fail = usize::MAX;
        assert_eq!(seq.step(&mut b), Err(Error::Transport(())));
        assert_eq!(seq.step(&mut b), Err(Error::Transport(())));

        let InitState::Failed(failure) = seq.state() else {
            panic!("expected failure, got {:?}", seq.state());
        };
        assert_eq!(failure.attempts, INIT_ATTEMPTS);
        assert_eq!(
            failure.cause,
            Some(Mismatch {
                channel: Channel::Primary,
                register: Register::DivLsb,
                expected: KNOWN_VALUE_MASK,
                observed: 0,
            })
        );
    }

    #[test]
    fn transport_errors_use_up_configuration_attempts() {
        let mut b = flaky();
        let mut seq = Sequencer::new(CONFIG);
        seq.step(&mut b).unwrap();
        seq.step(&mut b).unwrap();
        assert_eq!(seq.state(), InitState::ConfigureAndVerify);
        b.transport_mut().fail = usize::MAX;

        for _ in 0..INIT_ATTEMPTS {
            assert_eq!(seq.step(&mut b), Err(Error::Transport(())));
        }
        let sent = b.transport().calls;
        assert_eq!(
            seq.step(&mut b),
            Err(Error::Initialization(InitFailure {
                phase: InitPhase::ConfigureAndVerify,
                attempts: INIT_ATTEMPTS,
                cause: None,
            }))
        );
        assert_eq!(b.transport().calls, sent);
    }
}
