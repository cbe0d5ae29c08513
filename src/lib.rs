//! SD card bring-up library written in Embedded Rust, inspired by
//! [sdmmc-spi](https://crates.io/crates/sdmmc-spi).
//!
//! This crate drives the command path of a memory-mapped SDIO host
//! peripheral to take an SD card from power-on to the addressed state:
//! idle reset, interface condition check, operating condition negotiation,
//! identification, relative address assignment and CSD retrieval. Data
//! transfer, bus-width switching and card detection are out of scope.
//!
//! The peripheral is reached through the [`SdioBus`] register trait, so the
//! protocol engine runs unchanged against real hardware or a simulated bus.
//!
//! ## Features
//!
//! * `log` (default): log bring-up progress through the `log` crate.
//! * `defmt-log`: log through `defmt` instead. Enable exactly one of the
//!   two features.

#![cfg_attr(not(test), no_std)]

mod bus;
mod command;
mod config;
mod consts;
mod csd;
mod response;

pub use crate::bus::SdioBus;
pub use crate::command::{lookup, CmdInfo, ResponseType};
pub use crate::config::{DefaultSdioConfig, SdioConfig};
pub use crate::csd::{CapacityProvider, Cid, Csd, CsdV1, CsdV2, ResponseWords};
pub use crate::response::{CardStatus, Ocr, PublishedRca};

use crate::consts::{arguments, commands, control, masks, status};

use core::marker::PhantomData;

#[cfg(feature = "defmt-log")]
use defmt::{error, info, trace, warn};
#[cfg(feature = "log")]
use log::{error, info, trace, warn};

/// [`SdioCard`] result error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Error {
    /// Command is absent from the active descriptor namespace.
    UnknownCommand(u8),
    /// Software completion budget exhausted while executing this command.
    SoftwareTimeout(u8),
    /// The peripheral reported a response timeout for this command.
    HardwareTimeout(u8),
    /// The peripheral reported a response CRC mismatch for this command.
    ResponseCrc(u8),
    /// The echoed command index never matched the command just sent.
    IllegalResponse { sent: u8, received: u8 },
    /// Error bits set in an R1 card status (masked value).
    CardError(u32),
    /// Error bits set in the published-RCA response (masked value).
    RcaError(u32),
    /// The card never signalled power-up completion during operating
    /// condition negotiation.
    PowerUpTimeout,
}

/// Outcome of waiting for command-path completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Ready,
    CrcFailed,
    HardwareTimeout,
    SoftwareTimeout,
}

/// SD card driver over the command path of an SDIO host peripheral.
///
/// `Bus` - register interface to the peripheral.
/// `Config` - implementation of driver config trait.
///
/// The driver owns the card session state: the descriptor namespace flag
/// plus the RCA, CID and CSD captured during bring-up. Clock tree, pin
/// modes and the peripheral's power and clock enables are the caller's
/// responsibility and must be configured (with the bus clock below 400kHz)
/// before [`init`](SdioCard::init) is called.
pub struct SdioCard<Bus: SdioBus, Config: SdioConfig> {
    bus: Bus,
    /// The next descriptor lookup uses the application-specific namespace.
    app_command_pending: bool,
    rca: Option<u16>,
    cid: Option<Cid>,
    csd: Option<Csd>,
    config: PhantomData<Config>,
}

impl<Bus: SdioBus, Config: SdioConfig> SdioCard<Bus, Config> {
    /// Creates a new [`SdioCard<Bus, Config>`].
    ///
    /// `bus` - register interface instance.
    pub fn new(bus: Bus) -> Self {
        SdioCard {
            bus,
            app_command_pending: false,
            rca: None,
            cid: None,
            csd: None,
            config: PhantomData::<Config>,
        }
    }

    /// Releases the bus.
    pub fn release(self) -> Bus {
        self.bus
    }

    /// Relative card address published during bring-up.
    pub fn rca(&self) -> Option<u16> {
        self.rca
    }

    /// Card identification register captured during bring-up.
    pub fn cid(&self) -> Option<&Cid> {
        self.cid.as_ref()
    }

    /// Card specific data captured during bring-up.
    pub fn csd(&self) -> Option<&Csd> {
        self.csd.as_ref()
    }

    /// Block until the peripheral reports completion for `cmd`, under the
    /// timeout policy its descriptor selects. Acknowledges the status bits
    /// exactly once, on every outcome, after they have been classified.
    fn await_completion(&mut self, cmd: &CmdInfo) -> Completion {
        let completion = if cmd.ignore_hardware_timeout {
            // Commands without a response only ever raise the sent flag;
            // the response timeout cannot fire for them.
            self.wait_sent()
        } else if cmd.use_software_timeout {
            self.wait_completion_bounded()
        } else {
            self.wait_completion()
        };

        self.bus.clear_status(status::CLEAR_MASK);

        completion
    }

    fn wait_sent(&mut self) -> Completion {
        for _ in 0..Config::SOFT_TIMEOUT_CYCLES {
            if self.bus.status() & status::CMDSENT != 0 {
                return Completion::Ready;
            }
        }

        Completion::SoftwareTimeout
    }

    fn wait_completion_bounded(&mut self) -> Completion {
        for _ in 0..Config::SOFT_TIMEOUT_CYCLES {
            let flags = self.bus.status();
            if flags & status::COMPLETION_FLAGS != 0 {
                return Self::classify(flags);
            }
        }

        Completion::SoftwareTimeout
    }

    /// Unbounded wait. A peripheral that never raises a completion flag
    /// hangs the caller; commands selecting this policy accept that.
    fn wait_completion(&mut self) -> Completion {
        loop {
            let flags = self.bus.status();
            if flags & status::COMPLETION_FLAGS != 0 {
                return Self::classify(flags);
            }
        }
    }

    fn classify(flags: u32) -> Completion {
        if flags & status::CTIMEOUT != 0 {
            Completion::HardwareTimeout
        } else if flags & status::CCRCFAIL != 0 {
            Completion::CrcFailed
        } else {
            Completion::Ready
        }
    }

    /// Poll the echo field until it matches the command just sent. The
    /// field lags the completion flags, so it gets a bounded window to
    /// converge.
    fn check_echo(&mut self, index: u8) -> Result<(), Error> {
        let mut received = self.bus.response_command();
        let mut attempts = 1;

        while received != index && attempts < Config::ECHO_POLL_ATTEMPTS {
            received = self.bus.response_command();
            attempts += 1;
        }

        if received != index {
            warn!("SD: illegal response, got CMD{}", received);
            return Err(Error::IllegalResponse {
                sent: index,
                received,
            });
        }

        Ok(())
    }

    /// Read a response word repeatedly before using it, to let the
    /// register settle after completion.
    fn settled_response_word(&mut self, index: usize) -> u32 {
        let mut word = self.bus.response_word(index);
        for _ in 1..Config::RESPONSE_SETTLE_READS {
            word = self.bus.response_word(index);
        }

        word
    }

    fn capture_long_response(&mut self) -> ResponseWords {
        [
            self.settled_response_word(0),
            self.bus.response_word(1),
            self.bus.response_word(2),
            self.bus.response_word(3),
        ]
    }

    /// Send one command and validate its response according to the command
    /// descriptor. Does not retry.
    pub fn send_command(&mut self, index: u8, argument: u32) -> Result<(), Error> {
        trace!("SD: CMD{}, arg: {}", index, argument);

        let cmd = command::lookup(self.app_command_pending, index);

        // APP_CMD announces that the next command is application specific.
        // The flag tracks the attempted command, not its outcome.
        self.app_command_pending = index == commands::CMD55;

        let cmd = cmd.ok_or(Error::UnknownCommand(index))?;

        self.bus.write_argument(argument);

        let mut control_value = control::CPSMEN | u32::from(index);
        control_value |= match cmd.response_type {
            ResponseType::None => 0,
            ResponseType::R2 => control::WAITRESP_LONG,
            _ => control::WAITRESP_SHORT,
        };
        self.bus.write_command(control_value);

        match self.await_completion(cmd) {
            Completion::Ready => {}
            // R3 carries no valid CRC field; a CRC flag there is noise.
            Completion::CrcFailed if cmd.response_type == ResponseType::R3 => {}
            Completion::CrcFailed => return Err(Error::ResponseCrc(index)),
            Completion::HardwareTimeout => return Err(Error::HardwareTimeout(index)),
            Completion::SoftwareTimeout => return Err(Error::SoftwareTimeout(index)),
        }

        match cmd.response_type {
            ResponseType::None | ResponseType::R2 | ResponseType::R3 => Ok(()),
            ResponseType::R6 | ResponseType::R7 => self.check_echo(index),
            ResponseType::R1 => {
                self.check_echo(index)?;

                let card_status = CardStatus(self.settled_response_word(0));
                if card_status.has_errors() {
                    warn!("SD: card error: {}", card_status.errors());
                    return Err(Error::CardError(card_status.errors()));
                }

                Ok(())
            }
        }
    }

    /// Repeatedly ask the card for its operating conditions until it
    /// reports power-up completion. This is the only retrying operation in
    /// the bring-up sequence.
    fn negotiate_operating_conditions(&mut self) -> Result<(), Error> {
        info!("SD negotiating operating conditions");

        for _ in 0..Config::OP_COND_ATTEMPTS {
            self.send_command(commands::CMD55, 0)?;
            self.send_command(
                commands::ACMD41,
                arguments::VOLTAGE_WINDOW | arguments::HIGH_CAPACITY,
            )?;

            let ocr = Ocr(self.settled_response_word(0));
            if ocr.power_up_complete() {
                if ocr.card_capacity_status() {
                    info!("SD card is high capacity");
                }
                return Ok(());
            }
        }

        error!("SD card never signalled power-up completion");
        Err(Error::PowerUpTimeout)
    }

    /// Bring the card from power-on to the addressed state.
    ///
    /// Runs the fixed sequence: idle reset, interface condition check,
    /// bounded operating condition negotiation, identification, relative
    /// address assignment, CSD retrieval. The first failing step aborts
    /// the rest.
    pub fn init(&mut self) -> Result<(), Error> {
        info!("SD initialize started");

        // Fresh session for this bring-up attempt.
        self.app_command_pending = false;
        self.rca = None;
        self.cid = None;
        self.csd = None;

        self.send_command(commands::CMD0, 0)?;
        self.send_command(commands::CMD8, arguments::IF_COND_CHECK)?;

        self.negotiate_operating_conditions()?;

        self.send_command(commands::CMD2, 0)?;
        self.cid = Some(Cid::from(self.capture_long_response()));

        self.send_command(commands::CMD3, 0)?;
        let published = PublishedRca(self.settled_response_word(0));
        if published.has_errors() {
            warn!("SD: address assignment error: {}", published.0 & masks::R6_ERRORS);
            return Err(Error::RcaError(published.0 & masks::R6_ERRORS));
        }
        let rca = published.address();

        self.send_command(commands::CMD9, u32::from(rca) << 16)?;
        self.csd = Some(Csd::from(self.capture_long_response()));

        self.rca = Some(rca);
        info!("SD successfully initialized, rca: {}", rca);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One scripted command/response exchange.
    #[derive(Clone, Copy)]
    struct Exchange {
        /// Status the peripheral reports while this command completes.
        status: u32,
        /// Echo field value; `None` echoes the sent index.
        echo: Option<u8>,
        /// RESP1..RESP4.
        response: [u32; 4],
    }

    fn ok_sent() -> Exchange {
        Exchange {
            status: status::CMDSENT,
            echo: None,
            response: [0; 4],
        }
    }

    fn ok_short(word: u32) -> Exchange {
        Exchange {
            status: status::CMDREND,
            echo: None,
            response: [word, 0, 0, 0],
        }
    }

    fn ok_long(words: [u32; 4]) -> Exchange {
        Exchange {
            status: status::CMDREND,
            echo: None,
            response: words,
        }
    }

    /// R3 exchanges complete with the CRC flag raised and a garbage echo,
    /// like real hardware.
    fn ok_ocr(ocr: u32) -> Exchange {
        Exchange {
            status: status::CMDREND | status::CCRCFAIL,
            echo: Some(0x3F),
            response: [ocr, 0, 0, 0],
        }
    }

    fn failed(status: u32) -> Exchange {
        Exchange {
            status,
            echo: None,
            response: [0; 4],
        }
    }

    /// Scripted SDIO peripheral: serves one exchange per command register
    /// write and records all register traffic.
    struct MockBus {
        script: Vec<Exchange>,
        /// (index, argument) per command register write.
        sent: Vec<(u8, u32)>,
        pending_argument: u32,
        clear_writes: usize,
        status_reads: usize,
        echo_reads: usize,
    }

    impl MockBus {
        fn new(script: Vec<Exchange>) -> Self {
            MockBus {
                script,
                sent: Vec::new(),
                pending_argument: 0,
                clear_writes: 0,
                status_reads: 0,
                echo_reads: 0,
            }
        }

        fn current(&self) -> Exchange {
            self.script[self.sent.len() - 1]
        }

        fn sent_indices(&self) -> Vec<u8> {
            self.sent.iter().map(|(index, _)| *index).collect()
        }
    }

    impl SdioBus for MockBus {
        fn write_argument(&mut self, argument: u32) {
            self.pending_argument = argument;
        }

        fn write_command(&mut self, control_value: u32) {
            assert_ne!(control_value & control::CPSMEN, 0);
            let index = (control_value & control::INDEX_MASK) as u8;
            self.sent.push((index, self.pending_argument));
        }

        fn status(&mut self) -> u32 {
            self.status_reads += 1;
            self.current().status
        }

        fn clear_status(&mut self, mask: u32) {
            assert_eq!(mask, status::CLEAR_MASK);
            self.clear_writes += 1;
        }

        fn response_command(&mut self) -> u8 {
            self.echo_reads += 1;
            let (index, _) = *self.sent.last().unwrap();
            self.current().echo.unwrap_or(index)
        }

        fn response_word(&mut self, index: usize) -> u32 {
            self.current().response[index]
        }
    }

    struct TestConfig;

    impl SdioConfig for TestConfig {
        const SOFT_TIMEOUT_CYCLES: u32 = 16;
        const ECHO_POLL_ATTEMPTS: u32 = 4;
        const RESPONSE_SETTLE_READS: u32 = 3;
        const OP_COND_ATTEMPTS: u32 = 3;
    }

    fn card(script: Vec<Exchange>) -> SdioCard<MockBus, TestConfig> {
        SdioCard::new(MockBus::new(script))
    }

    /// R1 status with READY_FOR_DATA and APP_CMD set, no error bits.
    const APP_CMD_ACCEPTED: u32 = 0x0000_0120;
    const OCR_BUSY: u32 = 0x00FF_8000;
    const OCR_READY: u32 = 0xC0FF_8000;

    const CID_WORDS: [u32; 4] = [0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444];
    const CSD_WORDS: [u32; 4] = [0x400E_0032, 0x5B59_0000, 0x7652_7F80, 0x0A40_40AF];

    fn happy_script(busy_rounds: usize) -> Vec<Exchange> {
        let mut script = vec![ok_sent(), ok_short(0x1AA)];
        for _ in 0..busy_rounds {
            script.push(ok_short(APP_CMD_ACCEPTED));
            script.push(ok_ocr(OCR_BUSY));
        }
        script.push(ok_short(APP_CMD_ACCEPTED));
        script.push(ok_ocr(OCR_READY));
        script.push(ok_long(CID_WORDS));
        script.push(ok_short(0x0001_0000));
        script.push(ok_long(CSD_WORDS));
        script
    }

    fn words_to_u128(words: [u32; 4]) -> u128 {
        (u128::from(words[0]) << 96)
            | (u128::from(words[1]) << 64)
            | (u128::from(words[2]) << 32)
            | u128::from(words[3])
    }

    #[test]
    fn software_timeout_exhausts_exact_budget() {
        let mut card = card(vec![failed(0)]);

        assert_eq!(
            card.send_command(commands::CMD0, 0),
            Err(Error::SoftwareTimeout(commands::CMD0))
        );
        assert_eq!(card.bus.status_reads as u32, TestConfig::SOFT_TIMEOUT_CYCLES);
        assert_eq!(card.bus.clear_writes, 1);
    }

    #[test]
    fn hardware_timeout_is_reported_and_cleared() {
        let mut card = card(vec![failed(status::CTIMEOUT)]);

        assert_eq!(
            card.send_command(commands::CMD8, arguments::IF_COND_CHECK),
            Err(Error::HardwareTimeout(commands::CMD8))
        );
        assert_eq!(card.bus.clear_writes, 1);
    }

    #[test]
    fn crc_failure_fails_short_response_commands() {
        let mut card = card(vec![failed(status::CMDREND | status::CCRCFAIL)]);

        assert_eq!(
            card.send_command(commands::CMD55, 0),
            Err(Error::ResponseCrc(commands::CMD55))
        );
        assert_eq!(card.bus.clear_writes, 1);
    }

    #[test]
    fn r3_never_evaluates_crc_or_echo() {
        let mut card = card(vec![ok_short(APP_CMD_ACCEPTED), ok_ocr(OCR_READY)]);

        card.send_command(commands::CMD55, 0).unwrap();
        let echo_reads_before = card.bus.echo_reads;

        // Completes despite the CRC flag and a garbage echo field.
        card.send_command(
            commands::ACMD41,
            arguments::VOLTAGE_WINDOW | arguments::HIGH_CAPACITY,
        )
        .unwrap();

        assert_eq!(card.bus.echo_reads, echo_reads_before);
    }

    #[test]
    fn echo_mismatch_is_an_illegal_response() {
        let mut script = vec![ok_short(0x1AA)];
        script[0].echo = Some(0x15);
        let mut card = card(script);

        assert_eq!(
            card.send_command(commands::CMD8, arguments::IF_COND_CHECK),
            Err(Error::IllegalResponse {
                sent: commands::CMD8,
                received: 0x15,
            })
        );
        assert_eq!(card.bus.echo_reads as u32, TestConfig::ECHO_POLL_ATTEMPTS);
        assert_eq!(card.bus.clear_writes, 1);
    }

    #[test]
    fn echo_match_stops_polling() {
        let mut card = card(vec![ok_short(0x1AA)]);

        card.send_command(commands::CMD8, arguments::IF_COND_CHECK)
            .unwrap();

        assert_eq!(card.bus.echo_reads, 1);
    }

    #[test]
    fn r1_card_error_bits_fail_the_command() {
        // ILLEGAL_COMMAND plus a non-error bit; only the masked value
        // surfaces.
        let mut card = card(vec![ok_short((1 << 22) | (1 << 8))]);

        assert_eq!(
            card.send_command(commands::CMD55, 0),
            Err(Error::CardError(1 << 22))
        );
    }

    #[test]
    fn namespace_flag_tracks_last_attempted_command() {
        let mut card = card(vec![
            ok_short(APP_CMD_ACCEPTED),
            ok_ocr(OCR_READY),
            failed(status::CTIMEOUT),
            failed(status::CTIMEOUT),
        ]);

        assert!(!card.app_command_pending);

        card.send_command(commands::CMD55, 0).unwrap();
        assert!(card.app_command_pending);

        card.send_command(commands::ACMD41, 0).unwrap();
        assert!(!card.app_command_pending);

        // A failed APP_CMD still switches the namespace.
        assert!(card.send_command(commands::CMD55, 0).is_err());
        assert!(card.app_command_pending);

        // And any other attempt, failed or not, switches it back.
        assert!(card.send_command(commands::ACMD41, 0).is_err());
        assert!(!card.app_command_pending);
    }

    #[test]
    fn unknown_command_is_refused_before_the_bus_is_touched() {
        let mut card = card(vec![]);

        assert_eq!(card.send_command(17, 0), Err(Error::UnknownCommand(17)));
        assert!(card.bus.sent.is_empty());
        assert_eq!(card.bus.clear_writes, 0);
    }

    #[test]
    fn negotiation_succeeds_after_n_plus_one_rounds() {
        let mut card = card(happy_script(2));

        card.init().unwrap();

        let acmd41_sends = card
            .bus
            .sent_indices()
            .iter()
            .filter(|&&index| index == commands::ACMD41)
            .count();
        assert_eq!(acmd41_sends, 3);
    }

    #[test]
    fn negotiation_exhausts_the_bound() {
        let mut script = vec![ok_sent(), ok_short(0x1AA)];
        for _ in 0..TestConfig::OP_COND_ATTEMPTS {
            script.push(ok_short(APP_CMD_ACCEPTED));
            script.push(ok_ocr(OCR_BUSY));
        }
        let mut card = card(script);

        assert_eq!(card.init(), Err(Error::PowerUpTimeout));

        let indices = card.bus.sent_indices();
        let acmd41_sends = indices
            .iter()
            .filter(|&&index| index == commands::ACMD41)
            .count();
        assert_eq!(acmd41_sends as u32, TestConfig::OP_COND_ATTEMPTS);
        assert!(!indices.contains(&commands::CMD2));
        assert_eq!(card.rca(), None);
    }

    #[test]
    fn rca_error_bits_abort_bring_up() {
        let mut script = happy_script(0);
        // SEND_RELATIVE_ADDR is the 6th exchange.
        script[5] = ok_short(0x0001_2000);
        let mut card = card(script);

        assert_eq!(card.init(), Err(Error::RcaError(0x2000)));
        assert_eq!(card.rca(), None);
        assert!(card.csd().is_none());
    }

    #[test]
    fn failed_bring_up_leaves_no_session_state() {
        let mut card = card(vec![ok_sent(), failed(status::CTIMEOUT)]);

        assert_eq!(
            card.init(),
            Err(Error::HardwareTimeout(commands::CMD8))
        );
        assert_eq!(card.rca(), None);
        assert!(card.cid().is_none());
        assert!(card.csd().is_none());
    }

    #[test]
    fn bring_up_end_to_end() {
        let mut card = card(happy_script(0));

        card.init().unwrap();

        // Fixed protocol order, one exchange per command.
        assert_eq!(
            card.bus.sent_indices(),
            vec![0, 8, 55, 41, 2, 3, 9],
        );

        // Arguments: CMD8 check pattern, ACMD41 voltage window plus HCS,
        // CMD9 carries the RCA in the upper half.
        assert_eq!(card.bus.sent[1].1, 0x1AA);
        assert_eq!(
            card.bus.sent[3].1,
            arguments::VOLTAGE_WINDOW | arguments::HIGH_CAPACITY
        );
        assert_eq!(card.bus.sent[6].1, 0x0001_0000);

        // Session state captured in order, nothing swapped or dropped.
        assert_eq!(card.rca(), Some(0x0001));
        assert_eq!(card.cid().unwrap().raw(), words_to_u128(CID_WORDS));
        assert_eq!(card.csd().unwrap().raw(), words_to_u128(CSD_WORDS));

        // One status acknowledge per command, no double or missing clear.
        assert_eq!(card.bus.clear_writes, card.bus.sent.len());
    }
}
