//! Flood engine for constructive-interference dissemination.
//!
//! This module provides the [`Glossy`] struct, the per-node controller of
//! a single flood. One node initiates by transmitting the payload; every
//! node that hears it retransmits immediately, relying on the radio's
//! automatic RX→TX and TX→RX transitions to stay bit-synchronous with
//! its neighbors. Each participant counts its transmissions against the
//! `n_tx_max` budget carried in the header and withdraws once the budget
//! is spent.
//!
//! ## Control flow
//!
//! [`Glossy::start`] configures the radio and either transmits (initiator)
//! or listens (receiver). From then on the flood is driven entirely by
//! the radio's interrupt callbacks:
//!
//! - [`rx_started`](Glossy::rx_started): preamble+sync detected
//! - [`header_received`](Glossy::header_received): header bytes in the
//!   FIFO, validated early so a foreign packet aborts the reception
//! - [`rx_ended`](Glossy::rx_ended): CRC-clean packet, queue the
//!   retransmission, learn unknown header fields, update the time
//!   reference
//! - [`tx_ended`](Glossy::tx_ended): count the transmission, stop when
//!   the budget is spent, arm the retransmission timeout on a lonely
//!   initiator
//! - [`rx_failed`](Glossy::rx_failed) / [`rx_tx_error`](Glossy::rx_tx_error)
//!   recover and listen again
//!
//! The tightest deadline sits inside `rx_ended`: the next packet must be
//! in the TX FIFO before the radio, already switched to TX, sends its
//! preamble. Callbacks therefore run to completion and never yield.
//!
//! ## Example
//!
//! ```rust,ignore
//! use glossy433::driver::{FloodPayload, Glossy};
//!
//! let mut glossy = Glossy::new(radio, timer, 2, None);
//! // node 2 joins a flood seeded by node 1, parameters unknown
//! glossy.start(1, FloodPayload::Expect(None), 0, true, false);
//! // ... interrupts fire ...
//! let n_rx = glossy.stop();
//! if n_rx > 0 {
//!     let payload = glossy.payload();
//! }
//! ```
//!
//! ## Design notes
//!
//! No error is ever reported from `start`: a flood is a best-effort
//! one-shot primitive and reliability is built from repeated floods at a
//! higher layer. The caller inspects [`rx_cnt`](Glossy::rx_cnt) and
//! [`is_t_ref_updated`](Glossy::is_t_ref_updated) after `stop()`.
//!
//! For the time-reference internals, see [`crate::sync`].

use crate::consts::{COMMON_HEADER, MAX_PACKET_LEN, PAYLOAD_LEN, PAYLOAD_LEN_USIZE,
                    RF_RDY_WAIT_LOOPS, SYNC_SETUP_TICKS, UNKNOWN_N_TX_MAX};
#[cfg(feature = "rtx-timeout")]
use crate::consts::{SLOT_TIMEOUT_MIN, TIMEOUT_EXTRA_TICKS};
#[cfg(feature = "stats")]
use crate::consts::RSSI_WAIT_LOOPS;
use crate::header::Header;
use crate::radio::{CalibrationMode, OffMode, Radio};
#[cfg(feature = "stats")]
use crate::stats::GlossyStats;
use crate::sync::{TimeSync, TAU1_HF};
use crate::timer::Timer;
use embedded_hal::digital::OutputPin;

use core::convert::Infallible;
#[cfg(not(feature = "std"))]
use heapless::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

/// Payload argument of [`Glossy::start`], depending on the node's role in
/// the flood.
#[derive(Debug, Clone, Copy)]
pub enum FloodPayload<'a> {
    /// The payload to disseminate. Required when this node is the
    /// initiator.
    Data(&'a [u8]),
    /// The expected payload length on a receiver, or `None` when unknown;
    /// an unknown length is learned from the first valid packet.
    Expect(Option<u8>),
}

/// Debug activity outputs, typically wired to LEDs or logic-analyzer
/// probes.
///
/// All three outputs are optional as a set; error results from the pins
/// are ignored, a stuck debug pin must never disturb the protocol.
#[derive(Debug)]
pub struct DebugPins<P: OutputPin> {
    /// High while a flood is active.
    pub flood: P,
    /// High while a reception is in progress.
    pub rx: P,
    /// High while a transmission is in progress.
    pub tx: P,
}

impl<P: OutputPin> DebugPins<P> {
    fn flood_started(&mut self) {
        let _ = self.flood.set_high();
    }
    fn flood_stopped(&mut self) {
        let _ = self.flood.set_low();
    }
    fn rx_started(&mut self) {
        let _ = self.rx.set_high();
    }
    fn rx_stopped(&mut self) {
        let _ = self.rx.set_low();
    }
    fn tx_started(&mut self) {
        let _ = self.tx.set_high();
    }
    fn tx_stopped(&mut self) {
        let _ = self.tx.set_low();
    }
}

/// Stand-in for an unused debug-pin slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl embedded_hal::digital::ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Per-node engine for one flood at a time.
///
/// The instance is co-owned by the caller thread (`start`/`stop`) and the
/// radio/timer interrupt handlers; wrap it in the singleton plumbing of
/// [`crate::timer::isr`] so every access happens inside a critical
/// section. Late callbacks arriving after the flood ended are ignored.
///
/// ## Type Parameters
///
/// - `R`: the packet radio, see [`Radio`]
/// - `T`: the platform timer subsystem, see [`Timer`]
/// - `P`: the debug-pin type, [`NoPin`] when unused
#[derive(Debug)]
pub struct Glossy<R, T, P = NoPin>
where
    R: Radio,
    T: Timer,
    P: OutputPin,
{
    /// The radio backing this node. Exposed so integration layers can
    /// share the hardware between floods.
    pub radio: R,
    /// The timer subsystem backing timestamps and the one-shot timeout.
    pub timer: T,
    /// Optional debug activity outputs.
    pub pins: Option<DebugPins<P>>,

    node_id: u16,
    initiator_id: u16,
    header: Header,
    #[cfg(feature = "std")]
    payload: Vec<u8>,
    #[cfg(not(feature = "std"))]
    payload: Vec<u8, PAYLOAD_LEN_USIZE>,
    payload_len: Option<u8>,
    sync: TimeSync,
    t_rx_start: u64,
    t_rx_stop: u64,
    t_tx_start: u64,
    t_tx_stop: u64,
    #[cfg(feature = "rtx-timeout")]
    t_timeout: u64,
    relay_cnt_last_rx: u8,
    relay_cnt_last_tx: u8,
    #[cfg(feature = "rtx-timeout")]
    relay_cnt_timeout: u8,
    n_rx: u8,
    n_tx: u8,
    header_ok: bool,
    active: bool,
    #[cfg(feature = "stats")]
    stats: GlossyStats,
}

impl<R, T, P> Glossy<R, T, P>
where
    R: Radio,
    T: Timer,
    P: OutputPin,
{
    /// Creates an inactive driver bound to this node's identity.
    pub fn new(radio: R, timer: T, node_id: u16, pins: Option<DebugPins<P>>) -> Self {
        Self {
            radio,
            timer,
            pins,
            node_id,
            initiator_id: 0,
            header: Header::default(),
            payload: Vec::new(),
            payload_len: None,
            sync: TimeSync::new(),
            t_rx_start: 0,
            t_rx_stop: 0,
            t_tx_start: 0,
            t_tx_stop: 0,
            #[cfg(feature = "rtx-timeout")]
            t_timeout: 0,
            relay_cnt_last_rx: 0,
            relay_cnt_last_tx: 0,
            #[cfg(feature = "rtx-timeout")]
            relay_cnt_timeout: 0,
            n_rx: 0,
            n_tx: 0,
            header_ok: false,
            active: false,
            #[cfg(feature = "stats")]
            stats: GlossyStats::new(),
        }
    }

    fn is_initiator(&self) -> bool {
        self.node_id == self.initiator_id
    }

    /// Copies a payload into the driver buffer. False when it does not
    /// fit; the buffer is left empty in that case.
    fn store_payload(&mut self, data: &[u8]) -> bool {
        self.payload.clear();
        if data.len() > PAYLOAD_LEN_USIZE {
            return false;
        }
        #[cfg(feature = "std")]
        self.payload.extend_from_slice(data);
        #[cfg(not(feature = "std"))]
        if self.payload.extend_from_slice(data).is_err() {
            return false;
        }
        true
    }

    fn write_packet_to_tx_fifo(&mut self) {
        let (bytes, len) = self.header.to_bytes();
        self.radio.write_to_tx_fifo(&bytes[..len], &self.payload);
    }

    /// Begins a flood seeded by `initiator_id`.
    ///
    /// When the local node *is* the initiator it must pass
    /// [`FloodPayload::Data`] and fully specified `with_sync`/`n_tx_max`;
    /// it transmits immediately. Any other node becomes a receiver: it
    /// listens with possibly-unknown parameters
    /// ([`FloodPayload::Expect`], `n_tx_max == 0`) and learns them from
    /// the first valid packet.
    ///
    /// The radio is configured so a finished reception switches straight
    /// to TX and a finished transmission straight back to RX. With
    /// `with_rf_cal` a manual frequency-synthesizer calibration runs
    /// before the flood.
    ///
    /// Must be called with the driver singleton locked (interrupts
    /// masked); nothing is reported back, invalid initiator arguments
    /// silently stop the flood, per the one-shot best-effort contract.
    pub fn start(
        &mut self,
        initiator_id: u16,
        payload: FloodPayload<'_>,
        n_tx_max: u8,
        with_sync: bool,
        with_rf_cal: bool,
    ) {
        if let Some(pins) = self.pins.as_mut() {
            pins.flood_started();
        }
        trace!("flood start");
        let setup_time_start = self.timer.now_lf();

        self.active = true;
        self.initiator_id = initiator_id;
        self.n_rx = 0;
        self.n_tx = 0;
        self.relay_cnt_last_rx = 0;
        self.relay_cnt_last_tx = 0;
        self.header_ok = false;
        self.sync.reset();
        self.payload.clear();
        self.payload_len = match payload {
            FloodPayload::Data(data) if data.len() <= PAYLOAD_LEN_USIZE => Some(data.len() as u8),
            FloodPayload::Data(_) => None,
            FloodPayload::Expect(len) => len,
        };
        #[cfg(feature = "stats")]
        self.stats.reset_flood();

        self.header = Header::new(with_sync, n_tx_max);

        // wake the radio core and arm the automatic RX↔TX transitions
        self.radio.go_to_idle();
        self.radio.set_rxoff_mode(OffMode::Tx);
        self.radio.set_txoff_mode(OffMode::Rx);
        self.radio.set_calibration_mode(CalibrationMode::Manual);
        self.radio.reconfig_after_sleep();
        if with_rf_cal {
            self.radio.manual_calibration();
        }
        self.radio.set_header_len_rx(self.header.wire_len());

        if self.is_initiator() {
            let data = match payload {
                FloodPayload::Data(data) => data,
                FloodPayload::Expect(_) => {
                    // the initiator is the source of the payload
                    let _ = self.stop();
                    return;
                }
            };
            if data.len() + self.header.wire_len() as usize > MAX_PACKET_LEN as usize
                || !self.store_payload(data)
            {
                // over the wire bound, or over the payload buffer; the
                // two differ when the header is a single byte
                let _ = self.stop();
                return;
            }
            self.payload_len = Some(data.len() as u8);
            // the initiator knows the packet length up front; receivers
            // derive the slot estimate on their first reception
            self.sync
                .estimate_t_slot(self.header.wire_len() + data.len() as u8);
            if with_sync {
                // hold the first transmission until the setup time has
                // passed, so consecutive floods start on the slot grid
                while self.timer.now_lf().wrapping_sub(setup_time_start) < SYNC_SETUP_TICKS as u64 {
                }
            }
            #[cfg(feature = "rtx-timeout")]
            {
                self.t_timeout = self.timer.now_hf() + TIMEOUT_EXTRA_TICKS as u64;
            }
            self.radio.start_tx();
            #[cfg(feature = "stats")]
            {
                self.stats.last_flood_duration = self.timer.now_hf();
            }
            self.write_packet_to_tx_fifo();
            #[cfg(feature = "rtx-timeout")]
            {
                self.relay_cnt_timeout = 0;
            }
        } else {
            self.radio.start_rx();
            #[cfg(feature = "stats")]
            {
                self.stats.last_flood_duration = self.timer.now_hf();
                if with_sync {
                    // sample the noise floor before any preamble arrives;
                    // the RSSI readout needs to settle after entering RX
                    let mut timeout = RSSI_WAIT_LOOPS;
                    while !self.radio.rssi_valid() && timeout > 0 {
                        timeout -= 1;
                    }
                    if timeout > 0 {
                        self.stats.last_flood_rssi_noise = self.radio.rssi();
                    }
                }
            }
        }
        // the radio core must have settled before the caller may re-enter
        // a low-power mode
        let mut timeout = RF_RDY_WAIT_LOOPS;
        while !self.radio.rf_core_ready() && timeout > 0 {
            timeout -= 1;
        }
    }

    /// Ends the current flood and returns the number of successful
    /// receptions. Disarms the timeout, flushes both radio FIFOs, puts
    /// the radio to sleep and back-projects the time reference to the
    /// initiator's first transmission. Calling `stop` while inactive is
    /// a no-op.
    pub fn stop(&mut self) -> u8 {
        if self.active {
            self.timer.cancel();
            // the PA table is lost in sleep and restored on the next
            // wake-up by reconfig_after_sleep
            self.radio.flush_rx_fifo();
            self.radio.flush_tx_fifo();
            self.radio.go_to_sleep();
            self.radio.clear_pending_interrupts();

            if let Some(pins) = self.pins.as_mut() {
                pins.rx_stopped();
                pins.tx_stopped();
                pins.flood_stopped();
            }
            self.active = false;

            self.sync.finalize();

            #[cfg(feature = "stats")]
            {
                self.stats.last_flood_duration = self
                    .timer
                    .now_hf()
                    .wrapping_sub(self.stats.last_flood_duration);
                if !self.is_initiator() {
                    // the initiator always hears its own flood; counting
                    // it would bias the success rate
                    if self.stats.last_flood_n_rx_started > 0 {
                        self.stats.flood_cnt += 1;
                    }
                    if self.n_rx > 0 {
                        self.stats.flood_cnt_success += 1;
                    }
                }
            }

            self.timer.update_enable();
            trace!("flood stop");
        }
        self.n_rx
    }

    /// Validates a received header against the local flood state and, on
    /// the CRC-verified pass, learns the unknown fields from it.
    fn process_header(&mut self, rcvd: Header, pkt_len: u8, crc_ok: bool) -> bool {
        if !self.header_ok {
            if rcvd.common_header() != COMMON_HEADER {
                return false;
            }
            if self.header.with_sync() != rcvd.with_sync() {
                return false;
            }
            if self.header.n_tx_max() != UNKNOWN_N_TX_MAX
                && self.header.n_tx_max() != rcvd.n_tx_max()
            {
                return false;
            }
            let header_len = self.header.wire_len();
            if pkt_len < header_len {
                return false;
            }
            if let Some(expected) = self.payload_len {
                if expected != pkt_len - header_len {
                    return false;
                }
            }
            // the radio's length signalling has been seen to misreport;
            // the bound is enforced here even where upstream code appears
            // to have checked it already
            if pkt_len > MAX_PACKET_LEN || pkt_len - header_len > PAYLOAD_LEN {
                return false;
            }
            self.header_ok = true;
        }

        if crc_ok {
            let header_len = rcvd.wire_len();
            if pkt_len > MAX_PACKET_LEN
                || pkt_len < header_len
                || pkt_len - header_len > PAYLOAD_LEN
            {
                return false;
            }
            // the entire packet arrived and the CRC was good: keep the
            // header, all previously unknown values are now learned
            self.header = rcvd;
            self.payload_len = Some(pkt_len - header_len);
            self.radio.set_header_len_rx(header_len);
        }

        true
    }

    /// Radio callback: preamble and sync word detected, a reception is
    /// under way.
    pub fn rx_started(&mut self, timestamp: u64) {
        if !self.active {
            return;
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.rx_started();
        }
        // keep the timer service routine out of the way until the packet
        // is handled: FIFO reads and the RX→TX switch must not be delayed
        self.timer.update_disable();

        self.t_rx_start = timestamp;
        self.header_ok = false;
        #[cfg(feature = "stats")]
        {
            self.stats.already_counted = false;
            self.stats.pkt_cnt += 1;
            if self.stats.last_flood_n_rx_started == 0 {
                self.stats.last_flood_t_to_rx =
                    timestamp.wrapping_sub(self.stats.last_flood_duration);
            }
            self.stats.last_flood_n_rx_started = self.stats.last_flood_n_rx_started.wrapping_add(1);
        }

        if self.is_initiator() {
            // an echo is coming in, the retransmission timeout is obsolete
            self.timer.cancel();
        }
    }

    /// Radio callback: a transmission left the FIFO and is on the air.
    pub fn tx_started(&mut self, timestamp: u64) {
        if !self.active {
            return;
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.tx_started();
        }
        self.t_tx_start = timestamp;
    }

    /// Radio callback: the header bytes are in the RX FIFO ahead of the
    /// packet body. A header that fails validation aborts the reception
    /// right away instead of wasting the rest of the slot on a foreign
    /// packet.
    pub fn header_received(&mut self, timestamp: u64, header: &[u8], pkt_len: u8) {
        if !self.active {
            return;
        }
        let accepted = match Header::parse(header) {
            Some(rcvd) => self.process_header(rcvd, pkt_len, false),
            None => false,
        };
        if !accepted {
            self.rx_failed(timestamp);
        }
    }

    /// Radio callback: a reception completed with a good CRC.
    ///
    /// Queues the relayed copy (relay counter incremented) into the TX
    /// FIFO (this must happen before the radio, already switched to TX,
    /// emits its preamble), hands the payload to the application on the
    /// first reception, and feeds the time-reference engine.
    pub fn rx_ended(&mut self, timestamp: u64, pkt: &[u8]) {
        if !self.active {
            return;
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.rx_stopped();
        }
        self.timer.update_enable();
        self.t_rx_stop = timestamp;
        #[cfg(feature = "stats")]
        {
            self.stats.pkt_cnt_crcok += 1;
        }

        let pkt_len = pkt.len() as u8;
        let accepted = match Header::parse(pkt) {
            Some(rcvd) => self.process_header(rcvd, pkt_len, true),
            None => false,
        };

        if accepted {
            let header_len = self.header.wire_len() as usize;
            let rx_payload = &pkt[header_len..];

            // relay counter of this reception, before claiming the next hop
            let rcvd_relay_cnt = self.header.relay_cnt;
            self.header.relay_cnt = rcvd_relay_cnt.wrapping_add(1);

            if self.header.n_tx_max() == UNKNOWN_N_TX_MAX || self.n_tx < self.header.n_tx_max() {
                let (bytes, len) = self.header.to_bytes();
                self.radio.write_to_tx_fifo(&bytes[..len], rx_payload);
            } else {
                // transmission budget already spent
                let _ = self.stop();
            }

            #[cfg(feature = "stats")]
            {
                if self.header.with_relay_cnt() && self.n_rx == 0 {
                    self.stats.last_flood_relay_cnt = rcvd_relay_cnt;
                }
                self.stats.last_flood_rssi_sum += self.radio.last_packet_rssi() as i16;
            }

            self.n_rx = self.n_rx.wrapping_add(1);

            if !self.is_initiator() && self.n_rx == 1 {
                // hand the payload to the application, exactly once
                if !self.store_payload(rx_payload) {
                    self.payload_len = None;
                }
            }

            if self.header.with_sync() {
                self.relay_cnt_last_rx = self.header.relay_cnt.wrapping_sub(1);

                if !self.sync.t_ref_updated {
                    self.sync.update_t_ref(
                        self.t_rx_start.wrapping_sub(TAU1_HF as u64),
                        self.header.relay_cnt.wrapping_sub(1),
                    );
                    // estimating here rather than at tx_started keeps the
                    // slot estimate valid even when the flood ends before
                    // this node ever transmits
                    self.sync
                        .estimate_t_slot(self.header.wire_len() + self.payload_len.unwrap_or(0));
                }

                if self.relay_cnt_last_rx == self.relay_cnt_last_tx.wrapping_add(1) && self.n_tx > 0
                {
                    // reception immediately after a transmission; the
                    // TX→RX turnaround subtracts tau1
                    self.sync.add_t_slot_measurement(
                        self.t_rx_start
                            .wrapping_sub(self.t_tx_start)
                            .wrapping_sub(TAU1_HF as u64) as u32,
                    );
                }
            }
        } else {
            self.rx_failed(timestamp);
        }
    }

    /// Radio callback: a transmission completed; the radio has switched
    /// back to RX on its own.
    pub fn tx_ended(&mut self, timestamp: u64) {
        if !self.active {
            return;
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.tx_stopped();
        }
        self.t_tx_stop = timestamp;

        if self.header.with_sync() {
            self.relay_cnt_last_tx = self.header.relay_cnt;

            if !self.sync.t_ref_updated {
                self.sync.update_t_ref(self.t_tx_start, self.header.relay_cnt);
            }
            if self.relay_cnt_last_tx == self.relay_cnt_last_rx.wrapping_add(1) && self.n_rx > 0 {
                // transmission immediately after a reception; the RX→TX
                // turnaround adds tau1
                self.sync.add_t_slot_measurement(
                    self.t_tx_start
                        .wrapping_sub(self.t_rx_start)
                        .wrapping_add(TAU1_HF as u64) as u32,
                );
            }
        }
        self.n_tx = self.n_tx.wrapping_add(1);

        let n_tx_max = self.header.n_tx_max();
        if self.n_tx == n_tx_max && (n_tx_max > UNKNOWN_N_TX_MAX || !self.is_initiator()) {
            // the budget is spent (or an unbounded receiver wrapped)
            let _ = self.stop();
        } else {
            // the radio is already listening again
            #[cfg(feature = "rtx-timeout")]
            if self.is_initiator() && self.n_rx == 0 {
                // nothing heard back yet: arm the retransmission timeout
                self.schedule_timeout();
            }
        }
    }

    #[cfg(feature = "rtx-timeout")]
    fn schedule_timeout(&mut self) {
        // fixed at the minimum; a randomized pick in
        // SLOT_TIMEOUT_MIN..=SLOT_TIMEOUT_MAX would decorrelate colliding
        // initiators but has never been enabled
        let slot_timeout = SLOT_TIMEOUT_MIN;
        if self.header.with_relay_cnt() {
            // the wire relay counter keeps advancing by the skipped slots
            self.relay_cnt_timeout = self.header.relay_cnt.wrapping_add(slot_timeout);
        }
        self.timer.schedule(
            self.t_timeout + slot_timeout as u64 * self.sync.t_slot_estimated as u64,
        );
    }

    /// Timer callback: the retransmission one-shot fired.
    ///
    /// With the radio quiet the packet goes out again, relay counter
    /// advanced by the slots that went by. While a reception is in
    /// progress the timeout instead backs off by one slot; a legitimate
    /// packet beats a retry.
    #[cfg(feature = "rtx-timeout")]
    pub fn timeout_expired(&mut self) {
        if !self.active {
            // the one-shot outlived the flood
            return;
        }
        let now = self.timer.now_hf();
        if !self.radio.is_busy() {
            self.radio.start_tx();
            self.header.relay_cnt = self.relay_cnt_timeout;
            self.write_packet_to_tx_fifo();
            self.t_timeout = now;
        } else {
            self.relay_cnt_timeout = self.relay_cnt_timeout.wrapping_add(1);
            self.timer
                .schedule(now + self.sync.t_slot_estimated as u64);
        }
    }

    /// Radio callback: the reception was aborted (bad CRC or rejected
    /// header). Flushes the RX FIFO and listens again.
    pub fn rx_failed(&mut self, _timestamp: u64) {
        if !self.active {
            return;
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.rx_stopped();
        }
        warning!("rx failed, corrupted packet dropped");
        #[cfg(feature = "stats")]
        self.stats.count_rx_fail();

        self.timer.update_enable();
        self.radio.flush_rx_fifo();
        self.radio.start_rx();
    }

    /// Radio callback: an unexpected radio interrupt edge, typically
    /// caused by interference. Flushes both FIFOs and listens again.
    pub fn rx_tx_error(&mut self, _timestamp: u64) {
        if !self.active {
            return;
        }
        if let Some(pins) = self.pins.as_mut() {
            pins.rx_stopped();
            pins.tx_stopped();
        }
        warning!("radio rx/tx error");
        #[cfg(feature = "stats")]
        {
            self.stats.error_cnt = self.stats.error_cnt.wrapping_add(1);
        }

        self.timer.update_enable();
        self.radio.flush_rx_fifo();
        self.radio.flush_tx_fifo();
        self.radio.start_rx();
    }

    /// True while a flood is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of successful receptions in the current/last flood.
    pub fn rx_cnt(&self) -> u8 {
        self.n_rx
    }

    /// Number of completed transmissions in the current/last flood.
    pub fn n_tx(&self) -> u8 {
        self.n_tx
    }

    /// Payload length of the current/last flood, `0` while unknown.
    pub fn payload_len(&self) -> u8 {
        self.payload_len.unwrap_or(0)
    }

    /// The flood payload: what was sent (initiator) or received (first
    /// valid reception). Empty on a receiver that heard nothing.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True once a time reference was captured this flood.
    pub fn is_t_ref_updated(&self) -> bool {
        self.sync.t_ref_updated
    }

    /// The reconstructed reference time, the initiator's first
    /// transmission start, in local high-frequency ticks. Final after
    /// [`stop`](Self::stop), provided [`is_t_ref_updated`](Self::is_t_ref_updated).
    pub fn t_ref(&self) -> u64 {
        self.sync.t_ref
    }

    /// The reference time translated into the low-frequency timebase.
    pub fn t_ref_lf(&self) -> u64 {
        let (hf_now, lf_now) = self.timer.now();
        self.sync.t_ref_lf(hf_now, lf_now)
    }

    /// The header currently in flight.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Whether the current flood carries time synchronization.
    pub fn sync_mode(&self) -> bool {
        self.header.with_sync()
    }

    /// Capture window `(start, stop)` of the most recent reception.
    pub fn last_rx_window(&self) -> (u64, u64) {
        (self.t_rx_start, self.t_rx_stop)
    }

    /// Capture window `(start, stop)` of the most recent transmission.
    pub fn last_tx_window(&self) -> (u64, u64) {
        (self.t_tx_start, self.t_tx_stop)
    }

    /// Completes once the flood has ended, yielding the reception count.
    pub fn poll_done(&self) -> nb::Result<u8, Infallible> {
        if self.active {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(self.n_rx)
        }
    }
}

#[cfg(feature = "stats")]
impl<R, T, P> Glossy<R, T, P>
where
    R: Radio,
    T: Timer,
    P: OutputPin,
{
    /// Number of preamble+sync detections in the last flood.
    pub fn rx_try_cnt(&self) -> u8 {
        self.stats.last_flood_n_rx_started
    }

    /// Receptions dropped for a bad header or CRC in the last flood.
    pub fn last_flood_n_rx_fail(&self) -> u8 {
        self.stats.last_flood_n_rx_fail
    }

    /// Average packet RSSI of the last flood in dBm, `0` without a
    /// reception.
    pub fn rssi(&self) -> i8 {
        self.stats.avg_rssi(self.n_rx)
    }

    /// Signal-to-noise ratio of the last flood in dB, `0` when signal or
    /// noise floor is missing.
    pub fn snr(&self) -> i8 {
        self.stats.snr(self.n_rx)
    }

    /// Noise floor sampled right after the flood entered RX, in dBm.
    pub fn noise_floor(&self) -> i8 {
        self.stats.last_flood_rssi_noise
    }

    /// Relay counter observed on the first reception of the last flood.
    pub fn relay_cnt(&self) -> u8 {
        self.stats.last_flood_relay_cnt
    }

    /// Lifetime packet-error rate in units of 0.01 %.
    pub fn per(&self) -> u16 {
        self.stats.per()
    }

    /// Lifetime flood-success rate in units of 0.01 %.
    pub fn fsr(&self) -> u16 {
        self.stats.fsr()
    }

    /// Lifetime number of packet receptions started.
    pub fn n_pkts(&self) -> u32 {
        self.stats.pkt_cnt
    }

    /// Lifetime number of CRC-clean receptions, truncated to the narrow
    /// counter width of the wire stats report. See
    /// [`n_pkts_crcok`](Self::n_pkts_crcok) for the full counter.
    pub fn n_crc_ok(&self) -> u8 {
        self.stats.pkt_cnt_crcok as u8
    }

    /// Lifetime number of CRC-clean receptions.
    pub fn n_pkts_crcok(&self) -> u32 {
        self.stats.pkt_cnt_crcok
    }

    /// Lifetime number of unexpected radio errors.
    pub fn n_errors(&self) -> u16 {
        self.stats.error_cnt
    }

    /// Duration of the last flood in high-frequency ticks.
    pub fn flood_duration(&self) -> u64 {
        self.stats.last_flood_duration
    }

    /// Ticks from flood start to the first preamble detection of the
    /// last flood.
    pub fn t_to_first_rx(&self) -> u64 {
        self.stats.last_flood_t_to_rx
    }

    /// Read access to the raw statistics.
    pub fn stats(&self) -> &GlossyStats {
        &self.stats
    }

    /// Clears the lifetime statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{MAX_HEADER_LEN, PAYLOAD_LEN_USIZE};
    #[cfg(feature = "rtx-timeout")]
    use crate::consts::TIMEOUT_EXTRA_TICKS;
    use core::cell::Cell;

    const HDR_CAP: usize = MAX_HEADER_LEN as usize;
    const PKT_CAP: usize = PAYLOAD_LEN_USIZE + HDR_CAP + 2;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Idle,
        Sleep,
        StartTx,
        StartRx,
        WriteFifo(Vec<u8, HDR_CAP>, Vec<u8, PKT_CAP>),
        FlushRx,
        FlushTx,
        RxOff(OffMode),
        TxOff(OffMode),
        CalMode(CalibrationMode),
        ManualCal,
        HeaderLenRx(u8),
        Reconfig,
        ClearIrq,
    }

    struct MockRadio {
        ops: Vec<Op, 64>,
        busy: bool,
        noise: i8,
        pkt_rssi: i8,
    }

    impl MockRadio {
        fn new() -> Self {
            Self {
                ops: Vec::new(),
                busy: false,
                noise: -97,
                pkt_rssi: -70,
            }
        }

        fn push(&mut self, op: Op) {
            let _ = self.ops.push(op);
        }

        fn count(&self, op: &Op) -> usize {
            self.ops.iter().filter(|o| *o == op).count()
        }

        fn last_fifo(&self) -> (&[u8], &[u8]) {
            for op in self.ops.iter().rev() {
                if let Op::WriteFifo(header, payload) = op {
                    return (header, payload);
                }
            }
            panic!("no FIFO write recorded");
        }
    }

    impl Radio for MockRadio {
        fn go_to_idle(&mut self) {
            self.push(Op::Idle);
        }
        fn go_to_sleep(&mut self) {
            self.push(Op::Sleep);
        }
        fn start_tx(&mut self) {
            self.push(Op::StartTx);
        }
        fn start_rx(&mut self) {
            self.push(Op::StartRx);
        }
        fn write_to_tx_fifo(&mut self, header: &[u8], payload: &[u8]) {
            let op = Op::WriteFifo(
                Vec::from_slice(header).unwrap(),
                Vec::from_slice(payload).unwrap(),
            );
            self.push(op);
        }
        fn flush_rx_fifo(&mut self) {
            self.push(Op::FlushRx);
        }
        fn flush_tx_fifo(&mut self) {
            self.push(Op::FlushTx);
        }
        fn set_rxoff_mode(&mut self, mode: OffMode) {
            self.push(Op::RxOff(mode));
        }
        fn set_txoff_mode(&mut self, mode: OffMode) {
            self.push(Op::TxOff(mode));
        }
        fn set_calibration_mode(&mut self, mode: CalibrationMode) {
            self.push(Op::CalMode(mode));
        }
        fn manual_calibration(&mut self) {
            self.push(Op::ManualCal);
        }
        fn set_header_len_rx(&mut self, len: u8) {
            self.push(Op::HeaderLenRx(len));
        }
        fn reconfig_after_sleep(&mut self) {
            self.push(Op::Reconfig);
        }
        fn is_busy(&self) -> bool {
            self.busy
        }
        fn rf_core_ready(&self) -> bool {
            true
        }
        fn rssi_valid(&self) -> bool {
            true
        }
        fn rssi(&mut self) -> i8 {
            self.noise
        }
        fn last_packet_rssi(&mut self) -> i8 {
            self.pkt_rssi
        }
        fn clear_pending_interrupts(&mut self) {
            self.push(Op::ClearIrq);
        }
    }

    struct MockTimer {
        hf: u64,
        // advances by one tick per read so busy-waits terminate
        lf: Cell<u64>,
        armed: Option<u64>,
        update_masked: i32,
    }

    impl MockTimer {
        fn new() -> Self {
            Self {
                hf: 0,
                lf: Cell::new(0),
                armed: None,
                update_masked: 0,
            }
        }
    }

    impl Timer for MockTimer {
        fn now_hf(&self) -> u64 {
            self.hf
        }
        fn now_lf(&self) -> u64 {
            let now = self.lf.get();
            self.lf.set(now + 1);
            now
        }
        fn now(&self) -> (u64, u64) {
            (self.hf, self.lf.get())
        }
        fn schedule(&mut self, at_hf: u64) {
            self.armed = Some(at_hf);
        }
        fn cancel(&mut self) {
            self.armed = None;
        }
        fn update_enable(&mut self) {
            self.update_masked -= 1;
        }
        fn update_disable(&mut self) {
            self.update_masked += 1;
        }
    }

    type TestGlossy = Glossy<MockRadio, MockTimer, NoPin>;

    fn make(node_id: u16) -> TestGlossy {
        Glossy::new(MockRadio::new(), MockTimer::new(), node_id, None)
    }

    fn packet(with_sync: bool, n_tx_max: u8, relay_cnt: u8, payload: &[u8]) -> Vec<u8, PKT_CAP> {
        let mut header = Header::new(with_sync, n_tx_max);
        header.relay_cnt = relay_cnt;
        let (bytes, len) = header.to_bytes();
        let mut pkt = Vec::from_slice(&bytes[..len]).unwrap();
        let _ = pkt.extend_from_slice(payload);
        pkt
    }

    fn expected_t_slot(pkt_len: u8) -> u64 {
        let mut sync = TimeSync::new();
        sync.estimate_t_slot(pkt_len);
        sync.t_slot_estimated as u64
    }

    #[test]
    fn test_initiator_flood_runs_to_budget() {
        let mut g = make(1);
        g.timer.hf = 9_000;
        g.start(1, FloodPayload::Data(b"HELLO"), 2, true, false);

        assert!(g.is_active());
        assert!(g.poll_done().is_err());
        assert_eq!(g.radio.count(&Op::RxOff(OffMode::Tx)), 1);
        assert_eq!(g.radio.count(&Op::TxOff(OffMode::Rx)), 1);
        assert_eq!(g.radio.count(&Op::HeaderLenRx(2)), 1);
        assert_eq!(g.radio.count(&Op::StartTx), 1);
        let (header, payload) = g.radio.last_fifo();
        assert_eq!(header, &[Header::new(true, 2).pkt_type, 0]);
        assert_eq!(payload, b"HELLO");

        g.tx_started(10_000);
        g.tx_ended(10_700);
        assert_eq!(g.n_tx(), 1);
        assert!(g.is_t_ref_updated());
        // nothing heard yet: the retransmission timeout is armed
        #[cfg(feature = "rtx-timeout")]
        assert!(g.timer.armed.is_some());

        // a neighbor echoes the packet one slot later
        let t_slot = expected_t_slot(2 + 5);
        g.rx_started(10_000 + t_slot);
        assert!(g.timer.armed.is_none());
        g.rx_ended(10_000 + t_slot + 700, &packet(true, 2, 1, b"HELLO"));
        assert_eq!(g.rx_cnt(), 1);
        // the echo is relayed with the next hop count
        let (header, payload) = g.radio.last_fifo();
        assert_eq!(header[1], 2);
        assert_eq!(payload, b"HELLO");

        g.tx_started(10_000 + 2 * t_slot);
        g.tx_ended(10_000 + 2 * t_slot + 700);
        assert_eq!(g.n_tx(), 2);
        assert!(!g.is_active());
        assert_eq!(g.radio.count(&Op::Sleep), 1);
        assert_eq!(g.poll_done(), Ok(1));

        // the initiator's reference is its own first transmission start
        assert_eq!(g.t_ref(), 10_000);
    }

    #[test]
    fn test_receiver_learns_header_and_payload() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        assert_eq!(g.radio.count(&Op::StartRx), 1);
        assert_eq!(g.payload_len(), 0);

        g.rx_started(50_000);
        g.rx_ended(50_600, &packet(true, 5, 3, b"WORLD"));

        assert_eq!(g.rx_cnt(), 1);
        assert_eq!(g.payload(), b"WORLD");
        assert_eq!(g.payload_len(), 5);
        assert_eq!(g.header().n_tx_max(), 5);
        assert!(g.is_t_ref_updated());
        #[cfg(feature = "stats")]
        {
            assert_eq!(g.relay_cnt(), 3);
            assert_eq!(g.noise_floor(), -97);
        }

        // the outgoing copy claims the next hop
        let (header, payload) = g.radio.last_fifo();
        assert_eq!(header[1], 4);
        assert_eq!(payload, b"WORLD");

        // with no accepted slot measurement the back-projection falls
        // back to the theoretical slot length
        assert_eq!(g.stop(), 1);
        let t_slot = expected_t_slot(2 + 5);
        assert_eq!(g.t_ref(), 50_000 - TAU1_HF as u64 - 3 * t_slot);
    }

    #[test]
    fn test_receiver_recovers_after_crc_failure() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(Some(5)), 3, false, false);

        g.rx_started(1_000);
        g.rx_failed(1_100);
        assert_eq!(g.rx_cnt(), 0);
        assert_eq!(g.radio.count(&Op::FlushRx), 1);
        assert_eq!(g.radio.count(&Op::StartRx), 2);
        #[cfg(feature = "stats")]
        assert_eq!(g.last_flood_n_rx_fail(), 1);

        g.rx_started(2_000);
        g.rx_ended(2_600, &packet(false, 3, 0, b"AGAIN"));
        assert_eq!(g.rx_cnt(), 1);
        assert_eq!(g.payload(), b"AGAIN");

        assert_eq!(g.stop(), 1);
        #[cfg(feature = "stats")]
        assert_eq!(g.last_flood_n_rx_fail(), 1);
    }

    #[cfg(feature = "rtx-timeout")]
    #[test]
    fn test_initiator_timeout_retransmits() {
        let mut g = make(1);
        g.timer.hf = 9_000;
        g.start(1, FloodPayload::Data(b"PING"), 2, true, false);
        let t_slot = expected_t_slot(2 + 4);

        g.tx_started(10_000);
        g.tx_ended(10_700);
        // armed two slots past the pre-transmission anchor
        let deadline = g.timer.armed.unwrap();
        assert_eq!(deadline, 9_000 + TIMEOUT_EXTRA_TICKS as u64 + 2 * t_slot);

        // nothing came back; fire the one-shot with the radio quiet
        g.timer.hf = deadline;
        g.timeout_expired();
        assert_eq!(g.radio.count(&Op::StartTx), 2);
        // the relay counter advanced by the slots that went by
        let (header, payload) = g.radio.last_fifo();
        assert_eq!(header[1], 2);
        assert_eq!(payload, b"PING");

        g.tx_started(deadline + 70);
        g.tx_ended(deadline + 770);
        assert_eq!(g.n_tx(), 2);
        assert!(!g.is_active());
        assert_eq!(g.rx_cnt(), 0);
    }

    #[cfg(feature = "rtx-timeout")]
    #[test]
    fn test_timeout_backs_off_while_receiving() {
        let mut g = make(1);
        g.timer.hf = 9_000;
        g.start(1, FloodPayload::Data(b"PING"), 3, true, false);
        let t_slot = expected_t_slot(2 + 4);

        g.tx_started(10_000);
        g.tx_ended(10_700);
        let deadline = g.timer.armed.unwrap();

        // a packet is in the air when the one-shot fires
        g.timer.hf = deadline;
        g.radio.busy = true;
        g.timeout_expired();
        assert_eq!(g.radio.count(&Op::StartTx), 1);
        assert_eq!(g.timer.armed.unwrap(), deadline + t_slot);

        // the deferred retry carries the extra skipped slot
        g.timer.hf = deadline + t_slot;
        g.radio.busy = false;
        g.timeout_expired();
        let (header, _) = g.radio.last_fifo();
        assert_eq!(header[1], 3);
    }

    #[test]
    fn test_slot_measurements_filtered_by_tolerance() {
        let mut g = make(7);
        g.start(1, FloodPayload::Expect(Some(2)), UNKNOWN_N_TX_MAX, true, false);
        let t_slot = expected_t_slot(2 + 2);
        let tau1 = TAU1_HF as u64;

        // hop 4 packet, then our relay 3 ticks late: accepted
        g.rx_started(100_000);
        g.rx_ended(100_500, &packet(true, 0, 4, b"ab"));
        g.tx_started(100_000 + t_slot - tau1 + 3);
        g.tx_ended(100_000 + t_slot - tau1 + 503);

        // next reception 30 ticks off the slot grid: discarded
        let t_tx = 100_000 + t_slot - tau1 + 3;
        g.rx_started(t_tx + t_slot + tau1 + 30);
        g.rx_ended(t_tx + t_slot + tau1 + 530, &packet(true, 0, 6, b"ab"));

        assert_eq!(g.rx_cnt(), 2);
        let _ = g.stop();
        // exactly one accepted measurement of t_slot + 3 backs the
        // projection over the 4 hops of the first reception
        assert_eq!(g.t_ref(), 100_000 - tau1 - 4 * (t_slot + 3));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        assert_eq!(g.stop(), 0);
        assert!(!g.is_active());

        let ops_after_first_stop = g.radio.ops.len();
        assert_eq!(g.stop(), 0);
        assert_eq!(g.radio.ops.len(), ops_after_first_stop);
    }

    #[test]
    fn test_late_callbacks_are_ignored() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        let _ = g.stop();
        let ops = g.radio.ops.len();

        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(true, 2, 1, b"X"));
        g.tx_started(2_000);
        g.tx_ended(2_500);
        g.rx_failed(3_000);
        g.rx_tx_error(3_500);
        #[cfg(feature = "rtx-timeout")]
        g.timeout_expired();

        assert_eq!(g.rx_cnt(), 0);
        assert_eq!(g.n_tx(), 0);
        assert_eq!(g.radio.ops.len(), ops);
    }

    #[test]
    fn test_foreign_tag_is_rejected() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        g.rx_started(1_000);
        let mut pkt = packet(true, 2, 1, b"EVIL!");
        pkt[0] ^= 0x20; // flip a tag bit
        g.rx_ended(1_500, &pkt);

        assert_eq!(g.rx_cnt(), 0);
        // the reception was aborted and RX restarted
        assert_eq!(g.radio.count(&Op::FlushRx), 1);
        assert_eq!(g.radio.count(&Op::StartRx), 2);
        #[cfg(feature = "stats")]
        assert_eq!(g.last_flood_n_rx_fail(), 1);
    }

    #[test]
    fn test_mismatched_sync_flag_is_rejected() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(false, 2, 0, b"PLAIN"));
        assert_eq!(g.rx_cnt(), 0);
    }

    #[test]
    fn test_wrong_payload_length_is_rejected() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(Some(5)), UNKNOWN_N_TX_MAX, true, false);

        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(true, 2, 1, b"FOUR"));
        assert_eq!(g.rx_cnt(), 0);

        g.rx_started(2_000);
        g.rx_ended(2_500, &packet(true, 2, 1, b"FIVE!"));
        assert_eq!(g.rx_cnt(), 1);
    }

    #[test]
    fn test_oversized_packet_rejected_despite_crc() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        let body = [0x55u8; PAYLOAD_LEN_USIZE + 1];
        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(true, 2, 1, &body));
        assert_eq!(g.rx_cnt(), 0);
    }

    #[test]
    fn test_header_phase_abort() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        g.rx_started(1_000);
        let foreign = [Header::new(true, 2).pkt_type ^ 0x20, 0x01];
        g.header_received(1_100, &foreign, 7);

        assert_eq!(g.radio.count(&Op::FlushRx), 1);
        assert_eq!(g.radio.count(&Op::StartRx), 2);
        #[cfg(feature = "stats")]
        assert_eq!(g.last_flood_n_rx_fail(), 1);
    }

    #[test]
    fn test_initiator_with_oversized_payload_stops_immediately() {
        let mut g = make(1);
        let body = [0u8; PAYLOAD_LEN_USIZE + 1];
        g.start(1, FloodPayload::Data(&body), 2, true, false);
        assert!(!g.is_active());
        assert_eq!(g.radio.count(&Op::StartTx), 0);
        assert_eq!(g.radio.count(&Op::Sleep), 1);
    }

    #[test]
    fn test_initiator_payload_over_buffer_with_short_header_stops() {
        // with a 1-byte header, 129 bytes stay inside the wire bound but
        // exceed the payload buffer
        let mut g = make(1);
        let body = [0u8; PAYLOAD_LEN_USIZE + 1];
        g.start(1, FloodPayload::Data(&body), 2, false, false);
        assert!(!g.is_active());
        assert_eq!(g.radio.count(&Op::StartTx), 0);
        assert_eq!(g.payload_len(), 0);
        assert!(g.payload().is_empty());
    }

    #[test]
    fn test_rx_payload_over_buffer_rejected_despite_wire_bound() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, false, false);

        // 1-byte header plus 129 bytes: exactly the maximum packet
        // length, yet one byte more payload than a node can hold
        let body = [0x33u8; PAYLOAD_LEN_USIZE + 1];
        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(false, 2, 0, &body));
        assert_eq!(g.rx_cnt(), 0);
        assert!(g.payload().is_empty());
    }

    #[test]
    fn test_initiator_without_payload_stops_immediately() {
        let mut g = make(1);
        g.start(1, FloodPayload::Expect(None), 2, true, false);
        assert!(!g.is_active());
        assert_eq!(g.radio.count(&Op::StartTx), 0);
    }

    #[test]
    fn test_beacon_only_flood_is_legal() {
        let mut g = make(1);
        g.start(1, FloodPayload::Data(b""), 1, true, false);
        assert!(g.is_active());
        let (header, payload) = g.radio.last_fifo();
        assert_eq!(header.len(), 2);
        assert!(payload.is_empty());

        g.tx_started(1_000);
        g.tx_ended(1_600);
        assert!(!g.is_active());
        assert_eq!(g.n_tx(), 1);
    }

    #[test]
    fn test_unbounded_receiver_keeps_relaying() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        for hop in 0..4u8 {
            let t0 = 1_000 + hop as u64 * 2_000;
            g.rx_started(t0);
            g.rx_ended(t0 + 500, &packet(true, 0, hop.wrapping_mul(2), b"GO"));
            g.tx_started(t0 + 1_000);
            g.tx_ended(t0 + 1_500);
        }
        assert!(g.is_active());
        assert_eq!(g.n_tx(), 4);
        assert_eq!(g.stop(), 4);
    }

    #[test]
    fn test_payload_written_exactly_once() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(true, 0, 1, b"FIRST"));
        assert_eq!(g.payload(), b"FIRST");

        // later receptions relay but never rewrite the payload
        g.rx_started(3_000);
        g.rx_ended(3_500, &packet(true, 0, 3, b"OTHER"));
        assert_eq!(g.rx_cnt(), 2);
        assert_eq!(g.payload(), b"FIRST");
    }

    #[test]
    fn test_update_interrupt_bracketing() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        assert_eq!(g.timer.update_masked, 0);

        g.rx_started(1_000);
        assert_eq!(g.timer.update_masked, 1);
        g.rx_ended(1_500, &packet(true, 0, 1, b"OK"));
        assert_eq!(g.timer.update_masked, 0);

        g.rx_started(2_000);
        assert_eq!(g.timer.update_masked, 1);
        g.rx_failed(2_200);
        assert_eq!(g.timer.update_masked, 0);
    }

    #[test]
    fn test_rx_tx_error_recovery() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);

        g.rx_started(1_000);
        g.rx_tx_error(1_200);
        assert!(g.is_active());
        assert_eq!(g.radio.count(&Op::FlushRx), 1);
        assert_eq!(g.radio.count(&Op::FlushTx), 1);
        assert_eq!(g.radio.count(&Op::StartRx), 2);
        #[cfg(feature = "stats")]
        assert_eq!(g.n_errors(), 1);
    }

    #[test]
    fn test_t_ref_lf_translation() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        g.rx_started(200_000);
        g.rx_ended(200_500, &packet(true, 1, 0, b"T"));
        let _ = g.stop();

        // hop 0 reception: the reference is the RX capture minus tau1
        assert_eq!(g.t_ref(), 200_000 - TAU1_HF as u64);
        g.timer.hf = 300_000;
        g.timer.lf.set(4_000);
        let expected =
            4_000 - (300_000 - g.t_ref()) / crate::consts::HF_LF_RATIO as u64;
        assert_eq!(g.t_ref_lf(), expected);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_flood_counters_track_receivers_only() {
        let mut g = make(2);
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(true, 0, 1, b"A"));
        let _ = g.stop();
        assert_eq!(g.stats().flood_cnt, 1);
        assert_eq!(g.stats().flood_cnt_success, 1);
        assert_eq!(g.n_pkts(), 1);
        assert_eq!(g.n_pkts_crcok(), 1);
        assert_eq!(g.n_crc_ok(), 1);
        assert_eq!(g.per(), 0);
        assert_eq!(g.fsr(), 10_000);

        // a flood with a preamble but no good packet counts as attempted
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        g.rx_started(10_000);
        g.rx_failed(10_200);
        let _ = g.stop();
        assert_eq!(g.stats().flood_cnt, 2);
        assert_eq!(g.stats().flood_cnt_success, 1);
        assert_eq!(g.fsr(), 5_000);

        // the initiator is excluded from the flood counters
        let mut ini = make(1);
        ini.start(1, FloodPayload::Data(b"Z"), 1, true, false);
        ini.tx_started(1_000);
        ini.tx_ended(1_500);
        assert_eq!(ini.stats().flood_cnt, 0);
        assert_eq!(ini.stats().flood_cnt_success, 0);
    }

    #[test]
    fn test_debug_pins_follow_flood_activity() {
        use embedded_hal_mock::eh1::digital::{
            Mock as PinMock, State as PinState, Transaction as PinTransaction,
        };

        let flood = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let rx = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
        ]);
        let tx = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut g: Glossy<MockRadio, MockTimer, PinMock> = Glossy::new(
            MockRadio::new(),
            MockTimer::new(),
            2,
            Some(DebugPins { flood, rx, tx }),
        );
        g.start(1, FloodPayload::Expect(None), UNKNOWN_N_TX_MAX, true, false);
        g.rx_started(1_000);
        g.rx_ended(1_500, &packet(true, 0, 1, b"P"));
        let _ = g.stop();

        let pins = g.pins.as_mut().unwrap();
        pins.flood.done();
        pins.rx.done();
        pins.tx.done();
    }
}
