//! Packet-radio contract consumed by the flood driver.
//!
//! The driver assumes a CC430/CC1101-class radio core: hardware preamble,
//! sync word, length byte and CRC; separate RX and TX FIFOs; configurable
//! automatic mode transitions at the end of a reception or transmission.
//! The integration layer implements [`Radio`] on top of its hardware
//! driver and forwards the radio core's interrupts to the corresponding
//! `Glossy` callbacks.
//!
//! All operations are infallible from the protocol's point of view: the
//! hardware layer is expected to retry or absorb transient SPI/register
//! faults itself, and genuine radio anomalies surface through the
//! `rx_tx_error` callback instead of return values.

/// Radio state entered automatically when a reception or transmission
/// ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffMode {
    /// Stay in the idle state.
    Idle,
    /// Enter receive mode.
    Rx,
    /// Enter transmit mode.
    Tx,
}

/// Frequency-synthesizer calibration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    /// The radio calibrates on its own at mode transitions.
    Automatic,
    /// Calibration happens only on an explicit
    /// [`manual_calibration`](Radio::manual_calibration) request.
    Manual,
}

/// Control surface of the packet radio.
///
/// During a flood the driver owns the radio exclusively; the methods below
/// are called either from `start`/`stop` with interrupts masked or from
/// within the radio's own interrupt handlers.
pub trait Radio {
    /// Wakes the radio core into the idle state.
    fn go_to_idle(&mut self);

    /// Puts the radio core to sleep.
    fn go_to_sleep(&mut self);

    /// Starts a transmission; the packet data follows via
    /// [`write_to_tx_fifo`](Radio::write_to_tx_fifo).
    fn start_tx(&mut self);

    /// Starts listening for a packet.
    fn start_rx(&mut self);

    /// Writes the next packet (header bytes, then payload) into the TX
    /// FIFO. Must complete before the radio emits the preamble.
    fn write_to_tx_fifo(&mut self, header: &[u8], payload: &[u8]);

    /// Discards any pending RX FIFO contents.
    fn flush_rx_fifo(&mut self);

    /// Discards any pending TX FIFO contents.
    fn flush_tx_fifo(&mut self);

    /// Selects the state entered automatically when a reception ends.
    fn set_rxoff_mode(&mut self, mode: OffMode);

    /// Selects the state entered automatically when a transmission ends.
    fn set_txoff_mode(&mut self, mode: OffMode);

    /// Selects the calibration policy.
    fn set_calibration_mode(&mut self, mode: CalibrationMode);

    /// Runs a frequency-synthesizer calibration now.
    fn manual_calibration(&mut self);

    /// Number of header bytes the RX path delivers through the
    /// header-received interrupt before the rest of the packet arrives.
    fn set_header_len_rx(&mut self, len: u8);

    /// Restores radio registers lost while sleeping.
    fn reconfig_after_sleep(&mut self);

    /// True while a reception or transmission is in progress.
    fn is_busy(&self) -> bool;

    /// True once the radio core has settled after a mode transition
    /// (the RF_RDY indication).
    fn rf_core_ready(&self) -> bool;

    /// True once the RSSI readout is valid after entering RX.
    fn rssi_valid(&self) -> bool;

    /// Current RSSI in dBm.
    fn rssi(&mut self) -> i8;

    /// RSSI latched for the last received packet, in dBm.
    fn last_packet_rssi(&mut self) -> i8;

    /// Clears radio interrupt flags raised before the flood started.
    fn clear_pending_interrupts(&mut self);
}
