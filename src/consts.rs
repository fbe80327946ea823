//! Constants used across the flooding protocol implementation.
//!
//! This module defines the wire-header bit layout, packet size bounds,
//! radio timing characteristics and timeout parameters of the flood engine.
//!
//! ## Key Concepts
//!
//! - **Header byte 0**: `[tag:3 | sync:1 | n_tx_max:4]`: a deployment-wide
//!   tag, the synchronization flag, and the per-node transmission budget.
//! - **Header byte 1**: the relay counter, present whenever synchronization
//!   is on (or unconditionally with [`ALWAYS_RELAY_CNT`]).
//! - **Slot timing**: the slot length is derived from the packet-on-air
//!   time plus the radio's RX↔TX turnaround; the nanosecond constants here
//!   characterise that for a 250 kbps CC430-class radio clocked against a
//!   3.25 MHz high-frequency timer.
//! - **Sentinels**: a receiver may start a flood without knowing the
//!   transmission budget; `n_tx_max == 0` on the wire means
//!   unknown/unbounded and is learned from the first valid packet.
//!
//! These values must agree across all nodes of a deployment; a mismatched
//! common tag or slot-timing constant breaks bit-synchronous relaying.

/// Bitmask of the 3-bit deployment tag in header byte 0.
pub const HEADER_BYTE_MASK: u8 = 0xe0;

/// Bitmask of the synchronization flag in header byte 0.
pub const HEADER_SYNC_MASK: u8 = 0x10;

/// Bitmask of the 4-bit `n_tx_max` field in header byte 0.
pub const HEADER_N_TX_MASK: u8 = 0x0f;

/// Deployment-wide header tag (only the upper 3 bits are significant).
pub const HEADER_BYTE: u8 = 0xc0;

/// The masked deployment tag every incoming packet must carry.
pub const COMMON_HEADER: u8 = HEADER_BYTE & HEADER_BYTE_MASK;

/// `n_tx_max` value meaning "not yet learned / unbounded".
pub const UNKNOWN_N_TX_MAX: u8 = 0;

/// When true the relay counter is sent in every packet, with or without
/// the synchronization flag.
pub const ALWAYS_RELAY_CNT: bool = false;

/// Maximum payload length in bytes.
pub const PAYLOAD_LEN: u8 = 128;

/// See [`PAYLOAD_LEN`](crate::consts::PAYLOAD_LEN)
pub const PAYLOAD_LEN_USIZE: usize = PAYLOAD_LEN as usize;

/// Maximum wire-header length in bytes (tag byte + relay counter).
pub const MAX_HEADER_LEN: u8 = 2;

/// Maximum total packet length on the wire (header + payload).
pub const MAX_PACKET_LEN: u8 = PAYLOAD_LEN + MAX_HEADER_LEN;

/// Minimum number of slots after which the retransmission timeout expires,
/// counted from the last transmission.
/// Values below 2 make no sense: there would be no chance to receive a
/// packet in between.
pub const SLOT_TIMEOUT_MIN: u8 = 2;

/// Maximum number of slots for the retransmission timeout. A random pick
/// in `SLOT_TIMEOUT_MIN..=SLOT_TIMEOUT_MAX` would decorrelate initiators
/// that keep colliding; the timeout currently always uses the minimum.
pub const SLOT_TIMEOUT_MAX: u8 = 2;

/// Extra high-frequency ticks consumed by the timeout callback before the
/// transmission actually starts, kept so retransmissions stay aligned to
/// the slot grid.
pub const TIMEOUT_EXTRA_TICKS: u16 = 70;

/// Maximum deviation (high-frequency ticks) of a measured slot length from
/// the theoretical value for the measurement to be accepted.
pub const T_SLOT_TOLERANCE: u32 = 10;

/// High-frequency timer rate in Hz (CC430 rtimer, SMCLK / 4).
pub const RTIMER_HF_FREQ: u32 = 3_250_000;

/// Low-frequency timer rate in Hz (ACLK, 32 kHz crystal).
pub const RTIMER_LF_FREQ: u32 = 32_768;

/// Integer high-frequency to low-frequency tick ratio, used to translate
/// the time reference between the two timebases.
pub const HF_LF_RATIO: u32 = RTIMER_HF_FREQ / RTIMER_LF_FREQ;

/// Offset between the radio's sync-word capture and the start of the
/// packet on air, in nanoseconds.
pub const TAU1_NS: u32 = 16_000;

/// TX-to-RX turnaround time of the radio core, in nanoseconds.
pub const T2R_NS: u32 = 21_500;

/// On-air time per packet byte at 250 kbps, in nanoseconds.
pub const T_TX_BYTE_NS: u32 = 32_000;

/// Fixed per-packet on-air overhead (preamble and sync word), in
/// nanoseconds.
pub const T_TX_OFFSET_NS: u32 = 256_000;

/// Busy-wait in microseconds before the initiator's first synchronized
/// transmission, so consecutive floods start on a slot boundary.
pub const SETUPTIME_WITH_SYNC_US: u32 = 1_000;

/// [`SETUPTIME_WITH_SYNC_US`] converted to low-frequency ticks.
pub const SYNC_SETUP_TICKS: u16 =
    (SETUPTIME_WITH_SYNC_US as u64 * RTIMER_LF_FREQ as u64 / 1_000_000) as u16;

/// Bounded poll count while waiting for the radio core to settle after a
/// mode transition (~500 µs worth of iterations).
pub const RF_RDY_WAIT_LOOPS: u16 = 500;

/// Bounded poll count while waiting for a valid RSSI readout after
/// entering RX (~400 µs worth of iterations).
pub const RSSI_WAIT_LOOPS: u16 = 400;
