//! # glossy433
//!
//! A portable, no_std Rust driver for Glossy-style constructive-interference
//! flooding on sub-GHz packet radios with hardware preamble/sync/CRC handling,
//! such as the CC430/CC1101 family.
//!
//! One node (the *initiator*) seeds a flood with a single payload; every node
//! that receives the packet retransmits it immediately and bit-aligned, so
//! concurrent retransmissions superpose constructively. After a bounded number
//! of transmissions per node the flood dies out, every receiver holds the
//! payload, and every participant carries an estimate of the instant the
//! initiator started transmitting, a network-wide time reference with
//! sub-slot precision.
//!
//! This driver implements the per-node flood engine using:
//! - a [`radio::Radio`] trait for the packet radio (FIFO access, mode
//!   switching, RSSI readout, auto RX↔TX transitions)
//! - a [`timer::Timer`] trait for dual-rate timestamping and the one-shot
//!   retransmission timeout
//! - `embedded-hal` digital outputs for optional debug activity pins
//! - interrupt-safe singleton access with `critical-section`
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support and replaces `heapless::Vec`s with
//! `std::vec::Vec`s |
//! | `stats` (default)     | Per-flood and lifetime link statistics |
//! | `rtx-timeout` (default) | Initiator retransmission timeout |
//! | `defmt`               | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use glossy433::driver::{FloodPayload, Glossy};
//!
//! let mut glossy = Glossy::new(radio, timer, node_id, None);
//!
//! // initiator side
//! glossy.start(node_id, FloodPayload::Data(b"HELLO"), 2, true, false);
//! // ... radio interrupts drive glossy.rx_started() / glossy.rx_ended() / ...
//! let n_rx = glossy.stop();
//! ```
//!
//! ## Integration notes
//!
//! - All protocol activity between `start` and `stop` happens inside the
//!   radio and timer interrupt handlers; the callbacks must run to
//!   completion before the radio emits the next preamble.
//! - Only one driver instance may be active per node; [`timer::isr`] provides
//!   the `critical_section`-guarded singleton plumbing for ISR dispatch.
//! - A flood is a best-effort one-shot primitive: `start` reports nothing,
//!   the caller inspects `rx_cnt()`/`is_t_ref_updated()` after `stop()`.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

pub use critical_section;

#[cfg(not(feature = "std"))]
pub use heapless;

// Logging shims: defmt when enabled, log otherwise, silent by default.
// Messages stick to literals so both backends accept the same format strings.
#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}
#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "defmt")]
macro_rules! warning {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! warning {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}
#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! warning {
    ($($arg:tt)*) => {};
}

pub mod consts;
pub mod driver;
pub mod header;
pub mod radio;
#[cfg(feature = "stats")]
pub mod stats;
pub mod sync;
pub mod timer;
