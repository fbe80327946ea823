//! Timer contract and tick conversion helpers.
//!
//! The flood engine runs against two clocks: a high-frequency timer for
//! sub-slot timestamping and the retransmission timeout, and a
//! low-frequency (32 kHz class) timer that keeps counting while the CPU
//! sleeps. The [`Timer`] trait is the seam to the platform's timer
//! subsystem; the conversion helpers turn the nanosecond radio constants
//! of [`crate::consts`] into ticks of either clock.
//!
//! Tick rates (see [`crate::consts`]):
//!
//! | Clock | Rate        | Tick     |
//! |-------|-------------|----------|
//! | HF    | 3.25 MHz    | ~308 ns  |
//! | LF    | 32.768 kHz  | ~30.5 µs |

use crate::consts::{RTIMER_HF_FREQ, RTIMER_LF_FREQ};

/// Interrupt-safe singleton plumbing for dispatching radio and timer
/// interrupts into the one active driver instance.
pub mod isr;
pub use isr::*;

/// Platform timer services used by the flood driver.
///
/// The one-shot armed with [`schedule`](Timer::schedule) backs the
/// initiator's retransmission timeout; when it fires, the integration
/// layer calls [`crate::driver::Glossy::timeout_expired`]. A callback
/// firing after the flood stopped is harmless, the driver ignores it.
pub trait Timer {
    /// Current high-frequency timestamp in ticks.
    fn now_hf(&self) -> u64;

    /// Current low-frequency timestamp in ticks.
    fn now_lf(&self) -> u64;

    /// Simultaneous snapshot of both clocks, `(hf, lf)`.
    fn now(&self) -> (u64, u64);

    /// Arms the one-shot at an absolute high-frequency tick, replacing
    /// any previously armed deadline.
    fn schedule(&mut self, at_hf: u64);

    /// Disarms the one-shot.
    fn cancel(&mut self);

    /// Re-enables the timer overflow/update interrupt.
    fn update_enable(&mut self);

    /// Masks the timer overflow/update interrupt. Held masked for the
    /// duration of a reception so FIFO reads and the RX→TX switch are
    /// never delayed by a timer service routine.
    fn update_disable(&mut self);
}

/// Converts nanoseconds to high-frequency ticks.
pub const fn ns_to_hf_ticks(ns: u64) -> u64 {
    ns * RTIMER_HF_FREQ as u64 / 1_000_000_000
}

/// Converts nanoseconds to high-frequency ticks in 32-bit arithmetic,
/// sufficient for the slot-length range and faster on 16/32-bit MCUs.
pub const fn ns_to_hf_ticks_32(ns: u32) -> u32 {
    (ns as u64 * RTIMER_HF_FREQ as u64 / 1_000_000_000) as u32
}

/// Converts microseconds to low-frequency ticks.
pub const fn us_to_lf_ticks(us: u32) -> u16 {
    (us as u64 * RTIMER_LF_FREQ as u64 / 1_000_000) as u16
}
