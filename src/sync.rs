//! Time-reference recovery for synchronized floods.
//!
//! Every participant of a synchronized flood reconstructs, in its own
//! local high-frequency clock, the instant the initiator started its
//! first transmission. The engine works from two observations:
//!
//! - the capture timestamp of the node's *first* reception or
//!   transmission, together with the relay counter at that moment, and
//! - the durations between immediately consecutive RX→TX or TX→RX pairs,
//!   which measure the slot length `T_slot` directly.
//!
//! While the flood runs, measured slot lengths within a tolerance window
//! of the theoretical value are accumulated. When the flood stops, the
//! first-capture reference is projected back by `relay_cnt` slots using
//! the averaged (or, lacking measurements, the theoretical) slot length,
//! yielding the initiator's hop-0 start time.
//!
//! The slot model is `T_slot = T_rx + T_rx2tx + tau1 = T_tx + T_tx2rx -
//! tau1`: the two turnaround directions carry the sync-word offset with
//! opposite signs, which is why the driver adds `TAU1` to TX-after-RX
//! measurements and subtracts it from RX-after-TX ones. The sign must not
//! be "simplified" away.

use crate::consts::{HF_LF_RATIO, TAU1_NS, T2R_NS, T_SLOT_TOLERANCE, T_TX_BYTE_NS, T_TX_OFFSET_NS};
use crate::timer::ns_to_hf_ticks_32;

/// [`crate::consts::TAU1_NS`] converted to high-frequency ticks.
pub const TAU1_HF: u32 = ns_to_hf_ticks_32(TAU1_NS);

/// Time-reference state of the current flood.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSync {
    /// Estimated local time of the initiator's first transmission start.
    /// Only meaningful while [`t_ref_updated`](Self::t_ref_updated) is
    /// set; final only after [`finalize`](Self::finalize).
    pub t_ref: u64,
    /// Set once a reference has been captured this flood.
    pub t_ref_updated: bool,
    /// Relay counter sampled when the reference was captured.
    pub relay_cnt_t_ref: u8,
    /// Theoretical slot duration in high-frequency ticks, derived from
    /// the packet length.
    pub t_slot_estimated: u32,
    t_slot_sum: u64,
    n_t_slot: u8,
}

impl TimeSync {
    /// A zeroed engine, ready for a new flood.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all per-flood state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Derives the theoretical slot duration from the full packet length
    /// (header + payload), in ticks.
    pub fn estimate_t_slot(&mut self, pkt_len: u8) {
        // length byte and CRC ride along with the packet; 32-bit math is
        // sufficient for the on-air time range
        let t_tx_estim = T_TX_BYTE_NS * (pkt_len as u32 + 3) + T_TX_OFFSET_NS;
        self.t_slot_estimated = ns_to_hf_ticks_32(t_tx_estim + T2R_NS - TAU1_NS);
    }

    /// Captures the flood's time reference, once.
    pub fn update_t_ref(&mut self, t_ref: u64, relay_cnt: u8) {
        self.t_ref = t_ref;
        self.t_ref_updated = true;
        self.relay_cnt_t_ref = relay_cnt;
    }

    /// Feeds one measured slot duration. Measurements outside
    /// `t_slot_estimated ± T_SLOT_TOLERANCE` are discarded.
    pub fn add_t_slot_measurement(&mut self, t_slot_measured: u32) {
        if t_slot_measured > self.t_slot_estimated.wrapping_sub(T_SLOT_TOLERANCE)
            && t_slot_measured < self.t_slot_estimated.wrapping_add(T_SLOT_TOLERANCE)
        {
            self.t_slot_sum += t_slot_measured as u64;
            self.n_t_slot += 1;
        }
    }

    /// Number of accepted slot measurements so far.
    pub fn n_slot_measurements(&self) -> u8 {
        self.n_t_slot
    }

    /// Projects the captured reference back to the initiator's hop-0
    /// transmission start, using the averaged slot length when any
    /// measurement was accepted and the theoretical one otherwise.
    /// Called exactly once, when the flood stops.
    pub fn finalize(&mut self) {
        if self.t_ref_updated {
            if self.n_t_slot > 0 {
                self.t_ref = self
                    .t_ref
                    .wrapping_sub(self.relay_cnt_t_ref as u64 * self.t_slot_sum / self.n_t_slot as u64);
            } else {
                self.t_ref = self
                    .t_ref
                    .wrapping_sub(self.relay_cnt_t_ref as u64 * self.t_slot_estimated as u64);
            }
        }
    }

    /// Translates the reference into the low-frequency timebase, given a
    /// simultaneous snapshot of both clocks.
    pub fn t_ref_lf(&self, hf_now: u64, lf_now: u64) -> u64 {
        lf_now.wrapping_sub(hf_now.wrapping_sub(self.t_ref) / HF_LF_RATIO as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_follows_packet_length() {
        let mut sync = TimeSync::new();
        sync.estimate_t_slot(7);
        // 32 µs * (7 + 3) + 256 µs on air, plus turnaround, minus tau1
        let expected = ns_to_hf_ticks_32(T_TX_BYTE_NS * 10 + T_TX_OFFSET_NS + T2R_NS - TAU1_NS);
        assert_eq!(sync.t_slot_estimated, expected);

        sync.estimate_t_slot(8);
        assert!(sync.t_slot_estimated > expected);
    }

    #[test]
    fn test_measurement_tolerance_window() {
        let mut sync = TimeSync::new();
        sync.t_slot_estimated = 1500;

        sync.add_t_slot_measurement(1503);
        assert_eq!(sync.n_slot_measurements(), 1);

        sync.add_t_slot_measurement(1530);
        assert_eq!(sync.n_slot_measurements(), 1);

        // window bounds are exclusive
        sync.add_t_slot_measurement(1500 + T_SLOT_TOLERANCE);
        sync.add_t_slot_measurement(1500 - T_SLOT_TOLERANCE);
        assert_eq!(sync.n_slot_measurements(), 1);

        sync.add_t_slot_measurement(1500 - T_SLOT_TOLERANCE + 1);
        assert_eq!(sync.n_slot_measurements(), 2);
    }

    #[test]
    fn test_finalize_uses_measured_average() {
        let mut sync = TimeSync::new();
        sync.t_slot_estimated = 1490;
        sync.update_t_ref(100_000, 4);
        for _ in 0..6 {
            sync.add_t_slot_measurement(1493);
        }
        assert_eq!(sync.n_slot_measurements(), 6);
        // all six measurements were accepted, so the average is exact
        sync.finalize();
        assert_eq!(sync.t_ref, 100_000 - 4 * 1493);
    }

    #[test]
    fn test_finalize_falls_back_to_estimate() {
        let mut sync = TimeSync::new();
        sync.t_slot_estimated = 1500;
        sync.update_t_ref(100_000, 4);
        sync.finalize();
        assert_eq!(sync.t_ref, 100_000 - 4 * 1500);
    }

    #[test]
    fn test_finalize_without_reference_is_a_no_op() {
        let mut sync = TimeSync::new();
        sync.t_slot_estimated = 1500;
        sync.finalize();
        assert_eq!(sync.t_ref, 0);
        assert!(!sync.t_ref_updated);
    }

    #[test]
    fn test_lf_translation() {
        let mut sync = TimeSync::new();
        sync.update_t_ref(1_000_000, 0);
        let hf_now = 1_000_000 + 9_900;
        let lf_now = 50_000;
        // 9900 HF ticks back at the integer HF/LF ratio
        assert_eq!(
            sync.t_ref_lf(hf_now, lf_now),
            lf_now - 9_900 / HF_LF_RATIO as u64
        );
    }
}
