//! Wire-header codec for the flooding protocol.
//!
//! A packet carries a one- or two-byte header in front of the payload:
//!
//! ```text
//! offset 0 : [tag:3 | sync:1 | n_tx_max:4]
//! offset 1 : relay_cnt        (present iff sync == 1 or ALWAYS_RELAY_CNT)
//! ```
//!
//! The 3-bit tag is constant per deployment and filters foreign traffic.
//! The sync flag selects whether participants recover a common time
//! reference from the flood. `n_tx_max` bounds the number of
//! transmissions per node; `0` means unknown/unbounded. The relay counter
//! is incremented by every retransmitter and equals the hop distance from
//! the initiator.
//!
//! ## Functions
//!
//! - [`Header::new`]: builds a header from the sync flag and TX budget
//! - [`Header::parse`]: reconstructs a header from received bytes
//! - [`Header::to_bytes`]: serializes for the TX FIFO
//!
//! Validation against local flood state (learning unknown fields, packet
//! length checks) lives in the driver; this module only moves bits.

use crate::consts::{
    ALWAYS_RELAY_CNT, HEADER_BYTE_MASK, HEADER_N_TX_MASK, HEADER_SYNC_MASK, MAX_HEADER_LEN,
};

/// The in-flight protocol header of the current flood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Header byte 0: deployment tag, sync flag and `n_tx_max` packed.
    pub pkt_type: u8,
    /// Hop-relay counter, incremented by each retransmitter.
    pub relay_cnt: u8,
}

impl Header {
    /// Builds a header for a fresh flood from the tag configured in
    /// [`crate::consts::COMMON_HEADER`], the sync flag and the TX budget.
    /// The relay counter starts at zero.
    pub fn new(with_sync: bool, n_tx_max: u8) -> Self {
        let mut pkt_type = crate::consts::COMMON_HEADER;
        if with_sync {
            pkt_type |= HEADER_SYNC_MASK;
        }
        pkt_type |= n_tx_max & HEADER_N_TX_MASK;
        Header {
            pkt_type,
            relay_cnt: 0,
        }
    }

    /// The masked deployment tag of this header.
    pub fn common_header(&self) -> u8 {
        self.pkt_type & HEADER_BYTE_MASK
    }

    /// Whether the flood carries time synchronization.
    pub fn with_sync(&self) -> bool {
        self.pkt_type & HEADER_SYNC_MASK != 0
    }

    /// The per-node transmission budget; `0` means unknown/unbounded.
    pub fn n_tx_max(&self) -> u8 {
        self.pkt_type & HEADER_N_TX_MASK
    }

    /// Sets the sync flag, leaving tag and budget untouched.
    pub fn set_sync(&mut self, with_sync: bool) {
        self.pkt_type = (self.pkt_type & !HEADER_SYNC_MASK)
            | if with_sync { HEADER_SYNC_MASK } else { 0 };
    }

    /// Sets the transmission budget, leaving tag and sync flag untouched.
    pub fn set_n_tx_max(&mut self, n_tx_max: u8) {
        self.pkt_type = (self.pkt_type & !HEADER_N_TX_MASK) | (n_tx_max & HEADER_N_TX_MASK);
    }

    /// Whether the relay counter rides on the wire for this header.
    pub fn with_relay_cnt(&self) -> bool {
        ALWAYS_RELAY_CNT || self.with_sync()
    }

    /// Number of header bytes on the wire: 2 with a relay counter, 1
    /// without.
    pub fn wire_len(&self) -> u8 {
        if self.with_sync() || self.with_relay_cnt() {
            2
        } else {
            1
        }
    }

    /// Serializes the header; the returned length is [`Self::wire_len`].
    pub fn to_bytes(&self) -> ([u8; MAX_HEADER_LEN as usize], usize) {
        ([self.pkt_type, self.relay_cnt], self.wire_len() as usize)
    }

    /// Reconstructs a header from received bytes. Byte 0 decides whether a
    /// relay counter follows; a missing relay counter reads as zero, a
    /// truncated two-byte header is `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let pkt_type = *bytes.first()?;
        let mut header = Header {
            pkt_type,
            relay_cnt: 0,
        };
        if header.wire_len() == 2 {
            header.relay_cnt = *bytes.get(1)?;
        }
        Some(header)
    }
}
