//! Remembering the most recent frame of each kind from each device
//!
//! CEC devices broadcast a lot of what discovery wants to know —
//! \<Report Physical Address\> and \<Device Vendor ID\> in particular
//! are sent unprompted whenever a device joins the bus. The host
//! records every frame its local device accepts here, and the engine
//! checks the cache before putting a query on the wire; a warm cache
//! means a whole discovery run can complete without a single outbound
//! frame.
//!
//! The cache belongs to the host and outlives any one discovery run.
//! It is unbounded here; eviction (say, on a device's logical address
//! being re-allocated) is the host's business.

use alloc::collections::BTreeMap;
use twill_cec::{CecFrame, LogicalAddress, Opcode};

/// Most-recent-frame cache, keyed by (source, opcode)
///
/// Last write wins: a device re-announcing its physical address
/// replaces whatever it said before.
#[derive(Debug, Default)]
pub struct MessageCache {
    frames: BTreeMap<(LogicalAddress, Opcode), CecFrame>,
}

impl MessageCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound frame
    pub fn put(&mut self, frame: CecFrame) {
        self.frames.insert((frame.source, frame.opcode), frame);
    }

    /// The most recent frame from `source` with `opcode`, if any
    #[must_use]
    pub fn get(
        &self,
        source: LogicalAddress,
        opcode: Opcode,
    ) -> Option<&CecFrame> {
        self.frames.get(&(source, opcode))
    }
}
