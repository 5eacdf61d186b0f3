//! The seams between the discovery engine and its host
//!
//! The engine never touches hardware. Everything it needs from the
//! outside world comes through two traits: [`BusGateway`] (the CEC
//! transport plus its timer facility) and [`LocalDevice`] (whatever
//! the enclosing device can do with the answers). Hosts pass
//! implementations into each engine call, the engine holds no
//! references between calls.

use crate::DiscoveryState;
use bitflags::bitflags;
use core::time::Duration;
use twill_cec::{CecFrame, DeviceType, LogicalAddress, PhysicalAddress, PortId};

bitflags! {
    /// How the bus polling sweep should behave
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PollFlags: u8 {
        /// Sweep from address 14 down to 0 instead of up
        const REVERSE_ORDER = 0x01;
        /// Skip the local device's own logical addresses
        const REMOTES_ONLY = 0x02;
    }
}

/// What the discovery engine asks of the CEC transport
///
/// Implemented by the host that owns the bus. All methods take
/// `&self`: the engine may call them from any of its entry points,
/// and hosts with mutable internals are expected to use interior
/// mutability, the transport being shared with the rest of the CEC
/// service anyway.
pub trait BusGateway {
    /// The transport's send-failure type
    ///
    /// Discovery never treats a send failure as fatal — an unsent
    /// query times out like an unanswered one — so the engine only
    /// ever discards these. The type is still surfaced so hosts can
    /// log from their own implementations.
    type Error;

    /// Transmit one frame on the bus
    ///
    /// # Errors
    ///
    /// Whatever the transport reports; the engine ignores it and
    /// falls back on its timeout/retry policy.
    fn send_frame(&self, frame: &CecFrame) -> Result<(), Self::Error>;

    /// Start the bus polling sweep
    ///
    /// The sweep acks and nacks are collected by the transport; the
    /// host reports the acked addresses back through
    /// [`DiscoveryEngine::on_poll_complete`](crate::engine::DiscoveryEngine::on_poll_complete).
    /// `retries` is how many times each address is re-polled before
    /// being counted silent.
    fn poll_devices(&self, flags: PollFlags, retries: u8);

    /// Arm the single pending timeout, tagged with `state`
    ///
    /// When it fires the host calls
    /// [`DiscoveryEngine::on_timer`](crate::engine::DiscoveryEngine::on_timer)
    /// with the same tag. Arming replaces any previously armed
    /// timeout.
    fn arm_timer(&self, state: DiscoveryState, timeout: Duration);

    /// Cancel the pending timeout, if any
    fn clear_timer(&self);
}

/// What the local device can do with discovery's findings
///
/// A TV resolves physical addresses to its input ports, tracks
/// switches, and replays frames it deferred while discovery ran; an
/// audio system resolves ports only; anything else does nothing. The
/// provided defaults are that "anything else": implement none of the
/// methods and you have a device with no ports and no bookkeeping —
/// `()` implements exactly that.
pub trait LocalDevice {
    /// Which local input port leads to `physical`?
    fn port_id_of(&self, physical: PhysicalAddress) -> PortId {
        let _ = physical;
        PortId::INVALID
    }

    /// A device (possibly a CEC switch) reported its tree position
    ///
    /// TVs record these so switches that never claim a logical
    /// address of their own can still be tracked.
    fn on_switch_discovered(
        &mut self,
        logical: LogicalAddress,
        device_type: DeviceType,
        physical: PhysicalAddress,
    ) {
        let _ = (logical, device_type, physical);
    }

    /// Discovery has finished; replay any frames deferred during it
    fn flush_delayed_messages(&mut self) {}
}

/// The no-capability local device
impl LocalDevice for () {}
