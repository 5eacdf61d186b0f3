//! Enumerating the devices on an HDMI-CEC bus
//!
//! When an HDMI controller wakes from standby, or the user switches
//! CEC control on, the first thing it needs is an inventory: which
//! logical addresses answer on the bus, where each device sits in the
//! HDMI tree, what it is called, and who made it. This crate
//! implements that discovery sequence as a host-driven state machine,
//! [`engine::DiscoveryEngine`].
//!
//! Discovery goes through four stages:
//!
//! 1. Poll every remote logical address and keep the ones that ack
//! 2. Ask each acked device for its physical address and type
//! 3. Ask each for its OSD display name
//! 4. Ask each for its vendor ID
//!
//! after which the engine hands the caller one [`DeviceInfo`] per
//! surviving device, in poll-ack order, through a one-shot
//! [`DiscoveryCallback`]. Devices that never answer a query are
//! retried a few times and then dropped from the inventory; devices
//! that reject a query with \<Feature Abort\> keep a default value for
//! that attribute. Discovery always completes — an empty bus is a
//! successful (empty) result, not an error.
//!
//! The engine owns no sockets, no threads, and no clocks. The host —
//! whatever owns the CEC transport — drives it:
//!
//! * deliver every inbound frame to
//!   [`DiscoveryEngine::on_command`](engine::DiscoveryEngine::on_command),
//!   which returns `false` for frames discovery does not consume so
//!   the host can route them elsewhere;
//! * implement [`bus::BusGateway`] (send a frame, start the polling
//!   sweep, arm/clear the single pending timeout) and call
//!   [`DiscoveryEngine::on_timer`](engine::DiscoveryEngine::on_timer)
//!   when the timeout fires;
//! * keep a [`cache::MessageCache`] filled with every frame the local
//!   device accepts, so the engine can answer its own queries without
//!   touching the bus when a device has already volunteered the
//!   information;
//! * implement [`bus::LocalDevice`] if the local device is a TV or
//!   audio system and can resolve physical addresses to input ports.
//!
//! All of this happens on one thread: every engine method runs to
//! completion and returns, and "waiting" is nothing more than a state
//! plus a pending host timer.
//!
//! Todo:
//!  - [ ] restart discovery on hotplug instead of requiring the host
//!        to construct a fresh engine
//!  - [ ] map well-known vendor OUIs to manufacturer names

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;
use twill_cec::{
    DeviceType, LogicalAddress, PhysicalAddress, PortId, VendorId,
};

pub mod bus;
pub mod cache;
mod debug;
pub mod engine;

pub use engine::DiscoveryEngine;

/// Where a discovery run is in its life
///
/// Also used to tag timers: a timeout armed in one state is ignored
/// if it fires after the engine has moved on.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Constructed but not started
    Idle,
    /// Waiting for the bus polling sweep to report back
    Polling,
    /// Walking the inventory asking for physical addresses
    PhysicalAddress,
    /// Walking the inventory asking for OSD names
    OsdName,
    /// Walking the inventory asking for vendor IDs
    VendorId,
    /// Done; the callback has fired (or the run was cancelled)
    Finished,
}

/// Everything discovery learned about one remote device
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// The address the device acked during polling
    pub logical_address: LogicalAddress,
    /// Its position in the HDMI tree, or [`PhysicalAddress::INVALID`]
    pub physical_address: PhysicalAddress,
    /// The local input port it is reachable through, or
    /// [`PortId::INVALID`] when the local device has no ports
    pub port_id: PortId,
    /// The device-type code it reported, or [`DeviceType::INACTIVE`]
    pub device_type: DeviceType,
    /// Its manufacturer's OUI, or [`VendorId::UNKNOWN`]
    pub vendor_id: VendorId,
    /// Its OSD name, or a default derived from its type or address
    pub display_name: String,
}

/// What the engine's owner hears about a discovery run
pub trait DiscoveryCallback {
    /// One device has been fully enumerated
    ///
    /// Fires once per device that survives every stage, at the moment
    /// its last query completes; the same devices later appear in
    /// [`DiscoveryCallback::on_discovery_done`]. Useful for streaming
    /// UI updates. The default does nothing.
    fn on_device_discovered(&mut self, device: &DeviceInfo) {
        let _ = device;
    }

    /// Discovery is complete
    ///
    /// Called exactly once per started run, with one entry per device
    /// that answered the poll and survived its queries, in poll-ack
    /// order. Consumes the callback: a finished engine cannot report
    /// twice.
    fn on_discovery_done(self, devices: Vec<DeviceInfo>);
}

/// Tunables for a discovery run
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// How many times the polling sweep retries each address
    pub poll_retries: u8,
    /// How many sends of one query before its device is dropped
    pub query_retries: u8,
    /// How long to wait for the reply to each query
    pub query_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_retries: 3,
            query_retries: 5,
            query_timeout: Duration::from_millis(2000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let c = DiscoveryConfig::default();
        assert_eq!(c.poll_retries, 3);
        assert_eq!(c.query_retries, 5);
        assert_eq!(c.query_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn device_info_can_clone() {
        let d = DeviceInfo {
            logical_address: LogicalAddress(4),
            physical_address: PhysicalAddress(0x1000),
            port_id: PortId(1),
            device_type: DeviceType::PLAYBACK_DEVICE,
            vendor_id: VendorId(0x008045),
            display_name: "Player".into(),
        };
        assert_eq!(d.clone(), d);
    }
}
