//! Types and messages for HDMI-CEC, the Consumer Electronics Control bus
//!
//! CEC is a low-speed one-wire bus carried over HDMI. Devices address
//! each other using 4-bit _logical addresses_ which encode a device's
//! role (TV, recorder, playback device, and so on), and describe their
//! position in the HDMI cable tree using 16-bit _physical addresses_
//! (the "1.4.0.0" notation seen in AV-receiver menus).
//!
//! This crate supplies the vocabulary shared by every CEC feature:
//! the address and identifier newtypes ([`LogicalAddress`],
//! [`PhysicalAddress`], [`DeviceType`], [`VendorId`]), the structural
//! frame type [`CecFrame`], and — in [`message`] — builders for the
//! requests a controller sends and parsers for the replies it receives.
//!
//! What this crate deliberately does *not* cover is the bus-level byte
//! layout: header blocks, ack bits, and arbitration belong to whichever
//! transport (kernel CEC device, vendor MCU, bit-banged GPIO) carries
//! the frames. A [`CecFrame`] here is the already-framed triple of
//! source, destination, and opcode-plus-parameters.
//!
//! The crate is `no_std`-compatible (with `alloc`); enable the `defmt`
//! feature for embedded logging of its types.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

extern crate alloc;

pub mod message;

pub use message::{CecFrame, Opcode};

/// A 4-bit CEC bus address encoding a device's role
///
/// The CEC addressing plan assigns meanings to all sixteen values:
/// 0 is always the TV, 5 the audio system, and 15 doubles as the
/// "unregistered" source address and the broadcast destination.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalAddress(pub u8);

impl LogicalAddress {
    /// The TV (and the root of the HDMI tree)
    pub const TV: Self = Self(0);
    /// The (single) audio system, e.g. an AV receiver or soundbar
    pub const AUDIO_SYSTEM: Self = Self(5);
    /// A device which failed to claim a role address
    pub const UNREGISTERED: Self = Self(15);
    /// As a destination, address 15 reaches every device
    pub const BROADCAST: Self = Self(15);

    /// Can a directed frame be sent to this address?
    ///
    /// True for the role addresses 0..=14; false for the
    /// unregistered/broadcast address and for out-of-range values.
    #[must_use]
    pub fn is_addressable(self) -> bool {
        self.0 < Self::UNREGISTERED.0
    }

    /// The device type the addressing plan assigns to this address
    ///
    /// Addresses 12..=14 are reserved and map to
    /// [`DeviceType::RESERVED`], as does anything out of range.
    #[must_use]
    pub fn device_type(self) -> DeviceType {
        match self.0 {
            0 => DeviceType::TV,
            1 | 2 | 9 => DeviceType::RECORDING_DEVICE,
            3 | 6 | 7 | 10 => DeviceType::TUNER,
            4 | 8 | 11 => DeviceType::PLAYBACK_DEVICE,
            5 => DeviceType::AUDIO_SYSTEM,
            _ => DeviceType::RESERVED,
        }
    }

    /// A display name for a device which never told us its OSD name
    #[must_use]
    pub fn default_device_name(self) -> &'static str {
        self.device_type().default_name()
    }
}

/// A 16-bit HDMI topology coordinate
///
/// Each of the four nibbles is one level of the cable tree: the TV is
/// 0.0.0.0, a device on its input 1 is 1.0.0.0, a device behind a
/// switch on that input is 1.1.0.0, and so on. On the wire it travels
/// as two network-order bytes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalAddress(pub u16);

impl PhysicalAddress {
    /// The sentinel for "position unknown" (F.F.F.F)
    pub const INVALID: Self = Self(0xFFFF);

    /// Unpack from the two network-order bytes of a frame payload
    #[must_use]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Pack into the two network-order bytes of a frame payload
    #[must_use]
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl core::fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:x}.{:x}.{:x}.{:x}",
            (self.0 >> 12) & 0xF,
            (self.0 >> 8) & 0xF,
            (self.0 >> 4) & 0xF,
            self.0 & 0xF
        )
    }
}

/// An input number on a TV or audio system
///
/// Resolved from a [`PhysicalAddress`] by whichever local device owns
/// the inputs; [`PortId::INVALID`] when there is no such device or the
/// lookup fails.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortId(pub i32);

impl PortId {
    /// The sentinel for "no port"
    pub const INVALID: Self = Self(-1);
}

/// An 8-bit CEC device-type code
///
/// Reported by devices in the third byte of a physical-address report.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceType(pub u8);

impl DeviceType {
    /// Television
    pub const TV: Self = Self(0);
    /// Recording device (DVR, disc recorder)
    pub const RECORDING_DEVICE: Self = Self(1);
    /// Reserved device-type code
    pub const RESERVED: Self = Self(2);
    /// Tuner (set-top box)
    pub const TUNER: Self = Self(3);
    /// Playback device (disc player, streamer, games console)
    pub const PLAYBACK_DEVICE: Self = Self(4);
    /// Audio system (AV receiver, soundbar)
    pub const AUDIO_SYSTEM: Self = Self(5);
    /// CEC-capable switch with no AV function of its own
    pub const PURE_CEC_SWITCH: Self = Self(6);
    /// The sentinel for "type not yet reported"
    pub const INACTIVE: Self = Self(0xFF);

    /// A display name for devices of this type
    #[must_use]
    pub fn default_name(self) -> &'static str {
        match self {
            Self::TV => "TV",
            Self::RECORDING_DEVICE => "Recorder",
            Self::TUNER => "Tuner",
            Self::PLAYBACK_DEVICE => "Playback",
            Self::AUDIO_SYSTEM => "Audio System",
            Self::PURE_CEC_SWITCH => "Switch",
            _ => "",
        }
    }
}

/// A 24-bit IEEE OUI identifying a device's manufacturer
///
/// On the wire it travels as three network-order bytes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VendorId(pub u32);

impl VendorId {
    /// The sentinel for "vendor not reported"
    pub const UNKNOWN: Self = Self(0xFF_FFFF);

    /// Unpack from the three network-order bytes of a frame payload
    #[must_use]
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from(bytes[0]) << 16
            | u32::from(bytes[1]) << 8
            | u32::from(bytes[2]))
    }
}

impl core::fmt::Display for VendorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_addresses_are_addressable() {
        assert!(LogicalAddress::TV.is_addressable());
        assert!(LogicalAddress::AUDIO_SYSTEM.is_addressable());
        assert!(LogicalAddress(14).is_addressable());
    }

    #[test]
    fn broadcast_is_not_addressable() {
        assert!(!LogicalAddress::BROADCAST.is_addressable());
        assert!(!LogicalAddress::UNREGISTERED.is_addressable());
    }

    #[test]
    fn out_of_range_is_not_addressable() {
        assert!(!LogicalAddress(16).is_addressable());
        assert!(!LogicalAddress(255).is_addressable());
    }

    #[test]
    fn addressing_plan_types() {
        assert_eq!(LogicalAddress::TV.device_type(), DeviceType::TV);
        assert_eq!(
            LogicalAddress(4).device_type(),
            DeviceType::PLAYBACK_DEVICE
        );
        assert_eq!(
            LogicalAddress(9).device_type(),
            DeviceType::RECORDING_DEVICE
        );
        assert_eq!(LogicalAddress(10).device_type(), DeviceType::TUNER);
        assert_eq!(
            LogicalAddress::AUDIO_SYSTEM.device_type(),
            DeviceType::AUDIO_SYSTEM
        );
        assert_eq!(LogicalAddress(13).device_type(), DeviceType::RESERVED);
        assert_eq!(
            LogicalAddress::UNREGISTERED.device_type(),
            DeviceType::RESERVED
        );
    }

    #[test]
    fn default_names() {
        assert_eq!(LogicalAddress::TV.default_device_name(), "TV");
        assert_eq!(LogicalAddress(4).default_device_name(), "Playback");
        assert_eq!(
            LogicalAddress::AUDIO_SYSTEM.default_device_name(),
            "Audio System"
        );
        assert_eq!(LogicalAddress(12).default_device_name(), "");
        assert_eq!(DeviceType::INACTIVE.default_name(), "");
    }

    #[test]
    fn physical_address_round_trip() {
        let pa = PhysicalAddress::from_bytes([0x12, 0x34]);
        assert_eq!(pa, PhysicalAddress(0x1234));
        assert_eq!(pa.to_bytes(), [0x12, 0x34]);
    }

    #[test]
    fn physical_address_dotted_form() {
        use alloc::format;
        assert_eq!(format!("{}", PhysicalAddress(0x1000)), "1.0.0.0");
        assert_eq!(format!("{}", PhysicalAddress(0x2140)), "2.1.4.0");
        assert_eq!(format!("{}", PhysicalAddress::INVALID), "f.f.f.f");
    }

    #[test]
    fn vendor_id_packing() {
        assert_eq!(
            VendorId::from_bytes([0x00, 0x80, 0x45]),
            VendorId(0x008045)
        );
        assert_eq!(VendorId::from_bytes([0xFF, 0xFF, 0xFF]), VendorId::UNKNOWN);
    }

    #[test]
    fn vendor_id_display() {
        use alloc::format;
        assert_eq!(format!("{}", VendorId(0x008045)), "008045");
    }
}
