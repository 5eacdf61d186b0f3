//! Building the request frames a CEC feature sends, and parsing the
//! reply payloads it receives.
//!
//! Builders return a ready-to-send [`CecFrame`]; parsers take the raw
//! parameter bytes of a received frame and return typed values,
//! rejecting payloads that are too short or (for OSD names) not
//! US-ASCII.

use crate::{DeviceType, LogicalAddress, PhysicalAddress, VendorId};
use alloc::string::String;
use alloc::vec::Vec;

/// A raw CEC opcode byte
///
/// A newtype rather than an enum so that frames carrying opcodes this
/// crate knows nothing about stay representable; hosts route every
/// inbound frame, not just the ones a given feature consumes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    /// Protocol-level rejection of a previous frame
    pub const FEATURE_ABORT: Self = Self(0x00);
    /// Ask a device for its OSD display name
    pub const GIVE_OSD_NAME: Self = Self(0x46);
    /// A device advertising its OSD display name
    pub const SET_OSD_NAME: Self = Self(0x47);
    /// Ask a device for its physical address and type
    pub const GIVE_PHYSICAL_ADDRESS: Self = Self(0x83);
    /// A device advertising its physical address and type
    pub const REPORT_PHYSICAL_ADDRESS: Self = Self(0x84);
    /// A device advertising its manufacturer's IEEE OUI
    pub const DEVICE_VENDOR_ID: Self = Self(0x87);
    /// Ask a device for its manufacturer's IEEE OUI
    pub const GIVE_DEVICE_VENDOR_ID: Self = Self(0x8C);
}

impl core::fmt::Display for Opcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::FEATURE_ABORT => f.write_str("FeatureAbort"),
            Self::GIVE_OSD_NAME => f.write_str("GiveOsdName"),
            Self::SET_OSD_NAME => f.write_str("SetOsdName"),
            Self::GIVE_PHYSICAL_ADDRESS => {
                f.write_str("GivePhysicalAddress")
            }
            Self::REPORT_PHYSICAL_ADDRESS => {
                f.write_str("ReportPhysicalAddress")
            }
            Self::DEVICE_VENDOR_ID => f.write_str("DeviceVendorId"),
            Self::GIVE_DEVICE_VENDOR_ID => {
                f.write_str("GiveDeviceVendorId")
            }
            Self(other) => write!(f, "Opcode(0x{other:02x})"),
        }
    }
}

/// Reasons a device can give in a Feature Abort
pub mod abort_reason {
    /// The rejected opcode is not recognized at all
    pub const UNRECOGNIZED_OPCODE: u8 = 0;
    /// The device cannot comply in its current mode
    pub const NOT_IN_CORRECT_MODE: u8 = 1;
    /// The device cannot provide the requested source
    pub const CANNOT_PROVIDE_SOURCE: u8 = 2;
    /// A parameter of the rejected frame was invalid
    pub const INVALID_OPERAND: u8 = 3;
    /// The device simply declines
    pub const REFUSED: u8 = 4;
}

/// A structural CEC frame: who sent it, to whom, and what it says
///
/// The bus-level byte layout (header blocks, ack bits, arbitration)
/// belongs to the transport; by the time a frame reaches feature code
/// it looks like this.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CecFrame {
    /// The logical address the frame came from
    pub source: LogicalAddress,
    /// The logical address the frame is for (possibly broadcast)
    pub destination: LogicalAddress,
    /// What the frame says
    pub opcode: Opcode,
    /// Opcode-specific parameter bytes
    pub params: Vec<u8>,
}

/// \<Give Physical Address\>: ask `to` where it sits in the HDMI tree
#[must_use]
pub fn build_give_physical_address(
    from: LogicalAddress,
    to: LogicalAddress,
) -> CecFrame {
    CecFrame {
        source: from,
        destination: to,
        opcode: Opcode::GIVE_PHYSICAL_ADDRESS,
        params: Vec::new(),
    }
}

/// \<Give OSD Name\>: ask `to` for its display name
#[must_use]
pub fn build_give_osd_name(
    from: LogicalAddress,
    to: LogicalAddress,
) -> CecFrame {
    CecFrame {
        source: from,
        destination: to,
        opcode: Opcode::GIVE_OSD_NAME,
        params: Vec::new(),
    }
}

/// \<Give Device Vendor ID\>: ask `to` who made it
#[must_use]
pub fn build_give_device_vendor_id(
    from: LogicalAddress,
    to: LogicalAddress,
) -> CecFrame {
    CecFrame {
        source: from,
        destination: to,
        opcode: Opcode::GIVE_DEVICE_VENDOR_ID,
        params: Vec::new(),
    }
}

/// \<Report Physical Address\>: `from` advertising its tree position
///
/// Broadcast on the real bus; mostly useful here for hosts answering
/// queries, and for test scaffolding.
#[must_use]
pub fn build_report_physical_address(
    from: LogicalAddress,
    physical_address: PhysicalAddress,
    device_type: DeviceType,
) -> CecFrame {
    let pa = physical_address.to_bytes();
    CecFrame {
        source: from,
        destination: LogicalAddress::BROADCAST,
        opcode: Opcode::REPORT_PHYSICAL_ADDRESS,
        params: alloc::vec![pa[0], pa[1], device_type.0],
    }
}

/// \<Set OSD Name\>: `from` advertising its display name
#[must_use]
pub fn build_set_osd_name(
    from: LogicalAddress,
    to: LogicalAddress,
    name: &str,
) -> CecFrame {
    CecFrame {
        source: from,
        destination: to,
        opcode: Opcode::SET_OSD_NAME,
        params: name.as_bytes().to_vec(),
    }
}

/// \<Device Vendor ID\>: `from` advertising its manufacturer
#[must_use]
pub fn build_device_vendor_id(
    from: LogicalAddress,
    vendor_id: VendorId,
) -> CecFrame {
    CecFrame {
        source: from,
        destination: LogicalAddress::BROADCAST,
        opcode: Opcode::DEVICE_VENDOR_ID,
        params: alloc::vec![
            (vendor_id.0 >> 16) as u8,
            (vendor_id.0 >> 8) as u8,
            vendor_id.0 as u8,
        ],
    }
}

/// \<Feature Abort\>: `from` rejecting an earlier frame
#[must_use]
pub fn build_feature_abort(
    from: LogicalAddress,
    to: LogicalAddress,
    rejected: Opcode,
    reason: u8,
) -> CecFrame {
    CecFrame {
        source: from,
        destination: to,
        opcode: Opcode::FEATURE_ABORT,
        params: alloc::vec![rejected.0, reason],
    }
}

/// Why a reply payload could not be parsed
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload had fewer bytes than the opcode requires
    TooShort {
        /// How many bytes the opcode requires
        need: usize,
        /// How many the payload carried
        got: usize,
    },
    /// An OSD name contained a byte outside US-ASCII
    NotAscii,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooShort { need, got } => {
                write!(f, "payload too short: need {need} bytes, got {got}")
            }
            Self::NotAscii => f.write_str("OSD name is not US-ASCII"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

/// The payload of a \<Report Physical Address\>
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalAddressReport {
    /// Where the device sits in the HDMI tree
    pub physical_address: PhysicalAddress,
    /// What kind of device it claims to be
    pub device_type: DeviceType,
}

/// Parse the 3-byte payload of a \<Report Physical Address\>
///
/// # Errors
///
/// Returns [`ParseError::TooShort`] for payloads under 3 bytes.
pub fn parse_physical_address_report(
    params: &[u8],
) -> Result<PhysicalAddressReport, ParseError> {
    match params {
        [hi, lo, ty, ..] => Ok(PhysicalAddressReport {
            physical_address: PhysicalAddress::from_bytes([*hi, *lo]),
            device_type: DeviceType(*ty),
        }),
        _ => Err(ParseError::TooShort {
            need: 3,
            got: params.len(),
        }),
    }
}

/// Parse the 3-byte payload of a \<Device Vendor ID\>
///
/// # Errors
///
/// Returns [`ParseError::TooShort`] for payloads under 3 bytes.
pub fn parse_device_vendor_id(params: &[u8]) -> Result<VendorId, ParseError> {
    match params {
        [a, b, c, ..] => Ok(VendorId::from_bytes([*a, *b, *c])),
        _ => Err(ParseError::TooShort {
            need: 3,
            got: params.len(),
        }),
    }
}

/// Parse the payload of a \<Set OSD Name\>
///
/// OSD names are defined to be US-ASCII, 1..=14 bytes; an empty
/// payload decodes to an empty name, but any byte above 0x7F is an
/// error (callers fall back to a default name).
///
/// # Errors
///
/// Returns [`ParseError::NotAscii`] for non-ASCII payloads.
pub fn parse_osd_name(params: &[u8]) -> Result<String, ParseError> {
    if !params.is_ascii() {
        return Err(ParseError::NotAscii);
    }
    // is_ascii() implies valid UTF-8
    Ok(core::str::from_utf8(params)
        .map_err(|_| ParseError::NotAscii)?
        .into())
}

/// The opcode a \<Feature Abort\> is rejecting, if the payload has one
#[must_use]
pub fn feature_abort_target(params: &[u8]) -> Option<Opcode> {
    params.first().map(|b| Opcode(*b))
}
