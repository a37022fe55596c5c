//! Error types for owmem-core
//!
//! This module provides a no_std compatible error type that is used by
//! every protocol layer of the crate. Each variant belongs to one
//! [`ErrorKind`], which tells the caller whether the failure happened
//! before the bus was touched, on the wire, or in the device's answer.

use core::fmt;

/// Broad failure category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request violates static geometry or local state and was
    /// rejected before any bus traffic
    Configuration,
    /// The device did not answer (no presence, select failed, adapter fault)
    Transport,
    /// A CRC or verify-after-write check failed
    Integrity,
    /// The device answered with an unexpected status, or the operation is
    /// not supported by this bank, device variant or adapter
    Protocol,
    /// A MAC-authorized operation was refused by the device
    Authentication,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration error"),
            Self::Transport => write!(f, "transport error"),
            Self::Integrity => write!(f, "integrity error"),
            Self::Protocol => write!(f, "protocol error"),
            Self::Authentication => write!(f, "authentication error"),
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    /// Address or length extends beyond the memory bank
    AddressOutOfBounds,
    /// Page number is beyond the last page of the bank
    PageOutOfRange,
    /// Attempt to write a read-only bank
    ReadOnlyBank,
    /// Packet payload exceeds the bank's maximum packet data length
    PacketTooLong,
    /// Caller-supplied buffer is too small for the requested frame
    BufferTooSmall,
    /// Bank descriptor violates its geometry invariants
    InvalidGeometry,
    /// A lock or redirect target refers to a bank that does not exist
    InvalidControlTarget,
    /// Bank id does not exist in this device profile
    UnknownBank,
    /// No built-in profile for this family code
    UnknownFamily(u8),
    /// ROM id failed its CRC8 check
    InvalidRomId,
    /// The session does not hold a secret for this operation
    SecretUnknown,
    /// The session belongs to a different device
    SessionMismatch,
    /// A continued page read does not follow the previous page
    NotContinuable,
    /// Argument has no meaning for the operation, such as a zero-length copy
    InvalidArgument,

    // Transport errors
    /// No presence pulse, or the device did not answer the select
    DeviceNotPresent,
    /// The bus adapter reported a failure
    AdapterError,

    // Integrity errors
    /// CRC check on a framed read failed
    CrcMismatch,
    /// Data read back after a write does not match
    VerifyMismatch {
        /// Physical address of the first mismatching byte
        addr: u32,
    },
    /// Universal Data Packet length byte exceeds the maximum
    InvalidPacketLength,
    /// Universal Data Packet CRC16 is wrong
    InvalidPacketCrc,

    // Protocol errors
    /// Device answered with an unexpected status byte
    UnexpectedStatus(u8),
    /// Operation is not supported by this bank or device variant
    Unsupported(&'static str),
    /// Bus adapter cannot deliver strong pull-up power
    PowerDeliveryUnsupported,
    /// Bus adapter cannot generate EPROM program pulses
    ProgramPulseUnsupported,
    /// Page is locked
    PageLocked,
    /// Page is already redirected to a different page
    AlreadyRedirected,

    // Authentication errors
    /// Device rejected the MAC of an authorized copy
    MacMismatch,
    /// Device refused an authorized copy into a write-protected region
    RegionWriteProtected,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AddressOutOfBounds
            | Self::PageOutOfRange
            | Self::ReadOnlyBank
            | Self::PacketTooLong
            | Self::BufferTooSmall
            | Self::InvalidGeometry
            | Self::InvalidControlTarget
            | Self::UnknownBank
            | Self::UnknownFamily(_)
            | Self::InvalidRomId
            | Self::SecretUnknown
            | Self::SessionMismatch
            | Self::NotContinuable
            | Self::InvalidArgument => ErrorKind::Configuration,
            Self::DeviceNotPresent | Self::AdapterError => ErrorKind::Transport,
            Self::CrcMismatch
            | Self::VerifyMismatch { .. }
            | Self::InvalidPacketLength
            | Self::InvalidPacketCrc => ErrorKind::Integrity,
            Self::UnexpectedStatus(_)
            | Self::Unsupported(_)
            | Self::PowerDeliveryUnsupported
            | Self::ProgramPulseUnsupported
            // lock state comes from the device, even when cached
            | Self::PageLocked
            | Self::AlreadyRedirected => ErrorKind::Protocol,
            Self::MacMismatch | Self::RegionWriteProtected => ErrorKind::Authentication,
        }
    }

    /// Whether this error must invalidate the negotiated bus speed
    ///
    /// Everything except configuration errors was observed on the bus.
    pub fn forces_verify(&self) -> bool {
        self.kind() != ErrorKind::Configuration
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::PageOutOfRange => write!(f, "page number out of range"),
            Self::ReadOnlyBank => write!(f, "memory bank is read-only"),
            Self::PacketTooLong => write!(f, "packet exceeds maximum data length"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::InvalidGeometry => write!(f, "invalid memory bank geometry"),
            Self::InvalidControlTarget => write!(f, "lock/redirect target bank does not exist"),
            Self::UnknownBank => write!(f, "unknown memory bank"),
            Self::UnknownFamily(family) => write!(f, "unknown device family 0x{:02X}", family),
            Self::InvalidRomId => write!(f, "ROM id CRC8 mismatch"),
            Self::SecretUnknown => write!(f, "device secret is not known to this session"),
            Self::SessionMismatch => write!(f, "session belongs to a different device"),
            Self::NotContinuable => write!(f, "page read cannot continue from the previous read"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::PageLocked => write!(f, "page is locked"),
            Self::AlreadyRedirected => write!(f, "page is already redirected"),
            Self::DeviceNotPresent => write!(f, "device not present"),
            Self::AdapterError => write!(f, "bus adapter error"),
            Self::CrcMismatch => write!(f, "invalid CRC"),
            Self::VerifyMismatch { addr } => {
                write!(f, "verify failed at address 0x{:04X}", addr)
            }
            Self::InvalidPacketLength => write!(f, "invalid packet length"),
            Self::InvalidPacketCrc => write!(f, "invalid CRC16 in packet"),
            Self::UnexpectedStatus(status) => {
                write!(f, "unexpected status byte 0x{:02X}", status)
            }
            Self::Unsupported(op) => write!(f, "{} is not supported by this bank", op),
            Self::PowerDeliveryUnsupported => write!(f, "adapter cannot deliver power"),
            Self::ProgramPulseUnsupported => write!(f, "adapter cannot generate program pulses"),
            Self::MacMismatch => write!(f, "MAC does not match"),
            Self::RegionWriteProtected => write!(f, "region is write protected"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
