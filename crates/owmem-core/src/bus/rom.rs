//! 64-bit 1-Wire registration number

use core::fmt;

use crate::crc::crc8;
use crate::error::{Error, Result};

/// 1-Wire ROM id: family code, 48-bit serial number and CRC8
///
/// Bytes are stored in bus order, family code first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RomId([u8; 8]);

impl RomId {
    /// Create a ROM id from bus-order bytes, checking the CRC8
    pub fn new(bytes: [u8; 8]) -> Result<Self> {
        if crc8(0, &bytes) != 0 {
            return Err(Error::InvalidRomId);
        }
        Ok(Self(bytes))
    }

    /// Build a ROM id from a family code and serial number, computing the CRC8
    pub fn from_parts(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = family;
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = crc8(0, &bytes[..7]);
        Self(bytes)
    }

    /// Family code (first byte)
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    /// All eight bytes in bus order
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Family code and serial number without the CRC byte
    ///
    /// This is the part of the ROM id that enters SHA-1 message blocks.
    pub fn without_crc(&self) -> [u8; 7] {
        let mut out = [0u8; 7];
        out.copy_from_slice(&self.0[..7]);
        out
    }
}

impl fmt::Display for RomId {
    // Conventional display order: CRC first, family code last
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_known_rom_id() {
        let rom = RomId::new([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2]).unwrap();
        assert_eq!(rom.family(), 0x02);
        assert_eq!(rom.to_string(), "A200000001B81C02");
    }

    #[test]
    fn test_bad_crc_rejected() {
        let result = RomId::new([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA3]);
        assert_eq!(result, Err(Error::InvalidRomId));
    }

    #[test]
    fn test_from_parts_round_trip() {
        let rom = RomId::from_parts(0x33, [1, 2, 3, 4, 5, 6]);
        assert_eq!(RomId::new(*rom.as_bytes()), Ok(rom));
        assert_eq!(rom.without_crc(), [0x33, 1, 2, 3, 4, 5, 6]);
    }
}
