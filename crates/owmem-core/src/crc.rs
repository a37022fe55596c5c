//! Dow/Maxim 1-Wire CRC helpers
//!
//! 1-Wire devices protect their frames with either the 8-bit Dallas/Maxim
//! CRC (CRC-8/MAXIM-DOW) or the 16-bit CRC-16/ARC polynomial. Both are
//! reflected algorithms, so a frame that carries its own CRC folds to a
//! constant residual: `0` for CRC8 (the CRC byte is sent as is) and
//! `0xB001` for CRC16 (the two CRC bytes are sent inverted, LSB first).

use crc::{Crc, CRC_16_ARC, CRC_8_MAXIM_DOW};
use heapless::Vec;

static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);
static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Residual of a CRC16 frame that ends with its inverted CRC bytes
pub const CRC16_RESIDUAL: u16 = 0xB001;
/// Residual of a CRC8 frame that ends with its CRC byte
pub const CRC8_RESIDUAL: u8 = 0;

/// Compute the 8-bit CRC of `data` starting from register value `seed`
pub fn crc8(seed: u8, data: &[u8]) -> u8 {
    // The crate reflects the initial value for reflected algorithms; the
    // device seeds the shift register directly.
    let mut digest = CRC8.digest_with_initial(seed.reverse_bits());
    digest.update(data);
    digest.finalize()
}

/// Compute the 16-bit CRC of `data` starting from register value `seed`
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    let mut digest = CRC16.digest_with_initial(seed.reverse_bits());
    digest.update(data);
    digest.finalize()
}

/// CRC flavour used by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrcWidth {
    /// Dallas/Maxim CRC8, one byte, residual `0`
    Crc8,
    /// CRC16, two inverted bytes, residual `0xB001`
    Crc16,
}

impl CrcWidth {
    /// Number of CRC bytes on the wire
    pub const fn len(self) -> usize {
        match self {
            CrcWidth::Crc8 => 1,
            CrcWidth::Crc16 => 2,
        }
    }

    /// Continue a running CRC of this width over `data`
    pub fn running(self, seed: u16, data: &[u8]) -> u16 {
        match self {
            CrcWidth::Crc8 => crc8(seed as u8, data) as u16,
            CrcWidth::Crc16 => crc16(seed, data),
        }
    }

    /// Fold `frame` (data followed by its CRC bytes) and test the residual
    ///
    /// CRC8 uses only the low byte of `seed`.
    pub fn check(self, seed: u16, frame: &[u8]) -> bool {
        match self {
            CrcWidth::Crc8 => crc8(seed as u8, frame) == CRC8_RESIDUAL,
            CrcWidth::Crc16 => crc16(seed, frame) == CRC16_RESIDUAL,
        }
    }

    /// CRC bytes a device transmits after `data`
    pub fn trailer(self, seed: u16, data: &[u8]) -> Vec<u8, 2> {
        let mut out = Vec::new();
        match self {
            CrcWidth::Crc8 => {
                let _ = out.push(crc8(seed as u8, data));
            }
            CrcWidth::Crc16 => {
                let crc = !crc16(seed, data);
                let _ = out.extend_from_slice(&crc.to_le_bytes());
            }
        }
        out
    }
}

/// Inverted CRC16 bytes (LSB first) as stored in Universal Data Packets
pub fn crc16_trailer(seed: u16, data: &[u8]) -> [u8; 2] {
    (!crc16(seed, data)).to_le_bytes()
}
