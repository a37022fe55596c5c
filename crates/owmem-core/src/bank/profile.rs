//! Device profiles
//!
//! A [`DeviceProfile`] describes one device family: its banks, the
//! scratchpad the banks write through and the SHA-1 engine, if any.

use alloc::string::String;
use alloc::vec::Vec;

use super::descriptor::{BankId, ControlTarget, MemoryBank, ReadStrategy, WriteStrategy};
use crate::bus::BusSpeed;
use crate::error::{Error, Result};

/// Scratchpad geometry and timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchpadSpec {
    /// Scratchpad length in bytes (8 or 32)
    pub length: usize,
    /// Read Scratchpad ends with an inverted CRC16 over the whole frame
    pub read_crc: bool,
    /// Time to wait after a copy before polling the status byte
    pub copy_delay_us: u32,
}

impl ScratchpadSpec {
    /// Mask of the offset bits within the scratchpad
    pub fn offset_mask(&self) -> u32 {
        self.length as u32 - 1
    }

    /// E/S byte for a copy of `len` bytes starting at physical `addr`
    pub fn ending_offset(&self, addr: u32, len: usize) -> Result<u8> {
        if len == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(((addr + len as u32 - 1) & self.offset_mask()) as u8)
    }
}

/// SHA-1 engine parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaSpec {
    /// Physical address of the 8-byte secret
    pub secret_address: u32,
    /// Device variant implements Refresh Scratchpad
    pub supports_refresh: bool,
}

impl ShaSpec {
    /// Whether physical `addr` lies in the secret region
    pub fn is_secret_address(&self, addr: u32) -> bool {
        addr >= self.secret_address && addr < self.secret_address + 8
    }
}

/// Static description of one device family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Family code (first ROM byte)
    pub family: u8,
    /// Part name
    pub name: String,
    /// Bus speed the device is driven at
    pub speed: BusSpeed,
    /// Scratchpad, when writes are staged
    pub scratchpad: Option<ScratchpadSpec>,
    /// SHA-1 engine, when present
    pub sha: Option<ShaSpec>,
    /// Memory banks
    pub banks: Vec<MemoryBank>,
}

impl DeviceProfile {
    /// Bank descriptor by id
    pub fn bank(&self, id: BankId) -> Result<&MemoryBank> {
        self.banks.get(id.0).ok_or(Error::UnknownBank)
    }

    /// Find a bank by its description
    pub fn bank_id(&self, description: &str) -> Option<BankId> {
        self.banks
            .iter()
            .position(|b| b.description == description)
            .map(BankId)
    }

    /// Scratchpad spec, or `Unsupported` when the device has none
    pub fn scratchpad_spec(&self) -> Result<ScratchpadSpec> {
        self.scratchpad.ok_or(Error::Unsupported("scratchpad"))
    }

    /// SHA engine spec, or `Unsupported` when the device has none
    pub fn sha_spec(&self) -> Result<ShaSpec> {
        self.sha.ok_or(Error::Unsupported("SHA-1 engine"))
    }

    /// Check every bank and every cross-bank reference
    pub fn validate(&self) -> Result<()> {
        if let Some(sp) = &self.scratchpad {
            if !sp.length.is_power_of_two() || sp.length < 8 {
                return Err(Error::InvalidGeometry);
            }
        }

        for bank in &self.banks {
            bank.validate()?;

            if bank.write.uses_scratchpad() || bank.read == ReadStrategy::Scratchpad {
                let sp = self.scratchpad.as_ref().ok_or(Error::InvalidGeometry)?;
                if bank.write.uses_scratchpad()
                    && (bank.start as usize % sp.length != 0 || bank.size as usize % sp.length != 0)
                {
                    return Err(Error::InvalidGeometry);
                }
            }
            if bank.write == WriteStrategy::CopyWithMac
                && (self.sha.is_none() || bank.page_length != crate::mac::PAGE_LEN)
            {
                return Err(Error::InvalidGeometry);
            }

            let bit_span = bank.number_pages.div_ceil(8) as u32;
            let byte_span = bank.number_pages as u32;
            self.check_target(bank.lock, bit_span)?;
            self.check_target(bank.redirect_lock, bit_span)?;
            self.check_target(bank.redirect, byte_span)?;
        }
        Ok(())
    }

    fn check_target(&self, target: Option<ControlTarget>, span: u32) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };
        let host = self.banks.get(target.bank.0).ok_or(Error::InvalidControlTarget)?;
        if !matches!(host.write, WriteStrategy::Eprom(_)) {
            return Err(Error::InvalidControlTarget);
        }
        if target.offset + span > host.size {
            return Err(Error::InvalidControlTarget);
        }
        Ok(())
    }
}
