//! Device database for runtime loading and lookup
//!
//! This module provides the `DeviceDatabase` type for loading device
//! profiles from RON files at runtime, next to the built-in families.

use alloc::{string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use crate::bank::{
    BankFlags, BankId, ControlTarget, DeviceProfile, EpromWrite, FrameLayout, MemoryBank,
    PageCrcRead, ReadStrategy, ScratchpadSpec, ShaSpec, WriteStrategy,
};
use crate::bus::{commands, BusSpeed};
use crate::crc::CrcWidth;
use crate::families;

/// Error type for device database operations
#[derive(Debug, thiserror::Error)]
pub enum DeviceDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A profile parsed but does not describe a consistent device
    #[error("Invalid profile {name}: {source}")]
    Validation {
        /// Profile name
        name: String,
        /// Failed invariant
        source: crate::error::Error,
    },
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Capability flags (RON format)
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
struct FlagsDef {
    general_purpose: bool,
    read_write: bool,
    write_once: bool,
    read_only: bool,
    non_volatile: bool,
    needs_program_pulse: bool,
    needs_power_delivery: bool,
}

impl From<FlagsDef> for BankFlags {
    fn from(def: FlagsDef) -> Self {
        let mut f = BankFlags::empty();
        if def.general_purpose {
            f |= BankFlags::GENERAL_PURPOSE;
        }
        if def.read_write {
            f |= BankFlags::READ_WRITE;
        }
        if def.write_once {
            f |= BankFlags::WRITE_ONCE;
        }
        if def.read_only {
            f |= BankFlags::READ_ONLY;
        }
        if def.non_volatile {
            f |= BankFlags::NON_VOLATILE;
        }
        if def.needs_program_pulse {
            f |= BankFlags::NEEDS_PROGRAM_PULSE;
        }
        if def.needs_power_delivery {
            f |= BankFlags::NEEDS_POWER_DELIVERY;
        }
        f
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
enum CrcDef {
    Crc8,
    Crc16,
}

impl From<CrcDef> for CrcWidth {
    fn from(def: CrcDef) -> Self {
        match def {
            CrcDef::Crc8 => CrcWidth::Crc8,
            CrcDef::Crc16 => CrcWidth::Crc16,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
enum SpeedDef {
    #[default]
    Regular,
    Flex,
    Overdrive,
}

impl From<SpeedDef> for BusSpeed {
    fn from(def: SpeedDef) -> Self {
        match def {
            SpeedDef::Regular => BusSpeed::Regular,
            SpeedDef::Flex => BusSpeed::Flex,
            SpeedDef::Overdrive => BusSpeed::Overdrive,
        }
    }
}

/// Raw read path (RON format)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
enum ReadDef {
    Memory {
        #[serde(default = "default_read_opcode")]
        opcode: u8,
        #[serde(default)]
        crc_after_address: Option<CrcDef>,
    },
    Scratchpad,
}

impl Default for ReadDef {
    fn default() -> Self {
        ReadDef::Memory {
            opcode: commands::READ_MEMORY,
            crc_after_address: None,
        }
    }
}

fn default_read_opcode() -> u8 {
    commands::READ_MEMORY
}

impl From<ReadDef> for ReadStrategy {
    fn from(def: ReadDef) -> Self {
        match def {
            ReadDef::Memory {
                opcode,
                crc_after_address,
            } => ReadStrategy::Memory {
                opcode,
                crc_after_address: crc_after_address.map(Into::into),
            },
            ReadDef::Scratchpad => ReadStrategy::Scratchpad,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
enum LayoutDef {
    CrcAfterAddress,
    CrcAfterData,
}

/// Device-CRC page read (RON format)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct PageCrcDef {
    opcode: u8,
    crc: CrcDef,
    layout: LayoutDef,
    #[serde(default)]
    extra_info_len: usize,
}

impl From<PageCrcDef> for PageCrcRead {
    fn from(def: PageCrcDef) -> Self {
        PageCrcRead {
            opcode: def.opcode,
            crc: def.crc.into(),
            layout: match def.layout {
                LayoutDef::CrcAfterAddress => FrameLayout::CrcAfterAddress,
                LayoutDef::CrcAfterData => FrameLayout::CrcAfterData,
            },
            extra_info_len: def.extra_info_len,
        }
    }
}

/// Write path (RON format)
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
enum WriteDef {
    #[default]
    None,
    Scratchpad,
    CopyScratchpad,
    CopyWithPassword,
    CopyWithMac,
    Eprom { opcode: u8, crc: CrcDef },
}

impl From<WriteDef> for WriteStrategy {
    fn from(def: WriteDef) -> Self {
        match def {
            WriteDef::None => WriteStrategy::None,
            WriteDef::Scratchpad => WriteStrategy::Scratchpad,
            WriteDef::CopyScratchpad => WriteStrategy::CopyScratchpad,
            WriteDef::CopyWithPassword => WriteStrategy::CopyWithPassword,
            WriteDef::CopyWithMac => WriteStrategy::CopyWithMac,
            WriteDef::Eprom { opcode, crc } => WriteStrategy::Eprom(EpromWrite {
                opcode,
                crc: crc.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct TargetDef {
    bank: usize,
    offset: u32,
}

impl From<TargetDef> for ControlTarget {
    fn from(def: TargetDef) -> Self {
        ControlTarget::new(BankId(def.bank), def.offset)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct ExtraInfoDef {
    length: usize,
    description: String,
}

/// Single bank definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct BankDef {
    description: String,
    #[serde(default)]
    start: u32,
    pages: usize,
    page_length: usize,
    #[serde(default)]
    max_packet_data_length: Option<usize>,
    #[serde(default)]
    flags: FlagsDef,
    #[serde(default)]
    read: ReadDef,
    #[serde(default)]
    page_crc: Option<PageCrcDef>,
    #[serde(default)]
    extra_info: Option<ExtraInfoDef>,
    #[serde(default)]
    write: WriteDef,
    #[serde(default)]
    lock: Option<TargetDef>,
    #[serde(default)]
    redirect: Option<TargetDef>,
    #[serde(default)]
    redirect_lock: Option<TargetDef>,
    #[serde(default = "default_true")]
    write_verification: bool,
}

fn default_true() -> bool {
    true
}

impl From<BankDef> for MemoryBank {
    fn from(def: BankDef) -> Self {
        let mut bank = MemoryBank::new(&def.description, def.start, def.pages, def.page_length)
            .with_flags(def.flags.into())
            .with_read(def.read.into())
            .with_write(def.write.into());
        if let Some(max) = def.max_packet_data_length {
            bank.max_packet_data_length = max;
        }
        bank.page_crc = def.page_crc.map(Into::into);
        if let Some(extra) = def.extra_info {
            bank = bank.with_extra_info(extra.length, &extra.description);
        }
        bank.lock = def.lock.map(Into::into);
        bank.redirect = def.redirect.map(Into::into);
        bank.redirect_lock = def.redirect_lock.map(Into::into);
        bank.write_verification = def.write_verification;
        bank
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct ScratchpadDef {
    length: usize,
    #[serde(default)]
    read_crc: bool,
    #[serde(default = "default_copy_delay")]
    copy_delay_us: u32,
}

fn default_copy_delay() -> u32 {
    commands::T_PROG_EEPROM_US
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct ShaDef {
    secret_address: u32,
    #[serde(default)]
    supports_refresh: bool,
}

/// Single device definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct DeviceDef {
    family: u8,
    name: String,
    #[serde(default)]
    speed: SpeedDef,
    #[serde(default)]
    scratchpad: Option<ScratchpadDef>,
    #[serde(default)]
    sha: Option<ShaDef>,
    banks: Vec<BankDef>,
}

impl From<DeviceDef> for DeviceProfile {
    fn from(def: DeviceDef) -> Self {
        DeviceProfile {
            family: def.family,
            name: def.name,
            speed: def.speed.into(),
            scratchpad: def.scratchpad.map(|sp| ScratchpadSpec {
                length: sp.length,
                read_crc: sp.read_crc,
                copy_delay_us: sp.copy_delay_us,
            }),
            sha: def.sha.map(|sha| ShaSpec {
                secret_address: sha.secret_address,
                supports_refresh: sha.supports_refresh,
            }),
            banks: def.banks.into_iter().map(Into::into).collect(),
        }
    }
}

/// File containing multiple device definitions
#[derive(Debug, Clone, serde::Deserialize)]
struct DeviceFileDef {
    devices: Vec<DeviceDef>,
}

// ============================================================================
// Device database
// ============================================================================

/// Runtime device database
///
/// Holds a collection of device profiles that can be loaded from RON files.
#[derive(Debug, Clone, Default)]
pub struct DeviceDatabase {
    devices: Vec<DeviceProfile>,
}

impl DeviceDatabase {
    /// Create an empty device database
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Create a database holding the built-in family profiles
    pub fn with_builtin() -> Self {
        Self {
            devices: families::builtin_profiles(),
        }
    }

    /// Load device definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, DeviceDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load device definitions from a RON string
    ///
    /// Every profile is validated before any of them is added.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, DeviceDbError> {
        let file: DeviceFileDef = ron::from_str(content)?;
        let mut profiles = Vec::with_capacity(file.devices.len());

        for def in file.devices {
            let profile = DeviceProfile::from(def);
            profile
                .validate()
                .map_err(|source| DeviceDbError::Validation {
                    name: profile.name.clone(),
                    source,
                })?;
            log::debug!("database: loaded {} (family 0x{:02X})", profile.name, profile.family);
            profiles.push(profile);
        }

        let count = profiles.len();
        self.devices.extend(profiles);
        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, DeviceDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all profiles in the database
    pub fn devices(&self) -> &[DeviceProfile] {
        &self.devices
    }

    /// Get the number of profiles in the database
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Find a profile by family code
    ///
    /// Profiles loaded later take precedence over earlier ones.
    pub fn find_by_family(&self, family: u8) -> Option<&DeviceProfile> {
        self.devices.iter().rev().find(|d| d.family == family)
    }

    /// Find profiles by name (case-insensitive partial match)
    pub fn find_by_name(&self, name: &str) -> Vec<&DeviceProfile> {
        let name_lower = name.to_lowercase();
        self.devices
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&name_lower))
            .collect()
    }

    /// Iterate over all profiles
    pub fn iter(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.devices.iter()
    }
}
