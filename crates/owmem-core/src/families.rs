//! Built-in device family profiles
//!
//! These cover one representative of each memory technology the engine
//! implements. Further devices can be described in RON files and loaded
//! through the device database (requires the `std` feature).

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::bank::{
    BankFlags, BankId, ControlTarget, DeviceProfile, EpromWrite, FrameLayout, MemoryBank,
    PageCrcRead, ReadStrategy, ScratchpadSpec, ShaSpec, WriteStrategy,
};
use crate::bus::{commands, BusSpeed};
use crate::crc::CrcWidth;

/// Family code of the DS1982 1 kbit add-only memory
pub const FAMILY_DS1982: u8 = 0x09;
/// Family code of the DS2506 64 kbit add-only memory
pub const FAMILY_DS2506: u8 = 0x0F;
/// Family code of the DS2433 4 kbit EEPROM
pub const FAMILY_DS2433: u8 = 0x23;
/// Family code of the DS1963L monetary iButton
pub const FAMILY_DS1963L: u8 = 0x1A;
/// Family code of the DS1961S SHA-1 EEPROM
pub const FAMILY_DS1961S: u8 = 0x33;

const EPROM_FLAGS: BankFlags = BankFlags::GENERAL_PURPOSE
    .union(BankFlags::WRITE_ONCE)
    .union(BankFlags::NON_VOLATILE)
    .union(BankFlags::NEEDS_PROGRAM_PULSE);

const STATUS_FLAGS: BankFlags = BankFlags::WRITE_ONCE
    .union(BankFlags::NON_VOLATILE)
    .union(BankFlags::NEEDS_PROGRAM_PULSE);

const EEPROM_FLAGS: BankFlags = BankFlags::GENERAL_PURPOSE
    .union(BankFlags::READ_WRITE)
    .union(BankFlags::NON_VOLATILE);

const SCRATCHPAD_FLAGS: BankFlags = BankFlags::READ_WRITE;

fn scratchpad_bank(length: usize) -> MemoryBank {
    MemoryBank::new("Scratchpad", 0, 1, length)
        .with_flags(SCRATCHPAD_FLAGS)
        .with_read(ReadStrategy::Scratchpad)
        .with_write(WriteStrategy::Scratchpad)
}

/// DS1982: 128 bytes of EPROM in 4 pages, CRC8, 8-byte status memory
pub fn ds1982() -> DeviceProfile {
    let crc = CrcWidth::Crc8;
    let main = MemoryBank::new("Main Memory", 0, 4, 32)
        .with_flags(EPROM_FLAGS)
        .with_read(ReadStrategy::Memory {
            opcode: commands::READ_MEMORY,
            crc_after_address: Some(crc),
        })
        .with_page_crc(PageCrcRead {
            opcode: commands::EPROM_READ_PAGE_CRC8,
            crc,
            layout: FrameLayout::CrcAfterAddress,
            extra_info_len: 0,
        })
        .with_write(WriteStrategy::Eprom(EpromWrite {
            opcode: commands::EPROM_WRITE_MEMORY,
            crc,
        }))
        .with_lock(ControlTarget::new(BankId(1), 0))
        .with_redirect(ControlTarget::new(BankId(1), 1));

    let status = MemoryBank::new("Status Memory", 0, 1, 8)
        .with_flags(STATUS_FLAGS)
        .with_read(ReadStrategy::Memory {
            opcode: commands::EPROM_READ_STATUS,
            crc_after_address: Some(crc),
        })
        .with_write(WriteStrategy::Eprom(EpromWrite {
            opcode: commands::EPROM_WRITE_STATUS,
            crc,
        }));

    DeviceProfile {
        family: FAMILY_DS1982,
        name: String::from("DS1982"),
        speed: BusSpeed::Regular,
        scratchpad: None,
        sha: None,
        banks: vec![main, status],
    }
}

/// DS2506: 8 KiB of EPROM in 256 pages, CRC16, 512-byte status memory
///
/// Status memory holds the page lock bits at 0x000, the redirection lock
/// bits at 0x020 and one redirection byte per page at 0x100.
pub fn ds2506() -> DeviceProfile {
    let crc = CrcWidth::Crc16;
    let main = MemoryBank::new("Main Memory", 0, 256, 32)
        .with_flags(EPROM_FLAGS)
        .with_read(ReadStrategy::Memory {
            opcode: commands::READ_MEMORY,
            crc_after_address: Some(crc),
        })
        .with_page_crc(PageCrcRead {
            opcode: commands::EPROM_EXTENDED_READ,
            crc,
            layout: FrameLayout::CrcAfterAddress,
            extra_info_len: 1,
        })
        .with_extra_info(1, "Inverted redirection page")
        .with_write(WriteStrategy::Eprom(EpromWrite {
            opcode: commands::EPROM_WRITE_MEMORY,
            crc,
        }))
        .with_lock(ControlTarget::new(BankId(1), 0x000))
        .with_redirect_lock(ControlTarget::new(BankId(1), 0x020))
        .with_redirect(ControlTarget::new(BankId(1), 0x100));

    let status = MemoryBank::new("Status Memory", 0, 64, 8)
        .with_flags(STATUS_FLAGS)
        .with_read(ReadStrategy::Memory {
            opcode: commands::EPROM_READ_STATUS,
            crc_after_address: Some(crc),
        })
        .with_write(WriteStrategy::Eprom(EpromWrite {
            opcode: commands::EPROM_WRITE_STATUS,
            crc,
        }));

    DeviceProfile {
        family: FAMILY_DS2506,
        name: String::from("DS2506"),
        speed: BusSpeed::Regular,
        scratchpad: None,
        sha: None,
        banks: vec![main, status],
    }
}

/// DS2433: 512 bytes of EEPROM behind a 32-byte scratchpad
pub fn ds2433() -> DeviceProfile {
    let main = MemoryBank::new("Main Memory", 0, 16, 32)
        .with_flags(EEPROM_FLAGS)
        .with_write(WriteStrategy::CopyScratchpad);

    DeviceProfile {
        family: FAMILY_DS2433,
        name: String::from("DS2433"),
        speed: BusSpeed::Regular,
        scratchpad: Some(ScratchpadSpec {
            length: 32,
            read_crc: false,
            copy_delay_us: commands::T_PROG_EEPROM_US,
        }),
        sha: None,
        banks: vec![scratchpad_bank(32), main],
    }
}

/// DS1963L: 512 bytes of EEPROM with a write cycle counter per page
///
/// The CRC read delivers 8 extra bytes per page: the page's write cycle
/// counter (little endian) followed by four zero bytes.
pub fn ds1963l() -> DeviceProfile {
    let main = MemoryBank::new("Main Memory", 0, 16, 32)
        .with_flags(EEPROM_FLAGS)
        .with_page_crc(PageCrcRead {
            opcode: commands::READ_MEMORY_CRC,
            crc: CrcWidth::Crc16,
            layout: FrameLayout::CrcAfterData,
            extra_info_len: 8,
        })
        .with_extra_info(8, "Write cycle counter")
        .with_write(WriteStrategy::CopyScratchpad);

    DeviceProfile {
        family: FAMILY_DS1963L,
        name: String::from("DS1963L"),
        speed: BusSpeed::Regular,
        scratchpad: Some(ScratchpadSpec {
            length: 32,
            read_crc: false,
            copy_delay_us: commands::T_PROG_EEPROM_US,
        }),
        sha: None,
        banks: vec![scratchpad_bank(32), main],
    }
}

/// DS1961S: 128 bytes of SHA-1 protected EEPROM, 8-byte scratchpad
///
/// The register page at 0x88 holds the write protection bytes; the secret
/// at 0x80 always reads as 0xFF.
pub fn ds1961s() -> DeviceProfile {
    let main = MemoryBank::new("Main Memory", 0, 4, 32)
        .with_flags(EEPROM_FLAGS.union(BankFlags::NEEDS_POWER_DELIVERY))
        .with_write(WriteStrategy::CopyWithMac);

    let registers = MemoryBank::new("Registers", 0x88, 1, 8)
        .with_flags(BankFlags::READ_ONLY.union(BankFlags::NON_VOLATILE));

    DeviceProfile {
        family: FAMILY_DS1961S,
        name: String::from("DS1961S"),
        speed: BusSpeed::Regular,
        scratchpad: Some(ScratchpadSpec {
            length: 8,
            read_crc: true,
            copy_delay_us: commands::T_PROG_SHA_US,
        }),
        sha: Some(ShaSpec {
            secret_address: 0x80,
            supports_refresh: true,
        }),
        banks: vec![scratchpad_bank(8), main, registers],
    }
}

/// All built-in profiles
pub fn builtin_profiles() -> Vec<DeviceProfile> {
    vec![ds1982(), ds2506(), ds2433(), ds1963l(), ds1961s()]
}

/// Built-in profile for a family code
pub fn profile_for(family: u8) -> Option<DeviceProfile> {
    match family {
        FAMILY_DS1982 => Some(ds1982()),
        FAMILY_DS2506 => Some(ds2506()),
        FAMILY_DS2433 => Some(ds2433()),
        FAMILY_DS1963L => Some(ds1963l()),
        FAMILY_DS1961S => Some(ds1961s()),
        _ => None,
    }
}
