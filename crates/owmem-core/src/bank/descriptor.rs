//! Memory bank descriptors and per-bank protocol strategies
//!
//! A [`MemoryBank`] is plain data: geometry, capability flags and small
//! strategy values telling the protocol layer which commands and frame
//! layouts the bank uses. Device differences live here instead of in
//! per-family code.

use alloc::string::String;
use core::fmt;

use super::flags::BankFlags;
use crate::bus::commands;
use crate::crc::CrcWidth;
use crate::error::{Error, Result};

/// Index of a bank within its device profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BankId(pub usize);

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bank {}", self.0)
    }
}

/// Raw (non page-verified) read path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Memory read command followed by the data stream
    Memory {
        /// Read command opcode
        opcode: u8,
        /// CRC the device sends right after the address, if any
        crc_after_address: Option<CrcWidth>,
    },
    /// The bank is the scratchpad; reads go through Read Scratchpad
    Scratchpad,
}

impl ReadStrategy {
    /// Plain `READ_MEMORY` without any CRC
    pub const fn memory() -> Self {
        ReadStrategy::Memory {
            opcode: commands::READ_MEMORY,
            crc_after_address: None,
        }
    }
}

impl Default for ReadStrategy {
    fn default() -> Self {
        Self::memory()
    }
}

/// Where CRC and extra information appear in a page frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    /// Extra info and a CRC over command, address and extra info follow the
    /// address; the page data is then protected by its own CRC
    CrcAfterAddress,
    /// Page data and extra info are followed by one CRC over the whole
    /// frame (including command and address on the first page)
    CrcAfterData,
}

/// Page read with device-generated CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCrcRead {
    /// Read command opcode
    pub opcode: u8,
    /// CRC width of every frame
    pub crc: CrcWidth,
    /// Frame layout
    pub layout: FrameLayout,
    /// Extra information bytes delivered with each page
    pub extra_info_len: usize,
}

/// EPROM program command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpromWrite {
    /// Program command opcode
    pub opcode: u8,
    /// CRC width of the program echo frames
    pub crc: CrcWidth,
}

/// How a bank is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// The bank cannot be written
    #[default]
    None,
    /// The bank is the scratchpad itself
    Scratchpad,
    /// Write scratchpad, then plain copy
    CopyScratchpad,
    /// Write scratchpad, then copy authorized by an 8-byte password
    CopyWithPassword,
    /// Write scratchpad, then copy authorized by a SHA-1 MAC
    CopyWithMac,
    /// Program bytes one at a time with EPROM program pulses
    Eprom(EpromWrite),
}

impl WriteStrategy {
    /// Whether writes are staged through the device scratchpad
    pub fn uses_scratchpad(&self) -> bool {
        matches!(
            self,
            WriteStrategy::CopyScratchpad
                | WriteStrategy::CopyWithPassword
                | WriteStrategy::CopyWithMac
        )
    }
}

/// Location of lock or redirect bytes for another bank
///
/// Control bits of one logical bank commonly live in a different physical
/// bank (a shared status page). `offset` is the byte offset of page 0's
/// control data within `bank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTarget {
    /// Bank hosting the control bytes
    pub bank: BankId,
    /// Byte offset within that bank
    pub offset: u32,
}

impl ControlTarget {
    /// Create a control target
    pub const fn new(bank: BankId, offset: u32) -> Self {
        Self { bank, offset }
    }

    /// Byte offset and bit mask of `page`'s control bit
    pub fn bit_of(&self, page: usize) -> (u32, u8) {
        (self.offset + (page >> 3) as u32, 1 << (page & 7))
    }

    /// Byte offset of `page`'s control byte
    pub fn byte_of(&self, page: usize) -> u32 {
        self.offset + page as u32
    }
}

/// Extra information delivered alongside page data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraInfo {
    /// Number of bytes
    pub length: usize,
    /// What the bytes mean
    pub description: String,
}

/// Static description of one logical memory bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBank {
    /// Human-readable bank name (e.g., "Main Memory")
    pub description: String,
    /// Capability flags
    pub flags: BankFlags,
    /// Physical address of the first byte
    pub start: u32,
    /// Size in bytes
    pub size: u32,
    /// Number of pages
    pub number_pages: usize,
    /// Page length in bytes
    pub page_length: usize,
    /// Maximum Universal Data Packet payload per page
    pub max_packet_data_length: usize,
    /// Extra information delivered with page reads
    pub extra_info: Option<ExtraInfo>,
    /// Raw read command
    pub read: ReadStrategy,
    /// Device-CRC page read, if available
    pub page_crc: Option<PageCrcRead>,
    /// Write path
    pub write: WriteStrategy,
    /// Page lock bits
    pub lock: Option<ControlTarget>,
    /// Page redirection bytes
    pub redirect: Option<ControlTarget>,
    /// Redirection lock bits
    pub redirect_lock: Option<ControlTarget>,
    /// Read back and compare after each write
    pub write_verification: bool,
}

impl MemoryBank {
    /// Create a bank with the given geometry
    ///
    /// The bank starts out read-only with a plain `READ_MEMORY` read path;
    /// use the `with_*` methods to describe the rest.
    pub fn new(description: &str, start: u32, number_pages: usize, page_length: usize) -> Self {
        Self {
            description: String::from(description),
            flags: BankFlags::READ_ONLY,
            start,
            size: (number_pages * page_length) as u32,
            number_pages,
            page_length,
            max_packet_data_length: page_length.saturating_sub(3),
            extra_info: None,
            read: ReadStrategy::default(),
            page_crc: None,
            write: WriteStrategy::None,
            lock: None,
            redirect: None,
            redirect_lock: None,
            write_verification: true,
        }
    }

    /// Set the capability flags
    pub fn with_flags(mut self, flags: BankFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the raw read strategy
    pub fn with_read(mut self, read: ReadStrategy) -> Self {
        self.read = read;
        self
    }

    /// Set the device-CRC page read
    pub fn with_page_crc(mut self, page_crc: PageCrcRead) -> Self {
        self.page_crc = Some(page_crc);
        self
    }

    /// Set the write strategy
    pub fn with_write(mut self, write: WriteStrategy) -> Self {
        self.write = write;
        self
    }

    /// Describe the extra information delivered with page reads
    pub fn with_extra_info(mut self, length: usize, description: &str) -> Self {
        self.extra_info = Some(ExtraInfo {
            length,
            description: String::from(description),
        });
        self
    }

    /// Set the page lock target
    pub fn with_lock(mut self, target: ControlTarget) -> Self {
        self.lock = Some(target);
        self
    }

    /// Set the page redirection target
    pub fn with_redirect(mut self, target: ControlTarget) -> Self {
        self.redirect = Some(target);
        self
    }

    /// Set the redirection lock target
    pub fn with_redirect_lock(mut self, target: ControlTarget) -> Self {
        self.redirect_lock = Some(target);
        self
    }

    /// Check the geometry invariants
    pub fn validate(&self) -> Result<()> {
        if self.page_length == 0 || self.number_pages == 0 {
            return Err(Error::InvalidGeometry);
        }
        if self.size as usize != self.number_pages * self.page_length {
            return Err(Error::InvalidGeometry);
        }
        if self.max_packet_data_length + 3 > self.page_length {
            return Err(Error::InvalidGeometry);
        }
        if let (Some(crc), Some(extra)) = (&self.page_crc, &self.extra_info) {
            if crc.extra_info_len != extra.length {
                return Err(Error::InvalidGeometry);
            }
        }
        if self.start.checked_add(self.size).is_none() {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Whether the bank holds general purpose user memory
    pub fn is_general_purpose(&self) -> bool {
        self.flags.contains(BankFlags::GENERAL_PURPOSE)
    }

    /// Whether the bank can be read and rewritten
    pub fn is_read_write(&self) -> bool {
        self.flags.contains(BankFlags::READ_WRITE)
    }

    /// Whether the bank is one-time programmable
    pub fn is_write_once(&self) -> bool {
        self.flags.contains(BankFlags::WRITE_ONCE)
    }

    /// Whether the bank is read-only
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(BankFlags::READ_ONLY) || self.write == WriteStrategy::None
    }

    /// Whether the bank keeps its content without power
    pub fn is_non_volatile(&self) -> bool {
        self.flags.contains(BankFlags::NON_VOLATILE)
    }

    /// Whether writes need an EPROM program pulse
    pub fn needs_program_pulse(&self) -> bool {
        self.flags.contains(BankFlags::NEEDS_PROGRAM_PULSE)
    }

    /// Whether writes need strong pull-up power delivery
    pub fn needs_power_delivery(&self) -> bool {
        self.flags.contains(BankFlags::NEEDS_POWER_DELIVERY)
    }

    /// Whether the device verifies page reads with its own CRC
    pub fn has_page_auto_crc(&self) -> bool {
        self.page_crc.is_some()
    }

    /// Whether page reads deliver extra information
    pub fn has_extra_info(&self) -> bool {
        self.extra_info_length() > 0
    }

    /// Number of extra information bytes per page
    pub fn extra_info_length(&self) -> usize {
        self.extra_info.as_ref().map_or(0, |e| e.length)
    }

    /// What the extra information means
    pub fn extra_info_description(&self) -> Option<&str> {
        self.extra_info.as_ref().map(|e| e.description.as_str())
    }

    /// Whether pages can be redirected
    pub fn can_redirect_page(&self) -> bool {
        self.redirect.is_some()
    }

    /// Whether pages can be locked
    pub fn can_lock_page(&self) -> bool {
        self.lock.is_some()
    }

    /// Whether page redirections can be locked
    pub fn can_lock_redirect_page(&self) -> bool {
        self.redirect_lock.is_some()
    }

    /// Physical address of the first byte of `page`
    pub fn page_address(&self, page: usize) -> u32 {
        self.start + (page * self.page_length) as u32
    }

    /// Check that `len` bytes from bank offset `addr` stay inside the bank
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        let end = addr as u64 + len as u64;
        end <= self.size as u64
    }

    /// Check that `page` exists
    pub fn check_page(&self, page: usize) -> Result<()> {
        if page >= self.number_pages {
            return Err(Error::PageOutOfRange);
        }
        Ok(())
    }
}
