//! owmem-core - Core library for 1-Wire memory devices
//!
//! This crate implements the memory bank protocol engine for 1-Wire
//! memory devices: scratchpad-mediated writes, CRC-verified paged reads,
//! Universal Data Packets, EPROM programming with page locking and
//! redirection, and the SHA-1 secret/MAC protocol of authenticated
//! EEPROMs. It is `no_std` compatible (it needs `alloc`).
//!
//! # Features
//!
//! - `std` - Enable standard library support and the RON device database
//!
//! # Example
//!
//! ```ignore
//! use owmem_core::bus::{OneWireMaster, RomId};
//! use owmem_core::device::{Paged, Readable};
//! use owmem_core::DeviceContext;
//!
//! fn dump_main_memory<M: OneWireMaster>(master: &mut M, rom: RomId) -> owmem_core::Result<()> {
//!     let mut ctx = DeviceContext::for_rom(rom)?;
//!     let main = ctx.bank_id("Main Memory").ok_or(owmem_core::Error::UnknownBank)?;
//!     let mut bank = ctx.bank(master, main)?;
//!     let mut page = [0u8; 32];
//!     bank.read_page(0, false, &mut page)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bank;
pub mod bus;
pub mod crc;
#[cfg(feature = "std")]
pub mod database;
pub mod device;
pub mod error;
pub mod families;
pub mod mac;
pub mod packet;
pub mod protocol;
pub mod session;
pub mod speed;

#[cfg(test)]
mod testing;

pub use bank::{BankId, DeviceContext, DeviceProfile, MemoryBank};
pub use error::{Error, ErrorKind, Result};
pub use session::DeviceSession;
