//! Scratchpad-mediated EEPROM writes
//!
//! Data is first written to the volatile scratchpad together with a target
//! address, optionally read back, and then committed to memory by a copy
//! command that repeats the target address and the ending offset (E/S).
//! Memory is only ever written in whole scratchpad-aligned chunks; partial
//! chunks are completed with the current memory content first.

use alloc::vec;

use crate::bank::{BankId, DeviceState, MemoryBank, ScratchpadSpec};
use crate::bus::{commands, OneWireMaster, PowerCondition};
use crate::crc::CrcWidth;
use crate::error::{Error, Result};

use super::{address_bytes, memory, require_power_delivery};

/// Address registers echoed by Read Scratchpad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchpadEcho {
    /// Target address (TA2:TA1)
    pub target: u32,
    /// Ending offset and status flags (E/S)
    pub ending_offset: u8,
}

/// Write `data` to the scratchpad with target address `addr`
pub fn write_scratchpad<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    dev.select(master)?;
    let [lo, hi] = address_bytes(addr);
    let mut frame = vec![commands::WRITE_SCRATCHPAD, lo, hi];
    frame.extend_from_slice(data);
    master.data_block(&mut frame)?;
    log::trace!("scratchpad: wrote {} bytes for 0x{:04X}", data.len(), addr);
    Ok(())
}

/// Read the whole scratchpad into `buf`
///
/// Returns the echoed address registers. When the device protects the
/// frame with a CRC16 it is checked.
pub fn read_scratchpad<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    sp: &ScratchpadSpec,
    buf: &mut [u8],
) -> Result<ScratchpadEcho> {
    if buf.len() < sp.length {
        return Err(Error::BufferTooSmall);
    }
    dev.select(master)?;

    let crc_len = if sp.read_crc { CrcWidth::Crc16.len() } else { 0 };
    let mut frame = vec![0xFFu8; 4 + sp.length + crc_len];
    frame[0] = commands::READ_SCRATCHPAD;
    master.data_block(&mut frame)?;

    if sp.read_crc && !CrcWidth::Crc16.check(0, &frame) {
        log::debug!("scratchpad: read CRC mismatch");
        return Err(Error::CrcMismatch);
    }

    buf[..sp.length].copy_from_slice(&frame[4..4 + sp.length]);
    Ok(ScratchpadEcho {
        target: u32::from(frame[1]) | u32::from(frame[2]) << 8,
        ending_offset: frame[3],
    })
}

fn check_copy_status(status: u8) -> Result<()> {
    if commands::is_success(status) {
        Ok(())
    } else {
        Err(Error::UnexpectedStatus(status))
    }
}

/// Commit `len` scratchpad bytes to memory at physical `addr`
///
/// With `power` the strong pull-up is held for the copy time.
pub fn copy_scratchpad<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    sp: &ScratchpadSpec,
    addr: u32,
    len: usize,
    power: bool,
) -> Result<()> {
    if power {
        require_power_delivery(master)?;
    }
    let es = sp.ending_offset(addr, len)?;
    let [lo, hi] = address_bytes(addr);

    dev.select(master)?;
    if power {
        let mut frame = [commands::COPY_SCRATCHPAD, lo, hi];
        master.data_block(&mut frame)?;
        master.start_power_delivery(PowerCondition::AfterNextByte)?;
        master.put_byte(es)?;
        master.delay_us(sp.copy_delay_us);
        master.set_power_normal()?;
    } else {
        let mut frame = [commands::COPY_SCRATCHPAD, lo, hi, es];
        master.data_block(&mut frame)?;
        master.delay_us(sp.copy_delay_us);
    }

    let status = master.get_byte()?;
    log::debug!("scratchpad: copy to 0x{:04X} status 0x{:02X}", addr, status);
    check_copy_status(status)
}

/// Commit `len` scratchpad bytes to memory at physical `addr`, authorized
/// by an 8-byte password
pub fn copy_scratchpad_with_password<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    sp: &ScratchpadSpec,
    addr: u32,
    len: usize,
    password: &[u8; 8],
) -> Result<()> {
    let es = sp.ending_offset(addr, len)?;
    let [lo, hi] = address_bytes(addr);

    dev.select(master)?;
    let mut frame = [0u8; 12];
    frame[..4].copy_from_slice(&[commands::COPY_SCRATCHPAD_PASSWORD, lo, hi, es]);
    frame[4..].copy_from_slice(password);
    master.data_block(&mut frame)?;
    master.delay_us(sp.copy_delay_us);

    let status = master.get_byte()?;
    log::debug!("scratchpad: password copy to 0x{:04X} status 0x{:02X}", addr, status);
    check_copy_status(status)
}

/// Write `data` at bank offset `addr` through the scratchpad
///
/// For every scratchpad-aligned chunk touched by the write, the chunk is
/// completed from memory if the write covers it only partially, written to
/// the scratchpad, read back when the bank verifies writes, and handed to
/// `commit` together with its physical address.
#[allow(clippy::too_many_arguments)]
pub fn write_through<M, F>(
    master: &mut M,
    dev: &mut DeviceState,
    id: BankId,
    bank: &MemoryBank,
    sp: &ScratchpadSpec,
    addr: u32,
    data: &[u8],
    mut commit: F,
) -> Result<()>
where
    M: OneWireMaster + ?Sized,
    F: FnMut(&mut M, &mut DeviceState, u32, &[u8]) -> Result<()>,
{
    if !bank.is_valid_range(addr, data.len()) {
        return Err(Error::AddressOutOfBounds);
    }
    if data.is_empty() {
        return Ok(());
    }

    let chunk_len = sp.length as u32;
    let end = addr + data.len() as u32;
    let mut offset = addr - addr % chunk_len;
    let mut chunk = vec![0u8; sp.length];
    let mut readback = vec![0u8; sp.length];

    while offset < end {
        let lo = addr.max(offset);
        let hi = end.min(offset + chunk_len);
        if lo > offset || hi < offset + chunk_len {
            memory::read_memory(master, dev, id, bank, offset, false, &mut chunk)?;
        }
        chunk[(lo - offset) as usize..(hi - offset) as usize]
            .copy_from_slice(&data[(lo - addr) as usize..(hi - addr) as usize]);

        let phys = bank.start + offset;
        write_scratchpad(master, dev, phys, &chunk)?;

        if bank.write_verification {
            let echo = read_scratchpad(master, dev, sp, &mut readback)?;
            if echo.target != phys {
                log::debug!("scratchpad: target 0x{:04X} echoed as 0x{:04X}", phys, echo.target);
                return Err(Error::VerifyMismatch { addr: phys });
            }
            if let Some(i) = chunk.iter().zip(&readback).position(|(a, b)| a != b) {
                return Err(Error::VerifyMismatch { addr: phys + i as u32 });
            }
        }

        commit(master, dev, phys, &chunk)?;
        offset += chunk_len;
    }
    Ok(())
}
