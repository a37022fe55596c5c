//! Raw and CRC-verified memory reads
//!
//! Raw reads stream memory after a read command and address. Page reads
//! with device CRC come in two frame layouts:
//!
//! ```text
//! CrcAfterAddress:  cmd TA1 TA2 [extra] crc | data crc | [extra] crc data crc | ...
//! CrcAfterData:     cmd TA1 TA2 data [extra] crc | data [extra] crc | ...
//! ```
//!
//! The first CRC of a transaction includes the command and address bytes.
//! Continued pages are read without reselecting the device.

use alloc::vec;

use crate::bank::{BankId, CursorKind, DeviceState, FrameLayout, MemoryBank, ReadCursor, ReadStrategy};
use crate::bus::OneWireMaster;
use crate::error::{Error, Result};
use crate::packet;

use super::address_bytes;

/// Raw read of `buf.len()` bytes from bank offset `addr`
///
/// With `cont` the read continues the previous raw read of this bank
/// without a new command, which is only valid if it ended at `addr`.
pub fn read_memory<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    id: BankId,
    bank: &MemoryBank,
    addr: u32,
    cont: bool,
    buf: &mut [u8],
) -> Result<()> {
    let ReadStrategy::Memory {
        opcode,
        crc_after_address,
    } = bank.read
    else {
        return Err(Error::Unsupported("memory read"));
    };
    if !bank.is_valid_range(addr, buf.len()) {
        return Err(Error::AddressOutOfBounds);
    }

    if cont {
        dev.check_continue(id, CursorKind::Raw, addr as usize)?;
    } else {
        dev.select(master)?;
        let [lo, hi] = address_bytes(bank.start + addr);
        let header = [opcode, lo, hi];
        let mut frame = [opcode, lo, hi, 0xFF, 0xFF];
        let frame_len = 3 + crc_after_address.map_or(0, |crc| crc.len());
        master.data_block(&mut frame[..frame_len])?;
        if let Some(crc) = crc_after_address {
            let seed = crc.running(0, &header);
            if !crc.check(seed, &frame[3..frame_len]) {
                log::debug!("read: address CRC mismatch at 0x{:04X}", bank.start + addr);
                return Err(Error::CrcMismatch);
            }
        }
    }

    buf.fill(0xFF);
    master.data_block(buf)?;
    dev.set_cursor(ReadCursor {
        bank: id,
        kind: CursorKind::Raw,
        next: addr as usize + buf.len(),
    });
    Ok(())
}

/// Read one page with device-generated CRC
///
/// `data` receives the page, `extra` the extra information bytes when
/// given.
#[allow(clippy::too_many_arguments)]
pub fn read_page_crc<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    id: BankId,
    bank: &MemoryBank,
    page: usize,
    cont: bool,
    data: &mut [u8],
    extra: Option<&mut [u8]>,
) -> Result<()> {
    let spec = bank.page_crc.ok_or(Error::Unsupported("page CRC read"))?;
    bank.check_page(page)?;
    let page_len = bank.page_length;
    let extra_len = spec.extra_info_len;
    if data.len() < page_len {
        return Err(Error::BufferTooSmall);
    }
    if extra.as_ref().is_some_and(|e| e.len() < extra_len) {
        return Err(Error::BufferTooSmall);
    }

    let phys = bank.page_address(page);
    let mut header = heapless::Vec::<u8, 3>::new();
    if cont {
        dev.check_continue(id, CursorKind::PageCrc, page)?;
    } else {
        dev.select(master)?;
        let [lo, hi] = address_bytes(phys);
        let _ = header.extend_from_slice(&[spec.opcode, lo, hi]);
        let mut out = [spec.opcode, lo, hi];
        master.data_block(&mut out)?;
    }
    let crc = spec.crc;
    let header_seed = crc.running(0, &header);

    let mut extra_bytes = vec![0xFFu8; extra_len];
    match spec.layout {
        FrameLayout::CrcAfterAddress => {
            if !cont || extra_len > 0 {
                let mut frame = vec![0xFFu8; extra_len + crc.len()];
                master.data_block(&mut frame)?;
                if !crc.check(header_seed, &frame) {
                    log::debug!("read page {}: header CRC mismatch", page);
                    return Err(Error::CrcMismatch);
                }
                extra_bytes.copy_from_slice(&frame[..extra_len]);
            }
            let mut frame = vec![0xFFu8; page_len + crc.len()];
            master.data_block(&mut frame)?;
            if !crc.check(0, &frame) {
                log::debug!("read page {}: data CRC mismatch", page);
                return Err(Error::CrcMismatch);
            }
            data[..page_len].copy_from_slice(&frame[..page_len]);
        }
        FrameLayout::CrcAfterData => {
            let mut frame = vec![0xFFu8; page_len + extra_len + crc.len()];
            master.data_block(&mut frame)?;
            if !crc.check(header_seed, &frame) {
                log::debug!("read page {}: CRC mismatch", page);
                return Err(Error::CrcMismatch);
            }
            data[..page_len].copy_from_slice(&frame[..page_len]);
            extra_bytes.copy_from_slice(&frame[page_len..page_len + extra_len]);
        }
    }

    if let Some(extra) = extra {
        extra[..extra_len].copy_from_slice(&extra_bytes);
    }
    dev.set_cursor(ReadCursor {
        bank: id,
        kind: CursorKind::PageCrc,
        next: page + 1,
    });
    Ok(())
}

/// Read consecutive pages with device CRC in one transaction
///
/// `buf` must hold a whole number of pages.
pub fn read_pages_crc<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    id: BankId,
    bank: &MemoryBank,
    first_page: usize,
    buf: &mut [u8],
) -> Result<()> {
    let page_len = bank.page_length;
    if buf.len() % page_len != 0 {
        return Err(Error::BufferTooSmall);
    }
    let count = buf.len() / page_len;
    if first_page + count > bank.number_pages {
        return Err(Error::PageOutOfRange);
    }

    for (i, chunk) in buf.chunks_exact_mut(page_len).enumerate() {
        read_page_crc(master, dev, id, bank, first_page + i, i > 0, chunk, None)?;
    }
    Ok(())
}

/// Read one page, with device CRC when the bank supports it
pub fn read_page<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    id: BankId,
    bank: &MemoryBank,
    page: usize,
    cont: bool,
    buf: &mut [u8],
) -> Result<()> {
    bank.check_page(page)?;
    if buf.len() < bank.page_length {
        return Err(Error::BufferTooSmall);
    }
    if bank.has_page_auto_crc() {
        read_page_crc(master, dev, id, bank, page, cont, buf, None)
    } else {
        let addr = (page * bank.page_length) as u32;
        read_memory(master, dev, id, bank, addr, cont, &mut buf[..bank.page_length])
    }
}

/// Read the Universal Data Packet stored on `page`
///
/// Returns the payload length; the payload is copied to the start of `buf`.
pub fn read_page_packet<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    id: BankId,
    bank: &MemoryBank,
    page: usize,
    cont: bool,
    buf: &mut [u8],
) -> Result<usize> {
    let mut raw = vec![0u8; bank.page_length];
    read_page(master, dev, id, bank, page, cont, &mut raw)?;

    let payload = packet::decode(page, &raw, bank.max_packet_data_length)?;
    if buf.len() < payload.len() {
        return Err(Error::BufferTooSmall);
    }
    buf[..payload.len()].copy_from_slice(payload);
    Ok(payload.len())
}
