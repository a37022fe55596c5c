//! EPROM programming, page locking and page redirection
//!
//! EPROM bits can only be cleared. Programming a byte sends the data,
//! checks the device CRC, applies a program pulse and reads back the
//! result, which is the AND of the previous content and the data.
//!
//! Lock and redirect information lives in a separate status bank:
//!
//! - lock bits: byte `offset + page / 8`, bit `page % 8`, cleared = locked
//! - redirect bytes: byte `offset + page`, one's complement of the new
//!   page, `0xFF` = not redirected

use crate::bank::{BankId, ControlTarget, DeviceProfile, DeviceState, EpromWrite, WriteStrategy};
use crate::bus::{commands, OneWireMaster, PowerCondition};
use crate::crc::CrcWidth;
use crate::error::{Error, Result};

use super::{address_bytes, memory, require_program_pulse};

/// Program one byte at physical `addr` and return the device echo
///
/// With `cont` the byte follows the previously programmed one in the same
/// transaction; the device then protects it with a CRC seeded by the
/// incremented address. With `verify` the echo must equal `data`.
pub fn program_byte<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    write: EpromWrite,
    addr: u32,
    data: u8,
    cont: bool,
    verify: bool,
) -> Result<u8> {
    require_program_pulse(master)?;

    let [lo, hi] = address_bytes(addr);
    let mut frame = heapless::Vec::<u8, 6>::new();
    let seed = if cont {
        let _ = frame.push(data);
        match write.crc {
            CrcWidth::Crc8 => write.crc.running(0, &[lo]),
            CrcWidth::Crc16 => write.crc.running(0, &[lo, hi]),
        }
    } else {
        dev.select(master)?;
        let _ = frame.extend_from_slice(&[write.opcode, lo, hi, data]);
        0
    };
    for _ in 0..write.crc.len() {
        let _ = frame.push(0xFF);
    }

    master.data_block(&mut frame)?;
    if !write.crc.check(seed, &frame) {
        log::debug!("eprom: CRC mismatch programming 0x{:04X}", addr);
        return Err(Error::CrcMismatch);
    }

    master.start_program_pulse(PowerCondition::Now)?;
    master.delay_us(commands::T_PROGRAM_PULSE_US);
    let echo = master.get_byte()?;

    if verify && echo != data {
        log::debug!(
            "eprom: 0x{:04X} programmed 0x{:02X}, reads 0x{:02X}",
            addr,
            data,
            echo
        );
        return Err(Error::VerifyMismatch { addr });
    }
    Ok(echo)
}

fn eprom_write(profile: &DeviceProfile, id: BankId) -> Result<EpromWrite> {
    match profile.bank(id)?.write {
        WriteStrategy::Eprom(write) => Ok(write),
        _ => Err(Error::Unsupported("EPROM programming")),
    }
}

fn read_control_byte<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    target: ControlTarget,
    offset: u32,
) -> Result<u8> {
    let host = profile.bank(target.bank)?;
    let mut byte = [0xFFu8];
    memory::read_memory(master, dev, target.bank, host, offset, false, &mut byte)?;
    Ok(byte[0])
}

/// Program a control byte and read it back
fn program_control_byte<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    target: ControlTarget,
    offset: u32,
    value: u8,
) -> Result<()> {
    let host = profile.bank(target.bank)?;
    let write = eprom_write(profile, target.bank)?;
    let addr = host.start + offset;
    program_byte(master, dev, write, addr, value, false, true)?;

    let readback = read_control_byte(master, dev, profile, target, offset)?;
    if readback != value {
        return Err(Error::VerifyMismatch { addr });
    }
    Ok(())
}

fn bit_is_cleared<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    target: ControlTarget,
    page: usize,
) -> Result<bool> {
    let (offset, mask) = target.bit_of(page);
    let byte = read_control_byte(master, dev, profile, target, offset)?;
    Ok(byte & mask == 0)
}

fn clear_bit<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    target: ControlTarget,
    page: usize,
) -> Result<()> {
    let (offset, mask) = target.bit_of(page);
    let current = read_control_byte(master, dev, profile, target, offset)?;
    if current & mask == 0 {
        return Ok(());
    }
    program_control_byte(master, dev, profile, target, offset, current & !mask)
}

/// Whether `page` of bank `id` is write protected
pub fn is_page_locked<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
) -> Result<bool> {
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    let target = bank.lock.ok_or(Error::Unsupported("page locking"))?;
    if dev.is_known_locked(id, page) {
        return Ok(true);
    }

    let locked = bit_is_cleared(master, dev, profile, target, page)?;
    if locked {
        dev.note_locked(id, page);
    }
    Ok(locked)
}

/// Permanently write protect `page` of bank `id`
pub fn lock_page<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
) -> Result<()> {
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    let target = bank.lock.ok_or(Error::Unsupported("page locking"))?;
    if dev.is_known_locked(id, page) {
        return Ok(());
    }

    clear_bit(master, dev, profile, target, page)?;
    log::debug!("eprom: locked {} page {}", id, page);
    dev.note_locked(id, page);
    Ok(())
}

/// Whether the redirection of `page` of bank `id` is write protected
pub fn is_redirect_page_locked<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
) -> Result<bool> {
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    let target = bank
        .redirect_lock
        .ok_or(Error::Unsupported("redirection locking"))?;
    bit_is_cleared(master, dev, profile, target, page)
}

/// Permanently write protect the redirection of `page` of bank `id`
pub fn lock_redirect_page<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
) -> Result<()> {
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    let target = bank
        .redirect_lock
        .ok_or(Error::Unsupported("redirection locking"))?;
    clear_bit(master, dev, profile, target, page)?;
    log::debug!("eprom: locked redirection of {} page {}", id, page);
    Ok(())
}

/// Page that `page` of bank `id` is redirected to, if any
pub fn get_redirected_page<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
) -> Result<Option<usize>> {
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    let target = bank.redirect.ok_or(Error::Unsupported("page redirection"))?;
    let byte = read_control_byte(master, dev, profile, target, target.byte_of(page))?;
    Ok(match byte {
        0xFF => None,
        inverted => Some(usize::from(!inverted)),
    })
}

/// Redirect `page` of bank `id` to `new_page`
pub fn redirect_page<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
    new_page: usize,
) -> Result<()> {
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    bank.check_page(new_page)?;
    let target = bank.redirect.ok_or(Error::Unsupported("page redirection"))?;
    // 0xFF marks "not redirected", so page 0 cannot be a target
    if new_page == 0 || new_page > usize::from(u8::MAX) {
        return Err(Error::PageOutOfRange);
    }

    let offset = target.byte_of(page);
    let wanted = !(new_page as u8);
    let current = read_control_byte(master, dev, profile, target, offset)?;
    if current == wanted {
        return Ok(());
    }
    if current != 0xFF {
        return Err(Error::AlreadyRedirected);
    }
    if bank.can_lock_redirect_page() && is_redirect_page_locked(master, dev, profile, id, page)? {
        return Err(Error::PageLocked);
    }

    program_control_byte(master, dev, profile, target, offset, wanted)?;
    log::debug!("eprom: redirected {} page {} to {}", id, page, new_page);
    Ok(())
}

/// Program `data` at bank offset `addr` of bank `id`
///
/// Pages known or read to be locked are refused before anything is
/// programmed.
pub fn write<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    let bank = profile.bank(id)?;
    let write = eprom_write(profile, id)?;
    if !bank.is_valid_range(addr, data.len()) {
        return Err(Error::AddressOutOfBounds);
    }
    if data.is_empty() {
        return Ok(());
    }
    require_program_pulse(master)?;

    if bank.can_lock_page() {
        let first = addr as usize / bank.page_length;
        let last = (addr as usize + data.len() - 1) / bank.page_length;
        for page in first..=last {
            if is_page_locked(master, dev, profile, id, page)? {
                log::debug!("eprom: {} page {} is locked", id, page);
                return Err(Error::PageLocked);
            }
        }
    }

    let verify = bank.write_verification;
    for (i, byte) in data.iter().enumerate() {
        let phys = bank.start + addr + i as u32;
        program_byte(master, dev, write, phys, *byte, i > 0, verify)?;
    }
    Ok(())
}
