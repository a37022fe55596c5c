//! SHA-1 secret and MAC protocol of authenticated EEPROMs
//!
//! The device secret is loaded once with Load First Secret and evolved with
//! Compute Next Secret. Memory writes must be authorized with a MAC over
//! the secret, the target page and the ROM id; Read Authenticated Page
//! returns a MAC over the page and a host challenge. The host mirrors the
//! secret in a [`DeviceSession`] so it can compute and check these MACs.

use crate::bank::{BankId, DeviceProfile, DeviceState};
use crate::bus::{commands, OneWireMaster, PowerCondition};
use crate::crc::CrcWidth;
use crate::error::{Error, Result};
use crate::mac::{self, Mac, MAC_LEN, PAGE_LEN, SECRET_LEN};
use crate::session::DeviceSession;

use super::{address_bytes, memory, require_power_delivery, scratchpad};

/// Load the scratchpad into the secret (or another location) at `addr`
///
/// With `data` the scratchpad is written first. When `addr` is the start
/// of the secret region the session mirror is refreshed from the
/// scratchpad; a load into the middle of the secret leaves the mirror
/// unknown.
pub fn load_first_secret<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    session: &mut DeviceSession,
    addr: u32,
    data: Option<&[u8]>,
) -> Result<()> {
    let sha = profile.sha_spec()?;
    let sp = profile.scratchpad_spec()?;
    session.check_device(dev.rom())?;
    if data.is_some_and(|d| d.len() > sp.length) {
        return Err(Error::AddressOutOfBounds);
    }
    require_power_delivery(master)?;

    if let Some(data) = data {
        scratchpad::write_scratchpad(master, dev, addr, data)?;
    }

    let [lo, hi] = address_bytes(addr);
    dev.select(master)?;
    let mut frame = [commands::LOAD_FIRST_SECRET, lo, hi];
    master.data_block(&mut frame)?;
    master.start_power_delivery(PowerCondition::AfterNextByte)?;
    master.put_byte(commands::LOAD_FIRST_SECRET_ES)?;
    master.delay_us(commands::T_LOAD_SECRET_US);
    master.set_power_normal()?;

    let status = master.get_byte()?;
    if !commands::is_success(status) {
        log::debug!("sha: load first secret at 0x{:04X} status 0x{:02X}", addr, status);
        return Err(Error::UnexpectedStatus(status));
    }

    if addr == sha.secret_address {
        let mut buf = alloc::vec![0u8; sp.length];
        scratchpad::read_scratchpad(master, dev, &sp, &mut buf)?;
        let mut secret = [0u8; SECRET_LEN];
        secret.copy_from_slice(&buf[..SECRET_LEN]);
        session.set_secret(secret);
        log::debug!("sha: secret loaded for {}", dev.rom());
    } else if sha.is_secret_address(addr) {
        session.clear_secret();
    }
    Ok(())
}

/// Replace the secret with SHA-1 of the secret, a page and the scratchpad
///
/// `addr` is a bank offset in bank `id` and selects the page. With
/// `partial` the scratchpad is loaded with those bytes first. The session
/// mirror is evolved the same way.
#[allow(clippy::too_many_arguments)]
pub fn compute_next_secret<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    session: &mut DeviceSession,
    addr: u32,
    partial: Option<&[u8; SECRET_LEN]>,
) -> Result<()> {
    let sp = profile.scratchpad_spec()?;
    profile.sha_spec()?;
    let bank = profile.bank(id)?;
    session.check_device(dev.rom())?;
    let secret = *session.require_secret()?;
    if !bank.is_valid_range(addr, 1) {
        return Err(Error::AddressOutOfBounds);
    }
    require_power_delivery(master)?;

    let phys = bank.start + addr;
    if let Some(partial) = partial {
        scratchpad::write_scratchpad(master, dev, phys, partial)?;
    }

    let page_offset = addr - addr % PAGE_LEN as u32;
    let mut page = [0u8; PAGE_LEN];
    memory::read_memory(master, dev, id, bank, page_offset, false, &mut page)?;

    let mut buf = alloc::vec![0u8; sp.length];
    scratchpad::read_scratchpad(master, dev, &sp, &mut buf)?;
    let mut scratch = [0u8; 8];
    scratch.copy_from_slice(&buf[..8]);

    let [lo, hi] = address_bytes(phys);
    dev.select(master)?;
    let mut frame = [commands::COMPUTE_NEXT_SECRET, lo];
    master.data_block(&mut frame)?;
    master.start_power_delivery(PowerCondition::AfterNextByte)?;
    master.put_byte(hi)?;
    master.delay_us(commands::T_NEXT_SECRET_US);
    master.set_power_normal()?;

    // the device overwrites the scratchpad with 0xAA when it is done
    scratchpad::read_scratchpad(master, dev, &sp, &mut buf)?;
    if let Some(byte) = buf.iter().find(|&&b| b != commands::STATUS_SUCCESS_AA) {
        log::debug!("sha: compute next secret left scratchpad byte 0x{:02X}", byte);
        return Err(Error::UnexpectedStatus(*byte));
    }

    session.set_secret(mac::next_secret(&secret, &page, &scratch));
    log::debug!("sha: next secret computed over page at 0x{:04X}", phys);
    Ok(())
}

/// Commit the scratchpad to physical `addr`, authorized by `mac`
pub fn copy_scratchpad_with_mac<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    addr: u32,
    len: usize,
    mac: &Mac,
) -> Result<()> {
    let sp = profile.scratchpad_spec()?;
    require_power_delivery(master)?;

    let es = sp.ending_offset(addr, len)?;
    let [lo, hi] = address_bytes(addr);
    dev.select(master)?;
    let mut frame = [commands::COPY_SCRATCHPAD, lo, hi, es];
    master.data_block(&mut frame)?;
    master.delay_us(commands::T_CSHA_US);

    let mut head = [0u8; MAC_LEN - 1];
    head.copy_from_slice(&mac[..MAC_LEN - 1]);
    master.data_block(&mut head)?;
    master.start_power_delivery(PowerCondition::AfterNextByte)?;
    master.put_byte(mac[MAC_LEN - 1])?;
    master.delay_us(commands::T_PROG_SHA_US);
    master.set_power_normal()?;

    let status = master.get_byte()?;
    log::debug!("sha: MAC copy to 0x{:04X} status 0x{:02X}", addr, status);
    match status {
        s if commands::is_success(s) => Ok(()),
        commands::STATUS_WRITE_PROTECTED => Err(Error::RegionWriteProtected),
        commands::STATUS_MAC_MISMATCH => Err(Error::MacMismatch),
        s => Err(Error::UnexpectedStatus(s)),
    }
}

/// Write `data` at bank offset `addr`, authorizing every copy with a MAC
/// computed from the session secret
pub fn write_with_mac<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    session: &DeviceSession,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    let sp = profile.scratchpad_spec()?;
    let bank = profile.bank(id)?;
    session.check_device(dev.rom())?;
    let secret = *session.require_secret()?;
    if bank.page_length != PAGE_LEN || sp.length != 8 {
        return Err(Error::InvalidGeometry);
    }

    scratchpad::write_through(master, dev, id, bank, &sp, addr, data, |master, dev, phys, chunk| {
        let offset = phys - bank.start;
        let page_offset = offset - offset % PAGE_LEN as u32;
        let mut page = [0u8; PAGE_LEN];
        memory::read_memory(master, dev, id, bank, page_offset, false, &mut page)?;

        let scratch: &[u8; 8] = chunk.try_into().map_err(|_| Error::InvalidGeometry)?;
        let mac = mac::copy_mac(&secret, &page, scratch, dev.rom(), phys);
        copy_scratchpad_with_mac(master, dev, profile, phys, chunk.len(), &mac)
    })
}

/// Read `page` of bank `id` together with its MAC
///
/// The 8-byte `challenge` is placed in the scratchpad first; the device
/// hashes part of it into the MAC. Check the result with
/// [`DeviceSession::is_mac_valid`].
pub fn read_authenticated_page<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    page: usize,
    challenge: &[u8; 8],
    data: &mut [u8; PAGE_LEN],
) -> Result<Mac> {
    profile.sha_spec()?;
    let bank = profile.bank(id)?;
    bank.check_page(page)?;
    if bank.page_length != PAGE_LEN {
        return Err(Error::InvalidGeometry);
    }
    require_power_delivery(master)?;

    let phys = bank.page_address(page);
    scratchpad::write_scratchpad(master, dev, phys, challenge)?;

    let [lo, hi] = address_bytes(phys);
    dev.select(master)?;
    let mut frame = [0xFFu8; 3 + PAGE_LEN + 2];
    frame[..3].copy_from_slice(&[commands::READ_AUTH_PAGE, lo, hi]);
    master.data_block(&mut frame)?;
    if !CrcWidth::Crc16.check(0, &frame) {
        log::debug!("sha: authenticated read page {} data CRC mismatch", page);
        return Err(Error::CrcMismatch);
    }

    master.start_power_delivery(PowerCondition::Now)?;
    master.delay_us(commands::T_AUTH_READ_US);
    master.set_power_normal()?;

    let mut tail = [0xFFu8; MAC_LEN + 2];
    master.data_block(&mut tail)?;
    if !CrcWidth::Crc16.check(0, &tail) {
        log::debug!("sha: authenticated read page {} MAC CRC mismatch", page);
        return Err(Error::CrcMismatch);
    }

    data.copy_from_slice(&frame[3..3 + PAGE_LEN]);
    let mut device_mac = [0u8; MAC_LEN];
    device_mac.copy_from_slice(&tail[..MAC_LEN]);
    Ok(device_mac)
}

/// Reload the 8 memory bytes at bank offset `addr` into the scratchpad
pub fn refresh_scratchpad<M: OneWireMaster + ?Sized>(
    master: &mut M,
    dev: &mut DeviceState,
    profile: &DeviceProfile,
    id: BankId,
    addr: u32,
) -> Result<()> {
    let sha = profile.sha_spec()?;
    if !sha.supports_refresh {
        return Err(Error::Unsupported("refresh scratchpad"));
    }
    let bank = profile.bank(id)?;
    let aligned = addr - addr % 8;
    if !bank.is_valid_range(aligned, 8) {
        return Err(Error::AddressOutOfBounds);
    }

    let mut memory_bytes = [0u8; 8];
    memory::read_memory(master, dev, id, bank, aligned, false, &mut memory_bytes)?;

    let [lo, hi] = address_bytes(bank.start + aligned);
    dev.select(master)?;
    let mut frame = [0xFFu8; 13];
    frame[..3].copy_from_slice(&[commands::REFRESH_SCRATCHPAD, lo, hi]);
    frame[3..11].copy_from_slice(&memory_bytes);
    master.data_block(&mut frame)?;
    if !CrcWidth::Crc16.check(0, &frame) {
        log::debug!("sha: refresh scratchpad CRC mismatch");
        return Err(Error::CrcMismatch);
    }
    Ok(())
}
