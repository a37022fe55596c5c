//! Bank handle and capability traits
//!
//! A [`Bank`] borrows a device's state and a bus master for the duration
//! of a few operations and exposes the bank's verbs through capability
//! traits. Which traits actually work depends on the bank descriptor; a
//! verb the bank cannot perform fails with [`Error::Unsupported`] (or
//! [`Error::ReadOnlyBank`]) before touching the bus.
//!
//! Every verb passes its result through
//! [`DeviceState::settle`](crate::bank::DeviceState::settle), so any
//! failure observed on the bus forces speed re-verification on the next
//! operation. Nothing is retried.

use alloc::vec;

use crate::bank::{BankId, DeviceProfile, DeviceState, MemoryBank, ReadStrategy, WriteStrategy};
use crate::bus::OneWireMaster;
use crate::error::{Error, Result};
use crate::mac::{Mac, PAGE_LEN, SECRET_LEN};
use crate::packet;
use crate::protocol::{eprom, memory, scratchpad, sha};
use crate::session::DeviceSession;

/// Byte-addressed reads
pub trait Readable {
    /// Read `buf.len()` bytes from bank offset `addr`
    ///
    /// With `cont` the read continues the previous read of this bank
    /// without reselecting the device; it must start where that one ended.
    fn read(&mut self, addr: u32, cont: bool, buf: &mut [u8]) -> Result<()>;
}

/// Byte-addressed writes
pub trait Writable {
    /// Write `data` at bank offset `addr`
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;
}

/// Page-organized access
pub trait Paged {
    /// Read one page, verified by device CRC when the bank supports it
    fn read_page(&mut self, page: usize, cont: bool, buf: &mut [u8]) -> Result<()>;

    /// Read one page and its extra information
    fn read_page_extra(&mut self, page: usize, cont: bool, buf: &mut [u8], extra: &mut [u8]) -> Result<()>;

    /// Read the Universal Data Packet on `page`, returning its length
    fn read_page_packet(&mut self, page: usize, cont: bool, buf: &mut [u8]) -> Result<usize>;

    /// Store `data` as a Universal Data Packet on `page`
    fn write_page_packet(&mut self, page: usize, data: &[u8]) -> Result<()>;
}

/// Page reads verified by a device-generated CRC
pub trait CrcVerifiable {
    /// Read one page with device CRC
    fn read_page_crc(&mut self, page: usize, cont: bool, buf: &mut [u8]) -> Result<()>;

    /// Read one page with device CRC, including its extra information
    fn read_page_crc_extra(&mut self, page: usize, cont: bool, buf: &mut [u8], extra: &mut [u8]) -> Result<()>;

    /// Read consecutive pages starting at `first_page` in one transaction
    fn read_pages_crc(&mut self, first_page: usize, buf: &mut [u8]) -> Result<()>;
}

/// One-time-programmable page control
pub trait Otp {
    /// Permanently write protect a page
    fn lock_page(&mut self, page: usize) -> Result<()>;
    /// Whether a page is write protected
    fn is_page_locked(&mut self, page: usize) -> Result<bool>;
    /// Redirect a page to another page
    fn redirect_page(&mut self, page: usize, new_page: usize) -> Result<()>;
    /// Page a page is redirected to, if any
    fn get_redirected_page(&mut self, page: usize) -> Result<Option<usize>>;
    /// Permanently write protect a page's redirection
    fn lock_redirect_page(&mut self, page: usize) -> Result<()>;
    /// Whether a page's redirection is write protected
    fn is_redirect_page_locked(&mut self, page: usize) -> Result<bool>;
}

/// Writes authorized by an 8-byte password
pub trait PasswordProtected {
    /// Write `data` at bank offset `addr`, copying with `password`
    fn write_with_password(&mut self, addr: u32, data: &[u8], password: &[u8; 8]) -> Result<()>;
}

/// SHA-1 secret management and MAC-authorized access
pub trait MacAuthenticated {
    /// Write `data` at bank offset `addr`, authorizing copies with MACs
    fn write_with_mac(&mut self, session: &DeviceSession, addr: u32, data: &[u8]) -> Result<()>;

    /// Load the scratchpad (optionally written with `data` first) to
    /// physical `addr`
    fn load_first_secret(&mut self, session: &mut DeviceSession, addr: u32, data: Option<&[u8]>) -> Result<()>;

    /// Evolve the secret over the page containing bank offset `addr`
    fn compute_next_secret(
        &mut self,
        session: &mut DeviceSession,
        addr: u32,
        partial: Option<&[u8; SECRET_LEN]>,
    ) -> Result<()>;

    /// Read a page and the MAC the device computes over it
    fn read_authenticated_page(
        &mut self,
        page: usize,
        challenge: &[u8; 8],
        buf: &mut [u8; PAGE_LEN],
    ) -> Result<Mac>;

    /// Reload memory at bank offset `addr` into the scratchpad
    fn refresh_scratchpad(&mut self, addr: u32) -> Result<()>;
}

/// One memory bank of a device, bound to a bus master
pub struct Bank<'a, M: OneWireMaster + ?Sized> {
    master: &'a mut M,
    state: &'a mut DeviceState,
    profile: &'a DeviceProfile,
    id: BankId,
}

impl<'a, M: OneWireMaster + ?Sized> Bank<'a, M> {
    pub(crate) fn new(
        master: &'a mut M,
        state: &'a mut DeviceState,
        profile: &'a DeviceProfile,
        id: BankId,
    ) -> Self {
        Self {
            master,
            state,
            profile,
            id,
        }
    }

    /// Id of this bank
    pub fn id(&self) -> BankId {
        self.id
    }

    /// Descriptor of this bank
    pub fn descriptor(&self) -> &'a MemoryBank {
        // The id was checked when the handle was created
        &self.profile.banks[self.id.0]
    }

    /// Run a protocol operation and settle its result
    fn run<T>(
        &mut self,
        op: impl FnOnce(&mut M, &mut DeviceState, &DeviceProfile, BankId) -> Result<T>,
    ) -> Result<T> {
        let result = op(&mut *self.master, &mut *self.state, self.profile, self.id);
        self.state.settle(result)
    }

    fn write_scratchpad_bank(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.run(|master, dev, profile, id| {
            let bank = profile.bank(id)?;
            let sp = profile.scratchpad_spec()?;
            if !bank.is_valid_range(addr, data.len()) {
                return Err(Error::AddressOutOfBounds);
            }
            let target = bank.start + addr;
            scratchpad::write_scratchpad(master, dev, target, data)?;

            if bank.write_verification {
                let mut readback = vec![0u8; sp.length];
                scratchpad::read_scratchpad(master, dev, &sp, &mut readback)?;
                let offset = (target & sp.offset_mask()) as usize;
                let stored = readback.get(offset..offset + data.len()).ok_or(Error::AddressOutOfBounds)?;
                if let Some(i) = stored.iter().zip(data).position(|(a, b)| a != b) {
                    return Err(Error::VerifyMismatch { addr: target + i as u32 });
                }
            }
            Ok(())
        })
    }

    fn copy_through_scratchpad(&mut self, addr: u32, data: &[u8], password: Option<&[u8; 8]>) -> Result<()> {
        self.run(|master, dev, profile, id| {
            let bank = profile.bank(id)?;
            let sp = profile.scratchpad_spec()?;
            let power = bank.needs_power_delivery();
            scratchpad::write_through(master, dev, id, bank, &sp, addr, data, |master, dev, phys, chunk| {
                match password {
                    Some(password) => scratchpad::copy_scratchpad_with_password(
                        master,
                        dev,
                        &sp,
                        phys,
                        chunk.len(),
                        password,
                    ),
                    None => scratchpad::copy_scratchpad(master, dev, &sp, phys, chunk.len(), power),
                }
            })
        })
    }
}

impl<M: OneWireMaster + ?Sized> Readable for Bank<'_, M> {
    fn read(&mut self, addr: u32, cont: bool, buf: &mut [u8]) -> Result<()> {
        self.run(|master, dev, profile, id| {
            let bank = profile.bank(id)?;
            match bank.read {
                ReadStrategy::Memory { .. } => memory::read_memory(master, dev, id, bank, addr, cont, buf),
                ReadStrategy::Scratchpad => {
                    if cont {
                        return Err(Error::NotContinuable);
                    }
                    if !bank.is_valid_range(addr, buf.len()) {
                        return Err(Error::AddressOutOfBounds);
                    }
                    let sp = profile.scratchpad_spec()?;
                    let mut content = vec![0u8; sp.length];
                    scratchpad::read_scratchpad(master, dev, &sp, &mut content)?;
                    let start = addr as usize;
                    let stored = content.get(start..start + buf.len()).ok_or(Error::AddressOutOfBounds)?;
                    buf.copy_from_slice(stored);
                    Ok(())
                }
            }
        })
    }
}

impl<M: OneWireMaster + ?Sized> Writable for Bank<'_, M> {
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let bank = self.descriptor();
        if bank.is_read_only() {
            return Err(Error::ReadOnlyBank);
        }
        match bank.write {
            WriteStrategy::None => Err(Error::ReadOnlyBank),
            WriteStrategy::Scratchpad => self.write_scratchpad_bank(addr, data),
            WriteStrategy::CopyScratchpad => self.copy_through_scratchpad(addr, data, None),
            WriteStrategy::CopyWithPassword => Err(Error::Unsupported("write without password")),
            WriteStrategy::CopyWithMac => Err(Error::Unsupported("write without MAC session")),
            WriteStrategy::Eprom(_) => {
                self.run(|master, dev, profile, id| eprom::write(master, dev, profile, id, addr, data))
            }
        }
    }
}

impl<M: OneWireMaster + ?Sized> Paged for Bank<'_, M> {
    fn read_page(&mut self, page: usize, cont: bool, buf: &mut [u8]) -> Result<()> {
        if self.descriptor().read == ReadStrategy::Scratchpad {
            let bank = self.descriptor();
            bank.check_page(page)?;
            let len = bank.page_length;
            if buf.len() < len {
                return Err(Error::BufferTooSmall);
            }
            return self.read((page * len) as u32, cont, &mut buf[..len]);
        }
        self.run(|master, dev, profile, id| {
            memory::read_page(master, dev, id, profile.bank(id)?, page, cont, buf)
        })
    }

    fn read_page_extra(&mut self, page: usize, cont: bool, buf: &mut [u8], extra: &mut [u8]) -> Result<()> {
        if !self.descriptor().has_extra_info() {
            return Err(Error::Unsupported("extra information"));
        }
        self.read_page_crc_extra(page, cont, buf, extra)
    }

    fn read_page_packet(&mut self, page: usize, cont: bool, buf: &mut [u8]) -> Result<usize> {
        if self.descriptor().read == ReadStrategy::Scratchpad {
            let bank = self.descriptor();
            let max_len = bank.max_packet_data_length;
            let mut raw = vec![0u8; bank.page_length];
            self.read_page(page, cont, &mut raw)?;
            let result = packet::decode(page, &raw, max_len).and_then(|payload| {
                let out = buf.get_mut(..payload.len()).ok_or(Error::BufferTooSmall)?;
                out.copy_from_slice(payload);
                Ok(payload.len())
            });
            return self.state.settle(result);
        }
        self.run(|master, dev, profile, id| {
            memory::read_page_packet(master, dev, id, profile.bank(id)?, page, cont, buf)
        })
    }

    fn write_page_packet(&mut self, page: usize, data: &[u8]) -> Result<()> {
        let bank = self.descriptor();
        bank.check_page(page)?;
        let frame = packet::encode(page, data, bank.max_packet_data_length)?;
        let addr = (page * bank.page_length) as u32;
        self.write(addr, &frame)
    }
}

impl<M: OneWireMaster + ?Sized> CrcVerifiable for Bank<'_, M> {
    fn read_page_crc(&mut self, page: usize, cont: bool, buf: &mut [u8]) -> Result<()> {
        self.run(|master, dev, profile, id| {
            memory::read_page_crc(master, dev, id, profile.bank(id)?, page, cont, buf, None)
        })
    }

    fn read_page_crc_extra(&mut self, page: usize, cont: bool, buf: &mut [u8], extra: &mut [u8]) -> Result<()> {
        self.run(|master, dev, profile, id| {
            memory::read_page_crc(master, dev, id, profile.bank(id)?, page, cont, buf, Some(extra))
        })
    }

    fn read_pages_crc(&mut self, first_page: usize, buf: &mut [u8]) -> Result<()> {
        self.run(|master, dev, profile, id| {
            memory::read_pages_crc(master, dev, id, profile.bank(id)?, first_page, buf)
        })
    }
}

impl<M: OneWireMaster + ?Sized> Otp for Bank<'_, M> {
    fn lock_page(&mut self, page: usize) -> Result<()> {
        self.run(|master, dev, profile, id| eprom::lock_page(master, dev, profile, id, page))
    }

    fn is_page_locked(&mut self, page: usize) -> Result<bool> {
        self.run(|master, dev, profile, id| eprom::is_page_locked(master, dev, profile, id, page))
    }

    fn redirect_page(&mut self, page: usize, new_page: usize) -> Result<()> {
        self.run(|master, dev, profile, id| {
            eprom::redirect_page(master, dev, profile, id, page, new_page)
        })
    }

    fn get_redirected_page(&mut self, page: usize) -> Result<Option<usize>> {
        self.run(|master, dev, profile, id| {
            eprom::get_redirected_page(master, dev, profile, id, page)
        })
    }

    fn lock_redirect_page(&mut self, page: usize) -> Result<()> {
        self.run(|master, dev, profile, id| {
            eprom::lock_redirect_page(master, dev, profile, id, page)
        })
    }

    fn is_redirect_page_locked(&mut self, page: usize) -> Result<bool> {
        self.run(|master, dev, profile, id| {
            eprom::is_redirect_page_locked(master, dev, profile, id, page)
        })
    }
}

impl<M: OneWireMaster + ?Sized> PasswordProtected for Bank<'_, M> {
    fn write_with_password(&mut self, addr: u32, data: &[u8], password: &[u8; 8]) -> Result<()> {
        if self.descriptor().write != WriteStrategy::CopyWithPassword {
            return Err(Error::Unsupported("password copy"));
        }
        self.copy_through_scratchpad(addr, data, Some(password))
    }
}

impl<M: OneWireMaster + ?Sized> MacAuthenticated for Bank<'_, M> {
    fn write_with_mac(&mut self, session: &DeviceSession, addr: u32, data: &[u8]) -> Result<()> {
        if self.descriptor().write != WriteStrategy::CopyWithMac {
            return Err(Error::Unsupported("MAC copy"));
        }
        self.run(|master, dev, profile, id| {
            sha::write_with_mac(master, dev, profile, id, session, addr, data)
        })
    }

    fn load_first_secret(&mut self, session: &mut DeviceSession, addr: u32, data: Option<&[u8]>) -> Result<()> {
        self.run(|master, dev, profile, _| {
            sha::load_first_secret(master, dev, profile, session, addr, data)
        })
    }

    fn compute_next_secret(
        &mut self,
        session: &mut DeviceSession,
        addr: u32,
        partial: Option<&[u8; SECRET_LEN]>,
    ) -> Result<()> {
        self.run(|master, dev, profile, id| {
            sha::compute_next_secret(master, dev, profile, id, session, addr, partial)
        })
    }

    fn read_authenticated_page(
        &mut self,
        page: usize,
        challenge: &[u8; 8],
        buf: &mut [u8; PAGE_LEN],
    ) -> Result<Mac> {
        self.run(|master, dev, profile, id| {
            sha::read_authenticated_page(master, dev, profile, id, page, challenge, buf)
        })
    }

    fn refresh_scratchpad(&mut self, addr: u32) -> Result<()> {
        self.run(|master, dev, profile, id| sha::refresh_scratchpad(master, dev, profile, id, addr))
    }
}
