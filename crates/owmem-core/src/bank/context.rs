//! Per-device runtime state
//!
//! [`DeviceContext`] pairs a static [`DeviceProfile`] with the mutable
//! state a device accumulates while it is being talked to: the negotiated
//! bus speed, the pages observed to be locked, and the position of an
//! ongoing read that may be continued without reselecting the device.

use alloc::collections::BTreeSet;

use super::descriptor::{BankId, MemoryBank};
use super::profile::DeviceProfile;
use crate::bus::{BusSpeed, OneWireMaster, RomId};
use crate::device::Bank;
use crate::error::{Error, Result};
use crate::families;
use crate::speed::SpeedGovernor;

/// What kind of read a [`ReadCursor`] continues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// Raw memory stream, positioned at a bank byte offset
    Raw,
    /// Device-CRC page frames, positioned at a page number
    PageCrc,
}

/// Position right after the last successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCursor {
    /// Bank the read happened in
    pub bank: BankId,
    /// Read flavour
    pub kind: CursorKind,
    /// Next byte offset (raw) or next page (page CRC)
    pub next: usize,
}

/// Mutable per-device state shared by every bank of the device
#[derive(Debug, Clone)]
pub struct DeviceState {
    rom: RomId,
    speed: SpeedGovernor,
    locked: BTreeSet<(BankId, usize)>,
    cursor: Option<ReadCursor>,
}

impl DeviceState {
    /// Fresh state: speed unknown, nothing known to be locked
    pub fn new(rom: RomId, speed: BusSpeed) -> Self {
        Self {
            rom,
            speed: SpeedGovernor::new(speed),
            locked: BTreeSet::new(),
            cursor: None,
        }
    }

    /// ROM id of the device
    pub fn rom(&self) -> &RomId {
        &self.rom
    }

    /// Speed negotiation state
    pub fn speed(&self) -> &SpeedGovernor {
        &self.speed
    }

    /// Change the bus speed this device is driven at
    pub fn set_speed(&mut self, speed: BusSpeed) {
        self.speed.set_target(speed);
    }

    /// Start a new transaction with the device
    ///
    /// Negotiates the bus speed if needed and addresses the device. Any
    /// read in progress ends here.
    pub fn select<M: OneWireMaster + ?Sized>(&mut self, master: &mut M) -> Result<()> {
        self.cursor = None;
        self.speed.ensure(master)?;
        if !master.select(&self.rom)? {
            return Err(Error::DeviceNotPresent);
        }
        Ok(())
    }

    /// Invalidate the speed and any read in progress
    pub fn force_verify(&mut self) {
        self.speed.force_verify();
        self.cursor = None;
    }

    /// Pass `result` through, forcing re-verification on bus failures
    pub fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.forces_verify() {
                log::debug!("{}: {}, forcing speed verification", self.rom, e);
                self.force_verify();
            }
        }
        result
    }

    /// Continuation point of the last read
    pub fn cursor(&self) -> Option<ReadCursor> {
        self.cursor
    }

    /// Record where the last read ended
    pub fn set_cursor(&mut self, cursor: ReadCursor) {
        self.cursor = Some(cursor);
    }

    /// Check that a continued read picks up exactly where the last one ended
    pub fn check_continue(&self, bank: BankId, kind: CursorKind, next: usize) -> Result<()> {
        match self.cursor {
            Some(c) if c.bank == bank && c.kind == kind && c.next == next => Ok(()),
            _ => Err(Error::NotContinuable),
        }
    }

    /// Whether `page` of `bank` has been seen locked
    pub fn is_known_locked(&self, bank: BankId, page: usize) -> bool {
        self.locked.contains(&(bank, page))
    }

    /// Remember that `page` of `bank` is locked
    ///
    /// Locks are one-time programmable, so entries are never removed.
    pub fn note_locked(&mut self, bank: BankId, page: usize) {
        if self.locked.insert((bank, page)) {
            log::debug!("{}: {} page {} is locked", self.rom, bank, page);
        }
    }
}

/// A device: its profile and its runtime state
#[derive(Debug, Clone)]
pub struct DeviceContext {
    profile: DeviceProfile,
    state: DeviceState,
}

impl DeviceContext {
    /// Create a context for `rom` described by `profile`
    pub fn new(rom: RomId, profile: DeviceProfile) -> Result<Self> {
        profile.validate()?;
        let state = DeviceState::new(rom, profile.speed);
        Ok(Self { profile, state })
    }

    /// Create a context from the built-in profile of the ROM's family
    pub fn for_rom(rom: RomId) -> Result<Self> {
        let profile = families::profile_for(rom.family()).ok_or(Error::UnknownFamily(rom.family()))?;
        Self::new(rom, profile)
    }

    /// ROM id of the device
    pub fn rom(&self) -> &RomId {
        self.state.rom()
    }

    /// Device profile
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Runtime state
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Change the bus speed; renegotiated on the next operation
    pub fn set_speed(&mut self, speed: BusSpeed) {
        self.state.set_speed(speed);
    }

    /// Invalidate the negotiated bus speed
    pub fn force_verify(&mut self) {
        self.state.force_verify();
    }

    /// Find a bank by description
    pub fn bank_id(&self, description: &str) -> Option<BankId> {
        self.profile.bank_id(description)
    }

    /// Bank descriptor
    pub fn descriptor(&self, id: BankId) -> Result<&MemoryBank> {
        self.profile.bank(id)
    }

    /// Enable or disable read-back verification of writes to a bank
    pub fn set_write_verification(&mut self, id: BankId, enabled: bool) -> Result<()> {
        let bank = self.profile.banks.get_mut(id.0).ok_or(Error::UnknownBank)?;
        bank.write_verification = enabled;
        Ok(())
    }

    /// Operate on one bank over `master`
    pub fn bank<'a, M: OneWireMaster + ?Sized>(
        &'a mut self,
        master: &'a mut M,
        id: BankId,
    ) -> Result<Bank<'a, M>> {
        self.profile.bank(id)?;
        Ok(Bank::new(master, &mut self.state, &self.profile, id))
    }
}
