//! owmem-dummy - Emulated 1-Wire bus for testing
//!
//! This crate provides a bus master with one emulated memory device
//! attached. It's useful for exercising the memory bank engine without an
//! adapter or real parts: the models answer the same frames, CRCs and
//! status bytes the devices put on the wire.
//!
//! Three models are available:
//!
//! - [`EepromModel`]: scratchpad EEPROMs with plain or password copy and
//!   optional write cycle counters
//! - [`EpromModel`]: add-only memories with status memory, page locks and
//!   page redirection
//! - [`ShaModel`]: SHA-1 EEPROMs with secret, MAC-authorized copy and
//!   authenticated page reads

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod eeprom;
mod eprom;
mod scratchpad;
mod sha;

#[cfg(test)]
mod scenarios;

pub use eeprom::{EepromConfig, EepromModel};
pub use eprom::{EpromConfig, EpromModel};
pub use sha::ShaModel;

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use owmem_core::bus::{commands, BusSpeed, MasterFeatures, OneWireMaster, PowerCondition, RomId};
use owmem_core::crc::CrcWidth;
use owmem_core::error::Result;

/// An emulated 1-Wire slave
pub trait Device {
    /// ROM id the device answers to
    fn rom(&self) -> RomId;

    /// Reset pulse; any transaction in progress is abandoned
    fn reset(&mut self);

    /// One byte slot
    ///
    /// `sent` is what the master drives. The return value is what the
    /// device drives; `0xFF` leaves the line released.
    fn touch(&mut self, sent: u8) -> u8;

    /// A program pulse was applied to the line
    fn program_pulse(&mut self) {}
}

/// Bytes heard and bytes queued in the current transaction
#[derive(Debug, Default)]
pub(crate) struct Wire {
    pub rx: Vec<u8>,
    pub tx: VecDeque<u8>,
}

impl Wire {
    pub fn clear(&mut self) {
        self.rx.clear();
        self.tx.clear();
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.tx.extend(bytes.iter().copied());
    }

    /// Queue the CRC bytes a device appends after `covered`
    pub fn send_crc(&mut self, crc: CrcWidth, covered: &[u8]) {
        self.send(&crc.trailer(0, covered));
    }

    /// TA2:TA1 of the received command
    pub fn address(&self) -> u32 {
        u32::from(self.rx[1]) | u32::from(self.rx[2]) << 8
    }
}

/// Link-layer event counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    /// `set_speed` calls, i.e. speed negotiations
    pub speed_changes: usize,
    /// Bare reset pulses
    pub resets: usize,
    /// Device selections
    pub selects: usize,
    /// Program pulses
    pub program_pulses: usize,
    /// Strong pull-up activations
    pub power_deliveries: usize,
    /// Total requested delay
    pub delay_us: u64,
}

/// Bus master with one emulated device attached
pub struct DummyBus<D> {
    device: D,
    features: MasterFeatures,
    speed: BusSpeed,
    present: bool,
    device_overdrive: bool,
    selected: bool,
    awaiting_rom_command: bool,
    fail_next_select: bool,
    corrupt_in: Option<usize>,
    stats: BusStats,
}

impl<D: Device> DummyBus<D> {
    /// Create a bus with every master feature available
    pub fn new(device: D) -> Self {
        Self {
            device,
            features: MasterFeatures::all(),
            speed: BusSpeed::Regular,
            present: true,
            device_overdrive: false,
            selected: false,
            awaiting_rom_command: false,
            fail_next_select: false,
            corrupt_in: None,
            stats: BusStats::default(),
        }
    }

    /// Restrict the features the master reports
    pub fn with_features(mut self, features: MasterFeatures) -> Self {
        self.features = features;
        self
    }

    /// The attached device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The attached device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Event counters since creation or the last [`clear_stats`](Self::clear_stats)
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// Reset the event counters
    pub fn clear_stats(&mut self) {
        self.stats = BusStats::default();
    }

    /// Attach or detach the device
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Let the next select find no device
    pub fn fail_next_select(&mut self) {
        self.fail_next_select = true;
    }

    /// Flip the low bit of the `n`-th read slot from now (0 = the next one)
    pub fn corrupt_read(&mut self, n: usize) {
        self.corrupt_in = Some(n);
    }

    /// Knock the device back to regular speed, as a glitch on the line would
    pub fn drop_overdrive(&mut self) {
        self.device_overdrive = false;
    }

    /// Reset pulse at the current speed; returns presence
    fn line_reset(&mut self) -> bool {
        self.device.reset();
        self.selected = false;
        self.awaiting_rom_command = false;
        if self.speed != BusSpeed::Overdrive {
            self.device_overdrive = false;
        }
        self.present && self.device_overdrive == (self.speed == BusSpeed::Overdrive)
    }

    fn touch(&mut self, sent: u8) -> u8 {
        let driven = if self.awaiting_rom_command {
            self.awaiting_rom_command = false;
            if sent == commands::OVERDRIVE_SKIP_ROM {
                self.device_overdrive = true;
            }
            0xFF
        } else if self.selected {
            self.device.touch(sent)
        } else {
            0xFF
        };

        let mut value = sent & driven;
        if sent == 0xFF {
            match self.corrupt_in {
                Some(0) => {
                    log::debug!("dummy: corrupting read slot (0x{:02X})", value);
                    value ^= 0x01;
                    self.corrupt_in = None;
                }
                Some(n) => self.corrupt_in = Some(n - 1),
                None => {}
            }
        }
        value
    }
}

impl<D: Device> OneWireMaster for DummyBus<D> {
    fn features(&self) -> MasterFeatures {
        self.features
    }

    fn reset(&mut self) -> Result<bool> {
        self.stats.resets += 1;
        let presence = self.line_reset();
        self.awaiting_rom_command = presence;
        Ok(presence)
    }

    fn select(&mut self, rom: &RomId) -> Result<bool> {
        self.stats.selects += 1;
        let presence = self.line_reset();
        if self.fail_next_select {
            self.fail_next_select = false;
            log::debug!("dummy: failing select of {}", rom);
            return Ok(false);
        }
        self.selected = presence && *rom == self.device.rom();
        Ok(self.selected)
    }

    fn data_block(&mut self, buf: &mut [u8]) -> Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.touch(*byte);
        }
        Ok(())
    }

    fn put_byte(&mut self, byte: u8) -> Result<()> {
        self.touch(byte);
        Ok(())
    }

    fn get_byte(&mut self) -> Result<u8> {
        Ok(self.touch(0xFF))
    }

    fn start_power_delivery(&mut self, _condition: PowerCondition) -> Result<()> {
        self.stats.power_deliveries += 1;
        Ok(())
    }

    fn set_power_normal(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_program_pulse(&mut self, _condition: PowerCondition) -> Result<()> {
        self.stats.program_pulses += 1;
        if self.selected {
            self.device.program_pulse();
        }
        Ok(())
    }

    fn speed(&self) -> BusSpeed {
        self.speed
    }

    fn set_speed(&mut self, speed: BusSpeed) -> Result<()> {
        self.stats.speed_changes += 1;
        self.speed = speed;
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        // Nothing to wait for in memory
        self.stats.delay_us += u64::from(us);
    }
}
