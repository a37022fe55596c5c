//! Scratchpad EEPROM model
//!
//! Writes land in the scratchpad and reach memory only through a copy
//! command that repeats the target address and ending offset. The
//! password variant accepts only the password copy command.

use alloc::vec;
use alloc::vec::Vec;

use owmem_core::bus::{commands, RomId};
use owmem_core::crc::CrcWidth;

use crate::scratchpad::Scratchpad;
use crate::{Device, Wire};

/// Geometry and command set of an emulated EEPROM
#[derive(Debug, Clone)]
pub struct EepromConfig {
    /// ROM id
    pub rom: RomId,
    /// Memory size in bytes
    pub memory_size: usize,
    /// Page length in bytes
    pub page_length: usize,
    /// Scratchpad length in bytes
    pub scratchpad_length: usize,
    /// Read Scratchpad ends with a CRC16
    pub read_crc: bool,
    /// `0xA5` reads pages with their write cycle counter
    pub counter_read: bool,
    /// Copy requires this password (`0x99` instead of `0x55`)
    pub password: Option<[u8; 8]>,
}

impl EepromConfig {
    /// DS2433: 512 bytes, 32-byte scratchpad
    pub fn ds2433(rom: RomId) -> Self {
        Self {
            rom,
            memory_size: 512,
            page_length: 32,
            scratchpad_length: 32,
            read_crc: false,
            counter_read: false,
            password: None,
        }
    }

    /// DS1963L: 512 bytes with write cycle counters
    pub fn ds1963l(rom: RomId) -> Self {
        Self {
            counter_read: true,
            ..Self::ds2433(rom)
        }
    }

    /// DS1977: 32640 bytes in 64-byte pages behind a write password
    pub fn ds1977(rom: RomId, password: [u8; 8]) -> Self {
        Self {
            rom,
            memory_size: 510 * 64,
            page_length: 64,
            scratchpad_length: 64,
            read_crc: true,
            counter_read: false,
            password: Some(password),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    None,
    Memory(usize),
    CounterPage(usize),
}

/// Emulated scratchpad EEPROM
pub struct EepromModel {
    config: EepromConfig,
    memory: Vec<u8>,
    scratchpad: Scratchpad,
    counters: Vec<u32>,
    wire: Wire,
    stream: Stream,
}

impl EepromModel {
    /// Create a device with erased (`0xFF`) memory
    pub fn new(config: EepromConfig) -> Self {
        let pages = config.memory_size / config.page_length;
        Self {
            memory: vec![0xFF; config.memory_size],
            scratchpad: Scratchpad::new(config.scratchpad_length),
            counters: vec![0; pages],
            wire: Wire::default(),
            stream: Stream::None,
            config,
        }
    }

    /// Memory content
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Memory content, mutably
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Scratchpad content
    pub fn scratchpad(&self) -> &[u8] {
        &self.scratchpad.data
    }

    /// Number of copies into `page`
    pub fn write_cycles(&self, page: usize) -> u32 {
        self.counters[page]
    }

    fn pages(&self) -> usize {
        self.counters.len()
    }

    fn copy(&mut self, target: u32, es: u8) {
        if !self.scratchpad.authorizes(target, es) {
            log::debug!("eeprom: copy to 0x{:04X} E/S 0x{:02X} refused", target, es);
            return;
        }
        let row = self.scratchpad.row();
        let start = self.scratchpad.start();
        let end = usize::from(es);
        if end < start || row + end >= self.memory.len() {
            return;
        }
        self.memory[row + start..=row + end].copy_from_slice(&self.scratchpad.data[start..=end]);
        self.counters[row / self.config.page_length] += 1;
        self.scratchpad.copied = true;
        self.wire.send(&[commands::STATUS_SUCCESS_AA]);
    }

    /// Queue one page of a counter read, from `start` to the page end
    fn send_counter_page(&mut self, page: usize, start: usize, header: &[u8]) {
        let base = page * self.config.page_length;
        let mut frame = header.to_vec();
        frame.extend_from_slice(&self.memory[base + start..base + self.config.page_length]);
        frame.extend_from_slice(&self.counters[page].to_le_bytes());
        frame.extend_from_slice(&[0; 4]);
        self.wire.send(&frame[header.len()..]);
        self.wire.send_crc(CrcWidth::Crc16, &frame);
    }

    fn process(&mut self) {
        let cmd = self.wire.rx[0];
        let len = self.wire.rx.len();
        match cmd {
            commands::WRITE_SCRATCHPAD if len == 3 => {
                let target = self.wire.address();
                self.scratchpad.begin_write(target);
            }
            commands::WRITE_SCRATCHPAD if len > 3 => {
                self.scratchpad.write(len - 4, self.wire.rx[len - 1]);
            }
            commands::READ_SCRATCHPAD if len == 1 => {
                let frame = self.scratchpad.read_frame(self.config.read_crc);
                self.wire.send(&frame);
            }
            commands::COPY_SCRATCHPAD if len == 4 && self.config.password.is_none() => {
                let (target, es) = (self.wire.address(), self.wire.rx[3]);
                self.copy(target, es);
            }
            commands::COPY_SCRATCHPAD_PASSWORD if len == 12 => {
                let Some(password) = self.config.password else {
                    return;
                };
                if self.wire.rx[4..12] != password {
                    log::debug!("eeprom: wrong copy password");
                    return;
                }
                let (target, es) = (self.wire.address(), self.wire.rx[3]);
                self.copy(target, es);
            }
            commands::READ_MEMORY if len == 3 => {
                self.stream = Stream::Memory(self.wire.address() as usize);
            }
            commands::READ_MEMORY_CRC if len == 3 && self.config.counter_read => {
                let addr = self.wire.address() as usize;
                let page = addr / self.config.page_length;
                if page < self.pages() {
                    let header = self.wire.rx.clone();
                    self.send_counter_page(page, addr % self.config.page_length, &header);
                    self.stream = Stream::CounterPage(page + 1);
                }
            }
            _ => {}
        }
    }
}

impl Device for EepromModel {
    fn rom(&self) -> RomId {
        self.config.rom
    }

    fn reset(&mut self) {
        self.wire.clear();
        self.stream = Stream::None;
    }

    fn touch(&mut self, sent: u8) -> u8 {
        if let Some(byte) = self.wire.tx.pop_front() {
            return byte;
        }
        match self.stream {
            Stream::Memory(addr) => {
                self.stream = Stream::Memory(addr + 1);
                return self.memory.get(addr).copied().unwrap_or(0xFF);
            }
            Stream::CounterPage(page) => {
                if page >= self.pages() {
                    return 0xFF;
                }
                self.send_counter_page(page, 0, &[]);
                self.stream = Stream::CounterPage(page + 1);
                return self.wire.tx.pop_front().unwrap_or(0xFF);
            }
            Stream::None => {}
        }
        self.wire.rx.push(sent);
        self.process();
        0xFF
    }
}
