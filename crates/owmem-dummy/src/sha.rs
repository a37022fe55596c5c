//! SHA-1 EEPROM model
//!
//! 128 bytes of data memory in four pages, an 8-byte secret at 0x80 that
//! always reads as `0xFF`, and the protection registers at 0x88. Copies
//! into data memory must carry the MAC the device computes from its
//! secret.
//!
//! Registers count as set when they hold `0xAA` or `0x55`:
//!
//! - 0x88: secret write protected
//! - 0x89: all data pages write protected
//! - 0x8C: page 1 in EPROM mode (copies AND into memory)
//! - 0x8D: page 0 write protected

use alloc::vec::Vec;

use owmem_core::bus::{commands, RomId};
use owmem_core::crc::CrcWidth;
use owmem_core::mac::{Mac, Secret, MAC_LEN, PAGE_LEN, SECRET_LEN};
use sha1::{Digest, Sha1};

use crate::scratchpad::Scratchpad;
use crate::{Device, Wire};

const MEMORY_SIZE: usize = 128;
const SECRET_ADDRESS: usize = 0x80;
const REGISTER_ADDRESS: usize = 0x88;

const REG_SECRET_PROTECT: usize = 0x88;
const REG_ALL_PROTECT: usize = 0x89;
const REG_PAGE1_EPROM: usize = 0x8C;
const REG_PAGE0_PROTECT: usize = 0x8D;

/// Run the SHA-1 engine over the 55 message bytes of a block
///
/// Message words M0..M13: secret low half, 32 bytes of `body`, the 8-byte
/// `id` field, secret high half, then three `tail` bytes. The device
/// returns the result words E..A, each least significant byte first.
fn sha_engine(secret: &Secret, body: &[u8; 36], id: &[u8; 8], tail: &[u8; 3]) -> Mac {
    let mut hasher = Sha1::new();
    hasher.update(&secret[..4]);
    hasher.update(body);
    hasher.update(id);
    hasher.update(&secret[4..]);
    hasher.update(tail);
    let digest = hasher.finalize();
    let mut out = [0u8; MAC_LEN];
    for (word, dst) in digest.chunks(4).rev().zip(out.chunks_mut(4)) {
        for (d, s) in dst.iter_mut().zip(word.iter().rev()) {
            *d = *s;
        }
    }
    out
}

/// `MP` control byte followed by the family code and serial number
fn id_field(control: u8, rom: &RomId) -> [u8; 8] {
    let mut id = [control; 8];
    id[1..].copy_from_slice(&rom.as_bytes()[..7]);
    id
}

/// Emulated SHA-1 EEPROM
pub struct ShaModel {
    rom: RomId,
    memory: [u8; MEMORY_SIZE],
    secret: Secret,
    registers: [u8; 8],
    scratchpad: Scratchpad,
    supports_refresh: bool,
    wire: Wire,
    stream: Option<usize>,
}

impl ShaModel {
    /// Create a device with erased memory and an all-zero secret
    pub fn new(rom: RomId) -> Self {
        Self {
            rom,
            memory: [0xFF; MEMORY_SIZE],
            secret: [0; SECRET_LEN],
            registers: [0xFF; 8],
            scratchpad: Scratchpad::new(8),
            supports_refresh: true,
            wire: Wire::default(),
            stream: None,
        }
    }

    /// Variant without the Refresh Scratchpad command
    pub fn without_refresh(mut self) -> Self {
        self.supports_refresh = false;
        self
    }

    /// Start with `secret` already installed
    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = secret;
        self
    }

    /// Device secret, which the bus never reveals
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Data memory content
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Data memory content, mutably
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Set register `addr` (0x88..=0x8F)
    pub fn set_register(&mut self, addr: usize, value: u8) {
        self.registers[addr - REGISTER_ADDRESS] = value;
    }

    /// Scratchpad content
    pub fn scratchpad(&self) -> &[u8] {
        &self.scratchpad.data
    }

    fn register_set(&self, addr: usize) -> bool {
        matches!(self.registers[addr - REGISTER_ADDRESS], 0xAA | 0x55)
    }

    fn page_protected(&self, page: usize) -> bool {
        self.register_set(REG_ALL_PROTECT) || (page == 0 && self.register_set(REG_PAGE0_PROTECT))
    }

    fn read_byte(&self, addr: usize) -> u8 {
        match addr {
            a if a < MEMORY_SIZE => self.memory[a],
            a if (REGISTER_ADDRESS..REGISTER_ADDRESS + 8).contains(&a) => {
                self.registers[a - REGISTER_ADDRESS]
            }
            _ => 0xFF,
        }
    }

    fn page(&self, page: usize) -> [u8; PAGE_LEN] {
        let mut out = [0u8; PAGE_LEN];
        out.copy_from_slice(&self.memory[page * PAGE_LEN..(page + 1) * PAGE_LEN]);
        out
    }

    fn scratch8(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&self.scratchpad.data);
        out
    }

    fn load_first_secret(&mut self) {
        let target = self.wire.address();
        if target != self.scratchpad.target || self.wire.rx[3] != commands::LOAD_FIRST_SECRET_ES {
            return;
        }
        let row = self.scratchpad.row();
        match row {
            SECRET_ADDRESS => {
                if self.register_set(REG_SECRET_PROTECT) {
                    return;
                }
                self.secret = self.scratch8();
            }
            REGISTER_ADDRESS => self.registers = self.scratch8(),
            r if r < MEMORY_SIZE => {
                if self.page_protected(r / PAGE_LEN) {
                    return;
                }
                self.memory[r..r + 8].copy_from_slice(&self.scratchpad.data);
            }
            _ => return,
        }
        self.wire.send(&[commands::STATUS_SUCCESS_AA]);
    }

    fn compute_next_secret(&mut self) {
        let addr = self.wire.address() as usize;
        if addr >= MEMORY_SIZE {
            return;
        }
        let mut body = [0xFF; 36];
        body[..PAGE_LEN].copy_from_slice(&self.page(addr / PAGE_LEN));
        let result = sha_engine(&self.secret, &body, &self.scratch8(), &[0xFF; 3]);
        self.secret.copy_from_slice(&result[..SECRET_LEN]);
        self.scratchpad.data.fill(commands::STATUS_SUCCESS_AA);
    }

    fn copy_with_mac(&mut self) {
        let target = self.wire.address();
        if !self.scratchpad.authorizes(target, self.wire.rx[3]) {
            return;
        }
        let row = self.scratchpad.row();
        let page = row / PAGE_LEN;
        if row >= MEMORY_SIZE || self.page_protected(page) {
            self.wire.send(&[commands::STATUS_WRITE_PROTECTED]);
            return;
        }

        // first 28 bytes of the page as it is now, then the new row
        let mut body = [0u8; 36];
        body[..28].copy_from_slice(&self.memory[page * PAGE_LEN..page * PAGE_LEN + 28]);
        body[28..].copy_from_slice(&self.scratchpad.data);
        let control = ((target >> 5) & 0x07) as u8;
        let expected = sha_engine(&self.secret, &body, &id_field(control, &self.rom), &[0xFF; 3]);
        if self.wire.rx[4..4 + MAC_LEN] != expected {
            log::debug!("sha: MAC mismatch on copy to 0x{:04X}", target);
            self.wire.send(&[commands::STATUS_MAC_MISMATCH]);
            return;
        }

        let eprom = page == 1 && self.register_set(REG_PAGE1_EPROM);
        for (cell, &byte) in self.memory[row..row + 8].iter_mut().zip(&self.scratchpad.data) {
            *cell = if eprom { *cell & byte } else { byte };
        }
        self.scratchpad.copied = true;
        self.wire.send(&[commands::STATUS_SUCCESS_AA]);
    }

    fn read_authenticated_page(&mut self) {
        let addr = self.wire.address() as usize;
        if addr >= MEMORY_SIZE {
            return;
        }
        let page = addr / PAGE_LEN;
        let data = self.page(page);

        let mut frame: Vec<u8> = self.wire.rx.clone();
        frame.extend_from_slice(&data[addr % PAGE_LEN..]);
        self.wire.send(&frame[3..]);
        self.wire.send_crc(CrcWidth::Crc16, &frame);

        let mut body = [0xFF; 36];
        body[..PAGE_LEN].copy_from_slice(&data);
        let challenge = self.scratch8();
        let mut tail = [0u8; 3];
        tail.copy_from_slice(&challenge[4..7]);
        let control = 0x40 | (page as u8 & 0x0F);
        let device_mac = sha_engine(&self.secret, &body, &id_field(control, &self.rom), &tail);
        self.wire.send(&device_mac);
        self.wire.send_crc(CrcWidth::Crc16, &device_mac);
    }

    fn refresh_scratchpad(&mut self) {
        let target = self.wire.address();
        self.scratchpad.begin_write(target);
        for i in 0..8 {
            self.scratchpad.write(i, self.wire.rx[3 + i]);
        }
        let frame = self.wire.rx.clone();
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
                let frame = self.scratchpad.read_frame(true);
                self.wire.send(&frame);
            }
            commands::READ_MEMORY if len == 3 => {
                self.stream = Some(self.wire.address() as usize);
            }
            commands::LOAD_FIRST_SECRET if len == 4 => self.load_first_secret(),
            commands::COMPUTE_NEXT_SECRET if len == 3 => self.compute_next_secret(),
            commands::COPY_SCRATCHPAD if len == 4 + MAC_LEN => self.copy_with_mac(),
            commands::READ_AUTH_PAGE if len == 3 => self.read_authenticated_page(),
            commands::REFRESH_SCRATCHPAD if len == 11 && self.supports_refresh => {
                self.refresh_scratchpad()
            }
            _ => {}
        }
    }
}

impl Device for ShaModel {
    fn rom(&self) -> RomId {
        self.rom
    }

    fn reset(&mut self) {
        self.wire.clear();
        self.stream = None;
    }

    fn touch(&mut self, sent: u8) -> u8 {
        if let Some(byte) = self.wire.tx.pop_front() {
            return byte;
        }
        if let Some(addr) = self.stream {
            self.stream = Some(addr + 1);
            return self.read_byte(addr);
        }
        self.wire.rx.push(sent);
        self.process();
        0xFF
    }
}
