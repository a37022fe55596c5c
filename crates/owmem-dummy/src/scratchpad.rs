//! Scratchpad register file shared by the EEPROM and SHA models

use alloc::vec;
use alloc::vec::Vec;

use owmem_core::bus::commands;
use owmem_core::crc::CrcWidth;

/// Authorization accepted flag in the E/S register
const ES_AA: u8 = 0x80;

#[derive(Debug, Clone)]
pub(crate) struct Scratchpad {
    pub data: Vec<u8>,
    pub target: u32,
    /// Ending offset of the last write
    pub ending: u8,
    pub copied: bool,
}

impl Scratchpad {
    pub fn new(length: usize) -> Self {
        Self {
            data: vec![0xFF; length],
            target: 0,
            ending: 0,
            copied: false,
        }
    }

    pub fn mask(&self) -> u32 {
        self.data.len() as u32 - 1
    }

    /// Start of the memory row the scratchpad maps onto
    pub fn row(&self) -> usize {
        (self.target & !self.mask()) as usize
    }

    /// Offset of the target address within the scratchpad
    pub fn start(&self) -> usize {
        (self.target & self.mask()) as usize
    }

    pub fn begin_write(&mut self, target: u32) {
        self.target = target;
        self.ending = self.start() as u8;
        self.copied = false;
    }

    /// Store the `index`-th data byte of a Write Scratchpad
    pub fn write(&mut self, index: usize, byte: u8) {
        let offset = self.start() + index;
        if let Some(slot) = self.data.get_mut(offset) {
            *slot = byte;
            self.ending = offset as u8;
        }
    }

    /// Whether a copy command repeats the address registers
    pub fn authorizes(&self, target: u32, es: u8) -> bool {
        target == self.target && es == self.ending
    }

    /// Bytes sent after a Read Scratchpad command
    pub fn read_frame(&self, with_crc: bool) -> Vec<u8> {
        let es = if self.copied { self.ending | ES_AA } else { self.ending };
        let mut frame = vec![
            commands::READ_SCRATCHPAD,
            self.target as u8,
            (self.target >> 8) as u8,
            es,
        ];
        frame.extend_from_slice(&self.data);
        if with_crc {
            let trailer = CrcWidth::Crc16.trailer(0, &frame);
            frame.extend_from_slice(&trailer);
        }
        frame.remove(0);
        frame
    }
}
