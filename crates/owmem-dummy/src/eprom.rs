//! Add-only memory model
//!
//! Data and status memory start erased (`0xFF`). Programming clears bits
//! only, and only on a program pulse. A page whose lock bit in status
//! memory is cleared ignores programming.

use alloc::vec;
use alloc::vec::Vec;

use owmem_core::bus::{commands, RomId};
use owmem_core::crc::CrcWidth;

use crate::{Device, Wire};

/// Geometry and command set of an emulated EPROM
#[derive(Debug, Clone)]
pub struct EpromConfig {
    /// ROM id
    pub rom: RomId,
    /// CRC protecting every frame
    pub crc: CrcWidth,
    /// Data memory size in bytes
    pub memory_size: usize,
    /// Page length in bytes
    pub page_length: usize,
    /// Status memory size in bytes
    pub status_size: usize,
    /// Page read command with per-page CRC
    pub page_read_opcode: u8,
    /// The page read sends the page's redirection byte first
    pub page_read_redirect: bool,
    /// Status offset of the page lock bits
    pub lock_offset: usize,
    /// Status offset of the redirection bytes
    pub redirect_offset: usize,
}

impl EpromConfig {
    /// DS1982: 128 bytes, CRC8, 8 bytes of status memory
    pub fn ds1982(rom: RomId) -> Self {
        Self {
            rom,
            crc: CrcWidth::Crc8,
            memory_size: 128,
            page_length: 32,
            status_size: 8,
            page_read_opcode: commands::EPROM_READ_PAGE_CRC8,
            page_read_redirect: false,
            lock_offset: 0,
            redirect_offset: 1,
        }
    }

    /// DS2506: 8 KiB, CRC16, 512 bytes of status memory
    pub fn ds2506(rom: RomId) -> Self {
        Self {
            rom,
            crc: CrcWidth::Crc16,
            memory_size: 8192,
            page_length: 32,
            status_size: 512,
            page_read_opcode: commands::EPROM_EXTENDED_READ,
            page_read_redirect: true,
            lock_offset: 0,
            redirect_offset: 0x100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Area {
    Memory,
    Status,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    None,
    Raw(Area, usize),
    Pages(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramState {
    AwaitPulse,
    AwaitNext,
}

#[derive(Debug, Clone, Copy)]
struct Program {
    area: Area,
    addr: usize,
    data: u8,
    state: ProgramState,
}

/// Emulated add-only memory
pub struct EpromModel {
    config: EpromConfig,
    memory: Vec<u8>,
    status: Vec<u8>,
    wire: Wire,
    stream: Stream,
    program: Option<Program>,
}

impl EpromModel {
    /// Create a device with erased memory
    pub fn new(config: EpromConfig) -> Self {
        Self {
            memory: vec![0xFF; config.memory_size],
            status: vec![0xFF; config.status_size],
            wire: Wire::default(),
            stream: Stream::None,
            program: None,
            config,
        }
    }

    /// Data memory content
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Status memory content
    pub fn status(&self) -> &[u8] {
        &self.status
    }

    /// Status memory content, mutably
    pub fn status_mut(&mut self) -> &mut [u8] {
        &mut self.status
    }

    fn area(&self, area: Area) -> &[u8] {
        match area {
            Area::Memory => &self.memory,
            Area::Status => &self.status,
        }
    }

    fn is_locked(&self, page: usize) -> bool {
        let byte = self.status[self.config.lock_offset + page / 8];
        byte & (1 << (page % 8)) == 0
    }

    fn redirect_byte(&self, page: usize) -> u8 {
        self.status[self.config.redirect_offset + page]
    }

    /// Queue one page of a page CRC read
    ///
    /// `header` is the command and address on the first page; its CRC
    /// then also covers them.
    fn send_page(&mut self, page: usize, start: usize, header: &[u8]) {
        let crc = self.config.crc;
        if self.config.page_read_redirect {
            let mut frame = header.to_vec();
            frame.push(self.redirect_byte(page));
            self.wire.send(&frame[header.len()..]);
            self.wire.send_crc(crc, &frame);
        } else if !header.is_empty() {
            self.wire.send_crc(crc, header);
        }

        let base = page * self.config.page_length;
        let data = self.memory[base + start..base + self.config.page_length].to_vec();
        self.wire.send(&data);
        self.wire.send_crc(crc, &data);
    }

    fn begin_program(&mut self, area: Area) {
        let addr = self.wire.address() as usize;
        let data = self.wire.rx[3];
        if addr >= self.area(area).len() {
            return;
        }
        let frame = self.wire.rx.clone();
        self.wire.send_crc(self.config.crc, &frame);
        self.program = Some(Program {
            area,
            addr,
            data,
            state: ProgramState::AwaitPulse,
        });
    }

    /// Next byte of a continued program sequence
    fn continue_program(&mut self, mut program: Program, data: u8) {
        program.addr += 1;
        if program.addr >= self.area(program.area).len() {
            self.program = None;
            return;
        }
        program.data = data;
        program.state = ProgramState::AwaitPulse;

        let [lo, hi] = (program.addr as u16).to_le_bytes();
        let covered = match self.config.crc {
            CrcWidth::Crc8 => vec![lo, data],
            CrcWidth::Crc16 => vec![lo, hi, data],
        };
        self.wire.send_crc(self.config.crc, &covered);
        self.program = Some(program);
    }

    fn process(&mut self) {
        let cmd = self.wire.rx[0];
        if self.wire.rx.len() == 3 {
            let addr = self.wire.address() as usize;
            match cmd {
                commands::READ_MEMORY | commands::EPROM_READ_STATUS => {
                    let area = if cmd == commands::READ_MEMORY {
                        Area::Memory
                    } else {
                        Area::Status
                    };
                    let header = self.wire.rx.clone();
                    self.wire.send_crc(self.config.crc, &header);
                    self.stream = Stream::Raw(area, addr);
                }
                op if op == self.config.page_read_opcode => {
                    let page = addr / self.config.page_length;
                    if addr < self.memory.len() {
                        let header = self.wire.rx.clone();
                        self.send_page(page, addr % self.config.page_length, &header);
                        self.stream = Stream::Pages(page + 1);
                    }
                }
                _ => {}
            }
        } else if self.wire.rx.len() == 4 {
            match cmd {
                commands::EPROM_WRITE_MEMORY => self.begin_program(Area::Memory),
                commands::EPROM_WRITE_STATUS => self.begin_program(Area::Status),
                _ => {}
            }
        }
    }
}

impl Device for EpromModel {
    fn rom(&self) -> RomId {
        self.config.rom
    }

    fn reset(&mut self) {
        self.wire.clear();
        self.stream = Stream::None;
        self.program = None;
    }

    fn touch(&mut self, sent: u8) -> u8 {
        if let Some(byte) = self.wire.tx.pop_front() {
            return byte;
        }
        if let Some(program) = self.program {
            if program.state == ProgramState::AwaitNext {
                self.continue_program(program, sent);
            }
            return 0xFF;
        }
        match self.stream {
            Stream::Raw(area, addr) => {
                self.stream = Stream::Raw(area, addr + 1);
                return self.area(area).get(addr).copied().unwrap_or(0xFF);
            }
            Stream::Pages(page) => {
                if page * self.config.page_length >= self.memory.len() {
                    return 0xFF;
                }
                self.send_page(page, 0, &[]);
                self.stream = Stream::Pages(page + 1);
                return self.wire.tx.pop_front().unwrap_or(0xFF);
            }
            Stream::None => {}
        }
        self.wire.rx.push(sent);
        self.process();
        0xFF
    }

    fn program_pulse(&mut self) {
        let Some(mut program) = self.program else {
            return;
        };
        if program.state != ProgramState::AwaitPulse || !self.wire.tx.is_empty() {
            return;
        }

        let blocked =
            program.area == Area::Memory && self.is_locked(program.addr / self.config.page_length);
        let cell = match program.area {
            Area::Memory => &mut self.memory[program.addr],
            Area::Status => &mut self.status[program.addr],
        };
        if blocked {
            log::debug!("eprom: 0x{:04X} is in a locked page", program.addr);
        } else {
            *cell &= program.data;
        }
        let echo = *cell;
        self.wire.send(&[echo]);
        program.state = ProgramState::AwaitNext;
        self.program = Some(program);
    }
}
