//! The memory bank engine driven against the emulated devices

mod eeprom;
mod eprom;
mod sha;
mod speed;

use owmem_core::bus::RomId;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rom(family: u8) -> RomId {
    RomId::from_parts(family, [0x5A, 0x3C, 0x11, 0x27, 0x00, 0x00])
}
