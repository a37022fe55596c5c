use owmem_core::bank::{
    BankFlags, BankId, DeviceProfile, MemoryBank, ScratchpadSpec, WriteStrategy,
};
use owmem_core::bus::{commands, BusSpeed};
use owmem_core::device::{CrcVerifiable, Paged, PasswordProtected, Readable, Writable};
use owmem_core::{families, DeviceContext, Error};
use proptest::prelude::*;

use super::{init_logging, rom};
use crate::{DummyBus, EepromConfig, EepromModel};

const SCRATCHPAD: BankId = BankId(0);
const MAIN: BankId = BankId(1);

const PASSWORD: [u8; 8] = *b"letmein!";

fn ds2433() -> (DummyBus<EepromModel>, DeviceContext) {
    init_logging();
    let rom = rom(families::FAMILY_DS2433);
    let bus = DummyBus::new(EepromModel::new(EepromConfig::ds2433(rom)));
    let ctx = DeviceContext::for_rom(rom).unwrap();
    (bus, ctx)
}

fn ds1963l() -> (DummyBus<EepromModel>, DeviceContext) {
    init_logging();
    let rom = rom(families::FAMILY_DS1963L);
    let bus = DummyBus::new(EepromModel::new(EepromConfig::ds1963l(rom)));
    let ctx = DeviceContext::for_rom(rom).unwrap();
    (bus, ctx)
}

fn ds1977_profile() -> DeviceProfile {
    DeviceProfile {
        family: 0x37,
        name: String::from("DS1977"),
        speed: BusSpeed::Regular,
        scratchpad: Some(ScratchpadSpec {
            length: 64,
            read_crc: true,
            copy_delay_us: commands::T_PROG_EEPROM_US,
        }),
        sha: None,
        banks: vec![MemoryBank::new("Main Memory", 0, 510, 64)
            .with_flags(BankFlags::GENERAL_PURPOSE | BankFlags::READ_WRITE | BankFlags::NON_VOLATILE)
            .with_write(WriteStrategy::CopyWithPassword)],
    }
}

#[test]
fn test_write_read_across_scratchpad_rows() {
    let (mut bus, mut ctx) = ds2433();
    let data: Vec<u8> = (0..40).collect();

    ctx.bank(&mut bus, MAIN).unwrap().write(0x10, &data).unwrap();
    assert_eq!(&bus.device().memory()[0x10..0x38], &data[..]);
    assert_eq!(bus.device().write_cycles(0), 1);
    assert_eq!(bus.device().write_cycles(1), 1);

    let mut buf = [0u8; 40];
    ctx.bank(&mut bus, MAIN).unwrap().read(0x10, false, &mut buf).unwrap();
    assert_eq!(&buf[..], &data[..]);
}

#[test]
fn test_partial_write_keeps_neighbours() {
    let (mut bus, mut ctx) = ds2433();
    for (i, byte) in bus.device_mut().memory_mut().iter_mut().enumerate() {
        *byte = i as u8;
    }

    ctx.bank(&mut bus, MAIN).unwrap().write(0x25, &[0xA0, 0xA1, 0xA2]).unwrap();

    let memory = bus.device().memory();
    assert_eq!(&memory[0x25..0x28], &[0xA0, 0xA1, 0xA2]);
    assert_eq!(memory[0x24], 0x24);
    assert_eq!(memory[0x28], 0x28);
    assert_eq!(memory[0x3F], 0x3F);
    assert_eq!(memory[0x1F], 0x1F);
}

#[test]
fn test_repeated_write_is_stable() {
    let (mut bus, mut ctx) = ds2433();
    let data = [0x5Au8; 12];
    ctx.bank(&mut bus, MAIN).unwrap().write(0x7A, &data).unwrap();
    let first = bus.device().memory().to_vec();
    ctx.bank(&mut bus, MAIN).unwrap().write(0x7A, &data).unwrap();
    assert_eq!(bus.device().memory(), &first[..]);
}

#[test]
fn test_continued_raw_read() {
    let (mut bus, mut ctx) = ds2433();
    let data: Vec<u8> = (0..64).map(|i| 0xFF - i).collect();
    ctx.bank(&mut bus, MAIN).unwrap().write(0, &data).unwrap();

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    let mut first = [0u8; 20];
    let mut second = [0u8; 44];
    bank.read(0, false, &mut first).unwrap();
    bank.read(20, true, &mut second).unwrap();
    assert_eq!(&first[..], &data[..20]);
    assert_eq!(&second[..], &data[20..]);

    // a continued read must start where the last one ended
    assert_eq!(bank.read(0, true, &mut first), Err(Error::NotContinuable));
}

#[test]
fn test_scratchpad_bank() {
    let (mut bus, mut ctx) = ds2433();
    ctx.bank(&mut bus, SCRATCHPAD).unwrap().write(4, &[1, 2, 3]).unwrap();
    assert_eq!(&bus.device().scratchpad()[4..7], &[1, 2, 3]);
    assert!(bus.device().memory().iter().all(|&b| b == 0xFF));

    let mut buf = [0u8; 3];
    ctx.bank(&mut bus, SCRATCHPAD).unwrap().read(4, false, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3]);

    let mut page = [0u8; 32];
    ctx.bank(&mut bus, SCRATCHPAD).unwrap().read_page(0, false, &mut page).unwrap();
    assert_eq!(&page[4..7], &[1, 2, 3]);
}

#[test]
fn test_scratchpad_write_is_invisible_until_copied() {
    let (mut bus, mut ctx) = ds2433();
    ctx.bank(&mut bus, MAIN).unwrap().write(0x04, &[0x10, 0x20, 0x30]).unwrap();

    // staged for the same address, never copied
    ctx.bank(&mut bus, SCRATCHPAD).unwrap().write(0x04, &[0xE1, 0xE2, 0xE3]).unwrap();

    let mut buf = [0u8; 3];
    ctx.bank(&mut bus, MAIN).unwrap().read(0x04, false, &mut buf).unwrap();
    assert_eq!(buf, [0x10, 0x20, 0x30]);
    ctx.bank(&mut bus, SCRATCHPAD).unwrap().read(0x04, false, &mut buf).unwrap();
    assert_eq!(buf, [0xE1, 0xE2, 0xE3]);
}

#[test]
fn test_packet_round_trip() {
    let (mut bus, mut ctx) = ds2433();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.write_page_packet(2, b"hello, bus").unwrap();

    let mut buf = [0u8; 29];
    let len = bank.read_page_packet(2, false, &mut buf).unwrap();
    assert_eq!(&buf[..len], b"hello, bus");

    // erased page is not a valid packet
    assert_eq!(
        bank.read_page_packet(3, false, &mut buf),
        Err(Error::InvalidPacketLength)
    );
}

#[test]
fn test_packet_too_long_is_rejected_before_the_bus() {
    let (mut bus, mut ctx) = ds2433();
    let result = ctx.bank(&mut bus, MAIN).unwrap().write_page_packet(0, &[0; 30]);
    assert_eq!(result, Err(Error::PacketTooLong));
    assert_eq!(bus.stats().selects, 0);
}

#[test]
fn test_out_of_bounds_write_has_no_bus_traffic() {
    let (mut bus, mut ctx) = ds2433();
    let result = ctx.bank(&mut bus, MAIN).unwrap().write(0x1F0, &[0; 32]);
    assert_eq!(result, Err(Error::AddressOutOfBounds));

    let mut page = [0u8; 32];
    let result = ctx.bank(&mut bus, MAIN).unwrap().read_page(16, false, &mut page);
    assert_eq!(result, Err(Error::PageOutOfRange));

    assert_eq!(bus.stats().selects, 0);
    assert_eq!(bus.stats().speed_changes, 0);
}

#[test]
fn test_page_crc_unsupported() {
    let (mut bus, mut ctx) = ds2433();
    let mut page = [0u8; 32];
    let result = ctx.bank(&mut bus, MAIN).unwrap().read_page_crc(0, false, &mut page);
    assert_eq!(result, Err(Error::Unsupported("page CRC read")));
}

#[test]
fn test_write_cycle_counter() {
    let (mut bus, mut ctx) = ds1963l();
    ctx.bank(&mut bus, MAIN).unwrap().write(3 * 32, &[0xAB; 32]).unwrap();
    ctx.bank(&mut bus, MAIN).unwrap().write(3 * 32, &[0xCD; 32]).unwrap();

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    assert_eq!(bank.descriptor().extra_info_description(), Some("Write cycle counter"));

    let mut page = [0u8; 32];
    let mut extra = [0u8; 8];
    bank.read_page_extra(3, false, &mut page, &mut extra).unwrap();
    assert_eq!(page, [0xCD; 32]);
    assert_eq!(extra, [2, 0, 0, 0, 0, 0, 0, 0]);

    // the next page continues the same transaction
    bank.read_page_extra(4, true, &mut page, &mut extra).unwrap();
    assert_eq!(page, [0xFF; 32]);
    assert_eq!(extra, [0; 8]);
}

#[test]
fn test_read_pages_with_counter_frames() {
    let (mut bus, mut ctx) = ds1963l();
    ctx.bank(&mut bus, MAIN).unwrap().write(2 * 32, &[0x11; 64]).unwrap();
    bus.clear_stats();

    let mut buf = [0u8; 96];
    ctx.bank(&mut bus, MAIN).unwrap().read_pages_crc(1, &mut buf).unwrap();
    assert_eq!(&buf[..32], &[0xFF; 32]);
    assert_eq!(&buf[32..], &[0x11; 64]);
    assert_eq!(bus.stats().selects, 1);
}

#[test]
fn test_password_copy() {
    init_logging();
    let rom = rom(0x37);
    let mut bus = DummyBus::new(EepromModel::new(EepromConfig::ds1977(rom, PASSWORD)));
    let mut ctx = DeviceContext::new(rom, ds1977_profile()).unwrap();
    let data = [0x42; 10];

    let mut bank = ctx.bank(&mut bus, BankId(0)).unwrap();
    assert_eq!(bank.write(0x40, &data), Err(Error::Unsupported("write without password")));

    // a wrong password leaves the device silent
    assert_eq!(
        bank.write_with_password(0x40, &data, b"guessing"),
        Err(Error::UnexpectedStatus(0xFF))
    );
    drop(bank);
    assert_eq!(bus.device().memory()[0x40], 0xFF);

    ctx.bank(&mut bus, BankId(0))
        .unwrap()
        .write_with_password(0x40, &data, &PASSWORD)
        .unwrap();
    assert_eq!(&bus.device().memory()[0x40..0x4A], &data);
    assert_eq!(bus.device().memory()[0x4A], 0xFF);
}

#[test]
fn test_password_on_plain_bank() {
    let (mut bus, mut ctx) = ds2433();
    let result = ctx.bank(&mut bus, MAIN).unwrap().write_with_password(0, &[1], &PASSWORD);
    assert_eq!(result, Err(Error::Unsupported("password copy")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_write_overlays_memory(
        addr in 0u32..=416,
        data in proptest::collection::vec(any::<u8>(), 1..=96),
    ) {
        let (mut bus, mut ctx) = ds2433();
        for (i, byte) in bus.device_mut().memory_mut().iter_mut().enumerate() {
            *byte = (i * 7) as u8;
        }
        let mut expected = bus.device().memory().to_vec();
        expected[addr as usize..addr as usize + data.len()].copy_from_slice(&data);

        ctx.bank(&mut bus, MAIN).unwrap().write(addr, &data).unwrap();
        prop_assert_eq!(bus.device().memory(), &expected[..]);
    }
}
