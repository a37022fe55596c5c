use owmem_core::bank::BankId;
use owmem_core::bus::MasterFeatures;
use owmem_core::device::{CrcVerifiable, Otp, Paged, Readable, Writable};
use owmem_core::speed::SpeedState;
use owmem_core::{families, DeviceContext, Error};

use super::{init_logging, rom};
use crate::{DummyBus, EpromConfig, EpromModel};

const MAIN: BankId = BankId(0);
const STATUS: BankId = BankId(1);

fn ds1982() -> (DummyBus<EpromModel>, DeviceContext) {
    init_logging();
    let rom = rom(families::FAMILY_DS1982);
    let bus = DummyBus::new(EpromModel::new(EpromConfig::ds1982(rom)));
    let ctx = DeviceContext::for_rom(rom).unwrap();
    (bus, ctx)
}

fn ds2506() -> (DummyBus<EpromModel>, DeviceContext) {
    init_logging();
    let rom = rom(families::FAMILY_DS2506);
    let bus = DummyBus::new(EpromModel::new(EpromConfig::ds2506(rom)));
    let ctx = DeviceContext::for_rom(rom).unwrap();
    (bus, ctx)
}

#[test]
fn test_crc8_program_and_read() {
    let (mut bus, mut ctx) = ds1982();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.write(0x08, b"add-only").unwrap();

    let mut buf = [0u8; 8];
    bank.read(0x08, false, &mut buf).unwrap();
    assert_eq!(&buf, b"add-only");

    let mut page = [0u8; 32];
    bank.read_page_crc(0, false, &mut page).unwrap();
    assert_eq!(&page[8..16], b"add-only");
    assert_eq!(page[16], 0xFF);
    drop(bank);

    // one pulse per byte
    assert_eq!(bus.stats().program_pulses, 8);
}

#[test]
fn test_crc16_program_and_read() {
    let (mut bus, mut ctx) = ds2506();
    let data: Vec<u8> = (0..40).map(|i| i as u8).collect();
    ctx.bank(&mut bus, MAIN).unwrap().write(0x1F10, &data).unwrap();
    assert_eq!(&bus.device().memory()[0x1F10..0x1F38], &data[..]);

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    let mut page = [0u8; 32];
    let mut extra = [0u8; 1];
    bank.read_page_extra(0xF9, false, &mut page, &mut extra).unwrap();
    assert_eq!(&page[..24], &data[16..]);
    assert_eq!(&page[24..], &[0xFF; 8]);
    assert_eq!(extra, [0xFF]);
}

#[test]
fn test_programming_clears_bits_only() {
    let (mut bus, mut ctx) = ds1982();
    ctx.bank(&mut bus, MAIN).unwrap().write(0, &[0xF0]).unwrap();

    ctx.set_write_verification(MAIN, false).unwrap();
    ctx.bank(&mut bus, MAIN).unwrap().write(0, &[0x3C]).unwrap();
    assert_eq!(bus.device().memory()[0], 0x30);

    ctx.set_write_verification(MAIN, true).unwrap();
    let result = ctx.bank(&mut bus, MAIN).unwrap().write(0, &[0x0F]);
    assert_eq!(result, Err(Error::VerifyMismatch { addr: 0 }));
    assert_eq!(bus.device().memory()[0], 0x00);
}

#[test]
fn test_reprogramming_same_data_verifies() {
    let (mut bus, mut ctx) = ds1982();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.write(0x40, &[0x12, 0x34]).unwrap();
    bank.write(0x40, &[0x12, 0x34]).unwrap();
    drop(bank);
    assert_eq!(&bus.device().memory()[0x40..0x42], &[0x12, 0x34]);
}

#[test]
fn test_lock_page() {
    let (mut bus, mut ctx) = ds1982();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    assert!(!bank.is_page_locked(1).unwrap());
    bank.lock_page(1).unwrap();
    assert!(bank.is_page_locked(1).unwrap());
    assert!(!bank.is_page_locked(0).unwrap());
    drop(bank);
    assert_eq!(bus.device().status()[0], 0xFD);

    // known locks are answered without the bus
    bus.clear_stats();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.lock_page(1).unwrap();
    assert_eq!(bank.write(0x20, &[0x00]), Err(Error::PageLocked));
    drop(bank);
    assert_eq!(bus.stats().selects, 0);
    assert_eq!(bus.stats().program_pulses, 0);
    assert_eq!(bus.device().memory()[0x20], 0xFF);

    // a fresh context reads the lock back from status memory
    let mut fresh = DeviceContext::for_rom(*ctx.rom()).unwrap();
    assert!(fresh.bank(&mut bus, MAIN).unwrap().is_page_locked(1).unwrap());
    assert!(fresh.state().is_known_locked(MAIN, 1));
}

#[test]
fn test_locking_unsupported_on_status_bank() {
    let (mut bus, mut ctx) = ds1982();
    let result = ctx.bank(&mut bus, STATUS).unwrap().lock_page(0);
    assert_eq!(result, Err(Error::Unsupported("page locking")));
}

#[test]
fn test_redirect_page() {
    let (mut bus, mut ctx) = ds2506();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    assert_eq!(bank.get_redirected_page(3).unwrap(), None);

    bank.redirect_page(3, 7).unwrap();
    assert_eq!(bank.get_redirected_page(3).unwrap(), Some(7));
    assert_eq!(bank.get_redirected_page(4).unwrap(), None);

    // same target again is a no-op, a different one is refused
    bank.redirect_page(3, 7).unwrap();
    assert_eq!(bank.redirect_page(3, 9), Err(Error::AlreadyRedirected));
    assert_eq!(bank.redirect_page(4, 0), Err(Error::PageOutOfRange));

    let mut page = [0u8; 32];
    let mut extra = [0u8; 1];
    bank.read_page_extra(3, false, &mut page, &mut extra).unwrap();
    assert_eq!(extra, [!7]);
    drop(bank);
    assert_eq!(bus.device().status()[0x103], 0xF8);
}

#[test]
fn test_redirect_lock() {
    let (mut bus, mut ctx) = ds2506();
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    assert!(!bank.is_redirect_page_locked(5).unwrap());
    bank.lock_redirect_page(5).unwrap();
    assert!(bank.is_redirect_page_locked(5).unwrap());
    assert_eq!(bank.redirect_page(5, 6), Err(Error::PageLocked));
    assert_eq!(bank.get_redirected_page(5).unwrap(), None);
    drop(bank);
    assert_eq!(bus.device().status()[0x20], 0xDF);
}

#[test]
fn test_redirect_unsupported_without_target() {
    let (mut bus, mut ctx) = ds1982();
    let result = ctx.bank(&mut bus, MAIN).unwrap().is_redirect_page_locked(0);
    assert_eq!(result, Err(Error::Unsupported("redirection locking")));
}

#[test]
fn test_continued_page_reads() {
    let (mut bus, mut ctx) = ds2506();
    ctx.bank(&mut bus, MAIN).unwrap().write(32, &[0x5A; 64]).unwrap();
    ctx.bank(&mut bus, MAIN).unwrap().redirect_page(2, 9).unwrap();
    bus.clear_stats();

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    let mut buf = [0u8; 96];
    bank.read_pages_crc(1, &mut buf).unwrap();
    assert_eq!(&buf[..64], &[0x5A; 64]);
    assert_eq!(&buf[64..], &[0xFF; 32]);

    let mut page = [0u8; 32];
    let mut extra = [0u8; 1];
    bank.read_page_crc(1, false, &mut page).unwrap();
    bank.read_page_extra(2, true, &mut page, &mut extra).unwrap();
    assert_eq!(extra, [!9]);
    assert_eq!(bank.read_page_crc(7, true, &mut page), Err(Error::NotContinuable));
    drop(bank);
    assert_eq!(bus.stats().selects, 2);
}

#[test]
fn test_status_bank_read() {
    let (mut bus, mut ctx) = ds2506();
    ctx.bank(&mut bus, MAIN).unwrap().lock_page(9).unwrap();
    let mut status = [0u8; 8];
    ctx.bank(&mut bus, STATUS).unwrap().read_page(0, false, &mut status).unwrap();
    assert_eq!(status, [0xFF, 0xFD, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_corrupted_page_read() {
    let (mut bus, mut ctx) = ds1982();
    let mut page = [0u8; 32];
    bus.corrupt_read(5);
    let result = ctx.bank(&mut bus, MAIN).unwrap().read_page_crc(0, false, &mut page);
    assert_eq!(result, Err(Error::CrcMismatch));
    assert_eq!(ctx.state().speed().state(), SpeedState::Unknown);

    ctx.bank(&mut bus, MAIN).unwrap().read_page_crc(0, false, &mut page).unwrap();
    assert_eq!(page, [0xFF; 32]);
    assert_eq!(bus.stats().speed_changes, 2);
}

#[test]
fn test_program_pulse_required() {
    init_logging();
    let rom = rom(families::FAMILY_DS1982);
    let mut bus = DummyBus::new(EpromModel::new(EpromConfig::ds1982(rom)))
        .with_features(MasterFeatures::POWER_DELIVERY | MasterFeatures::OVERDRIVE);
    let mut ctx = DeviceContext::for_rom(rom).unwrap();

    let result = ctx.bank(&mut bus, MAIN).unwrap().write(0, &[0x00]);
    assert_eq!(result, Err(Error::ProgramPulseUnsupported));
    assert_eq!(bus.stats().selects, 0);
}
