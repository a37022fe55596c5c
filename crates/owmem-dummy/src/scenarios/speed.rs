use owmem_core::bank::BankId;
use owmem_core::bus::{BusSpeed, MasterFeatures, OneWireMaster};
use owmem_core::device::Readable;
use owmem_core::speed::SpeedState;
use owmem_core::{families, DeviceContext, Error};

use super::{init_logging, rom};
use crate::{DummyBus, EepromConfig, EepromModel};

const MAIN: BankId = BankId(1);

fn ds2433() -> (DummyBus<EepromModel>, DeviceContext) {
    init_logging();
    let rom = rom(families::FAMILY_DS2433);
    let bus = DummyBus::new(EepromModel::new(EepromConfig::ds2433(rom)));
    let ctx = DeviceContext::for_rom(rom).unwrap();
    (bus, ctx)
}

fn read_byte(bus: &mut DummyBus<EepromModel>, ctx: &mut DeviceContext) -> owmem_core::Result<u8> {
    let mut buf = [0u8; 1];
    ctx.bank(bus, MAIN)?.read(0, false, &mut buf)?;
    Ok(buf[0])
}

#[test]
fn test_speed_negotiated_once() {
    let (mut bus, mut ctx) = ds2433();
    assert_eq!(ctx.state().speed().state(), SpeedState::Unknown);
    read_byte(&mut bus, &mut ctx).unwrap();
    read_byte(&mut bus, &mut ctx).unwrap();
    assert_eq!(ctx.state().speed().state(), SpeedState::Ok);
    assert_eq!(bus.stats().speed_changes, 1);
    assert_eq!(bus.stats().selects, 2);
}

#[test]
fn test_bus_failure_forces_renegotiation() {
    let (mut bus, mut ctx) = ds2433();
    read_byte(&mut bus, &mut ctx).unwrap();

    bus.fail_next_select();
    assert_eq!(read_byte(&mut bus, &mut ctx), Err(Error::DeviceNotPresent));
    assert_eq!(ctx.state().speed().state(), SpeedState::Unknown);

    // renegotiated, not retried
    assert_eq!(bus.stats().speed_changes, 1);
    assert_eq!(read_byte(&mut bus, &mut ctx), Ok(0xFF));
    assert_eq!(bus.stats().speed_changes, 2);
}

#[test]
fn test_configuration_error_keeps_speed() {
    let (mut bus, mut ctx) = ds2433();
    read_byte(&mut bus, &mut ctx).unwrap();

    let mut buf = [0u8; 2];
    let result = ctx.bank(&mut bus, MAIN).unwrap().read(511, false, &mut buf);
    assert_eq!(result, Err(Error::AddressOutOfBounds));
    assert_eq!(ctx.state().speed().state(), SpeedState::Ok);

    read_byte(&mut bus, &mut ctx).unwrap();
    assert_eq!(bus.stats().speed_changes, 1);
}

#[test]
fn test_absent_device() {
    let (mut bus, mut ctx) = ds2433();
    bus.set_present(false);
    assert_eq!(read_byte(&mut bus, &mut ctx), Err(Error::DeviceNotPresent));
    bus.set_present(true);
    assert_eq!(read_byte(&mut bus, &mut ctx), Ok(0xFF));
}

#[test]
fn test_overdrive() {
    let (mut bus, mut ctx) = ds2433();
    ctx.bank(&mut bus, MAIN).unwrap().read(0, false, &mut [0u8; 4]).unwrap();
    bus.device_mut().memory_mut()[0] = 0x42;

    ctx.set_speed(BusSpeed::Overdrive);
    assert_eq!(read_byte(&mut bus, &mut ctx), Ok(0x42));
    assert_eq!(bus.speed(), BusSpeed::Overdrive);
    // regular, then overdrive after the overdrive skip ROM
    assert_eq!(bus.stats().speed_changes, 3);
    assert_eq!(bus.stats().resets, 1);

    read_byte(&mut bus, &mut ctx).unwrap();
    assert_eq!(bus.stats().speed_changes, 3);
}

#[test]
fn test_overdrive_lost() {
    let (mut bus, mut ctx) = ds2433();
    ctx.set_speed(BusSpeed::Overdrive);
    read_byte(&mut bus, &mut ctx).unwrap();

    bus.drop_overdrive();
    assert_eq!(read_byte(&mut bus, &mut ctx), Err(Error::DeviceNotPresent));
    assert_eq!(read_byte(&mut bus, &mut ctx), Ok(0xFF));
    assert_eq!(bus.stats().speed_changes, 4);
    assert_eq!(bus.stats().resets, 2);
}

#[test]
fn test_overdrive_unsupported_by_master() {
    init_logging();
    let rom = rom(families::FAMILY_DS2433);
    let mut bus = DummyBus::new(EepromModel::new(EepromConfig::ds2433(rom)))
        .with_features(MasterFeatures::POWER_DELIVERY | MasterFeatures::PROGRAM_PULSE);
    let mut ctx = DeviceContext::for_rom(rom).unwrap();
    ctx.set_speed(BusSpeed::Overdrive);

    assert_eq!(read_byte(&mut bus, &mut ctx), Err(Error::Unsupported("overdrive")));
    assert_eq!(bus.stats().selects, 0);
}
