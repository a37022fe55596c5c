use owmem_core::bank::{BankId, ShaSpec};
use owmem_core::bus::{MasterFeatures, RomId};
use owmem_core::device::{MacAuthenticated, Readable, Writable};
use owmem_core::mac::Secret;
use owmem_core::{families, DeviceContext, DeviceSession, Error};

use super::{init_logging, rom};
use crate::{Device, DummyBus, ShaModel};

const SCRATCHPAD: BankId = BankId(0);
const MAIN: BankId = BankId(1);
const REGISTERS: BankId = BankId(2);

const SECRET: Secret = [0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, 0xDC, 0xFE];

fn device() -> ShaModel {
    ShaModel::new(rom(families::FAMILY_DS1961S))
}

fn attach(model: ShaModel) -> (DummyBus<ShaModel>, DeviceContext) {
    init_logging();
    let ctx = DeviceContext::for_rom(model.rom()).unwrap();
    (DummyBus::new(model), ctx)
}

fn known(ctx: &DeviceContext) -> DeviceSession {
    DeviceSession::with_secret(*ctx.rom(), SECRET)
}

#[test]
fn test_load_first_secret() {
    let (mut bus, mut ctx) = attach(device());
    let mut session = DeviceSession::new(*ctx.rom());

    ctx.bank(&mut bus, MAIN)
        .unwrap()
        .load_first_secret(&mut session, 0x80, Some(&SECRET))
        .unwrap();
    assert_eq!(session.secret(), Some(&SECRET));
    assert_eq!(bus.device().secret(), &SECRET);
}

#[test]
fn test_load_into_memory_keeps_session() {
    let (mut bus, mut ctx) = attach(device());
    let mut session = known(&ctx);
    let data = [1, 2, 3, 4, 5, 6, 7, 8];

    ctx.bank(&mut bus, MAIN)
        .unwrap()
        .load_first_secret(&mut session, 0x10, Some(&data))
        .unwrap();
    assert_eq!(&bus.device().memory()[0x10..0x18], &data);
    assert_eq!(session.secret(), Some(&SECRET));
}

#[test]
fn test_partial_secret_load_forgets_mirror() {
    let (mut bus, mut ctx) = attach(device().with_secret(SECRET));
    let mut session = known(&ctx);

    ctx.bank(&mut bus, MAIN)
        .unwrap()
        .load_first_secret(&mut session, 0x84, Some(&[9; 4]))
        .unwrap();
    assert!(!session.is_secret_known());
    assert_eq!(&bus.device().secret()[4..], &[9; 4]);
}

#[test]
fn test_protected_secret_refuses_load() {
    let mut model = device();
    model.set_register(0x88, 0xAA);
    let (mut bus, mut ctx) = attach(model);
    let mut session = DeviceSession::new(*ctx.rom());

    let result = ctx
        .bank(&mut bus, MAIN)
        .unwrap()
        .load_first_secret(&mut session, 0x80, Some(&SECRET));
    assert_eq!(result, Err(Error::UnexpectedStatus(0xFF)));
    assert!(!session.is_secret_known());
    assert_eq!(bus.device().secret(), &[0; 8]);
}

#[test]
fn test_compute_next_secret_tracks_device() {
    let mut model = device().with_secret(SECRET);
    model.memory_mut()[..32].fill(0x77);
    let (mut bus, mut ctx) = attach(model);
    let mut session = known(&ctx);

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.compute_next_secret(&mut session, 0, None).unwrap();
    bank.compute_next_secret(&mut session, 0x20, Some(&[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
    drop(bank);

    assert_ne!(session.secret(), Some(&SECRET));
    assert_eq!(session.secret(), Some(bus.device().secret()));
    assert_eq!(bus.device().scratchpad(), &[0xAA; 8]);
}

#[test]
fn test_unknown_secret_has_no_bus_traffic() {
    let (mut bus, mut ctx) = attach(device());
    let mut session = DeviceSession::new(*ctx.rom());

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    assert_eq!(bank.compute_next_secret(&mut session, 0, None), Err(Error::SecretUnknown));
    assert_eq!(bank.write_with_mac(&session, 0, &[0; 8]), Err(Error::SecretUnknown));
    drop(bank);
    assert_eq!(bus.stats().selects, 0);
}

#[test]
fn test_session_of_other_device() {
    let (mut bus, mut ctx) = attach(device());
    let mut session = DeviceSession::new(RomId::from_parts(0x33, [9; 6]));
    let result = ctx
        .bank(&mut bus, MAIN)
        .unwrap()
        .load_first_secret(&mut session, 0x80, Some(&SECRET));
    assert_eq!(result, Err(Error::SessionMismatch));
}

#[test]
fn test_write_with_mac() {
    let (mut bus, mut ctx) = attach(device().with_secret(SECRET));
    let session = known(&ctx);

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.write_with_mac(&session, 0x28, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    bank.write_with_mac(&session, 0x41, &[0xAA, 0xBB, 0xCC]).unwrap();
    drop(bank);

    let memory = bus.device().memory();
    assert_eq!(&memory[0x28..0x30], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&memory[0x40..0x45], &[0xFF, 0xAA, 0xBB, 0xCC, 0xFF]);
}

#[test]
fn test_write_with_mac_over_existing_page() {
    let mut model = device().with_secret(SECRET);
    for (i, byte) in model.memory_mut()[0x60..0x80].iter_mut().enumerate() {
        *byte = 0x80 | i as u8;
    }
    let (mut bus, mut ctx) = attach(model);
    let session = known(&ctx);

    // each copy is authorized over the page as it is before that copy
    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    bank.write_with_mac(&session, 0x60, &[0x01; 8]).unwrap();
    bank.write_with_mac(&session, 0x78, &[0x02; 8]).unwrap();
    bank.write_with_mac(&session, 0x64, &[0x03; 2]).unwrap();
    drop(bank);

    let memory = bus.device().memory();
    assert_eq!(&memory[0x60..0x68], &[0x01, 0x01, 0x01, 0x01, 0x03, 0x03, 0x01, 0x01]);
    assert_eq!(&memory[0x68..0x70], &[0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x8D, 0x8E, 0x8F]);
    assert_eq!(&memory[0x78..0x80], &[0x02; 8]);
}

#[test]
fn test_wrong_secret_is_refused() {
    let (mut bus, mut ctx) = attach(device().with_secret(SECRET));
    let session = DeviceSession::with_secret(*ctx.rom(), [0; 8]);

    let result = ctx.bank(&mut bus, MAIN).unwrap().write_with_mac(&session, 0, &[0; 8]);
    assert_eq!(result, Err(Error::MacMismatch));
    assert_eq!(&bus.device().memory()[..8], &[0xFF; 8]);
}

#[test]
fn test_protected_region_is_refused() {
    let mut model = device().with_secret(SECRET);
    model.set_register(0x8D, 0x55);
    let (mut bus, mut ctx) = attach(model);
    let session = known(&ctx);

    let mut bank = ctx.bank(&mut bus, MAIN).unwrap();
    assert_eq!(
        bank.write_with_mac(&session, 0x08, &[0; 8]),
        Err(Error::RegionWriteProtected)
    );
    bank.write_with_mac(&session, 0x28, &[0; 8]).unwrap();
}

#[test]
fn test_eprom_mode_page() {
    let mut model = device().with_secret(SECRET);
    model.set_register(0x8C, 0xAA);
    model.memory_mut()[0x20..0x28].fill(0x0F);
    let (mut bus, mut ctx) = attach(model);
    let session = known(&ctx);

    ctx.bank(&mut bus, MAIN)
        .unwrap()
        .write_with_mac(&session, 0x20, &[0xF3; 8])
        .unwrap();
    assert_eq!(&bus.device().memory()[0x20..0x28], &[0x03; 8]);
}

#[test]
fn test_plain_write_needs_session() {
    let (mut bus, mut ctx) = attach(device());
    let session = known(&ctx);

    let result = ctx.bank(&mut bus, MAIN).unwrap().write(0, &[0; 8]);
    assert_eq!(result, Err(Error::Unsupported("write without MAC session")));
    let result = ctx.bank(&mut bus, SCRATCHPAD).unwrap().write_with_mac(&session, 0, &[0; 8]);
    assert_eq!(result, Err(Error::Unsupported("MAC copy")));
}

#[test]
fn test_registers_are_read_only() {
    let mut model = device();
    model.set_register(0x88, 0xAA);
    let (mut bus, mut ctx) = attach(model);

    let mut bank = ctx.bank(&mut bus, REGISTERS).unwrap();
    assert_eq!(bank.write(0, &[0]), Err(Error::ReadOnlyBank));
    let mut buf = [0u8; 8];
    bank.read(0, false, &mut buf).unwrap();
    assert_eq!(buf, [0xAA, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_authenticated_read() {
    let mut model = device().with_secret(SECRET);
    for (i, byte) in model.memory_mut()[64..96].iter_mut().enumerate() {
        *byte = (i * 3) as u8;
    }
    let (mut bus, mut ctx) = attach(model);
    let session = known(&ctx);
    let challenge = [0xC0, 0xFF, 0xEE, 0x00, 0x12, 0x34, 0x56, 0x78];

    let mut data = [0u8; 32];
    let mac = ctx
        .bank(&mut bus, MAIN)
        .unwrap()
        .read_authenticated_page(2, &challenge, &mut data)
        .unwrap();
    assert_eq!(&data[..], &bus.device().memory()[64..96]);
    assert_eq!(bus.stats().power_deliveries, 1);

    assert!(session.is_mac_valid(2, &data, &challenge, &mac).unwrap());
    let mut forged = data;
    forged[0] ^= 0x01;
    assert!(!session.is_mac_valid(2, &forged, &challenge, &mac).unwrap());
    assert!(!session.is_mac_valid(1, &data, &challenge, &mac).unwrap());

    let stranger = DeviceSession::new(*ctx.rom());
    assert_eq!(
        stranger.is_mac_valid(2, &data, &challenge, &mac),
        Err(Error::SecretUnknown)
    );
}

#[test]
fn test_refresh_scratchpad() {
    let mut model = device();
    model.memory_mut()[0x40..0x48].copy_from_slice(&[8, 7, 6, 5, 4, 3, 2, 1]);
    let (mut bus, mut ctx) = attach(model);

    ctx.bank(&mut bus, MAIN).unwrap().refresh_scratchpad(0x44).unwrap();
    assert_eq!(bus.device().scratchpad(), &[8, 7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn test_refresh_unsupported_by_variant() {
    init_logging();
    let model = device().without_refresh();
    let mut profile = families::ds1961s();
    profile.sha = Some(ShaSpec {
        secret_address: 0x80,
        supports_refresh: false,
    });
    let mut ctx = DeviceContext::new(model.rom(), profile).unwrap();
    let mut bus = DummyBus::new(model);

    let result = ctx.bank(&mut bus, MAIN).unwrap().refresh_scratchpad(0);
    assert_eq!(result, Err(Error::Unsupported("refresh scratchpad")));
    assert_eq!(bus.stats().selects, 0);
}

#[test]
fn test_power_delivery_required() {
    init_logging();
    let model = device();
    let mut ctx = DeviceContext::for_rom(model.rom()).unwrap();
    let mut bus = DummyBus::new(model).with_features(MasterFeatures::PROGRAM_PULSE);
    let mut session = DeviceSession::new(*ctx.rom());

    let result = ctx
        .bank(&mut bus, MAIN)
        .unwrap()
        .load_first_secret(&mut session, 0x80, Some(&SECRET));
    assert_eq!(result, Err(Error::PowerDeliveryUnsupported));
}
