//! Scripted bus master for unit tests

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::bus::{BusSpeed, MasterFeatures, OneWireMaster, PowerCondition, RomId};
use crate::error::Result;

/// Master that answers from a queue of device bytes
///
/// Every exchanged byte is recorded in `sent`; the value read back is the
/// sent byte ANDed with the next queued response (`0xFF` once the queue
/// runs dry), which is how an open-drain bus behaves.
pub struct ScriptedMaster {
    pub features: MasterFeatures,
    pub responses: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub selects: usize,
    pub power_deliveries: usize,
    pub program_pulses: usize,
    pub delays: Vec<u32>,
    pub present: bool,
    speed: BusSpeed,
}

/// Route `log` output of the code under test to the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl ScriptedMaster {
    pub fn new() -> Self {
        init_logging();
        Self {
            features: MasterFeatures::all(),
            responses: VecDeque::new(),
            sent: Vec::new(),
            selects: 0,
            power_deliveries: 0,
            program_pulses: 0,
            delays: Vec::new(),
            present: true,
            speed: BusSpeed::Regular,
        }
    }

    pub fn respond(&mut self, bytes: &[u8]) {
        self.responses.extend(bytes.iter().copied());
    }

    fn touch(&mut self, byte: u8) -> u8 {
        self.sent.push(byte);
        byte & self.responses.pop_front().unwrap_or(0xFF)
    }
}

impl OneWireMaster for ScriptedMaster {
    fn features(&self) -> MasterFeatures {
        self.features
    }

    fn reset(&mut self) -> Result<bool> {
        Ok(self.present)
    }

    fn select(&mut self, _rom: &RomId) -> Result<bool> {
        self.selects += 1;
        Ok(self.present)
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
        self.power_deliveries += 1;
        Ok(())
    }

    fn set_power_normal(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_program_pulse(&mut self, _condition: PowerCondition) -> Result<()> {
        self.program_pulses += 1;
        Ok(())
    }

    fn speed(&self) -> BusSpeed {
        self.speed
    }

    fn set_speed(&mut self, speed: BusSpeed) -> Result<()> {
        self.speed = speed;
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delays.push(us);
    }
}
