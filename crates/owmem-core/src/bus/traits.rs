//! Bus master trait definitions
//!
//! The memory bank engine never talks to hardware directly. Everything it
//! needs from the link layer goes through [`OneWireMaster`]: device
//! selection, half-duplex byte exchange, strong pull-up power delivery,
//! EPROM program pulses, speed switching and fixed delays.

use super::rom::RomId;
use crate::error::Result;
use bitflags::bitflags;

bitflags! {
    /// Bus master feature flags
    ///
    /// These flags indicate which optional link-layer capabilities an
    /// adapter provides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MasterFeatures: u32 {
        /// Can hold a strong pull-up for parasitically powered operations
        const POWER_DELIVERY = 1 << 0;
        /// Can generate 12V EPROM program pulses
        const PROGRAM_PULSE  = 1 << 1;
        /// Supports overdrive timing
        const OVERDRIVE      = 1 << 2;
    }
}

impl Default for MasterFeatures {
    fn default() -> Self {
        MasterFeatures::empty()
    }
}

/// Bus communication speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BusSpeed {
    /// Standard 1-Wire timing (~16 kbps)
    #[default]
    Regular,
    /// Standard timing with relaxed slew for long lines
    Flex,
    /// Overdrive timing (~142 kbps)
    Overdrive,
}

/// When a power delivery or program pulse starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerCondition {
    /// Immediately
    Now,
    /// After the next byte sent with `put_byte`
    AfterNextByte,
}

/// 1-Wire bus master
///
/// All operations are blocking. Implementations exchange bytes in
/// half-duplex fashion: a byte sent as `0xFF` leaves the line released so
/// the device can drive its response, which is returned in place.
///
/// ## Example: emulated master
///
/// ```ignore
/// impl OneWireMaster for MyAdapter {
///     fn features(&self) -> MasterFeatures {
///         MasterFeatures::POWER_DELIVERY
///     }
///
///     fn data_block(&mut self, buf: &mut [u8]) -> Result<()> {
///         for byte in buf.iter_mut() {
///             *byte = self.touch_byte(*byte)?;
///         }
///         Ok(())
///     }
///     // ...
/// }
/// ```
pub trait OneWireMaster {
    /// Optional capabilities of this adapter
    fn features(&self) -> MasterFeatures;

    /// Issue a reset pulse; returns whether a presence pulse was seen
    fn reset(&mut self) -> Result<bool>;

    /// Reset and address one device by ROM id
    ///
    /// Returns `false` when no device answered.
    fn select(&mut self, rom: &RomId) -> Result<bool>;

    /// Exchange a block of bytes in place
    fn data_block(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Send a single byte
    fn put_byte(&mut self, byte: u8) -> Result<()>;

    /// Read a single byte (sends `0xFF`)
    fn get_byte(&mut self) -> Result<u8>;

    /// Arm the strong pull-up
    fn start_power_delivery(&mut self, condition: PowerCondition) -> Result<()>;

    /// Return the line to normal pull-up
    fn set_power_normal(&mut self) -> Result<()>;

    /// Arm an EPROM program pulse
    fn start_program_pulse(&mut self, condition: PowerCondition) -> Result<()>;

    /// Current bus speed
    fn speed(&self) -> BusSpeed;

    /// Switch the adapter's bus timing
    fn set_speed(&mut self, speed: BusSpeed) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}
