//! Memory bank protocol implementations
//!
//! Each submodule implements the command sequences of one memory
//! technology. The functions are generic over [`OneWireMaster`] and take
//! the device state explicitly; they do not force speed re-verification
//! themselves, that is left to the [`Bank`](crate::device::Bank) handle.

pub mod eprom;
pub mod memory;
pub mod scratchpad;
pub mod sha;

use crate::bus::{MasterFeatures, OneWireMaster};
use crate::error::{Error, Result};

/// Target address bytes TA1 (low) and TA2 (high)
pub(crate) fn address_bytes(addr: u32) -> [u8; 2] {
    [addr as u8, (addr >> 8) as u8]
}

/// Fail unless the master can hold a strong pull-up
pub(crate) fn require_power_delivery<M: OneWireMaster + ?Sized>(master: &M) -> Result<()> {
    if !master.features().contains(MasterFeatures::POWER_DELIVERY) {
        return Err(Error::PowerDeliveryUnsupported);
    }
    Ok(())
}

/// Fail unless the master can generate program pulses
pub(crate) fn require_program_pulse<M: OneWireMaster + ?Sized>(master: &M) -> Result<()> {
    if !master.features().contains(MasterFeatures::PROGRAM_PULSE) {
        return Err(Error::ProgramPulseUnsupported);
    }
    Ok(())
}
