//! Lazy bus speed negotiation
//!
//! Every device remembers whether the bus speed it needs has been
//! established. Operations call [`SpeedGovernor::ensure`] before their first
//! command; any failure observed on the bus calls
//! [`SpeedGovernor::force_verify`] so the next operation renegotiates.
//! The failed operation itself is never retried here.

use crate::bus::{commands, BusSpeed, MasterFeatures, OneWireMaster};
use crate::error::{Error, Result};

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedState {
    /// Speed must be (re)negotiated before the next command
    #[default]
    Unknown,
    /// Speed negotiated and believed to be in effect
    Ok,
}

/// Per-device speed negotiation state
#[derive(Debug, Clone, Default)]
pub struct SpeedGovernor {
    target: BusSpeed,
    state: SpeedState,
}

impl SpeedGovernor {
    /// Create a governor for the given target speed, initially unknown
    pub fn new(target: BusSpeed) -> Self {
        Self {
            target,
            state: SpeedState::Unknown,
        }
    }

    /// Speed this device should be talked to at
    pub fn target(&self) -> BusSpeed {
        self.target
    }

    /// Current negotiation state
    pub fn state(&self) -> SpeedState {
        self.state
    }

    /// Change the target speed; takes effect on the next operation
    pub fn set_target(&mut self, target: BusSpeed) {
        self.target = target;
        self.state = SpeedState::Unknown;
    }

    /// Invalidate the negotiated speed
    pub fn force_verify(&mut self) {
        if self.state != SpeedState::Unknown {
            log::debug!("speed: forcing renegotiation at {:?}", self.target);
        }
        self.state = SpeedState::Unknown;
    }

    /// Negotiate the target speed if it is not known to be in effect
    pub fn ensure<M: OneWireMaster + ?Sized>(&mut self, master: &mut M) -> Result<()> {
        if self.state == SpeedState::Ok {
            return Ok(());
        }

        match self.target {
            BusSpeed::Overdrive => {
                if !master.features().contains(MasterFeatures::OVERDRIVE) {
                    return Err(Error::Unsupported("overdrive"));
                }
                // Devices only enter overdrive from regular speed via the
                // overdrive skip ROM command.
                master.set_speed(BusSpeed::Regular)?;
                if !master.reset()? {
                    return Err(Error::DeviceNotPresent);
                }
                master.put_byte(commands::OVERDRIVE_SKIP_ROM)?;
                master.set_speed(BusSpeed::Overdrive)?;
            }
            speed => master.set_speed(speed)?,
        }

        log::debug!("speed: negotiated {:?}", self.target);
        self.state = SpeedState::Ok;
        Ok(())
    }
}
