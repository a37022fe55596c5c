//! 1-Wire bus abstractions
//!
//! This module defines the link-layer boundary of the crate: the bus
//! master trait, ROM ids and the memory command codes.

pub mod commands;
mod rom;
mod traits;

pub use rom::RomId;
pub use traits::*;
