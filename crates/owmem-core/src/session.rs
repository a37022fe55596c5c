//! Host-side mirror of a device secret
//!
//! The secret of a SHA-1 EEPROM can never be read back. The host keeps its
//! own copy in a [`DeviceSession`], updated whenever an operation changes
//! the device secret in a way the host can reproduce. The session is owned
//! by the caller and passed by `&mut` to the operations that need it.

use crate::bus::RomId;
use crate::error::{Error, Result};
use crate::mac::{self, Mac, Secret, PAGE_LEN};

/// Secret mirror for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    rom: RomId,
    secret: Option<Secret>,
}

impl DeviceSession {
    /// Session with an unknown secret
    pub fn new(rom: RomId) -> Self {
        Self { rom, secret: None }
    }

    /// Session with a known secret
    pub fn with_secret(rom: RomId, secret: Secret) -> Self {
        Self {
            rom,
            secret: Some(secret),
        }
    }

    /// Device this session belongs to
    pub fn rom(&self) -> &RomId {
        &self.rom
    }

    /// Mirrored secret, if known
    pub fn secret(&self) -> Option<&Secret> {
        self.secret.as_ref()
    }

    /// Whether the secret is known
    pub fn is_secret_known(&self) -> bool {
        self.secret.is_some()
    }

    /// Replace the mirrored secret
    pub fn set_secret(&mut self, secret: Secret) {
        self.secret = Some(secret);
    }

    /// Forget the mirrored secret
    pub fn clear_secret(&mut self) {
        self.secret = None;
    }

    /// Check that this session belongs to `rom`
    pub fn check_device(&self, rom: &RomId) -> Result<()> {
        if self.rom != *rom {
            return Err(Error::SessionMismatch);
        }
        Ok(())
    }

    /// The mirrored secret, or `SecretUnknown`
    pub fn require_secret(&self) -> Result<&Secret> {
        self.secret.as_ref().ok_or(Error::SecretUnknown)
    }

    /// Recompute the MAC of an authenticated page read and compare
    pub fn is_mac_valid(
        &self,
        page: usize,
        page_data: &[u8; PAGE_LEN],
        challenge: &[u8; 8],
        device_mac: &Mac,
    ) -> Result<bool> {
        let secret = self.require_secret()?;
        let expected = mac::auth_mac(secret, page_data, &self.rom, page, challenge);
        Ok(expected == *device_mac)
    }
}
