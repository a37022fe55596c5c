//! 1-Wire memory function command codes
//!
//! Command codes are grouped by the device families that use them. Some
//! codes are reused with different meanings (for example `0xA5` is the
//! extended EPROM read on one family and the authenticated page read on
//! another); the bank strategies decide which one applies.

// ============================================================================
// ROM level
// ============================================================================

/// Overdrive skip ROM - puts every device on the bus into overdrive
pub const OVERDRIVE_SKIP_ROM: u8 = 0x3C;

// ============================================================================
// Generic memory
// ============================================================================

/// Read Memory - streams memory from the given address
pub const READ_MEMORY: u8 = 0xF0;
/// Read Memory with CRC16 (counter / extended read on some families)
pub const READ_MEMORY_CRC: u8 = 0xA5;

// ============================================================================
// Scratchpad
// ============================================================================

/// Write Scratchpad
pub const WRITE_SCRATCHPAD: u8 = 0x0F;
/// Read Scratchpad
pub const READ_SCRATCHPAD: u8 = 0xAA;
/// Copy Scratchpad (plain or MAC-authorized)
pub const COPY_SCRATCHPAD: u8 = 0x55;
/// Copy Scratchpad with write password
pub const COPY_SCRATCHPAD_PASSWORD: u8 = 0x99;

// ============================================================================
// EPROM
// ============================================================================

/// Read data memory and generate CRC8 per page
pub const EPROM_READ_PAGE_CRC8: u8 = 0xC3;
/// Extended read: redirection byte and CRC16 per page
pub const EPROM_EXTENDED_READ: u8 = 0xA5;
/// Read status memory
pub const EPROM_READ_STATUS: u8 = 0xAA;
/// Write (program) data memory
pub const EPROM_WRITE_MEMORY: u8 = 0x0F;
/// Write (program) status memory
pub const EPROM_WRITE_STATUS: u8 = 0x55;

// ============================================================================
// SHA-1 EEPROM
// ============================================================================

/// Load First Secret
pub const LOAD_FIRST_SECRET: u8 = 0x5A;
/// Compute Next Secret
pub const COMPUTE_NEXT_SECRET: u8 = 0x33;
/// Refresh Scratchpad
pub const REFRESH_SCRATCHPAD: u8 = 0xA3;
/// Read Authenticated Page
pub const READ_AUTH_PAGE: u8 = 0xA5;

/// E/S byte that must follow a Load First Secret command
pub const LOAD_FIRST_SECRET_ES: u8 = 0x5F;

// ============================================================================
// Status bytes
// ============================================================================

/// Operation complete (alternating pattern)
pub const STATUS_SUCCESS_AA: u8 = 0xAA;
/// Operation complete (alternating pattern, other phase)
pub const STATUS_SUCCESS_55: u8 = 0x55;
/// MAC copy refused: region is write protected
pub const STATUS_WRITE_PROTECTED: u8 = 0xFF;
/// MAC copy refused: MAC mismatch
pub const STATUS_MAC_MISMATCH: u8 = 0x00;

/// Whether `status` is one of the two success patterns
pub const fn is_success(status: u8) -> bool {
    status == STATUS_SUCCESS_AA || status == STATUS_SUCCESS_55
}

// ============================================================================
// Hardware timing (microseconds)
// ============================================================================

/// EEPROM copy time of scratchpad devices
pub const T_PROG_EEPROM_US: u32 = 5_000;
/// EEPROM copy time of SHA devices after the MAC has been sent
pub const T_PROG_SHA_US: u32 = 12_000;
/// SHA-1 computation time before the MAC may be sent on a copy
pub const T_CSHA_US: u32 = 2_000;
/// Compute Next Secret settle window
pub const T_NEXT_SECRET_US: u32 = 14_000;
/// Load First Secret settle window
pub const T_LOAD_SECRET_US: u32 = 10_000;
/// MAC computation window of an authenticated page read
pub const T_AUTH_READ_US: u32 = 20_000;
/// EPROM program pulse settle time
pub const T_PROGRAM_PULSE_US: u32 = 500;
