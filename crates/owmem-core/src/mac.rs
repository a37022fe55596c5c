//! SHA-1 message blocks and MACs of authenticated EEPROMs
//!
//! Every SHA operation of the device hashes one 64-byte block:
//!
//! ```text
//!          next secret      copy with MAC        authenticated read
//!  0..4    secret[0..4]     secret[0..4]         secret[0..4]
//!  4..32   page[0..28]      page[0..28]          page[0..28]
//! 32..36   page[28..32]     scratchpad[0..4]     page[28..32]
//! 36..40   0xFF             scratchpad[4..8]     0xFF
//! 40..48   scratchpad       control + ROM id     control + ROM id
//! 48..52   secret[4..8]     secret[4..8]         secret[4..8]
//! 52..55   0xFF             0xFF                 challenge[4..7]
//! 55..64   SHA-1 padding: 0x80, zeros, 440 bits as a 64-bit length
//! ```
//!
//! The page is the current memory content; for a copy the device hashes
//! the page as it is before the copy plus the new scratchpad bytes. The
//! ROM id is sent without its CRC byte.
//!
//! The block is a 55-byte message with standard SHA-1 padding, so the
//! device digest is plain SHA-1 over the first 55 bytes. The device sends
//! and stores the result words E, D, C, B, A least significant byte first,
//! which is the big-endian digest reversed.

use sha1::{Digest, Sha1};

use crate::bus::RomId;

/// Secret length in bytes
pub const SECRET_LEN: usize = 8;
/// Page length hashed into a block
pub const PAGE_LEN: usize = 32;
/// MAC length in bytes
pub const MAC_LEN: usize = 20;
/// Message block length
pub const BLOCK_LEN: usize = 64;

/// Bytes of the block that carry the message
const MESSAGE_LEN: usize = 55;

/// 8-byte device secret
pub type Secret = [u8; SECRET_LEN];
/// 20-byte MAC in device byte order
pub type Mac = [u8; MAC_LEN];

/// Page bytes hashed by a copy, the rest of the page is the scratchpad
const COPY_PAGE_LEN: usize = 28;

fn frame(secret: &Secret, body: &[u8; 36], middle: &[u8; 8], tail: &[u8; 3]) -> [u8; BLOCK_LEN] {
    let mut block = [0u8; BLOCK_LEN];
    block[0..4].copy_from_slice(&secret[0..4]);
    block[4..40].copy_from_slice(body);
    block[40..48].copy_from_slice(middle);
    block[48..52].copy_from_slice(&secret[4..8]);
    block[52..55].copy_from_slice(tail);
    block[55] = 0x80;
    // 440 message bits
    block[62] = 0x01;
    block[63] = 0xB8;
    block
}

fn page_body(page: &[u8; PAGE_LEN]) -> [u8; 36] {
    let mut body = [0xFF; 36];
    body[..PAGE_LEN].copy_from_slice(page);
    body
}

fn assemble(secret: &Secret, page: &[u8; PAGE_LEN], middle: &[u8; 8], tail: &[u8; 3]) -> [u8; BLOCK_LEN] {
    frame(secret, &page_body(page), middle, tail)
}

fn control_and_rom(control: u8, rom: &RomId) -> [u8; 8] {
    let mut middle = [0u8; 8];
    middle[0] = control;
    middle[1..].copy_from_slice(&rom.without_crc());
    middle
}

/// Block hashed by Compute Next Secret
pub fn next_secret_block(secret: &Secret, page: &[u8; PAGE_LEN], scratchpad: &[u8; 8]) -> [u8; BLOCK_LEN] {
    assemble(secret, page, scratchpad, &[0xFF; 3])
}

/// Block hashed by Copy Scratchpad with MAC
///
/// `page` is the target page before the copy and `scratchpad` the eight
/// bytes about to be copied to `addr`.
pub fn copy_block(
    secret: &Secret,
    page: &[u8; PAGE_LEN],
    scratchpad: &[u8; 8],
    rom: &RomId,
    addr: u32,
) -> [u8; BLOCK_LEN] {
    let mut body = [0u8; 36];
    body[..COPY_PAGE_LEN].copy_from_slice(&page[..COPY_PAGE_LEN]);
    body[COPY_PAGE_LEN..].copy_from_slice(scratchpad);
    let control = ((addr >> 5) & 0x07) as u8;
    frame(secret, &body, &control_and_rom(control, rom), &[0xFF; 3])
}

/// Block hashed by Read Authenticated Page
pub fn auth_block(
    secret: &Secret,
    page_data: &[u8; PAGE_LEN],
    rom: &RomId,
    page: usize,
    challenge: &[u8; 8],
) -> [u8; BLOCK_LEN] {
    let control = 0x40 | (page as u8 & 0x0F);
    let mut tail = [0u8; 3];
    tail.copy_from_slice(&challenge[4..7]);
    assemble(secret, page_data, &control_and_rom(control, rom), &tail)
}

/// SHA-1 of a message block in device byte order
pub fn device_digest(block: &[u8; BLOCK_LEN]) -> Mac {
    let digest = Sha1::digest(&block[..MESSAGE_LEN]);
    let mut mac = [0u8; MAC_LEN];
    for (dst, src) in mac.iter_mut().zip(digest.iter().rev()) {
        *dst = *src;
    }
    mac
}

/// Secret produced by Compute Next Secret
pub fn next_secret(secret: &Secret, page: &[u8; PAGE_LEN], scratchpad: &[u8; 8]) -> Secret {
    let digest = device_digest(&next_secret_block(secret, page, scratchpad));
    let mut out = [0u8; SECRET_LEN];
    out.copy_from_slice(&digest[..SECRET_LEN]);
    out
}

/// MAC authorizing a copy of `scratchpad` to `addr`
pub fn copy_mac(
    secret: &Secret,
    page: &[u8; PAGE_LEN],
    scratchpad: &[u8; 8],
    rom: &RomId,
    addr: u32,
) -> Mac {
    device_digest(&copy_block(secret, page, scratchpad, rom, addr))
}

/// MAC returned by an authenticated read of `page`
pub fn auth_mac(
    secret: &Secret,
    page_data: &[u8; PAGE_LEN],
    rom: &RomId,
    page: usize,
    challenge: &[u8; 8],
) -> Mac {
    device_digest(&auth_block(secret, page_data, rom, page, challenge))
}
