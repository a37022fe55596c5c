//! Universal Data Packet framing
//!
//! A packet occupies the start of one page:
//!
//! ```text
//! [len] [data; len] [~crc lo] [~crc hi]
//! ```
//!
//! The CRC16 covers the length byte and the data and is seeded with the
//! bank-relative page number, so a packet copied to another page no longer
//! validates.

use alloc::vec::Vec;

use crate::crc::{crc16, crc16_trailer, CRC16_RESIDUAL};
use crate::error::{Error, Result};

/// Bytes a packet adds around its payload
pub const PACKET_OVERHEAD: usize = 3;

/// Build the packet frame for `data` on `page`
pub fn encode(page: usize, data: &[u8], max_data_len: usize) -> Result<Vec<u8>> {
    if data.len() > max_data_len || data.len() > u8::MAX as usize {
        return Err(Error::PacketTooLong);
    }

    let mut frame = Vec::with_capacity(data.len() + PACKET_OVERHEAD);
    frame.push(data.len() as u8);
    frame.extend_from_slice(data);
    let trailer = crc16_trailer(page as u16, &frame);
    frame.extend_from_slice(&trailer);
    Ok(frame)
}

/// Validate the packet at the start of `page_data` and return its payload
pub fn decode(page: usize, page_data: &[u8], max_data_len: usize) -> Result<&[u8]> {
    let len = *page_data.first().ok_or(Error::InvalidPacketLength)? as usize;
    if len > max_data_len || len + PACKET_OVERHEAD > page_data.len() {
        log::debug!("packet: page {} length byte {} out of range", page, len);
        return Err(Error::InvalidPacketLength);
    }

    let frame = &page_data[..len + PACKET_OVERHEAD];
    if crc16(page as u16, frame) != CRC16_RESIDUAL {
        log::debug!("packet: page {} CRC16 mismatch", page);
        return Err(Error::InvalidPacketCrc);
    }
    Ok(&frame[1..=len])
}
