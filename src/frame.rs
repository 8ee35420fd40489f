//! C1 — Frame codec.
//!
//! Parses and builds the outer BKV frame. Both directions share one codec
//! parameterized only by magic: fixed 18-byte header (magic, length, cmd,
//! msgId, direction, gatewayId), variable data, one checksum byte, two-byte
//! tail. See spec.md §3 / §4.1.

use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use crate::gateway_id::GatewayId;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downlink,
    Uplink,
}

impl Direction {
    pub const fn magic(self) -> u16 {
        match self {
            Direction::Downlink => MAGIC_DOWNLINK,
            Direction::Uplink => MAGIC_UPLINK,
        }
    }

    pub const fn byte(self) -> u8 {
        match self {
            Direction::Downlink => DIRECTION_DOWNLINK,
            Direction::Uplink => DIRECTION_UPLINK,
        }
    }

    fn from_magic(magic: u16) -> CoreResult<Self> {
        match magic {
            MAGIC_DOWNLINK => Ok(Direction::Downlink),
            MAGIC_UPLINK => Ok(Direction::Uplink),
            other => Err(CoreError::BadMagic(other)),
        }
    }
}

/// A fully parsed outer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub direction: Direction,
    pub cmd: u16,
    pub msg_id: u32,
    pub gateway_id: GatewayId,
    pub data: Bytes,
}

/// 8-bit wrapped sum, the checksum convention for both directions (§3, §9:
/// the canonical convention, chosen over the obsolete `data[2:len-3]` one).
fn wrapped_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

impl Frame {
    /// Parse a single, complete frame. `bytes` must contain exactly one
    /// frame (the stream framer is responsible for locating frame
    /// boundaries before calling this).
    pub fn parse(bytes: &[u8]) -> CoreResult<Frame> {
        if bytes.len() < 4 {
            return Err(CoreError::Short {
                needed: 4,
                got: bytes.len(),
            });
        }

        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        let direction = Direction::from_magic(magic)?;

        let declared_len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if declared_len < MIN_DECLARED_LEN as usize {
            return Err(CoreError::BadLen {
                declared: declared_len,
                available: bytes.len(),
            });
        }

        let total_len = 4 + declared_len;
        if total_len != bytes.len() {
            return Err(CoreError::BadLen {
                declared: declared_len,
                available: bytes.len(),
            });
        }
        if total_len < OUTER_HEADER_LEN + 1 + 2 {
            return Err(CoreError::Short {
                needed: OUTER_HEADER_LEN + 1 + 2,
                got: total_len,
            });
        }

        let tail = u16::from_be_bytes([bytes[total_len - 2], bytes[total_len - 1]]);
        if tail != TAIL {
            return Err(CoreError::BadTail(tail));
        }

        let checksum_index = total_len - 3;
        let expected = bytes[checksum_index];
        let computed = wrapped_sum(&bytes[2..checksum_index]);
        if expected != computed {
            return Err(CoreError::ChecksumMismatch { expected, computed });
        }

        let cmd = u16::from_be_bytes([bytes[4], bytes[5]]);
        let msg_id = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);

        let direction_byte = bytes[10];
        if direction_byte != direction.byte() {
            return Err(CoreError::DirectionMismatch {
                direction: direction_byte,
                magic,
            });
        }

        let mut gateway_id_bytes = [0u8; GATEWAY_ID_LEN];
        gateway_id_bytes.copy_from_slice(&bytes[11..11 + GATEWAY_ID_LEN]);
        let gateway_id = GatewayId::from_bytes(gateway_id_bytes);

        let data = Bytes::copy_from_slice(&bytes[OUTER_HEADER_LEN..checksum_index]);

        Ok(Frame {
            direction,
            cmd,
            msg_id,
            gateway_id,
            data,
        })
    }

    /// Build an outer frame for the given direction. Downlink ACKs and
    /// platform commands are the only producers in this crate (§4.1, §4.4,
    /// §4.8); `direction` is exposed so tests can also author uplink
    /// fixtures.
    pub fn build(direction: Direction, cmd: u16, msg_id: u32, gateway_id: GatewayId, data: &[u8]) -> Bytes {
        let declared_len = 2 + 4 + 1 + GATEWAY_ID_LEN + data.len() + 1 + 2;

        let mut buf = Vec::with_capacity(4 + declared_len);
        buf.extend_from_slice(&direction.magic().to_be_bytes());
        buf.extend_from_slice(&(declared_len as u16).to_be_bytes());
        buf.extend_from_slice(&cmd.to_be_bytes());
        buf.extend_from_slice(&msg_id.to_be_bytes());
        buf.push(direction.byte());
        buf.extend_from_slice(gateway_id.as_bytes());
        buf.extend_from_slice(data);

        let checksum = wrapped_sum(&buf[2..]);
        buf.push(checksum);
        buf.extend_from_slice(&TAIL.to_be_bytes());

        Bytes::from(buf)
    }

    /// Convenience for the common case: build a downlink frame.
    pub fn build_downlink(cmd: u16, msg_id: u32, gateway_id: GatewayId, data: &[u8]) -> Bytes {
        Self::build(Direction::Downlink, cmd, msg_id, gateway_id, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    #[test]
    fn round_trips_build_then_parse() {
        let data = b"hello";
        let bytes = Frame::build(Direction::Downlink, 0x1000, 42, gw(), data);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.direction, Direction::Downlink);
        assert_eq!(frame.cmd, 0x1000);
        assert_eq!(frame.msg_id, 42);
        assert_eq!(frame.gateway_id, gw());
        assert_eq!(&frame.data[..], data);

        let rebuilt = Frame::build(frame.direction, frame.cmd, frame.msg_id, frame.gateway_id, &frame.data);
        assert_eq!(rebuilt, bytes);
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(matches!(Frame::parse(&[0xFC]), Err(CoreError::Short { needed: 4, got: 1 })));
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0x00, 0x00, 0x00, 0x02, 0xFC, 0xEE];
        assert!(matches!(Frame::parse(&bytes), Err(CoreError::BadMagic(0x0000))));
    }

    #[test]
    fn detects_checksum_mutation_anywhere_in_checksum_range() {
        let bytes = Frame::build(Direction::Downlink, 0x0000, 1, gw(), b"xyz");
        for i in 2..bytes.len() - 3 {
            let mut mutated = bytes.to_vec();
            mutated[i] ^= 0xFF;
            assert!(matches!(
                Frame::parse(&mutated),
                Err(CoreError::ChecksumMismatch { .. })
            ));
        }
    }

    #[test]
    fn rejects_bad_tail() {
        let mut bytes = Frame::build(Direction::Downlink, 0x0000, 1, gw(), b"").to_vec();
        let len = bytes.len();
        bytes[len - 1] ^= 0xFF;
        // mutating the tail also changes nothing upstream of the checksum,
        // so this must surface as BadTail, not ChecksumMismatch.
        assert!(matches!(Frame::parse(&bytes), Err(CoreError::BadTail(_))));
    }

    #[test]
    fn rejects_direction_magic_mismatch() {
        let mut bytes = Frame::build(Direction::Downlink, 0x0000, 1, gw(), b"").to_vec();
        bytes[10] = DIRECTION_UPLINK;
        let checksum_index = bytes.len() - 3;
        let recomputed = wrapped_sum(&bytes[2..checksum_index]);
        bytes[checksum_index] = recomputed;
        assert!(matches!(
            Frame::parse(&bytes),
            Err(CoreError::DirectionMismatch { .. })
        ));
    }
}
