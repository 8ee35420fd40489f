//! C4 — ACK builder.
//!
//! Building the right ACK fast is the difference between a device staying
//! online and a device power-cycling itself (spec.md §4.4): every uplink
//! that expects one gets an ACK before any other processing, using only
//! data already present on the inbound frame.

use crate::constants::{ACK_FAILURE, ACK_SUCCESS};
use crate::frame::{Direction, Frame};
use crate::gateway_id::GatewayId;
use crate::tlv::{build_fields, build_payload};
use bytes::Bytes;

/// Plain status ACK for cmd=0x1000 uplinks (status report, charging end,
/// exception report, control command): echo cmd/frameSeq/gatewayId, append
/// a single nested result field.
pub fn status_ack(cmd: u16, frame_seq: [u8; 8], gateway_id: GatewayId, success: bool) -> Bytes {
    let status = if success { ACK_SUCCESS } else { ACK_FAILURE };
    let trailing = build_fields(&[(crate::constants::tag::RESULT, &[status])]);
    let payload = build_payload(cmd, frame_seq, gateway_id, &trailing);
    Frame::build(Direction::Downlink, crate::constants::cmd::TLV, 0, gateway_id, &payload)
}

/// Convenience wrapper for a successful status ACK.
pub fn status_ack_ok(cmd: u16, frame_seq: [u8; 8], gateway_id: GatewayId) -> Bytes {
    status_ack(cmd, frame_seq, gateway_id, true)
}

/// ACK for the long-form charging-end report on outer cmd=0x0015: mirrors
/// the status ACK shape but travels on the control-umbrella outer cmd
/// rather than the TLV one, since the uplink it answers did too (§4.3).
pub fn charging_end_ack(msg_id: u32, gateway_id: GatewayId, success: bool) -> Bytes {
    let status = if success { ACK_SUCCESS } else { ACK_FAILURE };
    Frame::build(
        Direction::Downlink,
        crate::constants::cmd::CONTROL,
        msg_id,
        gateway_id,
        &[status],
    )
}

/// ACK for a heartbeat (cmd=0x0000): echoes the device's own gatewayId and
/// carries a BCD-encoded platform timestamp so the device can resync its
/// clock (§4.7).
pub fn heartbeat_ack(msg_id: u32, gateway_id: GatewayId, timestamp: chrono::DateTime<chrono::Utc>) -> Bytes {
    let bcd = bcd_timestamp(timestamp);
    Frame::build(Direction::Downlink, crate::constants::cmd::HEARTBEAT, msg_id, gateway_id, &bcd)
}

/// Encode `CCYYMMDDHHMMSS` as 7 BCD bytes (two decimal digits packed per
/// byte, century included), the format heartbeat ACKs carry.
fn bcd_timestamp(ts: chrono::DateTime<chrono::Utc>) -> [u8; 7] {
    use chrono::Datelike;
    use chrono::Timelike;

    fn bcd(n: u32) -> u8 {
        (((n / 10) % 10) as u8) << 4 | (n % 10) as u8
    }

    let year = ts.year() as u32;
    [
        bcd(year / 100),
        bcd(year % 100),
        bcd(ts.month()),
        bcd(ts.day()),
        bcd(ts.hour()),
        bcd(ts.minute()),
        bcd(ts.second()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    #[test]
    fn status_ack_is_well_formed_downlink() {
        let bytes = status_ack_ok(crate::constants::subcmd::STATUS_REPORT, [0u8; 8], gw());
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.direction, Direction::Downlink);
        assert_eq!(frame.cmd, crate::constants::cmd::TLV);
        assert_eq!(frame.gateway_id, gw());

        let payload = crate::tlv::Payload::parse(&frame.data).unwrap();
        assert_eq!(payload.cmd, crate::constants::subcmd::STATUS_REPORT);
        assert_eq!(payload.u8_field(crate::constants::tag::RESULT), Some(ACK_SUCCESS));
    }

    #[test]
    fn bcd_timestamp_packs_two_digits_per_byte() {
        let ts = chrono::Utc
            .with_ymd_and_hms(2026, 7, 26, 9, 5, 3)
            .unwrap();
        assert_eq!(bcd_timestamp(ts), [0x20, 0x26, 0x07, 0x26, 0x09, 0x05, 0x03]);
    }

    #[test]
    fn heartbeat_ack_echoes_gateway_id_on_cmd_zero() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let bytes = heartbeat_ack(9, gw(), ts);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.cmd, crate::constants::cmd::HEARTBEAT);
        assert_eq!(frame.msg_id, 9);
        assert_eq!(frame.gateway_id, gw());
        assert_eq!(&frame.data[..], &[0x20, 0x26, 0x01, 0x01, 0x00, 0x00, 0x00]);
    }
}
