//! Heartbeat handler (outer cmd=0x0000, §4.7).
//!
//! Liveness only: acking a heartbeat is how the device knows the platform
//! is still reachable at all. The payload also carries enough to report
//! signal quality and SIM identity, so this path emits a `DeviceHeartbeat`
//! event rather than a bare liveness marker.

use crate::ack;
use crate::constants::HEARTBEAT_MIN_LEN;
use crate::error::{CoreError, CoreResult};
use crate::event::{CoreEvent, EventBuilder};
use crate::frame::Frame;
use crate::transport::Clock;
use tracing::trace;

pub fn validate(frame: &Frame) -> CoreResult<()> {
    if frame.data.len() < HEARTBEAT_MIN_LEN {
        return Err(CoreError::InvalidPayload(format!(
            "heartbeat payload too short: need {HEARTBEAT_MIN_LEN}, got {}",
            frame.data.len()
        )));
    }
    trace!(gateway_id = %frame.gateway_id, "heartbeat");
    Ok(())
}

pub fn ack_bytes(frame: &Frame, clock: &dyn Clock) -> bytes::Bytes {
    ack::heartbeat_ack(frame.msg_id, frame.gateway_id, clock.now())
}

/// RSSI rides in the trailing byte, signed (negative dBm-derived values);
/// ICCID occupies the leading 20 bytes as an ASCII digit string, NUL-padded
/// when shorter (§4.7). `None` when the ICCID field is entirely padding.
pub fn device_heartbeat(frame: &Frame, clock: &dyn Clock) -> CoreEvent {
    let rssi = *frame.data.last().unwrap_or(&0) as i8;
    let iccid = frame.data.get(0..20).and_then(|raw| {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim_end_matches('\0').trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    EventBuilder::new(frame.gateway_id, clock).device_heartbeat(rssi, iccid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Direction;
    use crate::gateway_id::GatewayId;
    use chrono::Utc;
    use std::str::FromStr;

    struct FixedClock(chrono::DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            self.0
        }
    }

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    #[test]
    fn rejects_undersized_payload() {
        let bytes = Frame::build(Direction::Uplink, 0x0000, 1, gw(), b"too short");
        let frame = Frame::parse(&bytes).unwrap();
        assert!(validate(&frame).is_err());
    }

    #[test]
    fn acks_and_emits_heartbeat_with_rssi_and_iccid() {
        let mut data = vec![0u8; HEARTBEAT_MIN_LEN];
        let iccid = b"89860000000000000001";
        data[0..20].copy_from_slice(&iccid[..20]);
        *data.last_mut().unwrap() = (-67i8) as u8;

        let bytes = Frame::build(Direction::Uplink, 0x0000, 1, gw(), &data);
        let frame = Frame::parse(&bytes).unwrap();
        assert!(validate(&frame).is_ok());

        let clock = FixedClock(Utc::now());
        let ack = ack_bytes(&frame, &clock);
        let ack_frame = Frame::parse(&ack).unwrap();
        assert_eq!(ack_frame.direction, Direction::Downlink);
        assert_eq!(ack_frame.gateway_id, gw());

        match device_heartbeat(&frame, &clock) {
            CoreEvent::DeviceHeartbeat { rssi, iccid, .. } => {
                assert_eq!(rssi, -67);
                assert_eq!(iccid.as_deref(), Some("89860000000000000001"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn reports_no_iccid_when_field_is_all_padding() {
        let data = vec![0u8; HEARTBEAT_MIN_LEN];
        let bytes = Frame::build(Direction::Uplink, 0x0000, 1, gw(), &data);
        let frame = Frame::parse(&bytes).unwrap();
        let clock = FixedClock(Utc::now());

        match device_heartbeat(&frame, &clock) {
            CoreEvent::DeviceHeartbeat { iccid, .. } => assert!(iccid.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
