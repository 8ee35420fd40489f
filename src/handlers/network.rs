//! Network-list handler (outer cmd=0x0005, §4.5): the device reports which
//! paired sockets it can currently see on its local mesh/bus, in response to
//! a refresh/add/delete request the platform issued.

use crate::constants::{cmd as outer_cmd, ACK_SUCCESS};
use crate::error::{CoreError, CoreResult};
use crate::event::{CoreEvent, EventBuilder, NetworkAction};
use crate::frame::{Direction, Frame};
use crate::transport::Clock;
use bytes::Bytes;
use tracing::trace;

pub struct Outcome {
    pub ack: Bytes,
    pub events: Vec<CoreEvent>,
}

/// `socketNo:1, mac:6, uid:4, channel:1, rssi:1, status:1`.
const ENTRY_LEN: usize = 14;

pub fn handle(frame: &Frame, clock: &dyn Clock) -> CoreResult<Outcome> {
    if frame.data.len() < 2 {
        return Err(CoreError::InvalidPayload("network-list payload shorter than subcmd+result prefix".into()));
    }
    let sub_cmd = frame.data[0];
    let action = match sub_cmd {
        0x08 => NetworkAction::RefreshAck,
        0x09 => NetworkAction::AddAck,
        0x0A => NetworkAction::DeleteAck,
        other => {
            return Err(CoreError::InvalidPayload(format!("unrecognized network-list subcmd {other:#04x}")));
        }
    };

    let entries = &frame.data[2..];
    let (mut upsert_count, mut failure_count) = (0u32, 0u32);
    for chunk in entries.chunks(ENTRY_LEN) {
        if chunk.len() < ENTRY_LEN {
            break;
        }
        let status = chunk[ENTRY_LEN - 1];
        if status == 0 {
            upsert_count += 1;
        } else {
            failure_count += 1;
        }
    }

    trace!(gateway_id = %frame.gateway_id, ?action, upsert_count, failure_count, "network-list report");

    let builder = EventBuilder::new(frame.gateway_id, clock);
    let event = builder.network_topology(action, upsert_count, failure_count);

    let ack = Frame::build(Direction::Downlink, outer_cmd::NETWORK_LIST, frame.msg_id, frame.gateway_id, &[ACK_SUCCESS]);
    Ok(Outcome { ack, events: vec![event] })
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn counts_successes_and_failures_across_entries() {
        let mut ok_entry = vec![0u8; ENTRY_LEN];
        ok_entry[ENTRY_LEN - 1] = 0x00;
        let mut bad_entry = vec![0u8; ENTRY_LEN];
        bad_entry[ENTRY_LEN - 1] = 0x01;

        let mut data = vec![0x08, 0x01];
        data.extend_from_slice(&ok_entry);
        data.extend_from_slice(&bad_entry);

        let raw = Frame::build(Direction::Uplink, outer_cmd::NETWORK_LIST, 1, gw(), &data);
        let frame = Frame::parse(&raw).unwrap();
        let clock = FixedClock(Utc::now());

        let outcome = handle(&frame, &clock).unwrap();
        match &outcome.events[0] {
            CoreEvent::NetworkTopology {
                action,
                upsert_count,
                failure_count,
                ..
            } => {
                assert_eq!(*action, NetworkAction::RefreshAck);
                assert_eq!(*upsert_count, 1);
                assert_eq!(*failure_count, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let ack_frame = Frame::parse(&outcome.ack).unwrap();
        assert_eq!(ack_frame.cmd, outer_cmd::NETWORK_LIST);
        assert_eq!(ack_frame.direction, Direction::Downlink);
    }
}
