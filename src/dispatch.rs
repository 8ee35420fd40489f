//! C5 — Command dispatcher.
//!
//! Routes a parsed outer [`Frame`] to its handler by `cmd`, producing the
//! ACK to write back and the domain events to emit. Every uplink that
//! reaches this point already passed the frame codec (§4.1); handlers only
//! see well-formed frames.

use crate::constants::cmd as outer_cmd;
use crate::error::CoreResult;
use crate::event::CoreEvent;
use crate::frame::Frame;
use crate::handlers;
use crate::session::SessionTracker;
use crate::transport::Clock;
use bytes::Bytes;

pub struct DispatchOutcome {
    pub ack: Bytes,
    pub events: Vec<CoreEvent>,
}

pub async fn dispatch(frame: &Frame, tracker: &SessionTracker, clock: &dyn Clock) -> CoreResult<DispatchOutcome> {
    match frame.cmd {
        outer_cmd::HEARTBEAT => {
            handlers::heartbeat::validate(frame)?;
            Ok(DispatchOutcome {
                ack: handlers::heartbeat::ack_bytes(frame, clock),
                events: vec![handlers::heartbeat::device_heartbeat(frame, clock)],
            })
        }
        outer_cmd::TLV => {
            let outcome = handlers::status::handle(frame, tracker, clock).await?;
            Ok(DispatchOutcome {
                ack: outcome.ack,
                events: outcome.events,
            })
        }
        outer_cmd::CONTROL => {
            let outcome = handlers::control::handle(frame, tracker, clock).await?;
            Ok(DispatchOutcome {
                ack: outcome.ack,
                events: outcome.events,
            })
        }
        outer_cmd::NETWORK_LIST => {
            let outcome = handlers::network::handle(frame, clock)?;
            Ok(DispatchOutcome {
                ack: outcome.ack,
                events: outcome.events,
            })
        }
        outer_cmd::OTA => {
            let outcome = handlers::ota::handle(frame, clock)?;
            Ok(DispatchOutcome {
                ack: outcome.ack,
                events: outcome.events,
            })
        }
        outer_cmd::POWER_LEVEL_END | outer_cmd::SERVICE_FEE_END => {
            let outcome = handlers::billing::handle(frame, tracker, clock).await?;
            Ok(DispatchOutcome {
                ack: outcome.ack,
                events: outcome.events,
            })
        }
        _ => Ok(DispatchOutcome {
            ack: handlers::misc::handle(frame)?,
            events: Vec::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HEARTBEAT_MIN_LEN;
    use crate::frame::Direction;
    use crate::gateway_id::GatewayId;
    use crate::transport::SystemClock;
    use std::str::FromStr;

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    #[tokio::test]
    async fn routes_heartbeat_to_its_handler() {
        let tracker = SessionTracker::new();
        let clock = SystemClock;
        let data = vec![0u8; HEARTBEAT_MIN_LEN];
        let raw = Frame::build(Direction::Uplink, outer_cmd::HEARTBEAT, 1, gw(), &data);
        let frame = Frame::parse(&raw).unwrap();

        let outcome = dispatch(&frame, &tracker, &clock).await.unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(outcome.events[0], CoreEvent::DeviceHeartbeat { .. }));
    }

    #[tokio::test]
    async fn routes_network_list_to_its_handler() {
        let tracker = SessionTracker::new();
        let clock = SystemClock;
        let raw = Frame::build(Direction::Uplink, outer_cmd::NETWORK_LIST, 1, gw(), &[0x08, 0x00]);
        let frame = Frame::parse(&raw).unwrap();

        let outcome = dispatch(&frame, &tracker, &clock).await.unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(outcome.events[0], CoreEvent::NetworkTopology { .. }));
    }

    #[tokio::test]
    async fn routes_unknown_outer_cmd_to_passthrough_ack() {
        let tracker = SessionTracker::new();
        let clock = SystemClock;
        let raw = Frame::build(Direction::Uplink, outer_cmd::CARD_SWIPE, 1, gw(), b"x");
        let frame = Frame::parse(&raw).unwrap();

        let outcome = dispatch(&frame, &tracker, &clock).await.unwrap();
        assert!(outcome.events.is_empty());
        let ack_frame = Frame::parse(&outcome.ack).unwrap();
        assert_eq!(ack_frame.cmd, outer_cmd::CARD_SWIPE);
    }
}
