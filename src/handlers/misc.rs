//! Thin passthrough for outer codes some firmwares send standalone rather
//! than as a 0x0015 sub-command (§4.5). No session-affecting behavior is
//! defined for these at the wire level documented so far: acknowledge and
//! move on.

use crate::constants::cmd as outer_cmd;
use crate::error::CoreResult;
use crate::frame::{Direction, Frame};
use bytes::Bytes;
use tracing::trace;

pub fn handle(frame: &Frame) -> CoreResult<Bytes> {
    trace!(gateway_id = %frame.gateway_id, cmd = frame.cmd, "passthrough ack");
    Ok(Frame::build(Direction::Downlink, frame.cmd, frame.msg_id, frame.gateway_id, &[]))
}

/// Outer commands routed through [`handle`] rather than a dedicated
/// handler module.
pub const PASSTHROUGH_CMDS: &[u16] = &[
    outer_cmd::PARAM_SET,
    outer_cmd::PARAM_QUERY,
    outer_cmd::PARAM_SYNC,
    outer_cmd::PARAM_OTHER,
    outer_cmd::CARD_SWIPE,
    outer_cmd::ORDER_CONFIRM,
    outer_cmd::CHARGE_END,
    outer_cmd::BALANCE_QUERY,
    outer_cmd::VOICE_CONFIG,
    outer_cmd::SOCKET_STATE_QUERY,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway_id::GatewayId;
    use std::str::FromStr;

    #[test]
    fn acks_every_passthrough_cmd() {
        let gw = GatewayId::from_str("82200520004869").unwrap();
        for &cmd in PASSTHROUGH_CMDS {
            let raw = Frame::build(Direction::Uplink, cmd, 1, gw, b"x");
            let frame = Frame::parse(&raw).unwrap();
            let ack = handle(&frame).unwrap();
            let ack_frame = Frame::parse(&ack).unwrap();
            assert_eq!(ack_frame.cmd, cmd);
            assert_eq!(ack_frame.direction, Direction::Downlink);
        }
    }
}
