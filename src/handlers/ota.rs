//! OTA handler (outer cmd=0x0007, §4.5): firmware push progress reports.
//!
//! Firmware sends a short `status`-only response for a plain trigger
//! acknowledgment, and a longer `status, progress, [errorMsg]` report while
//! an update is actually running.

use crate::constants::cmd as outer_cmd;
use crate::error::CoreResult;
use crate::event::{CoreEvent, EventBuilder, OtaStatus};
use crate::frame::{Direction, Frame};
use crate::transport::Clock;
use bytes::Bytes;
use tracing::trace;

pub struct Outcome {
    pub ack: Bytes,
    pub events: Vec<CoreEvent>,
}

/// Raw status byte → coarse lifecycle state. 0 while the transfer is still
/// running, 1 on a verified completion, 2 or 3 for the two failure modes
/// this firmware generation reports (transfer failure and verification
/// failure) — both collapse to `Failed` since this crate carries no
/// separate "verification failed" event.
fn ota_status(raw: u8) -> OtaStatus {
    match raw {
        0 => OtaStatus::InProgress,
        1 => OtaStatus::Completed,
        _ => OtaStatus::Failed,
    }
}

pub fn handle(frame: &Frame, clock: &dyn Clock) -> CoreResult<Outcome> {
    let data = &frame.data[..];
    let (status, progress_pct, error_msg) = if data.len() < 4 {
        let status = data.first().copied().unwrap_or(0);
        (status, None, None)
    } else {
        let status = data[0];
        let progress = data.get(1).copied();
        let error_msg = if status >= 2 {
            let text = String::from_utf8_lossy(&data[2..]).trim_end_matches('\0').to_string();
            (!text.is_empty()).then_some(text)
        } else {
            None
        };
        (status, progress, error_msg)
    };

    trace!(gateway_id = %frame.gateway_id, status, "ota progress");

    let builder = EventBuilder::new(frame.gateway_id, clock);
    let event = builder.ota_progress(ota_status(status), progress_pct, error_msg);

    let ack = Frame::build(Direction::Downlink, outer_cmd::OTA, frame.msg_id, frame.gateway_id, &[]);
    Ok(Outcome { ack, events: vec![event] })
}
