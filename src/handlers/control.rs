//! Control-umbrella handler (outer cmd=0x0015, §4.3 long form, §4.7-4.8).
//!
//! Every inner payload here shares `length:2, subcmd:1, ...`; `length` is
//! advisory (never checked against the actual remaining byte count) and
//! `subcmd` decides which fixed-position layout follows.

use crate::ack;
use crate::constants::CtrlSub;
use crate::error::{CoreError, CoreResult};
use crate::event::{CoreEvent, EventBuilder};
use crate::frame::Frame;
use crate::reason::derive_end_reason;
use crate::session::{LookupSource, SessionTracker};
use crate::transport::Clock;
use bytes::Bytes;
use tracing::{debug, trace, warn};

pub struct Outcome {
    pub ack: Bytes,
    pub events: Vec<CoreEvent>,
}

/// Minimum remainder length for the charging-end long form: socketNo(1) +
/// reserved(5) + portStatus(1) + businessNo(2) + reserved(4) +
/// energyKWh01(2) + chargingTimeMinutes(2) = 17 bytes (§4.3). Checked with
/// `>=`, not `==`: some firmwares append a trailing checksum byte here.
const CHARGING_END_MIN_LEN: usize = 17;

pub async fn handle(frame: &Frame, tracker: &SessionTracker, clock: &dyn Clock) -> CoreResult<Outcome> {
    if frame.data.len() < 3 {
        return Err(CoreError::InvalidPayload("control payload shorter than length+subcmd prefix".into()));
    }
    let subcmd = CtrlSub::from(frame.data[2]);
    let rest = &frame.data[3..];
    trace!(gateway_id = %frame.gateway_id, ?subcmd, "control-umbrella frame");

    let builder = EventBuilder::new(frame.gateway_id, clock);
    let now = clock.now();
    let mut events = Vec::new();

    if subcmd.is_charging_end() {
        if let Some(event) = charging_end_event(rest, tracker, &builder, now).await {
            debug!(gateway_id = %frame.gateway_id, "charging session ended");
            events.push(event);
        } else {
            warn!(gateway_id = %frame.gateway_id, "charging-end payload too short");
        }
    } else if subcmd.is_control_ack() {
        // rest = result:1, socketNo:1, portNo:1, businessNo:2.
        if rest.len() >= 5 {
            let port_no = rest[2];
            let business_no = u16::from_be_bytes([rest[3], rest[4]]);
            if tracker.promote(frame.gateway_id, port_no, business_no, now).await {
                debug!(gateway_id = %frame.gateway_id, port_no, business_no, "pending session promoted");
                events.push(builder.session_started(port_no, business_no));
            } else {
                warn!(gateway_id = %frame.gateway_id, port_no, business_no, "control-ack did not match a pending session");
            }
        }
    } else {
        // Card-swipe, order-confirm, balance-query, voice-config,
        // socket-state-query: acknowledged, no session-affecting event.
    }

    let ack = ack::charging_end_ack(frame.msg_id, frame.gateway_id, true);
    Ok(Outcome { ack, events })
}

/// Resolves the session either by a direct tracker hit (businessNo still
/// tracked against a port) or, failing that, the businessNo fallback (§4.7
/// S5): a `SessionEnded` is still emitted, with no known port, so the
/// platform isn't left blind to an end-report it can't otherwise place.
async fn charging_end_event(
    rest: &[u8],
    tracker: &SessionTracker,
    builder: &EventBuilder<'_>,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<CoreEvent> {
    if rest.len() < CHARGING_END_MIN_LEN {
        return None;
    }
    let raw_status = rest[6];
    let business_no = u16::from_be_bytes([rest[7], rest[8]]);
    let energy_kwh01 = u16::from_be_bytes([rest[13], rest[14]]);
    let duration_min = u16::from_be_bytes([rest[15], rest[16]]);
    let duration_sec = duration_min as u32 * 60;
    let reason = derive_end_reason(raw_status);
    let gateway_id = builder.gateway_id();

    match tracker.find_port_by_business_no(gateway_id, business_no).await {
        Some(port_no) => {
            let order_no = tracker.lookup(gateway_id, port_no).await.map(|r| r.order_no);
            tracker.end(gateway_id, port_no, now).await;
            Some(builder.session_ended(
                Some(port_no),
                business_no,
                energy_kwh01,
                duration_sec,
                reason,
                LookupSource::TrackerHit,
                order_no,
                None,
            ))
        }
        None => {
            warn!(%gateway_id, business_no, "charging-end businessNo matched no tracked session, falling back");
            Some(builder.session_ended(
                None,
                business_no,
                energy_kwh01,
                duration_sec,
                reason,
                LookupSource::BusinessNoFallback,
                Some(format!("{business_no:04X}")),
                None,
            ))
        }
    }
}
