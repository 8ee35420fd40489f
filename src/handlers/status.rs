//! BKV TLV handler (outer cmd=0x1000, §4.3/§4.7): status reports, the
//! short-form charging end, exception reports, and parameter traffic.

use crate::ack;
use crate::constants::tag;
use crate::error::CoreResult;
use crate::event::{CoreEvent, EventBuilder};
use crate::frame::Frame;
use crate::reason::derive_end_reason;
use crate::session::{LookupSource, SessionTracker};
use crate::tlv::Payload;
use crate::transport::Clock;
use bytes::Bytes;
use tracing::{debug, trace};

/// Parsed outcome of a single cmd=0x1000 uplink: the ACK to send back plus
/// whatever domain events it produced. A status report with no matching
/// session still gets acked — ACKs never depend on session state (§4.4).
pub struct Outcome {
    pub ack: Bytes,
    pub events: Vec<CoreEvent>,
}

pub async fn handle(frame: &Frame, tracker: &SessionTracker, clock: &dyn Clock) -> CoreResult<Outcome> {
    let payload = Payload::parse(&frame.data)?;
    let builder = EventBuilder::new(frame.gateway_id, clock);
    let now = clock.now();

    let mut events = Vec::new();
    trace!(gateway_id = %frame.gateway_id, cmd = payload.cmd, "tlv payload");

    if payload.is_status_report() {
        for port in payload.socket_status() {
            let (Some(port_no), Some(raw_status)) = (port.port_no, port.raw_status) else {
                continue;
            };

            events.push(builder.port_snapshot(port_no, raw_status, port.instant_power_dw.unwrap_or(0)));

            if let Some(business_no) = port.business_no {
                if port.charging() {
                    if tracker.promote(frame.gateway_id, port_no, business_no, now).await {
                        debug!(gateway_id = %frame.gateway_id, port_no, business_no, "pending session promoted");
                        events.push(builder.session_started(port_no, business_no));
                    }
                } else if derive_end_reason(raw_status) != crate::reason::EndReason::Normal {
                    debug!(gateway_id = %frame.gateway_id, port_no, "session ended by status report");
                    tracker.end(frame.gateway_id, port_no, now).await;
                }
            }
        }
    } else if payload.is_charging_end() {
        if let Some(event) = charging_end_event(&payload, tracker, &builder, now).await {
            events.push(event);
        }
    } else if payload.is_exception_report() {
        let code = payload.u8_field(tag::RESULT).unwrap_or(0);
        let port = payload.u8_field(tag::PORT_NO);
        events.push(builder.exception_reported(port, code));
    } else if payload.is_parameter_set_ack() {
        let accepted = payload.u8_field(tag::RESULT).map(|r| r != 0).unwrap_or(false);
        events.push(builder.parameter_acked(accepted));
    } else if payload.is_parameter_query() {
        let values = param_values(&payload);
        events.push(builder.param_result(values));
    } else if payload.is_parameter_set() {
        let values = param_values(&payload);
        events.push(builder.param_sync(values));
    }

    let ack = ack::status_ack_ok(payload.cmd, payload.frame_seq, frame.gateway_id);
    Ok(Outcome { ack, events })
}

fn param_values(payload: &Payload) -> Vec<(u8, u16)> {
    payload.fields.iter().map(|f| (f.tag, f.as_u16_be())).collect()
}

/// Resolves the session either by the explicit portNo field (when present)
/// or, failing that, the businessNo fallback (§4.7 S5): a `SessionEnded` is
/// still emitted with no known port rather than dropped silently.
async fn charging_end_event(
    payload: &Payload,
    tracker: &SessionTracker,
    builder: &EventBuilder<'_>,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<CoreEvent> {
    let business_no = payload.u16_field(tag::BUSINESS_NO)?;
    let energy_kwh01 = payload.u16_field(tag::ENERGY_USED).unwrap_or(0);
    let duration_min = payload.u16_field(tag::CHARGING_TIME).unwrap_or(0);
    let raw_status = payload.u8_field(tag::PORT_STATUS).unwrap_or(0);
    let duration_sec = duration_min as u32 * 60;
    let reason = derive_end_reason(raw_status);
    let gateway_id = builder.gateway_id();

    let resolved_port = match payload.u8_field(tag::PORT_NO) {
        Some(p) => Some(p),
        None => tracker.find_port_by_business_no(gateway_id, business_no).await,
    };

    match resolved_port {
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
        None => Some(builder.session_ended(
            None,
            business_no,
            energy_kwh01,
            duration_sec,
            reason,
            LookupSource::BusinessNoFallback,
            Some(format!("{business_no:04X}")),
            None,
        )),
    }
}
