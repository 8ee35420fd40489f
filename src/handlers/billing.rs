//! Billing-end handler (outer cmd=0x0018 power-level-end, 0x0019
//! service-fee-end, §4.5): alternate session-end shapes that carry a
//! settled amount instead of the usual energy/duration pair.
//!
//! `portNo:1, businessNo:2, totalAmount:4` (exact layout not pinned down by
//! the wire spec beyond field order — resolved here by analogy with the
//! other session-end reports, which all lead with the port identifier).

use crate::error::{CoreError, CoreResult};
use crate::event::{CoreEvent, EventBuilder};
use crate::frame::{Direction, Frame};
use crate::reason::EndReason;
use crate::session::{LookupSource, SessionTracker};
use crate::transport::Clock;
use bytes::Bytes;
use tracing::debug;

pub struct Outcome {
    pub ack: Bytes,
    pub events: Vec<CoreEvent>,
}

const MIN_LEN: usize = 7;

pub async fn handle(frame: &Frame, tracker: &SessionTracker, clock: &dyn Clock) -> CoreResult<Outcome> {
    if frame.data.len() < MIN_LEN {
        return Err(CoreError::InvalidPayload(format!(
            "billing-end payload shorter than {MIN_LEN} bytes, got {}",
            frame.data.len()
        )));
    }

    let port_no = frame.data[0];
    let business_no = u16::from_be_bytes([frame.data[1], frame.data[2]]);
    let total_amount = u32::from_be_bytes([frame.data[3], frame.data[4], frame.data[5], frame.data[6]]);
    let gateway_id = frame.gateway_id;
    let now = clock.now();

    let (lookup_source, order_no) = match tracker.lookup(gateway_id, port_no).await {
        Some(record) => (LookupSource::TrackerHit, Some(record.order_no)),
        None => match tracker.find_port_by_business_no(gateway_id, business_no).await {
            Some(_) => (LookupSource::BusinessNoFallback, Some(format!("{business_no:04X}"))),
            None => (LookupSource::NotFound, None),
        },
    };
    tracker.end(gateway_id, port_no, now).await;
    debug!(%gateway_id, port_no, business_no, total_amount, ?lookup_source, "billing-end session closed");

    let builder = EventBuilder::new(gateway_id, clock);
    let event = builder.session_ended(
        Some(port_no),
        business_no,
        0,
        0,
        EndReason::Normal,
        lookup_source,
        order_no,
        Some(total_amount),
    );

    let ack = Frame::build(Direction::Downlink, frame.cmd, frame.msg_id, gateway_id, &[port_no, 0x00]);
    Ok(Outcome { ack, events: vec![event] })
}
