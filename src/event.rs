//! C9 — Domain event builder and sink.
//!
//! Handlers derive [`CoreEvent`]s from parsed uplinks and push them through
//! a [`crate::transport::CoreEventSink`]; this crate stops at the trait
//! boundary (no webhook delivery, no persistence — spec.md §6 Non-goals).

use crate::gateway_id::GatewayId;
use crate::reason::EndReason;
use crate::session::LookupSource;
use crate::transport::Clock;
use chrono::{DateTime, Utc};

/// Action a network-list (outer cmd 0x0005) report acknowledged (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkAction {
    RefreshAck,
    AddAck,
    DeleteAck,
}

/// Coarse OTA lifecycle state (§4.5), collapsing firmware's raw status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    DeviceHeartbeat {
        gateway_id: GatewayId,
        rssi: i8,
        iccid: Option<String>,
        at: DateTime<Utc>,
    },
    SessionStarted {
        gateway_id: GatewayId,
        port: u8,
        business_no: u16,
        at: DateTime<Utc>,
    },
    SessionEnded {
        gateway_id: GatewayId,
        /// `None` when the session was resolved by the businessNo fallback
        /// and no tracked port could be identified.
        port: Option<u8>,
        business_no: u16,
        energy_kwh01: u16,
        duration_sec: u32,
        reason: EndReason,
        lookup_source: LookupSource,
        order_no: Option<String>,
        /// Present only for billing-derived ends (power-level/service-fee).
        total_amount: Option<u32>,
        at: DateTime<Utc>,
    },
    ExceptionReported {
        gateway_id: GatewayId,
        port: Option<u8>,
        code: u8,
        at: DateTime<Utc>,
    },
    ParameterAcked {
        gateway_id: GatewayId,
        accepted: bool,
        at: DateTime<Utc>,
    },
    PortSnapshot {
        gateway_id: GatewayId,
        port: u8,
        raw_status: u8,
        power_dw: u16,
        at: DateTime<Utc>,
    },
    NetworkTopology {
        gateway_id: GatewayId,
        action: NetworkAction,
        upsert_count: u32,
        failure_count: u32,
        at: DateTime<Utc>,
    },
    OTAProgress {
        gateway_id: GatewayId,
        status: OtaStatus,
        progress_pct: Option<u8>,
        error_msg: Option<String>,
        at: DateTime<Utc>,
    },
    ParamResult {
        gateway_id: GatewayId,
        values: Vec<(u8, u16)>,
        at: DateTime<Utc>,
    },
    ParamSync {
        gateway_id: GatewayId,
        values: Vec<(u8, u16)>,
        at: DateTime<Utc>,
    },
}

impl CoreEvent {
    pub fn gateway_id(&self) -> GatewayId {
        match self {
            CoreEvent::DeviceHeartbeat { gateway_id, .. }
            | CoreEvent::SessionStarted { gateway_id, .. }
            | CoreEvent::SessionEnded { gateway_id, .. }
            | CoreEvent::ExceptionReported { gateway_id, .. }
            | CoreEvent::ParameterAcked { gateway_id, .. }
            | CoreEvent::PortSnapshot { gateway_id, .. }
            | CoreEvent::NetworkTopology { gateway_id, .. }
            | CoreEvent::OTAProgress { gateway_id, .. }
            | CoreEvent::ParamResult { gateway_id, .. }
            | CoreEvent::ParamSync { gateway_id, .. } => *gateway_id,
        }
    }
}

/// Stamps every event it produces with the same gateway id and a reading
/// from an injected clock, so handlers don't repeat `Utc::now()` calls that
/// would otherwise make tests non-deterministic (§3 supplement).
pub struct EventBuilder<'a> {
    gateway_id: GatewayId,
    clock: &'a dyn Clock,
}

impl<'a> EventBuilder<'a> {
    pub fn new(gateway_id: GatewayId, clock: &'a dyn Clock) -> Self {
        Self { gateway_id, clock }
    }

    pub fn gateway_id(&self) -> GatewayId {
        self.gateway_id
    }

    pub fn device_heartbeat(&self, rssi: i8, iccid: Option<String>) -> CoreEvent {
        CoreEvent::DeviceHeartbeat {
            gateway_id: self.gateway_id,
            rssi,
            iccid,
            at: self.clock.now(),
        }
    }

    pub fn session_started(&self, port: u8, business_no: u16) -> CoreEvent {
        CoreEvent::SessionStarted {
            gateway_id: self.gateway_id,
            port,
            business_no,
            at: self.clock.now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn session_ended(
        &self,
        port: Option<u8>,
        business_no: u16,
        energy_kwh01: u16,
        duration_sec: u32,
        reason: EndReason,
        lookup_source: LookupSource,
        order_no: Option<String>,
        total_amount: Option<u32>,
    ) -> CoreEvent {
        CoreEvent::SessionEnded {
            gateway_id: self.gateway_id,
            port,
            business_no,
            energy_kwh01,
            duration_sec,
            reason,
            lookup_source,
            order_no,
            total_amount,
            at: self.clock.now(),
        }
    }

    pub fn exception_reported(&self, port: Option<u8>, code: u8) -> CoreEvent {
        CoreEvent::ExceptionReported {
            gateway_id: self.gateway_id,
            port,
            code,
            at: self.clock.now(),
        }
    }

    pub fn parameter_acked(&self, accepted: bool) -> CoreEvent {
        CoreEvent::ParameterAcked {
            gateway_id: self.gateway_id,
            accepted,
            at: self.clock.now(),
        }
    }

    pub fn port_snapshot(&self, port: u8, raw_status: u8, power_dw: u16) -> CoreEvent {
        CoreEvent::PortSnapshot {
            gateway_id: self.gateway_id,
            port,
            raw_status,
            power_dw,
            at: self.clock.now(),
        }
    }

    pub fn network_topology(&self, action: NetworkAction, upsert_count: u32, failure_count: u32) -> CoreEvent {
        CoreEvent::NetworkTopology {
            gateway_id: self.gateway_id,
            action,
            upsert_count,
            failure_count,
            at: self.clock.now(),
        }
    }

    pub fn ota_progress(&self, status: OtaStatus, progress_pct: Option<u8>, error_msg: Option<String>) -> CoreEvent {
        CoreEvent::OTAProgress {
            gateway_id: self.gateway_id,
            status,
            progress_pct,
            error_msg,
            at: self.clock.now(),
        }
    }

    pub fn param_result(&self, values: Vec<(u8, u16)>) -> CoreEvent {
        CoreEvent::ParamResult {
            gateway_id: self.gateway_id,
            values,
            at: self.clock.now(),
        }
    }

    pub fn param_sync(&self, values: Vec<(u8, u16)>) -> CoreEvent {
        CoreEvent::ParamSync {
            gateway_id: self.gateway_id,
            values,
            at: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    #[test]
    fn builder_stamps_gateway_id_and_clock_reading() {
        let ts = chrono::Utc::now();
        let clock = FixedClock(ts);
        let builder = EventBuilder::new(gw(), &clock);

        let event = builder.session_started(0, 0x0068);
        assert_eq!(event.gateway_id(), gw());
        match event {
            CoreEvent::SessionStarted { port, business_no, at, .. } => {
                assert_eq!(port, 0);
                assert_eq!(business_no, 0x0068);
                assert_eq!(at, ts);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn session_ended_carries_fallback_lookup_metadata() {
        let ts = chrono::Utc::now();
        let clock = FixedClock(ts);
        let builder = EventBuilder::new(gw(), &clock);

        let event = builder.session_ended(
            None,
            0x0068,
            0,
            0,
            EndReason::Normal,
            LookupSource::BusinessNoFallback,
            Some("0068".into()),
            None,
        );
        match event {
            CoreEvent::SessionEnded { port, lookup_source, order_no, .. } => {
                assert_eq!(port, None);
                assert_eq!(lookup_source, LookupSource::BusinessNoFallback);
                assert_eq!(order_no.as_deref(), Some("0068"));
            }
            _ => panic!("wrong variant"),
        }
    }
}
