//! C6 — Session tracker.
//!
//! Correlates uplinks that belong to the same charging session, keyed by
//! `(gatewayId, port)` (spec.md §4.6). The device — not the platform —
//! assigns `businessNo`; a `StartCharge` only creates a placeholder PENDING
//! record under an `orderNo` the platform chose. The businessNo becomes
//! known, and immutable, only once the device's control-ACK promotes the
//! record to CHARGING.
//!
//! Mutation goes through `SessionTracker`'s methods, mirroring the
//! lock-then-mutate-then-stamp shape used for shared session state
//! elsewhere in this stack.

use crate::gateway_id::GatewayId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub gateway_id: GatewayId,
    pub port: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Charging,
    Ended,
}

/// How a lookup that produced a `SessionEnded`/`SessionStarted` event located
/// its session (§3): a direct tracker hit, a fallback scan by businessNo
/// when no record matched the reporting port, or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    TrackerHit,
    BusinessNoFallback,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub state: SessionState,
    /// Platform-chosen identifier assigned at StartCharge (§3); stable for
    /// the life of the record.
    pub order_no: String,
    /// Device-assigned correlation id. Zero while PENDING (the device
    /// hasn't reported one yet); bound once, immutably, on promotion.
    pub business_no: u16,
    pub lookup_source: LookupSource,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn ttl_secs(state: SessionState) -> i64 {
        match state {
            SessionState::Pending => crate::constants::PENDING_TTL_SECS,
            SessionState::Charging => crate::constants::CHARGING_TTL_SECS,
            SessionState::Ended => 0,
        }
    }
}

type SessionMap = Arc<RwLock<HashMap<SessionKey, SessionRecord>>>;

#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    sessions: SessionMap,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a pending session for a just-issued StartCharge, before the
    /// device has reported a businessNo back (§4.6). The platform does not
    /// know (and does not choose) the businessNo at this point, so the
    /// record starts with `business_no = 0` until [`Self::promote`] binds
    /// whatever the device assigns.
    pub async fn track_pending(&self, gateway_id: GatewayId, port: u8, order_no: String, now: DateTime<Utc>) {
        let key = SessionKey { gateway_id, port };
        let record = SessionRecord {
            state: SessionState::Pending,
            order_no,
            business_no: 0,
            lookup_source: LookupSource::TrackerHit,
            started_at: now,
            expires_at: now + chrono::Duration::seconds(SessionRecord::ttl_secs(SessionState::Pending)),
        };
        self.sessions.write().await.insert(key, record);
    }

    /// Bind a device-assigned businessNo to a pending session and promote it
    /// to charging. The device chooses this value; the tracker's only job is
    /// to accept it for any still-pending record (§4.6: "transition
    /// PENDING → CHARGING requires a control ACK with result=success and a
    /// non-zero businessNo"). Returns `false` if no session is tracked for
    /// this port, the record isn't PENDING, or the reported businessNo is
    /// zero.
    pub async fn promote(&self, gateway_id: GatewayId, port: u8, business_no: u16, now: DateTime<Utc>) -> bool {
        let key = SessionKey { gateway_id, port };
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&key) {
            Some(record) if record.state == SessionState::Pending && business_no != 0 => {
                record.business_no = business_no;
                record.state = SessionState::Charging;
                record.expires_at = now + chrono::Duration::seconds(SessionRecord::ttl_secs(SessionState::Charging));
                true
            }
            _ => false,
        }
    }

    /// Mark a session ended. Kept around (rather than removed outright)
    /// until the next sweep so a duplicate end-report doesn't re-create a
    /// fresh pending session for the same port.
    pub async fn end(&self, gateway_id: GatewayId, port: u8, now: DateTime<Utc>) {
        let key = SessionKey { gateway_id, port };
        if let Some(record) = self.sessions.write().await.get_mut(&key) {
            record.state = SessionState::Ended;
            record.expires_at = now;
        }
    }

    pub async fn lookup(&self, gateway_id: GatewayId, port: u8) -> Option<SessionRecord> {
        let key = SessionKey { gateway_id, port };
        self.sessions.read().await.get(&key).cloned()
    }

    /// Find the port currently tracking a given businessNo on this device,
    /// for wire layouts that report businessNo without an explicit port
    /// (§4.3 charging-end long form).
    pub async fn find_port_by_business_no(&self, gateway_id: GatewayId, business_no: u16) -> Option<u8> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|(k, v)| k.gateway_id == gateway_id && v.business_no == business_no)
            .map(|(k, _)| k.port)
    }

    pub async fn clear(&self, gateway_id: GatewayId, port: u8) {
        let key = SessionKey { gateway_id, port };
        self.sessions.write().await.remove(&key);
    }

    /// Drop every session whose TTL has elapsed as of `now`. Pure function
    /// of tracker state plus the supplied clock reading; callers decide how
    /// often to invoke it (spec.md explicitly keeps the scheduling loop
    /// outside this crate).
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<SessionKey> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<SessionKey> = sessions
            .iter()
            .filter(|(_, v)| v.expires_at <= now)
            .map(|(k, _)| *k)
            .collect();
        for key in &expired {
            sessions.remove(key);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired sessions");
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn gw() -> GatewayId {
        GatewayId::from_str("82200520004869").unwrap()
    }

    fn now() -> DateTime<Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn promote_binds_the_device_assigned_business_no() {
        let tracker = SessionTracker::new();
        tracker.track_pending(gw(), 0, "ORDER1".into(), now()).await;

        // The pending placeholder carries business_no=0; the device assigns
        // 0x0068 only on the control-ACK. Promotion must bind it, not
        // require it to already match.
        assert!(tracker.promote(gw(), 0, 0x0068, now()).await);
        let record = tracker.lookup(gw(), 0).await.unwrap();
        assert_eq!(record.state, SessionState::Charging);
        assert_eq!(record.business_no, 0x0068);
        assert_eq!(record.order_no, "ORDER1");
    }

    #[tokio::test]
    async fn rejects_zero_business_no() {
        let tracker = SessionTracker::new();
        tracker.track_pending(gw(), 0, "ORDER1".into(), now()).await;

        assert!(!tracker.promote(gw(), 0, 0, now()).await);
        let record = tracker.lookup(gw(), 0).await.unwrap();
        assert_eq!(record.state, SessionState::Pending);
    }

    #[tokio::test]
    async fn rejects_promote_on_non_pending_record() {
        let tracker = SessionTracker::new();
        tracker.track_pending(gw(), 0, "ORDER1".into(), now()).await;
        assert!(tracker.promote(gw(), 0, 0x0068, now()).await);

        // Already Charging: a second promote attempt must not re-bind.
        assert!(!tracker.promote(gw(), 0, 0x0099, now()).await);
        let record = tracker.lookup(gw(), 0).await.unwrap();
        assert_eq!(record.business_no, 0x0068);
    }

    #[tokio::test]
    async fn sweeps_expired_pending_sessions() {
        let tracker = SessionTracker::new();
        tracker.track_pending(gw(), 0, "ORDER1".into(), now()).await;

        let later = now() + chrono::Duration::seconds(crate::constants::PENDING_TTL_SECS + 1);
        let expired = tracker.sweep_expired(later).await;
        assert_eq!(expired.len(), 1);
        assert!(tracker.lookup(gw(), 0).await.is_none());
    }

    #[tokio::test]
    async fn finds_port_by_business_no_without_explicit_port() {
        let tracker = SessionTracker::new();
        tracker.track_pending(gw(), 3, "ORDER1".into(), now()).await;
        tracker.promote(gw(), 3, 0x0068, now()).await;

        assert_eq!(tracker.find_port_by_business_no(gw(), 0x0068).await, Some(3));
        assert_eq!(tracker.find_port_by_business_no(gw(), 0xDEAD).await, None);
    }
}
