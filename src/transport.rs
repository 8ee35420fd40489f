//! External collaborator interfaces (spec.md §6): the adapter and handlers
//! depend only on these traits, never on a concrete socket, clock, or event
//! bus. Connection acceptance, auth, persistence, and webhook delivery are
//! the caller's concern — this crate only defines the seam.

use crate::error::CoreResult;
use crate::event::CoreEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single device connection's write half. Implementors own the actual
/// socket/retry/backpressure handling; this crate only needs "send these
/// bytes" (used for ACKs and downlink commands).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn write_frame(&self, bytes: &[u8]) -> CoreResult<()>;
}

/// Receives domain events as they're derived from uplinks. Emission is
/// synchronous and non-fatal (§4.9): a sink error is logged by the caller,
/// never allowed to unwind into the dispatcher.
#[async_trait]
pub trait CoreEventSink: Send + Sync {
    async fn emit(&self, event: CoreEvent);
}

/// Injected time source, so the session tracker's TTL logic is testable
/// without sleeping (§3 supplement).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
