//! C11 — Adapter facade.
//!
//! The single entry point a connection-owning caller needs: feed raw bytes
//! in, get ACK bytes and domain events out. Accepting connections, TLS,
//! authentication, and persistence stay outside this crate (§6 Non-goals);
//! this facade only re-frames, dispatches, and reports what happened.

use crate::dispatch::dispatch;
use crate::error::CoreError;
use crate::event::CoreEvent;
use crate::framer::StreamFramer;
use crate::session::SessionTracker;
use crate::transport::Clock;
use bytes::Bytes;
use tracing::{trace, warn};

/// One outcome per frame successfully extracted from the fed bytes. A
/// frame that fails dispatch still yields an entry with `ack: None` and
/// the error noted on it — callers decide whether that's fatal to the
/// connection.
pub struct Processed {
    pub ack: Option<Bytes>,
    pub events: Vec<CoreEvent>,
    pub error: Option<CoreError>,
}

/// Per-connection protocol engine: owns the re-framing buffer and the
/// shared session tracker handle. Not `Send`-restricted beyond what its
/// fields require, so it can live behind a per-connection task.
pub struct Adapter<'a> {
    framer: StreamFramer,
    tracker: &'a SessionTracker,
    clock: &'a dyn Clock,
}

impl<'a> Adapter<'a> {
    pub fn new(tracker: &'a SessionTracker, clock: &'a dyn Clock) -> Self {
        Self {
            framer: StreamFramer::new(),
            tracker,
            clock,
        }
    }

    /// Feed newly-received bytes and process every frame they complete.
    pub async fn process_bytes(&mut self, bytes: &[u8]) -> Vec<Processed> {
        let frames = self.framer.feed(bytes);
        trace!(fed = bytes.len(), extracted = frames.len(), "process_bytes");
        let mut out = Vec::with_capacity(frames.len());

        for frame in &frames {
            match dispatch(frame, self.tracker, self.clock).await {
                Ok(outcome) => out.push(Processed {
                    ack: Some(outcome.ack),
                    events: outcome.events,
                    error: None,
                }),
                Err(err) => {
                    warn!(gateway_id = %frame.gateway_id, cmd = frame.cmd, error = %err, "dispatch failed");
                    out.push(Processed {
                        ack: None,
                        events: Vec::new(),
                        error: Some(err),
                    });
                }
            }
        }

        out
    }

    /// Cheap sniff used to decide whether a newly-accepted connection is
    /// speaking this protocol at all, before committing a framer to it
    /// (§4.1): true if `prefix` starts with either outer magic.
    pub fn sniff(prefix: &[u8]) -> bool {
        if prefix.len() < 2 {
            return false;
        }
        let candidate = u16::from_be_bytes([prefix[0], prefix[1]]);
        candidate == crate::constants::MAGIC_UPLINK || candidate == crate::constants::MAGIC_DOWNLINK
    }
}
