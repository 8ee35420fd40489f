//! C7 — Per-outer-cmd handlers. [`crate::dispatch`] routes a parsed
//! [`crate::frame::Frame`] to exactly one of these.

pub mod billing;
pub mod control;
pub mod heartbeat;
pub mod misc;
pub mod network;
pub mod ota;
pub mod status;
