//! Protocol engine for the BKV gateway-facing smart-socket charging wire
//! protocol: frame codec, TLV sub-protocol, command dispatch, session
//! correlation, ACK building, and downlink command encoding.
//!
//! This crate stops at the wire boundary. Accepting TCP connections,
//! authentication, persistence, HTTP/webhook delivery, and metrics are the
//! caller's concern (see [`transport`] for the seams this crate expects
//! the caller to implement).

pub mod ack;
pub mod adapter;
pub mod command;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod frame;
pub mod framer;
pub mod gateway_id;
pub mod handlers;
pub mod reason;
pub mod session;
pub mod tlv;
pub mod transport;

pub use adapter::{Adapter, Processed};
pub use command::{ChargeMode, CoreCommand, MsgIdCounter};
pub use error::{CoreError, CoreResult};
pub use event::{CoreEvent, EventBuilder, NetworkAction, OtaStatus};
pub use frame::{Direction, Frame};
pub use gateway_id::GatewayId;
pub use session::{LookupSource, SessionKey, SessionRecord, SessionState, SessionTracker};
pub use transport::{Clock, CoreEventSink, SystemClock, Transport};
