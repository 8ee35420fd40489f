//! C8 — Downlink command source.
//!
//! Encodes platform-issued commands into downlink frames (spec.md §4.8).
//! Control-umbrella variants (StartCharge, StopCharge, CancelSession,
//! QueryPortStatus) share the `length:2, subcmd:1, <variant fields>` shape
//! on outer cmd=0x0015; `length` is advisory only (§4.3, §4.8) and is never
//! relied on by the parsing side of this crate. SetParams, TriggerOTA, and
//! ConfigureNetwork each own a dedicated outer cmd instead.

use crate::constants::{cmd, ctrl_sub};
use crate::error::{CoreError, CoreResult};
use crate::frame::{Direction, Frame};
use crate::gateway_id::GatewayId;
use crate::session::SessionTracker;
use crate::transport::{Clock, Transport};
use bytes::Bytes;
use std::sync::atomic::{AtomicU16, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeMode {
    /// Charge for a fixed duration.
    Duration,
    /// Charge until a fixed energy budget is delivered.
    Energy,
    /// Charge at a fixed power level.
    Power,
    /// Charge to full.
    Full,
    /// Firmware-specific mode code not covered by the named variants.
    Custom(u8),
}

impl ChargeMode {
    fn code(self) -> u8 {
        match self {
            ChargeMode::Duration => 1,
            ChargeMode::Energy => 2,
            ChargeMode::Power => 3,
            ChargeMode::Full => 4,
            ChargeMode::Custom(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    StartCharge {
        gateway_id: GatewayId,
        socket: u8,
        port: u8,
        mode: ChargeMode,
        duration_secs: u32,
        /// Platform-chosen correlation id; the device's own businessNo is
        /// assigned later and bound by `SessionTracker::promote` (§4.6).
        order_no: String,
    },
    StopCharge {
        gateway_id: GatewayId,
        socket: u8,
        port: u8,
        business_no: u16,
    },
    CancelSession {
        gateway_id: GatewayId,
        socket: u8,
        port: u8,
        business_no: u16,
    },
    QueryPortStatus {
        gateway_id: GatewayId,
        socket: u8,
    },
    SetParams {
        gateway_id: GatewayId,
        params: Vec<(u8, Vec<u8>)>,
    },
    TriggerOTA {
        gateway_id: GatewayId,
        target_type: u8,
        socket: u8,
        ftp_server_ip: [u8; 4],
        ftp_port: u16,
        filename: String,
    },
    ConfigureNetwork {
        gateway_id: GatewayId,
        channel: u8,
        entries: Vec<(u8, [u8; 6])>,
    },
}

impl CoreCommand {
    pub fn gateway_id(&self) -> GatewayId {
        match self {
            CoreCommand::StartCharge { gateway_id, .. }
            | CoreCommand::StopCharge { gateway_id, .. }
            | CoreCommand::CancelSession { gateway_id, .. }
            | CoreCommand::QueryPortStatus { gateway_id, .. }
            | CoreCommand::SetParams { gateway_id, .. }
            | CoreCommand::TriggerOTA { gateway_id, .. }
            | CoreCommand::ConfigureNetwork { gateway_id, .. } => *gateway_id,
        }
    }

    /// Reject commands missing fields the encoder needs to produce a
    /// meaningful frame. Encoding itself never fails — any shape that
    /// passes validation always has a well-formed wire representation.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            CoreCommand::StartCharge { order_no, .. } if order_no.is_empty() => {
                Err(CoreError::InvalidCommand("StartCharge requires a non-empty order_no".into()))
            }
            CoreCommand::SetParams { params, .. } if params.is_empty() => {
                Err(CoreError::InvalidCommand("SetParams requires at least one param".into()))
            }
            CoreCommand::TriggerOTA { filename, .. } if filename.len() > 12 => Err(CoreError::InvalidCommand(format!(
                "TriggerOTA filename must be at most 12 bytes, got {}",
                filename.len()
            ))),
            CoreCommand::ConfigureNetwork { entries, .. } if entries.is_empty() => {
                Err(CoreError::InvalidCommand("ConfigureNetwork requires at least one entry".into()))
            }
            _ => Ok(()),
        }
    }

    /// Encode into a complete downlink frame ready for the wire.
    pub fn encode(&self, msg_id: u32) -> Bytes {
        match self {
            CoreCommand::StartCharge {
                gateway_id,
                socket,
                port,
                mode,
                duration_secs,
                ..
            } => Frame::build(
                Direction::Downlink,
                cmd::CONTROL,
                msg_id,
                *gateway_id,
                &encode_start_charge(*socket, *port, *mode, *duration_secs),
            ),
            CoreCommand::StopCharge {
                gateway_id,
                socket,
                port,
                business_no,
            }
            | CoreCommand::CancelSession {
                gateway_id,
                socket,
                port,
                business_no,
            } => Frame::build(
                Direction::Downlink,
                cmd::CONTROL,
                msg_id,
                *gateway_id,
                &encode_stop_or_cancel(*socket, *port, *business_no),
            ),
            CoreCommand::QueryPortStatus { gateway_id, socket } => Frame::build(
                Direction::Downlink,
                cmd::CONTROL,
                msg_id,
                *gateway_id,
                &[0x00, 0x02, ctrl_sub::SOCKET_STATE_QUERY, *socket],
            ),
            CoreCommand::SetParams { gateway_id, params } => Frame::build(
                Direction::Downlink,
                cmd::PARAM_QUERY,
                msg_id,
                *gateway_id,
                &encode_params(params),
            ),
            CoreCommand::TriggerOTA {
                gateway_id,
                target_type,
                socket,
                ftp_server_ip,
                ftp_port,
                filename,
            } => Frame::build(
                Direction::Downlink,
                cmd::OTA,
                msg_id,
                *gateway_id,
                &encode_trigger_ota(*target_type, *socket, *ftp_server_ip, *ftp_port, filename),
            ),
            CoreCommand::ConfigureNetwork { gateway_id, channel, entries } => Frame::build(
                Direction::Downlink,
                cmd::NETWORK_LIST,
                msg_id,
                *gateway_id,
                &encode_configure_network(*channel, entries),
            ),
        }
    }
}

/// `length:2, 0x07, socket, port, 0x01, mode, duration:2(minutes), businessNo:2(placeholder)`.
/// Minutes round up so a sub-minute request still charges for at least one
/// minute; the trailing placeholder word is ignored by the device (§4.8).
fn encode_start_charge(socket: u8, port: u8, mode: ChargeMode, duration_secs: u32) -> Vec<u8> {
    let minutes = duration_secs.div_ceil(60).max(1).min(u16::MAX as u32) as u16;
    let fields: [u8; 9] = [
        ctrl_sub::CONTROL_ACK_A,
        socket,
        port,
        0x01,
        mode.code(),
        (minutes >> 8) as u8,
        minutes as u8,
        0x00,
        0x00,
    ];
    finish_control_payload(&fields)
}

/// `length:2, 0x07, socket, port, 0x00, 0x01, 0x0000, businessNo:2`: the
/// same subcmd as a control-ACK expects, since stop/cancel are answered by
/// the control-ACK handler (§4.7/§4.8).
fn encode_stop_or_cancel(socket: u8, port: u8, business_no: u16) -> Vec<u8> {
    let fields: [u8; 9] = [
        ctrl_sub::CONTROL_ACK_A,
        socket,
        port,
        0x00,
        0x01,
        0x00,
        0x00,
        (business_no >> 8) as u8,
        business_no as u8,
    ];
    finish_control_payload(&fields)
}

fn finish_control_payload(fields: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + fields.len());
    let len = (fields.len() - 1) as u16;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(fields);
    out
}

/// Flat tag/len/value triples, one per param — no outer framing beyond what
/// `cmd::PARAM_QUERY` itself already supplies at the frame level.
fn encode_params(params: &[(u8, Vec<u8>)]) -> Vec<u8> {
    let borrowed: Vec<(u8, &[u8])> = params.iter().map(|(tag, value)| (*tag, value.as_slice())).collect();
    crate::tlv::build_fields(&borrowed)
}

/// `targetType:1, socket:1, ftpServerIp:4, ftpPort:2, filename:12` (space-padded).
fn encode_trigger_ota(target_type: u8, socket: u8, ftp_server_ip: [u8; 4], ftp_port: u16, filename: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(20);
    out.push(target_type);
    out.push(socket);
    out.extend_from_slice(&ftp_server_ip);
    out.extend_from_slice(&ftp_port.to_be_bytes());
    let mut name_field = [b' '; 12];
    let name_bytes = filename.as_bytes();
    name_field[..name_bytes.len()].copy_from_slice(name_bytes);
    out.extend_from_slice(&name_field);
    out
}

/// `channel:1`, followed by `socketNo:1, mac:6` per entry.
fn encode_configure_network(channel: u8, entries: &[(u8, [u8; 6])]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + entries.len() * 7);
    out.push(channel);
    for (socket_no, mac) in entries {
        out.push(*socket_no);
        out.extend_from_slice(mac);
    }
    out
}

/// Validates, tracks (for `StartCharge`), encodes, and writes a command to
/// the wire. The only place in this crate where a `CoreCommand` turns into
/// bytes on an actual connection; everything else is pure encoding.
pub async fn dispatch(
    command: &CoreCommand,
    tracker: &SessionTracker,
    msg_ids: &MsgIdCounter,
    transport: &dyn Transport,
    clock: &dyn Clock,
) -> CoreResult<()> {
    command.validate()?;

    if let CoreCommand::StartCharge {
        gateway_id,
        port,
        order_no,
        ..
    } = command
    {
        tracker.track_pending(*gateway_id, *port, order_no.clone(), clock.now()).await;
    }

    let bytes = command.encode(msg_ids.next() as u32);
    transport.write_frame(&bytes).await
}

/// Monotonic msgId source shared by everything that sends downlink frames
/// for a single connection (§4.1: msgId only needs to be unique per
/// gatewayId, not globally). Seeded from the current unix time modulo
/// 65535 rather than zero, so a freshly-started process doesn't replay
/// msgIds a device may still remember from before a restart; wraps back to
/// a fresh seed on overflow instead of silently rolling to zero.
#[derive(Debug)]
pub struct MsgIdCounter(AtomicU16);

impl MsgIdCounter {
    pub fn new() -> Self {
        Self(AtomicU16::new(Self::seed()))
    }

    /// Start from a caller-chosen value instead of the time-derived seed —
    /// useful for resuming a counter across a process restart, and for
    /// deterministic tests.
    pub fn starting_at(value: u16) -> Self {
        Self(AtomicU16::new(value))
    }

    fn seed() -> u16 {
        use std::time::{SystemTime, UNIX_EPOCH};
        let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        (secs % 65535) as u16
    }

    pub fn next(&self) -> u16 {
        loop {
            let current = self.0.load(Ordering::Relaxed);
            let next_val = if current == u16::MAX { Self::seed() } else { current + 1 };
            if self
                .0
                .compare_exchange_weak(current, next_val, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return current;
            }
        }
    }
}

impl Default for MsgIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn gw() -> GatewayId {
        GatewayId::from_str("86004459453005").unwrap()
    }

    #[test]
    fn start_charge_matches_documented_wire_bytes() {
        let command = CoreCommand::StartCharge {
            gateway_id: gw(),
            socket: 0,
            port: 0,
            mode: ChargeMode::Duration,
            duration_secs: 600,
            order_no: "ORDER1".into(),
        };
        let bytes = command.encode(0);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.cmd, cmd::CONTROL);
        assert_eq!(
            &frame.data[..],
            &[0x00, 0x08, 0x07, 0x00, 0x00, 0x01, 0x01, 0x00, 0x0A, 0x00, 0x00]
        );
    }

    #[test]
    fn duration_rounds_up_to_whole_minutes() {
        let command = CoreCommand::StartCharge {
            gateway_id: gw(),
            socket: 0,
            port: 0,
            mode: ChargeMode::Duration,
            duration_secs: 61,
            order_no: "ORDER1".into(),
        };
        let bytes = command.encode(0);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(&frame.data[7..9], &[0x00, 0x02]);
    }

    #[test]
    fn rejects_start_charge_with_empty_order_no() {
        let command = CoreCommand::StartCharge {
            gateway_id: gw(),
            socket: 0,
            port: 0,
            mode: ChargeMode::Duration,
            duration_secs: 60,
            order_no: String::new(),
        };
        assert!(command.validate().is_err());
    }

    #[test]
    fn rejects_ota_with_overlong_filename() {
        let command = CoreCommand::TriggerOTA {
            gateway_id: gw(),
            target_type: 0,
            socket: 0,
            ftp_server_ip: [192, 168, 1, 1],
            ftp_port: 21,
            filename: "way-too-long-for-twelve-bytes.bin".into(),
        };
        assert!(command.validate().is_err());
    }

    #[test]
    fn trigger_ota_pads_filename_to_twelve_bytes() {
        let command = CoreCommand::TriggerOTA {
            gateway_id: gw(),
            target_type: 1,
            socket: 0,
            ftp_server_ip: [192, 168, 1, 1],
            ftp_port: 21,
            filename: "fw.bin".into(),
        };
        let bytes = command.encode(0);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.cmd, cmd::OTA);
        assert_eq!(&frame.data[8..20], b"fw.bin      ");
    }

    #[test]
    fn configure_network_rejects_empty_entries() {
        let command = CoreCommand::ConfigureNetwork {
            gateway_id: gw(),
            channel: 1,
            entries: Vec::new(),
        };
        assert!(command.validate().is_err());
    }

    #[test]
    fn msg_id_counter_increments_monotonically_from_a_fixed_start() {
        let counter = MsgIdCounter::starting_at(100);
        assert_eq!(counter.next(), 100);
        assert_eq!(counter.next(), 101);
        assert_eq!(counter.next(), 102);
    }

    #[test]
    fn msg_id_counter_reseeds_on_wraparound() {
        let counter = MsgIdCounter::starting_at(u16::MAX);
        let wrapped = counter.next();
        assert_eq!(wrapped, u16::MAX);
        let reseeded = counter.next();
        assert!(reseeded < u16::MAX);
    }
}
