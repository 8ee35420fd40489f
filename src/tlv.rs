//! C3 — TLV payload codec.
//!
//! Parses and builds the inner "BKV" TLV payload carried by outer cmd
//! 0x1000 (spec.md §3, §4.3). Enforces the fixed prefix byte-for-byte, then
//! scans trailing tag/len/value triples with bounds checks; a truncated
//! trailing TLV ends the scan without error since field presence is always
//! optional at the wire level.

use crate::constants::{subcmd, tag};
use crate::error::{CoreError, CoreResult};
use crate::gateway_id::GatewayId;

/// Prefix: `04 01 01 <cmd:2> 0A 01 02 <frameSeq:8> 09 01 03 <gatewayId:7>`.
const PREFIX_LEN: usize = 3 + 2 + 3 + 8 + 3 + 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvField {
    pub tag: u8,
    /// Up to 2 raw value bytes, as every field this codec recognizes is
    /// 1 or 2 bytes wide (spec.md §3 table).
    pub value: [u8; 2],
    pub len: u8,
}

impl TlvField {
    pub fn as_u8(&self) -> u8 {
        self.value[0]
    }

    pub fn as_u16_be(&self) -> u16 {
        u16::from_be_bytes(self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub cmd: u16,
    pub frame_seq: [u8; 8],
    pub gateway_id: GatewayId,
    pub fields: Vec<TlvField>,
}

impl Payload {
    pub fn parse(data: &[u8]) -> CoreResult<Self> {
        if data.len() < PREFIX_LEN {
            return Err(CoreError::InvalidPayload(format!(
                "TLV payload shorter than fixed prefix: need {PREFIX_LEN}, got {}",
                data.len()
            )));
        }
        if data[0..3] != [0x04, 0x01, 0x01] {
            return Err(CoreError::InvalidPayload("TLV prefix marker #1 mismatch".into()));
        }
        let cmd = u16::from_be_bytes([data[3], data[4]]);
        if data[5..8] != [0x0A, 0x01, 0x02] {
            return Err(CoreError::InvalidPayload("TLV prefix marker #2 mismatch".into()));
        }
        let mut frame_seq = [0u8; 8];
        frame_seq.copy_from_slice(&data[8..16]);
        if data[16..19] != [0x09, 0x01, 0x03] {
            return Err(CoreError::InvalidPayload("TLV prefix marker #3 mismatch".into()));
        }
        let mut gw = [0u8; 7];
        gw.copy_from_slice(&data[19..26]);
        let gateway_id = GatewayId::from_bytes(gw);

        let fields = scan_fields(&data[PREFIX_LEN..]);

        Ok(Payload {
            cmd,
            frame_seq,
            gateway_id,
            fields,
        })
    }

    pub fn is_status_report(&self) -> bool {
        self.cmd == subcmd::STATUS_REPORT
            && self
                .fields
                .iter()
                .any(|f| f.tag == tag::STATUS_INDICATOR && f.value[0] == tag::STATUS_INDICATOR_VALUE)
    }

    pub fn is_charging_end(&self) -> bool {
        self.cmd == subcmd::CHARGING_END
    }

    pub fn is_exception_report(&self) -> bool {
        self.cmd == subcmd::EXCEPTION
    }

    pub fn is_parameter_set(&self) -> bool {
        self.cmd == subcmd::PARAMETER_SET
    }

    pub fn is_parameter_set_ack(&self) -> bool {
        self.cmd == subcmd::PARAMETER_SET_ACK
    }

    pub fn is_parameter_query(&self) -> bool {
        self.cmd == subcmd::PARAMETER_QUERY
    }

    pub fn is_control_command(&self) -> bool {
        self.cmd == subcmd::CONTROL_COMMAND
    }

    pub fn field(&self, t: u8) -> Option<&TlvField> {
        self.fields.iter().find(|f| f.tag == t)
    }

    pub fn u8_field(&self, t: u8) -> Option<u8> {
        self.field(t).map(|f| f.as_u8())
    }

    pub fn u16_field(&self, t: u8) -> Option<u16> {
        self.field(t).map(|f| f.as_u16_be())
    }

    /// Per-port socket-status records (§4.3). `scan_fields` already folds
    /// both the flat and nested wire encodings into the same [`TlvField`]
    /// list, so grouping by [`tag::PORT_CONTAINER`] works regardless of
    /// which one a given firmware used.
    pub fn socket_status(&self) -> Vec<PortStatus> {
        group_ports(&self.fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStatus {
    pub port_no: Option<u8>,
    pub raw_status: Option<u8>,
    pub business_no: Option<u16>,
    pub instant_power_dw: Option<u16>,
    pub instant_current_ma3: Option<u16>,
    pub energy_used_kwh01: Option<u16>,
    pub charging_time_min: Option<u16>,
}

impl PortStatus {
    pub fn online(&self) -> bool {
        self.raw_status
            .map(|s| s & crate::constants::status_bit::ONLINE != 0)
            .unwrap_or(false)
    }

    pub fn charging(&self) -> bool {
        self.raw_status
            .map(|s| s & crate::constants::status_bit::CHARGING != 0)
            .unwrap_or(false)
    }
}

fn group_ports(fields: &[TlvField]) -> Vec<PortStatus> {
    let mut ports = Vec::new();
    let mut current: Option<PortStatus> = None;

    for f in fields {
        if f.tag == tag::PORT_CONTAINER {
            if let Some(p) = current.take() {
                ports.push(p);
            }
            current = Some(PortStatus::default());
            continue;
        }

        let slot = match &mut current {
            Some(p) => p,
            None => {
                current = Some(PortStatus::default());
                current.as_mut().unwrap()
            }
        };

        match f.tag {
            tag::PORT_NO => slot.port_no = Some(f.as_u8()),
            tag::PORT_STATUS => slot.raw_status = Some(f.as_u8()),
            tag::BUSINESS_NO => slot.business_no = Some(f.as_u16_be()),
            tag::INSTANT_POWER => slot.instant_power_dw = Some(f.as_u16_be()),
            tag::INSTANT_CURRENT => slot.instant_current_ma3 = Some(f.as_u16_be()),
            tag::ENERGY_USED => slot.energy_used_kwh01 = Some(f.as_u16_be()),
            tag::CHARGING_TIME => slot.charging_time_min = Some(f.as_u16_be()),
            tag::NESTED_U16 => { /* vendor-specific extra field, ignored */ }
            _ => {}
        }
    }

    if let Some(p) = current {
        ports.push(p);
    }

    ports
}

/// Scan trailing TLV triples. Recognizes the nested wrap markers `0x03`
/// (1-byte inner value) and `0x04` (2-byte inner value) described in
/// spec.md §4.3, falling back to the flat `<tag:1><len:1><value:len>`
/// encoding otherwise. Stops silently on a truncated trailing field.
fn scan_fields(data: &[u8]) -> Vec<TlvField> {
    let mut fields = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let wrap = data[i];

        if wrap == 0x03 && i + 3 < data.len() && data[i + 1] == 0x01 {
            let inner_tag = data[i + 2];
            let value = data[i + 3];
            fields.push(TlvField {
                tag: inner_tag,
                value: [value, 0],
                len: 1,
            });
            i += 4;
            continue;
        }

        if wrap == 0x04 && i + 4 < data.len() && data[i + 1] == 0x01 {
            let inner_tag = data[i + 2];
            let value = [data[i + 3], data[i + 4]];
            fields.push(TlvField {
                tag: inner_tag,
                value,
                len: 2,
            });
            i += 5;
            continue;
        }

        // Flat encoding: <tag:1><len:1><value:len>.
        if i + 1 >= data.len() {
            break;
        }
        let t = data[i];
        let len = data[i + 1] as usize;
        if i + 2 + len > data.len() {
            break;
        }
        let mut value = [0u8; 2];
        match len {
            0 => {}
            1 => value[0] = data[i + 2],
            _ => {
                value[0] = data[i + 2];
                value[1] = data[i + 3];
            }
        }
        fields.push(TlvField {
            tag: t,
            value,
            len: len.min(2) as u8,
        });
        i += 2 + len;
    }

    fields
}

/// Build a flat-encoded field list back into trailing TLV bytes. Used by
/// the ACK builder (C4) and by tests constructing fixtures.
pub fn build_fields(fields: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (t, value) in fields {
        out.push(*t);
        out.push(value.len() as u8);
        out.extend_from_slice(value);
    }
    out
}

/// Build a complete cmd=0x1000 TLV payload (prefix + trailing fields).
pub fn build_payload(cmd: u16, frame_seq: [u8; 8], gateway_id: GatewayId, trailing: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_LEN + trailing.len());
    out.extend_from_slice(&[0x04, 0x01, 0x01]);
    out.extend_from_slice(&cmd.to_be_bytes());
    out.extend_from_slice(&[0x0A, 0x01, 0x02]);
    out.extend_from_slice(&frame_seq);
    out.extend_from_slice(&[0x09, 0x01, 0x03]);
    out.extend_from_slice(gateway_id.as_bytes());
    out.extend_from_slice(trailing);
    out
}
