//! The 7-byte device identifier, rendered as 14 hex characters in higher
//! layers (spec.md §3).

use crate::constants::GATEWAY_ID_LEN;
use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GatewayId([u8; GATEWAY_ID_LEN]);

impl GatewayId {
    pub const fn from_bytes(bytes: [u8; GATEWAY_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; GATEWAY_ID_LEN] {
        &self.0
    }

    /// Build from a raw slice, left-padding with zeros if shorter than
    /// [`GATEWAY_ID_LEN`] and truncating (keeping the trailing bytes) if
    /// longer, as required by the ACK builder (§4.4).
    pub fn padded(raw: &[u8]) -> Self {
        let mut buf = [0u8; GATEWAY_ID_LEN];
        if raw.len() >= GATEWAY_ID_LEN {
            let start = raw.len() - GATEWAY_ID_LEN;
            buf.copy_from_slice(&raw[start..]);
        } else {
            let offset = GATEWAY_ID_LEN - raw.len();
            buf[offset..].copy_from_slice(raw);
        }
        Self(buf)
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for GatewayId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| CoreError::InvalidPayload(format!("invalid gatewayId hex {s:?}: {e}")))?;
        if bytes.len() != GATEWAY_ID_LEN {
            return Err(CoreError::InvalidPayload(format!(
                "gatewayId must decode to {GATEWAY_ID_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = [0u8; GATEWAY_ID_LEN];
        buf.copy_from_slice(&bytes);
        Ok(Self(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let id = GatewayId::from_str("82200520004869").unwrap();
        assert_eq!(id.to_string(), "82200520004869");
    }

    #[test]
    fn pads_short_slices_with_leading_zeros() {
        let id = GatewayId::padded(&[0x86, 0x00, 0x44]);
        assert_eq!(id.to_string(), "00000000860044");
    }

    #[test]
    fn truncates_long_slices_keeping_trailing_bytes() {
        let id = GatewayId::padded(&[0xAA; 9]);
        assert_eq!(id.to_string(), "aaaaaaaaaaaaaa");
    }
}
