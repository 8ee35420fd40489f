//! Protocol constants for the BKV wire format.

/// Uplink (device → platform) outer magic.
pub const MAGIC_UPLINK: u16 = 0xFCFE;
/// Downlink (platform → device) outer magic.
pub const MAGIC_DOWNLINK: u16 = 0xFCFF;
/// Tail marker closing every outer frame.
pub const TAIL: u16 = 0xFCEE;

/// Direction byte values (redundant with magic; both must agree).
pub const DIRECTION_DOWNLINK: u8 = 0x00;
pub const DIRECTION_UPLINK: u8 = 0x01;

/// Gateway id width in raw bytes (rendered as 14 hex chars).
pub const GATEWAY_ID_LEN: usize = 7;

/// Fixed outer header size up to and including gatewayId:
/// magic(2) + length(2) + cmd(2) + msgId(4) + direction(1) + gatewayId(7) = 18.
pub const OUTER_HEADER_LEN: usize = 18;

/// Minimum declared `length` value (must at least cover the tail).
pub const MIN_DECLARED_LEN: u16 = 2;

/// Outer command codes understood by the dispatcher (C5).
pub mod cmd {
    pub const HEARTBEAT: u16 = 0x0000;
    pub const TLV: u16 = 0x1000;
    pub const CONTROL: u16 = 0x0015;
    pub const NETWORK_LIST: u16 = 0x0005;
    pub const OTA: u16 = 0x0007;
    pub const PARAM_SET: u16 = 0x0001;
    pub const PARAM_QUERY: u16 = 0x0002;
    pub const PARAM_SYNC: u16 = 0x0003;
    pub const PARAM_OTHER: u16 = 0x0004;

    // Non-standard outer codes that a conformant firmware would express as
    // 0x0015 sub-commands (§4.5).
    pub const CARD_SWIPE: u16 = 0x000B;
    pub const ORDER_CONFIRM: u16 = 0x000F;
    pub const CHARGE_END: u16 = 0x000C;
    pub const BALANCE_QUERY: u16 = 0x001A;
    pub const VOICE_CONFIG: u16 = 0x001B;
    pub const SOCKET_STATE_QUERY: u16 = 0x001D;
    pub const POWER_LEVEL_END: u16 = 0x0018;
    pub const SERVICE_FEE_END: u16 = 0x0019;
}

/// Inner TLV sub-commands carried inside outer cmd=0x1000 (§3).
pub mod subcmd {
    pub const STATUS_REPORT: u16 = 0x1017;
    pub const CHARGING_END: u16 = 0x1004;
    pub const CONTROL_COMMAND: u16 = 0x1007;
    pub const EXCEPTION: u16 = 0x1010;
    pub const PARAMETER_SET: u16 = 0x1011;
    pub const PARAMETER_QUERY: u16 = 0x1012;
    pub const PARAMETER_SET_ACK: u16 = 0x1013;
}

/// Control-umbrella (outer cmd=0x0015) inner sub-command first byte.
pub mod ctrl_sub {
    pub const CHARGING_END_A: u8 = 0x02;
    pub const CHARGING_END_B: u8 = 0x18;
    pub const CONTROL_ACK_A: u8 = 0x07;
    pub const CONTROL_ACK_B: u8 = 0x17;
    pub const CARD_SWIPE: u8 = 0x0B;
    pub const CHARGE_END: u8 = 0x0C;
    pub const ORDER_CONFIRM: u8 = 0x0F;
    pub const BALANCE_QUERY: u8 = 0x1A;
    pub const VOICE_CONFIG: u8 = 0x1B;
    pub const SOCKET_STATE_QUERY: u8 = 0x1D;
}

/// Typed view over [`ctrl_sub`]'s raw byte, for dispatch sites that want to
/// match on a closed set of known shapes while still tolerating whatever a
/// firmware revision sends next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum CtrlSub {
    ChargingEndA = ctrl_sub::CHARGING_END_A,
    ChargingEndB = ctrl_sub::CHARGING_END_B,
    ControlAckA = ctrl_sub::CONTROL_ACK_A,
    ControlAckB = ctrl_sub::CONTROL_ACK_B,
    CardSwipe = ctrl_sub::CARD_SWIPE,
    ChargeEnd = ctrl_sub::CHARGE_END,
    OrderConfirm = ctrl_sub::ORDER_CONFIRM,
    BalanceQuery = ctrl_sub::BALANCE_QUERY,
    VoiceConfig = ctrl_sub::VOICE_CONFIG,
    SocketStateQuery = ctrl_sub::SOCKET_STATE_QUERY,
    #[num_enum(catch_all)]
    Other(u8),
}

impl CtrlSub {
    pub fn is_charging_end(&self) -> bool {
        matches!(self, Self::ChargingEndA | Self::ChargingEndB)
    }

    pub fn is_control_ack(&self) -> bool {
        matches!(self, Self::ControlAckA | Self::ControlAckB)
    }
}

/// TLV tags recognized within the inner BKV payload (§3).
pub mod tag {
    pub const PORT_NO: u8 = 0x08;
    pub const PORT_STATUS: u8 = 0x09;
    pub const BUSINESS_NO: u8 = 0x0A;
    pub const INSTANT_POWER: u8 = 0x0B;
    pub const INSTANT_CURRENT: u8 = 0x0C;
    pub const ENERGY_USED: u8 = 0x0D;
    pub const CHARGING_TIME: u8 = 0x0E;
    pub const END_REASON: u8 = 0x2F;
    pub const SOCKET_NO: u8 = 0x4A;
    pub const STATUS_INDICATOR: u8 = 0x65;
    pub const PORT_CONTAINER: u8 = 0x28;
    pub const RESULT: u8 = 0x0F;
    /// Nested-encoding tag for a 2-byte inner field (§4.3 socketStatus).
    pub const NESTED_U16: u8 = 0x95;

    /// Value that must accompany [`STATUS_INDICATOR`] for a 0x1017 payload
    /// to qualify as a status report.
    pub const STATUS_INDICATOR_VALUE: u8 = 0x94;
}

/// Raw per-port status bitmap bit positions (§3).
pub mod status_bit {
    pub const ONLINE: u8 = 1 << 7;
    pub const CHARGING: u8 = 1 << 5;
    pub const NO_LOAD: u8 = 1 << 4;
    pub const TEMPERATURE_OK: u8 = 1 << 3;
    pub const CURRENT_OK: u8 = 1 << 2;
    pub const POWER_OK: u8 = 1 << 1;
}

/// ACK status byte values (§4.4).
pub const ACK_SUCCESS: u8 = 0x01;
pub const ACK_FAILURE: u8 = 0x00;

/// Default TTLs and timeouts (§4.6, §5).
pub const PENDING_TTL_SECS: i64 = 30;
pub const CHARGING_TTL_SECS: i64 = 24 * 60 * 60;
pub const TTL_SWEEP_INTERVAL_SECS: i64 = 60;
pub const ACK_WRITE_DEADLINE_SECS: u64 = 5;
pub const EVENT_SINK_DEADLINE_SECS: u64 = 2;

/// Minimum uplink heartbeat length (§4.7): header fields + ICCID + version + RSSI.
pub const HEARTBEAT_MIN_LEN: usize = 29;
