//! Protocol header exchange and sniffing

use std::convert::{TryFrom, TryInto};

const PROTOCOL_HEADER_PREFIX: &[u8; 4] = b"AMQP";

/// Length in bytes of a protocol header
pub const PROTOCOL_HEADER_LEN: usize = 8;

/// The SASL protocol header, sent exactly once per direction before any
/// SASL frame
pub const SASL_PROTOCOL_HEADER: [u8; 8] = [0x41, 0x4d, 0x51, 0x50, 0x03, 0x01, 0x00, 0x00];

/// The plain AMQP protocol header
pub const AMQP_PROTOCOL_HEADER: [u8; 8] = [0x41, 0x4d, 0x51, 0x50, 0x00, 0x01, 0x00, 0x00];

/// AMQP protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Protocol ID
    pub id: ProtocolId,
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Protocol revision
    pub revision: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self {
            id: ProtocolId::Amqp,
            major: fe2o3_amqp_types::definitions::MAJOR,
            minor: fe2o3_amqp_types::definitions::MINOR,
            revision: fe2o3_amqp_types::definitions::REVISION,
        }
    }
}

impl ProtocolHeader {
    /// Creates a new protocol header
    pub fn new(id: ProtocolId, major: u8, minor: u8, revision: u8) -> Self {
        Self {
            id,
            major,
            minor,
            revision,
        }
    }

    /// Creates an AMQP protocol header
    pub fn amqp() -> Self {
        Self {
            id: ProtocolId::Amqp,
            ..Default::default()
        }
    }

    /// Creates a SASL protocol header
    pub fn sasl() -> Self {
        Self {
            id: ProtocolId::Sasl,
            ..Default::default()
        }
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(value: ProtocolHeader) -> Self {
        [
            PROTOCOL_HEADER_PREFIX[0],
            PROTOCOL_HEADER_PREFIX[1],
            PROTOCOL_HEADER_PREFIX[2],
            PROTOCOL_HEADER_PREFIX[3],
            value.id as u8,
            value.major,
            value.minor,
            value.revision,
        ]
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = [u8; 8];

    fn try_from(v: [u8; 8]) -> Result<Self, Self::Error> {
        if &v[..4] != PROTOCOL_HEADER_PREFIX {
            return Err(v);
        }
        let id = match v[4].try_into() {
            Ok(id) => id,
            Err(_) => return Err(v),
        };

        Ok(Self::new(id, v[5], v[6], v[7]))
    }
}

/// Protocol ID carried in byte 5 of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    /// AMQP without a security layer
    Amqp = 0x0,
    /// TLS security layer
    Tls = 0x2,
    /// SASL security layer
    Sasl = 0x3,
}

impl TryFrom<u8> for ProtocolId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Amqp),
            0x2 => Ok(Self::Tls),
            0x3 => Ok(Self::Sasl),
            _ => Err(value),
        }
    }
}

/// Protocol detected from the first bytes of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedProtocol {
    /// The SASL security layer header
    AmqpSasl,
    /// The plain AMQP header
    Amqp,
    /// Bytes that are not a recognized protocol header
    Other,
    /// Not enough bytes to decide yet
    Insufficient,
}

impl SniffedProtocol {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::AmqpSasl => "SASL",
            Self::Amqp => "AMQP",
            Self::Other => "unknown",
            Self::Insufficient => "insufficient",
        }
    }
}

/// Sniffs the protocol from the first bytes of a stream.
///
/// A prefix that can no longer be completed into a known header is reported
/// as [`SniffedProtocol::Other`] without waiting for the full eight bytes.
pub fn sniff_protocol(bytes: &[u8]) -> SniffedProtocol {
    if bytes.len() < PROTOCOL_HEADER_LEN {
        let n = bytes.len();
        if bytes == &SASL_PROTOCOL_HEADER[..n] || bytes == &AMQP_PROTOCOL_HEADER[..n] {
            return SniffedProtocol::Insufficient;
        }
        return SniffedProtocol::Other;
    }

    if bytes[..PROTOCOL_HEADER_LEN] == SASL_PROTOCOL_HEADER {
        SniffedProtocol::AmqpSasl
    } else if bytes[..PROTOCOL_HEADER_LEN] == AMQP_PROTOCOL_HEADER {
        SniffedProtocol::Amqp
    } else {
        SniffedProtocol::Other
    }
}
