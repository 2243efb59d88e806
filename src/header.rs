//! SOME/IP header framing for SD messages, plus ID newtypes.

use bytes::BufMut;

use crate::error::{Result, SdError};
use crate::types::{SD_METHOD_ID, SD_SERVICE_ID};

/// Size of the SOME/IP header in bytes.
pub const HEADER_SIZE: usize = 16;

/// SOME/IP protocol version (always 0x01).
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Interface version carried by SD messages.
pub const SD_INTERFACE_VERSION: u8 = 0x01;

/// Message type of SD messages (notification).
pub const MESSAGE_TYPE_NOTIFICATION: u8 = 0x02;

/// Return code of SD messages (E_OK).
pub const RETURN_CODE_OK: u8 = 0x00;

/// Service ID - identifies a SOME/IP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ServiceId(pub u16);

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Session ID - distinguishes successive transmissions of the same
/// logical request.
///
/// Starts at 0x0001 and wraps from 0xFFFF back to 0x0001; the value
/// 0x0000 is never used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u16);

impl SessionId {
    /// First session ID used after startup.
    pub const INITIAL: SessionId = SessionId(0x0001);

    /// The session ID following this one.
    pub fn next(self) -> SessionId {
        if self.0 == u16::MAX {
            SessionId(0x0001)
        } else {
            SessionId(self.0 + 1)
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// SOME/IP header of a service discovery frame.
///
/// SD frames are notifications from the reserved SD service (0xFFFF) and
/// method (0x8100) with client ID 0x0000; the session ID is the only
/// field that varies between transmissions.
///
/// ```text
/// +--------+--------+--------+--------+
/// |    Service ID   |    Method ID    |  (4 bytes)
/// +--------+--------+--------+--------+
/// |              Length               |  (4 bytes, payload + 8)
/// +--------+--------+--------+--------+
/// |    Client ID    |   Session ID    |  (4 bytes)
/// +--------+--------+--------+--------+
/// | Proto | Iface | MsgType | RetCode |  (4 bytes)
/// +--------+--------+--------+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdFrameHeader {
    /// Service ID (0xFFFF for SD).
    pub service_id: ServiceId,
    /// Method ID (0x8100 for SD).
    pub method_id: u16,
    /// Length of payload + 8 bytes.
    pub length: u32,
    /// Client ID (0x0000 for SD).
    pub client_id: u16,
    /// Session ID of this transmission.
    pub session_id: SessionId,
    /// Protocol version (0x01).
    pub protocol_version: u8,
    /// Interface version.
    pub interface_version: u8,
    /// Message type.
    pub message_type: u8,
    /// Return code.
    pub return_code: u8,
}

impl SdFrameHeader {
    /// Create the header of an outgoing SD frame.
    pub fn new(session_id: SessionId, payload_len: usize) -> Self {
        Self {
            service_id: ServiceId(SD_SERVICE_ID),
            method_id: SD_METHOD_ID,
            length: payload_len as u32 + 8,
            client_id: 0x0000,
            session_id,
            protocol_version: PROTOCOL_VERSION,
            interface_version: SD_INTERFACE_VERSION,
            message_type: MESSAGE_TYPE_NOTIFICATION,
            return_code: RETURN_CODE_OK,
        }
    }

    /// Parse a header from the start of a datagram.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(SdError::MessageTooShort {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let protocol_version = data[12];
        if protocol_version != PROTOCOL_VERSION {
            return Err(SdError::WrongProtocolVersion(protocol_version));
        }

        Ok(Self {
            service_id: ServiceId(u16::from_be_bytes([data[0], data[1]])),
            method_id: u16::from_be_bytes([data[2], data[3]]),
            length: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            client_id: u16::from_be_bytes([data[8], data[9]]),
            session_id: SessionId(u16::from_be_bytes([data[10], data[11]])),
            protocol_version,
            interface_version: data[13],
            message_type: data[14],
            return_code: data[15],
        })
    }

    /// Serialize the header into a buffer.
    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.service_id.0);
        buf.put_u16(self.method_id);
        buf.put_u32(self.length);
        buf.put_u16(self.client_id);
        buf.put_u16(self.session_id.0);
        buf.put_u8(self.protocol_version);
        buf.put_u8(self.interface_version);
        buf.put_u8(self.message_type);
        buf.put_u8(self.return_code);
    }

    /// Check whether this header frames a service discovery message.
    pub fn is_sd(&self) -> bool {
        self.service_id.0 == SD_SERVICE_ID
            && self.method_id == SD_METHOD_ID
            && self.message_type == MESSAGE_TYPE_NOTIFICATION
    }

    /// Length of the payload following the header.
    pub fn payload_length(&self) -> u32 {
        self.length.saturating_sub(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_header_roundtrip() {
        let header = SdFrameHeader::new(SessionId(0x0042), 20);

        let mut buf = BytesMut::new();
        header.put(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let parsed = SdFrameHeader::from_bytes(&buf).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.is_sd());
        assert_eq!(parsed.payload_length(), 20);
    }

    #[test]
    fn test_rejects_wrong_protocol_version() {
        let mut buf = BytesMut::new();
        SdFrameHeader::new(SessionId::INITIAL, 0).put(&mut buf);
        buf[12] = 0x02;

        let err = SdFrameHeader::from_bytes(&buf).unwrap_err();
        assert!(matches!(err, SdError::WrongProtocolVersion(0x02)));
    }

    #[test]
    fn test_rejects_short_header() {
        let err = SdFrameHeader::from_bytes(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, SdError::MessageTooShort { .. }));
    }

    #[test]
    fn test_non_sd_header() {
        let mut header = SdFrameHeader::new(SessionId::INITIAL, 0);
        header.service_id = ServiceId(0x1234);
        assert!(!header.is_sd());
    }

    #[test]
    fn test_session_id_wraps_past_zero() {
        assert_eq!(SessionId(0x0001).next(), SessionId(0x0002));
        assert_eq!(SessionId(0xFFFF).next(), SessionId(0x0001));
    }
}
