//! SD message handling and frame codec.

use bytes::{BufMut, Bytes, BytesMut};
use log::debug;

use crate::entry::ServiceEntry;
use crate::error::{Result, SdError};
use crate::header::{HEADER_SIZE, SdFrameHeader, SessionId};
use crate::types::{EntryType, SD_ENTRY_SIZE};

/// SD message flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SdFlags {
    /// Reboot flag - set when the sender has rebooted.
    pub reboot: bool,
    /// Unicast flag - set when the message should be answered via unicast.
    pub unicast: bool,
    /// Explicit initial data control flag.
    pub explicit_initial_data: bool,
}

impl SdFlags {
    /// Parse flags from a byte.
    pub fn from_u8(byte: u8) -> Self {
        Self {
            reboot: (byte & 0x80) != 0,
            unicast: (byte & 0x40) != 0,
            explicit_initial_data: (byte & 0x20) != 0,
        }
    }

    /// Serialize flags to a byte.
    pub fn to_u8(&self) -> u8 {
        let mut byte = 0u8;
        if self.reboot {
            byte |= 0x80;
        }
        if self.unicast {
            byte |= 0x40;
        }
        if self.explicit_initial_data {
            byte |= 0x20;
        }
        byte
    }
}

/// A SOME/IP-SD message.
///
/// The session ID lives in the enclosing SOME/IP header on the wire; it
/// is kept here so a stored find message can be retransmitted with an
/// incrementing session ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdMessage {
    /// Message flags.
    pub flags: SdFlags,
    /// Session ID of this transmission.
    pub session_id: SessionId,
    /// Service entries carried by the message.
    pub entries: Vec<ServiceEntry>,
}

impl SdMessage {
    /// Create a new empty SD message.
    pub fn new() -> Self {
        Self {
            flags: SdFlags::default(),
            session_id: SessionId::INITIAL,
            entries: Vec::new(),
        }
    }

    /// Create a FindService message carrying one descriptor entry.
    pub fn find(descriptor: ServiceEntry) -> Self {
        Self {
            flags: SdFlags {
                unicast: true,
                ..SdFlags::default()
            },
            session_id: SessionId::INITIAL,
            entries: vec![descriptor],
        }
    }

    /// Create an OfferService message.
    pub fn offer(entry: ServiceEntry) -> Self {
        Self {
            flags: SdFlags {
                unicast: true,
                ..SdFlags::default()
            },
            session_id: SessionId::INITIAL,
            entries: vec![entry],
        }
    }

    /// Scan the entries for the first offer matching a find descriptor.
    ///
    /// Non-matching offers do not stop the scan. The returned entry's
    /// TTL distinguishes a live offer (> 0) from a withdrawal (0).
    pub fn find_matching_offer(&self, descriptor: &ServiceEntry) -> Option<&ServiceEntry> {
        self.entries.iter().find(|e| descriptor.matches_offer(e))
    }

    /// Check if this message carries a FindService entry.
    pub fn is_find(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.entry_type == EntryType::FindService)
    }

    /// Serialize the message to a complete datagram (header + payload).
    pub fn to_frame(&self) -> Bytes {
        let entries_length = self.entries.len() * SD_ENTRY_SIZE;
        let payload_len = 4 + 4 + entries_length + 4;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload_len);
        SdFrameHeader::new(self.session_id, payload_len).put(&mut buf);

        // Flags + 3 reserved bytes.
        buf.put_u8(self.flags.to_u8());
        buf.put_bytes(0, 3);

        buf.put_u32(entries_length as u32);
        for entry in &self.entries {
            buf.put_slice(&entry.to_bytes());
        }

        // Options array length; this client sends no options.
        buf.put_u32(0);

        buf.freeze()
    }

    /// Parse a complete datagram into an SD message.
    ///
    /// Entries of unknown type (eventgroup subscriptions and the like)
    /// are skipped; the options array is length-checked and ignored.
    pub fn from_frame(data: &[u8]) -> Result<Self> {
        let header = SdFrameHeader::from_bytes(data)?;
        if !header.is_sd() {
            return Err(SdError::NotSdMessage {
                service_id: header.service_id.0,
                method_id: header.method_id,
            });
        }

        let payload = &data[HEADER_SIZE..];
        if payload.len() < 12 {
            return Err(SdError::MessageTooShort {
                expected: HEADER_SIZE + 12,
                actual: data.len(),
            });
        }

        let flags = SdFlags::from_u8(payload[0]);
        // payload[1..4] is reserved

        let entries_length = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]])
            as usize;
        if payload.len() < 8 + entries_length + 4 {
            return Err(SdError::MessageTooShort {
                expected: HEADER_SIZE + 8 + entries_length + 4,
                actual: data.len(),
            });
        }

        let entries_data = &payload[8..8 + entries_length];
        let mut entries = Vec::new();
        let mut offset = 0;
        while offset + SD_ENTRY_SIZE <= entries_data.len() {
            match ServiceEntry::from_bytes(&entries_data[offset..]) {
                Ok(entry) => entries.push(entry),
                Err(SdError::UnknownEntryType(value)) => {
                    debug!("skipping entry of unknown type 0x{value:02X}");
                }
                Err(e) => return Err(e),
            }
            offset += SD_ENTRY_SIZE;
        }

        let options_offset = 8 + entries_length;
        let options_length = u32::from_be_bytes([
            payload[options_offset],
            payload[options_offset + 1],
            payload[options_offset + 2],
            payload[options_offset + 3],
        ]) as usize;
        if payload.len() < options_offset + 4 + options_length {
            return Err(SdError::MessageTooShort {
                expected: HEADER_SIZE + options_offset + 4 + options_length,
                actual: data.len(),
            });
        }

        Ok(Self {
            flags,
            session_id: header.session_id,
            entries,
        })
    }
}

impl Default for SdMessage {
    fn default() -> Self {
        Self::new()
    }
}
