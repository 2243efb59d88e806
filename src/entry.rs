//! SD service entries and wildcard matching.

use crate::error::{Result, SdError};
use crate::header::ServiceId;
use crate::types::{
    ANY_MAJOR_VERSION, ANY_MINOR_VERSION, EntryType, FIND_TTL, InstanceId, SD_ENTRY_SIZE,
};

/// A service entry (FindService or OfferService).
///
/// A find-type entry doubles as the client's service descriptor: the
/// instance ID, major version, and minor version may each hold their
/// wildcard sentinel, in which case any concrete value offered by a
/// remote matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Entry type (FindService or OfferService).
    pub entry_type: EntryType,
    /// Service ID.
    pub service_id: ServiceId,
    /// Instance ID, possibly [`InstanceId::ANY`].
    pub instance_id: InstanceId,
    /// Major version, possibly [`ANY_MAJOR_VERSION`].
    pub major_version: u8,
    /// Time-to-live in seconds (0 = stop offer). 24 bits on the wire.
    pub ttl: u32,
    /// Minor version, possibly [`ANY_MINOR_VERSION`].
    pub minor_version: u32,
}

impl ServiceEntry {
    /// Create a FindService entry for the given descriptor.
    pub fn find(
        service_id: ServiceId,
        instance_id: InstanceId,
        major_version: u8,
        minor_version: u32,
    ) -> Self {
        Self {
            entry_type: EntryType::FindService,
            service_id,
            instance_id,
            major_version,
            ttl: FIND_TTL,
            minor_version,
        }
    }

    /// Create a FindService entry matching any instance and version of
    /// a service.
    pub fn find_any(service_id: ServiceId) -> Self {
        Self::find(
            service_id,
            InstanceId::ANY,
            ANY_MAJOR_VERSION,
            ANY_MINOR_VERSION,
        )
    }

    /// Create an OfferService entry.
    pub fn offer(
        service_id: ServiceId,
        instance_id: InstanceId,
        major_version: u8,
        minor_version: u32,
        ttl: u32,
    ) -> Self {
        Self {
            entry_type: EntryType::OfferService,
            service_id,
            instance_id,
            major_version,
            ttl: ttl & 0xFF_FFFF, // 24 bits only
            minor_version,
        }
    }

    /// Create a StopOfferService entry (OfferService with TTL = 0).
    pub fn stop_offer(
        service_id: ServiceId,
        instance_id: InstanceId,
        major_version: u8,
        minor_version: u32,
    ) -> Self {
        Self::offer(service_id, instance_id, major_version, minor_version, 0)
    }

    /// Check if this is a stop offer (TTL = 0).
    pub fn is_stop_offer(&self) -> bool {
        self.entry_type == EntryType::OfferService && self.ttl == 0
    }

    /// Match an offered entry against this find descriptor.
    ///
    /// The service ID must be equal; instance ID, major version, and
    /// minor version must each be equal or wildcarded in the descriptor.
    /// Only offer-type entries can match.
    pub fn matches_offer(&self, offer: &ServiceEntry) -> bool {
        offer.entry_type == EntryType::OfferService
            && offer.service_id == self.service_id
            && (self.instance_id.is_any() || offer.instance_id == self.instance_id)
            && (self.major_version == ANY_MAJOR_VERSION
                || offer.major_version == self.major_version)
            && (self.minor_version == ANY_MINOR_VERSION
                || offer.minor_version == self.minor_version)
    }

    /// Parse a service entry from a 16-byte wire entry.
    ///
    /// The option-run index fields (bytes 1-3) are accepted and ignored;
    /// this client consumes no options.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < SD_ENTRY_SIZE {
            return Err(SdError::MessageTooShort {
                expected: SD_ENTRY_SIZE,
                actual: data.len(),
            });
        }

        let entry_type = EntryType::from_u8(data[0]).ok_or(SdError::UnknownEntryType(data[0]))?;

        Ok(Self {
            entry_type,
            service_id: ServiceId(u16::from_be_bytes([data[4], data[5]])),
            instance_id: InstanceId(u16::from_be_bytes([data[6], data[7]])),
            major_version: data[8],
            ttl: u32::from_be_bytes([0, data[9], data[10], data[11]]),
            minor_version: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
        })
    }

    /// Serialize the entry to its 16-byte wire form.
    pub fn to_bytes(&self) -> [u8; SD_ENTRY_SIZE] {
        let mut buf = [0u8; SD_ENTRY_SIZE];

        buf[0] = self.entry_type as u8;
        // Bytes 1-3: option run indices and counts, always zero here.
        buf[4..6].copy_from_slice(&self.service_id.0.to_be_bytes());
        buf[6..8].copy_from_slice(&self.instance_id.0.to_be_bytes());
        buf[8] = self.major_version;
        let ttl_bytes = self.ttl.to_be_bytes();
        buf[9] = ttl_bytes[1];
        buf[10] = ttl_bytes[2];
        buf[11] = ttl_bytes[3];
        buf[12..16].copy_from_slice(&self.minor_version.to_be_bytes());

        buf
    }
}
