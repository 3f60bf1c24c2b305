//! Identifiers and versions (spec §3 "Identifiers and versions").

use uuid::Uuid;

/// Protocol version, 8-bit.
pub type ProtocolVersion = u8;

/// Interface version, 32-bit.
pub type InterfaceVersion = u32;

/// Sentinel meaning "no interface version has been negotiated yet".
pub const INTERFACE_VERSION_UNDEFINED: InterfaceVersion = 0xFFFF_FFFF;

/// Protocol versions this build understands, most recent first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[ProtocolVersion] = &[1];

/// Sentinel protocol version used when no version has been agreed on
/// (e.g. the client's initial `get_server_protocol_versions` probe).
pub const PROTOCOL_VERSION_UNDEFINED: ProtocolVersion = 0xFF;

pub fn latest_protocol_version() -> ProtocolVersion {
    SUPPORTED_PROTOCOL_VERSIONS[0]
}

/// A 128-bit type identifier, stored as two 64-bit halves so it serializes
/// as a fixed pair of arithmetic values rather than requiring a 16-byte raw
/// copy of a UUID's internal byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    pub low: u64,
    pub high: u64,
}

impl Id {
    pub const fn new(low: u64, high: u64) -> Self {
        Id { low, high }
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        let bytes = uuid.as_u64_pair();
        Id {
            low: bytes.0,
            high: bytes.1,
        }
    }

    pub fn to_uuid(self) -> Uuid {
        Uuid::from_u64_pair(self.low, self.high)
    }

    pub fn nil() -> Self {
        Id { low: 0, high: 0 }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

impl From<Uuid> for Id {
    fn from(u: Uuid) -> Self {
        Id::from_uuid(u)
    }
}

/// A named, versioned collection of serializable types (spec §3 "Interface
/// descriptor").
#[derive(Debug, Clone, Copy)]
pub struct InterfaceDescriptor {
    pub id: Id,
    pub version: InterfaceVersion,
    pub mandatory_data_flags: u32,
    pub forbidden_data_flags: u32,
}

impl InterfaceDescriptor {
    /// Union of this interface's mandatory flags with an operation's
    /// additional flags (spec §3 "Data flags").
    pub fn effective_flags(&self, operation_flags: u32) -> u32 {
        self.mandatory_data_flags | operation_flags
    }

    /// `Ok(())` iff `flags` doesn't set anything in `forbidden_data_flags`
    /// and carries everything in `mandatory_data_flags`.
    pub fn validate(&self, flags: u32) -> Result<(), crate::error::CspError> {
        if flags & self.forbidden_data_flags != 0 {
            return Err(crate::error::CspError::NotCompatibleDataFlagsSettings {
                mandatory: self.mandatory_data_flags,
                forbidden: self.forbidden_data_flags,
                actual: flags,
            });
        }
        if flags & self.mandatory_data_flags != self.mandatory_data_flags {
            return Err(crate::error::CspError::NotCompatibleDataFlagsSettings {
                mandatory: self.mandatory_data_flags,
                forbidden: self.forbidden_data_flags,
                actual: flags,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = Id::from_uuid(uuid);
        assert_eq!(id.to_uuid(), uuid);
    }

    #[test]
    fn effective_flags_unions_mandatory() {
        let iface = InterfaceDescriptor {
            id: Id::nil(),
            version: 1,
            mandatory_data_flags: 0b0001,
            forbidden_data_flags: 0b1000,
        };
        assert_eq!(iface.effective_flags(0b0010), 0b0011);
        assert!(iface.validate(0b0011).is_ok());
        assert!(iface.validate(0b1001).is_err());
        assert!(iface.validate(0b0010).is_err());
    }
}
