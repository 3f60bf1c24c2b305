//! Party settings and configuration (spec §3 "Party settings", §4.8
//! handshake), following the teacher's builder-with-defaults idiom.

use serde::{Deserialize, Serialize};

use crate::flags::{CommonFlags, DataFlags};
use crate::id::{Id, InterfaceVersion, ProtocolVersion};

/// One interface a party publishes as part of its settings (§3 "Interface
/// descriptor").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceEntry {
    pub id_low: u64,
    pub id_high: u64,
    pub version: InterfaceVersion,
    pub mandatory_data_flags: u32,
    pub forbidden_data_flags: u32,
}

impl InterfaceEntry {
    pub fn id(&self) -> Id {
        Id::new(self.id_low, self.id_high)
    }
}

/// A party's published settings (`CspPartySettings` in §6), exchanged
/// during the `GetSettings` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartySettings {
    pub protocol_versions: Vec<ProtocolVersion>,
    pub mandatory_common_flags: u32,
    pub forbidden_common_flags: u32,
    pub interfaces: Vec<InterfaceEntry>,
}

impl Default for PartySettings {
    fn default() -> Self {
        PartySettings {
            protocol_versions: vec![crate::id::latest_protocol_version()],
            mandatory_common_flags: 0,
            forbidden_common_flags: CommonFlags::RESERVED_FORBIDDEN_MASK.bits(),
            interfaces: Vec::new(),
        }
    }
}

impl PartySettings {
    /// Intersects two parties' settings (§4.8 "intersect client and server
    /// settings"): the common protocol versions (ordered by the local
    /// party's preference), the union of mandatory flags, the union of
    /// forbidden flags, and interfaces present (by id) on both sides.
    pub fn intersect(&self, other: &PartySettings) -> PartySettings {
        let protocol_versions: Vec<ProtocolVersion> = self
            .protocol_versions
            .iter()
            .copied()
            .filter(|v| other.protocol_versions.contains(v))
            .collect();

        let interfaces: Vec<InterfaceEntry> = self
            .interfaces
            .iter()
            .filter(|iface| other.interfaces.iter().any(|o| o.id() == iface.id()))
            .cloned()
            .collect();

        PartySettings {
            protocol_versions,
            mandatory_common_flags: self.mandatory_common_flags | other.mandatory_common_flags,
            forbidden_common_flags: self.forbidden_common_flags | other.forbidden_common_flags,
            interfaces,
        }
    }

    /// The highest protocol version both this party's list and `supported`
    /// have in common (§4.8 "pick the highest intersection").
    pub fn highest_common_protocol_version(
        &self,
        supported: &[ProtocolVersion],
    ) -> Option<ProtocolVersion> {
        self.protocol_versions
            .iter()
            .filter(|v| supported.contains(v))
            .copied()
            .max()
    }

    pub fn is_empty_intersection(&self) -> bool {
        self.interfaces.is_empty()
    }
}

/// Builder for [`PartySettings`], following the teacher's `ConfigBuilder`
/// pattern (construct piecemeal, `.build()` at the end).
#[derive(Debug, Default)]
pub struct PartySettingsBuilder {
    settings: PartySettings,
}

impl PartySettingsBuilder {
    pub fn new() -> Self {
        PartySettingsBuilder {
            settings: PartySettings {
                protocol_versions: Vec::new(),
                mandatory_common_flags: 0,
                forbidden_common_flags: CommonFlags::RESERVED_FORBIDDEN_MASK.bits(),
                interfaces: Vec::new(),
            },
        }
    }

    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.settings.protocol_versions.push(version);
        self
    }

    pub fn mandatory_common_flags(mut self, flags: CommonFlags) -> Self {
        self.settings.mandatory_common_flags |= flags.bits();
        self
    }

    pub fn forbidden_common_flags(mut self, flags: CommonFlags) -> Self {
        self.settings.forbidden_common_flags |= flags.bits();
        self
    }

    pub fn interface(
        mut self,
        id: Id,
        version: InterfaceVersion,
        mandatory: DataFlags,
        forbidden: DataFlags,
    ) -> Self {
        self.settings.interfaces.push(InterfaceEntry {
            id_low: id.low,
            id_high: id.high,
            version,
            mandatory_data_flags: mandatory.bits(),
            forbidden_data_flags: forbidden.bits(),
        });
        self
    }

    pub fn build(mut self) -> PartySettings {
        if self.settings.protocol_versions.is_empty() {
            self.settings
                .protocol_versions
                .push(crate::id::latest_protocol_version());
        }
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_sane_defaults() {
        let settings = PartySettingsBuilder::new().build();
        assert_eq!(settings.protocol_versions, vec![crate::id::latest_protocol_version()]);
        assert!(settings.interfaces.is_empty());
    }

    #[test]
    fn intersection_keeps_only_shared_interfaces() {
        let iface_a = Id::new(1, 0);
        let iface_b = Id::new(2, 0);

        let client = PartySettingsBuilder::new()
            .protocol_version(3)
            .protocol_version(2)
            .interface(iface_a, 1, DataFlags::empty(), DataFlags::empty())
            .interface(iface_b, 1, DataFlags::empty(), DataFlags::empty())
            .build();

        let server = PartySettingsBuilder::new()
            .protocol_version(2)
            .protocol_version(1)
            .interface(iface_a, 1, DataFlags::empty(), DataFlags::empty())
            .build();

        let intersection = client.intersect(&server);
        assert_eq!(intersection.interfaces.len(), 1);
        assert_eq!(intersection.interfaces[0].id(), iface_a);
        assert_eq!(
            client.highest_common_protocol_version(&server.protocol_versions),
            Some(2)
        );
    }

    #[test]
    fn empty_interface_intersection_is_reported() {
        let a = PartySettingsBuilder::new()
            .interface(Id::new(1, 0), 1, DataFlags::empty(), DataFlags::empty())
            .build();
        let b = PartySettingsBuilder::new()
            .interface(Id::new(2, 0), 1, DataFlags::empty(), DataFlags::empty())
            .build();
        assert!(a.intersect(&b).is_empty_intersection());
    }
}
