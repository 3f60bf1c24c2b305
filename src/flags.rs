//! Common and data flag bitfields (spec §3 "Common flags" / "Data flags").

use bitflags::bitflags;

bitflags! {
    /// Session-wide flags, frozen once a context begins serializing a body.
    /// Two parties' common flags must compare equal exactly; mismatch is a
    /// hard error (`CspError::MismatchOfProtocolVersions` is the protocol
    /// analogue; common-flags mismatch is
    /// `CspError::NotCompatibleCommonFlagsSettings`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommonFlags: u32 {
        const BIG_ENDIAN_FORMAT = 1 << 0;
        const BITNESS_32 = 1 << 1;
        const ENDIANNESS_DIFFERENCE = 1 << 2;
        /// Bits reserved by the wire format; any party setting one is a
        /// hard protocol violation.
        const RESERVED_FORBIDDEN_MASK = 0xFFFF_FFF8;
    }
}

impl CommonFlags {
    /// The bit an implementation derives from its own CPU's endianness,
    /// independent of any negotiated `ENDIANNESS_DIFFERENCE`.
    pub fn for_host_endian() -> Self {
        if cfg!(target_endian = "big") {
            CommonFlags::BIG_ENDIAN_FORMAT
        } else {
            CommonFlags::empty()
        }
    }

    /// Whether a session with these flags must byte-swap primitives
    /// relative to the local host's native endianness.
    pub fn endian_mismatch(self) -> bool {
        let local_is_big = cfg!(target_endian = "big");
        let wire_is_big = self.contains(CommonFlags::BIG_ENDIAN_FORMAT);
        local_is_big != wire_is_big
    }
}

bitflags! {
    /// Per-interface/per-operation flags (spec §3 "Data flags").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DataFlags: u32 {
        const ALIGNMENT_MAY_BE_NOT_EQUAL = 1 << 0;
        const SIZE_OF_INTEGERS_MAY_BE_NOT_EQUAL = 1 << 1;
        const ALLOW_UNMANAGED_POINTERS = 1 << 2;
        const CHECK_RECURSIVE_POINTERS = 1 << 3;
        const SIMPLY_ASSIGNABLE_TAGS_OPTIMIZATIONS_ARE_TURNED_OFF = 1 << 4;
    }
}
