//! Top-level serializable trait (spec §4.6): the `ISerializable` contract a
//! user type provides, plus the `serialize`/`deserialize` entry points that
//! build default sessions over a byte buffer.

use crate::context::{
    CommonContext, DeserializeContext, DeserializePointerMap, SerializeContext,
    SerializePointerMap,
};
use crate::error::{CspError, CspResult};
use crate::flags::{CommonFlags, DataFlags};
use crate::header::{CommonHeader, DataHeader, MessageType};
use crate::id::{Id, InterfaceVersion};
use crate::io::{ByteReader, ByteWriter, SliceReader};
use crate::version::VersionChain;

/// Static identity/version data a user type provides (normally emitted by
/// the `Serializable` derive in `csp_macro`, or hand-written).
pub trait Serializable: Sized {
    /// The type's stable identity on the wire.
    const TYPE_ID: Id;

    /// The latest interface version this type's shape corresponds to.
    const LATEST_VERSION: InterfaceVersion;

    /// The oldest private version this type can be deserialized from
    /// without an explicit `minimum_interface_version` override.
    const ORIGIN_VERSION: InterfaceVersion;

    /// Flags this type mandates regardless of what the session negotiated.
    const MANDATORY_DATA_FLAGS: DataFlags = DataFlags::empty();

    /// Flags this type forbids regardless of what the session negotiated.
    const FORBIDDEN_DATA_FLAGS: DataFlags = DataFlags::empty();

    /// Writes the body (post data-header) of this value into `ctx`.
    fn serialize_body(&self, w: &mut dyn ByteWriter, ctx: &mut SerializeContext) -> CspResult<()>;

    /// Reads the body (post data-header) of this value from `ctx`.
    fn deserialize_body(
        r: &mut dyn ByteReader,
        ctx: &mut DeserializeContext,
    ) -> CspResult<Self>;

    /// The version bridge (spec §4.5) this type uses to downgrade its body
    /// to a private wire shape older than [`Serializable::LATEST_VERSION`].
    /// Types with only one interface version (the common case, and the
    /// default for anything produced by the `Serializable` derive) have no
    /// chain and return `None`; [`Serializable::serialize_at_version`] then
    /// only accepts `target_version == Self::LATEST_VERSION`.
    fn version_chain() -> Option<&'static VersionChain<Self>> {
        None
    }

    /// Serializes into a fresh buffer using a default session: local
    /// endianness, this type's mandatory flags, and the latest interface
    /// version (§4.6 "Interface-version choice").
    fn serialize(&self, protocol_version: crate::id::ProtocolVersion) -> CspResult<Vec<u8>> {
        let mut buf = Vec::new();
        let common_flags = CommonFlags::for_host_endian();
        let header = CommonHeader {
            protocol_version,
            message_type: MessageType::Data,
            common_flags,
        };
        header.write(&mut buf)?;

        let mut ctx = SerializeContext::new(
            CommonContext::new(protocol_version, MessageType::Data, common_flags),
            Self::MANDATORY_DATA_FLAGS,
        );
        ctx.set_interface_version(Self::LATEST_VERSION);
        if Self::MANDATORY_DATA_FLAGS.contains(DataFlags::CHECK_RECURSIVE_POINTERS) {
            ctx.install_pointer_map(SerializePointerMap::new());
        }

        let data_header = DataHeader {
            type_id: Self::TYPE_ID,
            interface_version: Self::LATEST_VERSION,
            data_flags: Self::MANDATORY_DATA_FLAGS,
        };
        data_header.write(&mut buf, common_flags.endian_mismatch())?;

        self.serialize_body(&mut buf, &mut ctx)?;
        Ok(buf)
    }

    /// Serializes into a fresh buffer pinned to `target_version` rather than
    /// [`Serializable::LATEST_VERSION`] (spec §4.5 "Versioning properties"):
    /// a receiver built against an older interface version sees the private
    /// wire shape it expects, not the latest one.
    ///
    /// `target_version == Self::LATEST_VERSION` is handled directly, without
    /// consulting [`Serializable::version_chain`]. Any older target requires
    /// a registered chain; `CspError::Internal` is returned if none exists.
    fn serialize_at_version(
        &self,
        protocol_version: crate::id::ProtocolVersion,
        target_version: InterfaceVersion,
    ) -> CspResult<Vec<u8>> {
        if target_version == Self::LATEST_VERSION {
            return self.serialize(protocol_version);
        }

        DataHeader::check_interface_version_bounds(
            target_version,
            Self::ORIGIN_VERSION,
            Self::LATEST_VERSION,
        )?;

        let chain = Self::version_chain().ok_or_else(|| {
            CspError::Internal(format!(
                "{} has no version chain registered; cannot serialize at version {target_version}",
                std::any::type_name::<Self>()
            ))
        })?;
        let downgrade = chain.serializer_for(target_version)?;

        let mut buf = Vec::new();
        let common_flags = CommonFlags::for_host_endian();
        let header = CommonHeader {
            protocol_version,
            message_type: MessageType::Data,
            common_flags,
        };
        header.write(&mut buf)?;

        let data_header = DataHeader {
            type_id: Self::TYPE_ID,
            interface_version: target_version,
            data_flags: Self::MANDATORY_DATA_FLAGS,
        };
        data_header.write(&mut buf, common_flags.endian_mismatch())?;

        let mut write_downgraded = downgrade(self)?;
        write_downgraded(&mut buf)?;
        Ok(buf)
    }

    /// Deserializes from a buffer produced by [`Serializable::serialize`].
    /// Verifies the wire type id matches `Self::TYPE_ID` and the interface
    /// version falls within `[Self::ORIGIN_VERSION, Self::LATEST_VERSION]`.
    fn deserialize(bytes: &[u8]) -> CspResult<Self> {
        let mut r = SliceReader::new(bytes);
        let common_header = CommonHeader::read(&mut r)?;
        if common_header.message_type != MessageType::Data {
            return Err(CspError::UnsupportedMessageType(
                common_header.message_type.to_wire(),
            ));
        }

        let data_header = DataHeader::read(&mut r, common_header.common_flags.endian_mismatch())?;
        if data_header.type_id != Self::TYPE_ID {
            return Err(CspError::MismatchOfTypeId);
        }
        DataHeader::check_interface_version_bounds(
            data_header.interface_version,
            Self::ORIGIN_VERSION,
            Self::LATEST_VERSION,
        )?;

        let mut ctx = DeserializeContext::new(
            CommonContext::new(
                common_header.protocol_version,
                MessageType::Data,
                common_header.common_flags,
            ),
            data_header.data_flags,
        );
        ctx.data.set_interface_version(data_header.interface_version);
        ctx.data
            .set_interface_version_not_match(data_header.interface_version != Self::LATEST_VERSION);
        if data_header
            .data_flags
            .contains(DataFlags::CHECK_RECURSIVE_POINTERS)
        {
            ctx.data.install_pointer_map(DeserializePointerMap::new());
        }

        Self::deserialize_body(&mut r, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_primitive;

    struct Ping {
        value: u32,
    }

    impl Serializable for Ping {
        const TYPE_ID: Id = Id::new(1, 0);
        const LATEST_VERSION: InterfaceVersion = 1;
        const ORIGIN_VERSION: InterfaceVersion = 1;

        fn serialize_body(
            &self,
            w: &mut dyn ByteWriter,
            ctx: &mut SerializeContext,
        ) -> CspResult<()> {
            write_primitive(w, self.value, ctx.common.endian_mismatch())
        }

        fn deserialize_body(
            r: &mut dyn ByteReader,
            ctx: &mut DeserializeContext,
        ) -> CspResult<Self> {
            let value = crate::io::read_primitive(r, ctx.data.common.endian_mismatch())?;
            Ok(Ping { value })
        }
    }

    #[test]
    fn serializable_round_trips() {
        let ping = Ping { value: 99 };
        let bytes = ping.serialize(1).unwrap();
        let decoded = Ping::deserialize(&bytes).unwrap();
        assert_eq!(decoded.value, 99);
    }

    #[test]
    fn mismatched_type_id_is_rejected() {
        struct Other;
        impl Serializable for Other {
            const TYPE_ID: Id = Id::new(2, 0);
            const LATEST_VERSION: InterfaceVersion = 1;
            const ORIGIN_VERSION: InterfaceVersion = 1;

            fn serialize_body(
                &self,
                _w: &mut dyn ByteWriter,
                _ctx: &mut SerializeContext,
            ) -> CspResult<()> {
                Ok(())
            }

            fn deserialize_body(
                _r: &mut dyn ByteReader,
                _ctx: &mut DeserializeContext,
            ) -> CspResult<Self> {
                Ok(Other)
            }
        }

        let bytes = Ping { value: 1 }.serialize(1).unwrap();
        let err = Other::deserialize(&bytes).unwrap_err();
        assert!(matches!(err, CspError::MismatchOfTypeId));
    }
}
