//! Client envelope (spec §4.8): settings negotiation and `handleData`.

use crate::config::PartySettings;
use crate::context::{
    CommonContext, DeserializeContext, DeserializePointerMap, SerializeContext,
    SerializePointerMap,
};
use crate::error::{CspError, CspResult, Status};
use crate::flags::{CommonFlags, DataFlags};
use crate::header::{
    read_status_code, CommonHeader, DataHeader, MessageType, NotSupportedProtocolVersionBody,
};
use crate::id::{ProtocolVersion, PROTOCOL_VERSION_UNDEFINED};
use crate::io::SliceReader;
use crate::serializable::Serializable;

/// Transport abstraction the client sends requests through and reads
/// replies from. Opaque to the core (§1 "out of scope: the transport").
pub trait Communicator: Send + Sync {
    fn send_and_receive(&self, request: &[u8]) -> CspResult<Vec<u8>>;
}

/// Owns a negotiated settings snapshot and a communicator (§4.8 "Client").
pub struct Client<C: Communicator> {
    communicator: C,
    settings: Option<PartySettings>,
    negotiated_protocol_version: ProtocolVersion,
}

impl<C: Communicator> Client<C> {
    pub fn new(communicator: C) -> Self {
        Client {
            communicator,
            settings: None,
            negotiated_protocol_version: PROTOCOL_VERSION_UNDEFINED,
        }
    }

    /// Skips the handshake, installing settings supplied directly (§4.8
    /// "Init either by supplying settings directly, or by handshake").
    pub fn with_settings(communicator: C, settings: PartySettings, protocol_version: ProtocolVersion) -> Self {
        Client {
            communicator,
            settings: Some(settings),
            negotiated_protocol_version: protocol_version,
        }
    }

    pub fn settings(&self) -> Option<&PartySettings> {
        self.settings.as_ref()
    }

    /// Runs the three-step handshake: probe supported protocol versions,
    /// pick the highest intersection, fetch and intersect server settings.
    pub fn handshake(&mut self, local: &PartySettings) -> CspResult<()> {
        let server_supported = self.get_server_protocol_versions()?;
        let chosen = local
            .highest_common_protocol_version(&server_supported)
            .ok_or_else(|| CspError::NotSupportedProtocolVersion {
                requested: local
                    .protocol_versions
                    .iter()
                    .copied()
                    .max()
                    .unwrap_or(PROTOCOL_VERSION_UNDEFINED),
                supported: server_supported,
            })?;

        let server_settings = self.get_server_settings(chosen)?;
        let intersection = local.intersect(&server_settings);
        if intersection.is_empty_intersection() && !local.interfaces.is_empty() {
            return Err(CspError::NoSupportedInterfaces);
        }

        self.negotiated_protocol_version = chosen;
        self.settings = Some(intersection);
        tracing::info!(chosen_protocol_version = chosen, "handshake complete");
        Ok(())
    }

    fn get_server_protocol_versions(&self) -> CspResult<Vec<ProtocolVersion>> {
        let mut request = Vec::new();
        CommonHeader {
            protocol_version: PROTOCOL_VERSION_UNDEFINED,
            message_type: MessageType::GetSettings,
            common_flags: CommonFlags::empty(),
        }
        .write(&mut request)?;

        let reply = self.communicator.send_and_receive(&request)?;
        let mut r = SliceReader::new(&reply);
        let header = CommonHeader::read(&mut r)?;
        if header.message_type != MessageType::Status {
            return Err(CspError::Internal(
                "expected a Status reply to protocol-version probe".to_string(),
            ));
        }
        let endian_mismatch = header.common_flags.endian_mismatch();
        let code = read_status_code(&mut r, endian_mismatch)?;
        match Status::from_i32(code) {
            Some(Status::ErrorNotSupportedProtocolVersion) => {
                let body = NotSupportedProtocolVersionBody::read(&mut r)?;
                Ok(body.supported_versions)
            }
            Some(other) => Err(CspError::Remote(other)),
            None => Err(CspError::DataCorrupted {
                reason: format!("unrecognized status code {code}"),
            }),
        }
    }

    fn get_server_settings(&self, protocol_version: ProtocolVersion) -> CspResult<PartySettings> {
        let mut request = Vec::new();
        CommonHeader {
            protocol_version,
            message_type: MessageType::GetSettings,
            common_flags: CommonFlags::empty(),
        }
        .write(&mut request)?;

        let reply = self.communicator.send_and_receive(&request)?;
        let mut r = SliceReader::new(&reply);
        let header = CommonHeader::read(&mut r)?;
        match header.message_type {
            MessageType::Status => {
                let code = read_status_code(&mut r, header.common_flags.endian_mismatch())?;
                let status = Status::from_i32(code).unwrap_or(Status::ErrorInternal);
                Err(CspError::Remote(status))
            }
            MessageType::Data => {
                let rest = &reply[r.tell()..];
                serde_json::from_slice(rest)
                    .map_err(|e| CspError::DataCorrupted { reason: e.to_string() })
            }
            other => Err(CspError::UnsupportedMessageType(other.to_wire())),
        }
    }

    /// Serializes `input`, sends it, and decodes the reply as `O` (§4.8
    /// "handleData"). If the server replies `Status`, that status is
    /// surfaced as `CspError::Remote`.
    pub fn handle_data<T: Serializable, O: Serializable>(&self, input: &T) -> CspResult<O> {
        let settings = self.settings.as_ref().ok_or(CspError::NotInited)?;
        let common_flags = CommonFlags::from_bits_truncate(settings.mandatory_common_flags)
            | CommonFlags::for_host_endian();

        let mut request = Vec::new();
        CommonHeader {
            protocol_version: self.negotiated_protocol_version,
            message_type: MessageType::Data,
            common_flags,
        }
        .write(&mut request)?;

        let mut ctx = SerializeContext::new(
            CommonContext::new(self.negotiated_protocol_version, MessageType::Data, common_flags),
            T::MANDATORY_DATA_FLAGS,
        );
        ctx.set_interface_version(T::LATEST_VERSION);
        if T::MANDATORY_DATA_FLAGS.contains(DataFlags::CHECK_RECURSIVE_POINTERS) {
            ctx.install_pointer_map(SerializePointerMap::new());
        }

        DataHeader {
            type_id: T::TYPE_ID,
            interface_version: T::LATEST_VERSION,
            data_flags: T::MANDATORY_DATA_FLAGS,
        }
        .write(&mut request, common_flags.endian_mismatch())?;
        input.serialize_body(&mut request, &mut ctx)?;

        let reply = self.communicator.send_and_receive(&request)?;
        let mut r = SliceReader::new(&reply);
        let header = CommonHeader::read(&mut r)?;

        match header.message_type {
            MessageType::Status => {
                let code = read_status_code(&mut r, header.common_flags.endian_mismatch())?;
                let status = Status::from_i32(code).unwrap_or(Status::ErrorInternal);
                Err(CspError::Remote(status))
            }
            MessageType::Data => {
                let endian_mismatch = header.common_flags.endian_mismatch();
                let data_header = DataHeader::read(&mut r, endian_mismatch)?;
                if data_header.data_flags != T::MANDATORY_DATA_FLAGS {
                    return Err(CspError::NotCompatibleDataFlagsSettings {
                        mandatory: T::MANDATORY_DATA_FLAGS.bits(),
                        forbidden: 0,
                        actual: data_header.data_flags.bits(),
                    });
                }
                if data_header.type_id != O::TYPE_ID {
                    return Err(CspError::MismatchOfTypeId);
                }
                DataHeader::check_interface_version_bounds(
                    data_header.interface_version,
                    O::ORIGIN_VERSION,
                    O::LATEST_VERSION,
                )?;

                let mut dctx = DeserializeContext::new(
                    CommonContext::new(header.protocol_version, MessageType::Data, header.common_flags),
                    data_header.data_flags,
                );
                dctx.data.set_interface_version(data_header.interface_version);
                if data_header
                    .data_flags
                    .contains(DataFlags::CHECK_RECURSIVE_POINTERS)
                {
                    dctx.data.install_pointer_map(DeserializePointerMap::new());
                }
                O::deserialize_body(&mut r, &mut dctx)
            }
            other => Err(CspError::UnsupportedMessageType(other.to_wire())),
        }
    }
}
