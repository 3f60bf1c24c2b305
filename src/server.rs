//! Server envelope (spec §4.8): `handleMessage` dispatch over the
//! registrar, protocol-version gating, and settings service.

use crate::config::PartySettings;
use crate::error::{CspError, CspResult};
use crate::flags::CommonFlags;
use crate::header::{
    write_status_code, CommonHeader, DataHeader, MessageType, NotSupportedProtocolVersionBody,
};
use crate::id::SUPPORTED_PROTOCOL_VERSIONS;
use crate::io::SliceReader;
use crate::registrar::Registrar;

/// Owns settings and a registrar (§4.8 "Server").
pub struct Server {
    settings: PartySettings,
    pub registrar: Registrar,
}

impl Server {
    pub fn new(settings: PartySettings) -> Self {
        Server {
            settings,
            registrar: Registrar::new(),
        }
    }

    pub fn settings(&self) -> &PartySettings {
        &self.settings
    }

    /// Reads the common header from `in_buffer` and dispatches; writes the
    /// reply into `out_buffer`. Unsupported protocol versions and handler
    /// errors are both encoded as `Status` frames rather than propagated to
    /// the caller, matching the source's "surfaced behavior" contract
    /// (spec §7).
    pub fn handle_message(&self, in_buffer: &[u8], out_buffer: &mut Vec<u8>) -> CspResult<()> {
        let mut r = SliceReader::new(in_buffer);
        let header = match CommonHeader::read(&mut r) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read common header");
                return Err(e);
            }
        };

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&header.protocol_version) {
            return self.write_unsupported_protocol_version(out_buffer);
        }

        match header.message_type {
            MessageType::GetSettings => self.write_settings(header, out_buffer),
            MessageType::Data => self.dispatch_data(header, in_buffer, &mut r, out_buffer),
            MessageType::Status => Err(CspError::UnsupportedMessageType(
                MessageType::Status.to_wire(),
            )),
            MessageType::InOutData => Err(CspError::UnsupportedMessageType(
                MessageType::InOutData.to_wire(),
            )),
        }
    }

    fn write_unsupported_protocol_version(&self, out_buffer: &mut Vec<u8>) -> CspResult<()> {
        CommonHeader {
            protocol_version: *SUPPORTED_PROTOCOL_VERSIONS.first().unwrap_or(&0),
            message_type: MessageType::Status,
            common_flags: CommonFlags::empty(),
        }
        .write(out_buffer)?;
        write_status_code(
            out_buffer,
            crate::error::Status::ErrorNotSupportedProtocolVersion,
            false,
        )?;
        NotSupportedProtocolVersionBody {
            supported_versions: SUPPORTED_PROTOCOL_VERSIONS.to_vec(),
        }
        .write(out_buffer)?;
        Ok(())
    }

    fn write_settings(&self, header: CommonHeader, out_buffer: &mut Vec<u8>) -> CspResult<()> {
        CommonHeader {
            protocol_version: header.protocol_version,
            message_type: MessageType::Data,
            common_flags: header.common_flags,
        }
        .write(out_buffer)?;
        let payload = serde_json::to_vec(&self.settings)
            .map_err(|e| CspError::Internal(e.to_string()))?;
        out_buffer.extend_from_slice(&payload);
        Ok(())
    }

    fn dispatch_data(
        &self,
        header: CommonHeader,
        in_buffer: &[u8],
        r: &mut SliceReader,
        out_buffer: &mut Vec<u8>,
    ) -> CspResult<()> {
        let mandatory = CommonFlags::from_bits_truncate(self.settings.mandatory_common_flags);
        if !header.common_flags.contains(mandatory) {
            return self.write_status(
                header,
                crate::error::Status::ErrorNotCompatibleCommonFlagsSettings,
                out_buffer,
            );
        }

        let endian_mismatch = header.common_flags.endian_mismatch();
        let data_header = DataHeader::read(r, endian_mismatch)?;

        let handlers = match self.registrar.acquire_handlers(data_header.type_id) {
            Ok(h) => h,
            Err(e) => {
                return self.write_status(header, e.as_status(), out_buffer);
            }
        };

        let body_offset = r.tell();
        let body = &in_buffer[body_offset..];

        CommonHeader {
            protocol_version: header.protocol_version,
            message_type: MessageType::Data,
            common_flags: header.common_flags,
        }
        .write(out_buffer)?;
        data_header.write(out_buffer, endian_mismatch)?;

        // Multicast handlers each see the same input and write their reply
        // in registration order (§5 "Ordering guarantees").
        for handle in handlers {
            let mut handler_out = Vec::new();
            let result = handle.handler().handle_data(body, &mut handler_out);
            self.registrar.release(handle);
            match result {
                Ok(()) => out_buffer.extend_from_slice(&handler_out),
                Err(e) => {
                    tracing::warn!(error = %e, "handler failed");
                    return self.write_status(header, e.as_status(), out_buffer);
                }
            }
        }

        Ok(())
    }

    fn write_status(
        &self,
        header: CommonHeader,
        status: crate::error::Status,
        out_buffer: &mut Vec<u8>,
    ) -> CspResult<()> {
        out_buffer.clear();
        CommonHeader {
            protocol_version: header.protocol_version,
            message_type: MessageType::Status,
            common_flags: header.common_flags,
        }
        .write(out_buffer)?;
        write_status_code(out_buffer, status, header.common_flags.endian_mismatch())?;
        Ok(())
    }
}
