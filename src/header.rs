//! Header & status codec (spec §4.4, wire layout in spec §6), grounded in
//! `examples/original_source/cslib/include/common_serialization/csp/processing/Status.h`.
//!
//! The common header is always little-endian regardless of session
//! endianness; everything after it follows the session's negotiated
//! endianness.

use crate::error::{CspError, CspResult, Status};
use crate::flags::{CommonFlags, DataFlags};
use crate::id::{Id, InterfaceVersion, ProtocolVersion};
use crate::io::{read_primitive, write_primitive, ByteReader, ByteWriter};

/// Message kind carried by the common header.
///
/// `InOutData` is the legacy generation-one message type
/// (`original_source` keeps two generations of this enum). This repo's
/// decision (see DESIGN.md) is to reserve its wire value and reject it on
/// receipt rather than implement the dead protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    Status = 0,
    Data = 1,
    GetSettings = 2,
    InOutData = 3,
}

impl MessageType {
    pub fn from_wire(value: u32) -> CspResult<Self> {
        match value {
            0 => Ok(MessageType::Status),
            1 => Ok(MessageType::Data),
            2 => Ok(MessageType::GetSettings),
            3 => Ok(MessageType::InOutData),
            other => Err(CspError::UnsupportedMessageType(other)),
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// 10-byte common header: `u16 protocol_version, u32 message_type, u32 common_flags`,
/// all little-endian regardless of session endianness (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeader {
    pub protocol_version: ProtocolVersion,
    pub message_type: MessageType,
    pub common_flags: CommonFlags,
}

impl CommonHeader {
    pub fn write(&self, w: &mut impl ByteWriter) -> CspResult<()> {
        write_primitive(w, self.protocol_version as u16, false)?;
        write_primitive(w, self.message_type.to_wire(), false)?;
        write_primitive(w, self.common_flags.bits(), false)?;
        Ok(())
    }

    pub fn read(r: &mut impl ByteReader) -> CspResult<Self> {
        let protocol_version_wide: u16 = read_primitive(r, false)?;
        let message_type_raw: u32 = read_primitive(r, false)?;
        let common_flags_raw: u32 = read_primitive(r, false)?;
        Ok(CommonHeader {
            protocol_version: protocol_version_wide as ProtocolVersion,
            message_type: MessageType::from_wire(message_type_raw)?,
            common_flags: CommonFlags::from_bits_truncate(common_flags_raw),
        })
    }
}

/// Data-message header: `type_id: Id (16 bytes), interface_version: u32, data_flags: u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub type_id: Id,
    pub interface_version: InterfaceVersion,
    pub data_flags: DataFlags,
}

impl DataHeader {
    pub fn write(&self, w: &mut impl ByteWriter, endian_mismatch: bool) -> CspResult<()> {
        write_primitive(w, self.type_id.low, endian_mismatch)?;
        write_primitive(w, self.type_id.high, endian_mismatch)?;
        write_primitive(w, self.interface_version, endian_mismatch)?;
        write_primitive(w, self.data_flags.bits(), endian_mismatch)?;
        Ok(())
    }

    pub fn read(r: &mut impl ByteReader, endian_mismatch: bool) -> CspResult<Self> {
        let low: u64 = read_primitive(r, endian_mismatch)?;
        let high: u64 = read_primitive(r, endian_mismatch)?;
        let interface_version: InterfaceVersion = read_primitive(r, endian_mismatch)?;
        let data_flags_raw: u32 = read_primitive(r, endian_mismatch)?;
        Ok(DataHeader {
            type_id: Id::new(low, high),
            interface_version,
            data_flags: DataFlags::from_bits_truncate(data_flags_raw),
        })
    }

    /// Verifies the session's interface version lies within
    /// `[minimum, latest]` (§4.4); `minimum` defaults to the type's origin
    /// private version on the deserialize side.
    pub fn check_interface_version_bounds(
        version: InterfaceVersion,
        minimum: InterfaceVersion,
        latest: InterfaceVersion,
    ) -> CspResult<()> {
        if version < minimum || version > latest {
            return Err(CspError::NotSupportedInterfaceVersion {
                requested: version,
                minimum,
                latest,
            });
        }
        Ok(())
    }
}

/// Status-specific payload for `ErrorNotSupportedProtocolVersion`:
/// `u8 count, u8 supported_versions[count]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotSupportedProtocolVersionBody {
    pub supported_versions: Vec<ProtocolVersion>,
}

impl NotSupportedProtocolVersionBody {
    pub fn write(&self, w: &mut impl ByteWriter) -> CspResult<()> {
        let count: u8 = self
            .supported_versions
            .len()
            .try_into()
            .map_err(|_| CspError::TypeSizeIsTooBig {
                size: self.supported_versions.len(),
            })?;
        write_primitive(w, count, false)?;
        for v in &self.supported_versions {
            write_primitive(w, *v, false)?;
        }
        Ok(())
    }

    pub fn read(r: &mut impl ByteReader) -> CspResult<Self> {
        let count: u8 = read_primitive(r, false)?;
        let mut supported_versions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            supported_versions.push(read_primitive(r, false)?);
        }
        Ok(NotSupportedProtocolVersionBody { supported_versions })
    }
}

/// Status-specific payload for `ErrorNotSupportedInterfaceVersion`:
/// `u32 minimum_interface_version, Id output_type_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotSupportedInterfaceVersionBody {
    pub minimum_interface_version: InterfaceVersion,
    pub output_type_id: Id,
}

impl NotSupportedInterfaceVersionBody {
    pub fn write(&self, w: &mut impl ByteWriter, endian_mismatch: bool) -> CspResult<()> {
        write_primitive(w, self.minimum_interface_version, endian_mismatch)?;
        write_primitive(w, self.output_type_id.low, endian_mismatch)?;
        write_primitive(w, self.output_type_id.high, endian_mismatch)?;
        Ok(())
    }

    pub fn read(r: &mut impl ByteReader, endian_mismatch: bool) -> CspResult<Self> {
        let minimum_interface_version = read_primitive(r, endian_mismatch)?;
        let low: u64 = read_primitive(r, endian_mismatch)?;
        let high: u64 = read_primitive(r, endian_mismatch)?;
        Ok(NotSupportedInterfaceVersionBody {
            minimum_interface_version,
            output_type_id: Id::new(low, high),
        })
    }
}

/// A common-header-only frame whose payload is `status_code: i32` followed
/// by zero or more status-specific body bytes.
pub fn write_status_code(w: &mut impl ByteWriter, status: Status, endian_mismatch: bool) -> CspResult<()> {
    write_primitive(w, status as i32, endian_mismatch)
}

pub fn read_status_code(r: &mut impl ByteReader, endian_mismatch: bool) -> CspResult<i32> {
    read_primitive(r, endian_mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceReader;

    #[test]
    fn common_header_round_trips() {
        let header = CommonHeader {
            protocol_version: 1,
            message_type: MessageType::Data,
            common_flags: CommonFlags::BITNESS_32,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 10);
        let mut r = SliceReader::new(&buf);
        let decoded = CommonHeader::read(&mut r).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn reserved_message_type_value_rejected() {
        let mut buf = Vec::new();
        write_primitive(&mut buf, 1u16, false).unwrap();
        write_primitive(&mut buf, 99u32, false).unwrap();
        write_primitive(&mut buf, 0u32, false).unwrap();
        let mut r = SliceReader::new(&buf);
        let err = CommonHeader::read(&mut r).unwrap_err();
        assert!(matches!(err, CspError::UnsupportedMessageType(99)));
    }

    #[test]
    fn in_out_data_is_reserved_but_parses() {
        assert_eq!(MessageType::from_wire(3).unwrap(), MessageType::InOutData);
    }

    #[test]
    fn data_header_round_trips_with_endian_swap() {
        let header = DataHeader {
            type_id: Id::new(1, 2),
            interface_version: 7,
            data_flags: DataFlags::ALLOW_UNMANAGED_POINTERS,
        };
        let mut buf = Vec::new();
        header.write(&mut buf, true).unwrap();
        let mut r = SliceReader::new(&buf);
        let decoded = DataHeader::read(&mut r, true).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn interface_version_bounds_reject_out_of_range() {
        assert!(DataHeader::check_interface_version_bounds(2, 1, 3).is_ok());
        assert!(DataHeader::check_interface_version_bounds(0, 1, 3).is_err());
        assert!(DataHeader::check_interface_version_bounds(4, 1, 3).is_err());
    }
}
