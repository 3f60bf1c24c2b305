//! Negotiation and registrar properties (spec §8 "Negotiation properties",
//! "Registrar properties", concrete scenarios 5 and 6).

use std::sync::Arc;

use csp::config::PartySettingsBuilder;
use csp::error::CspError;
use csp::flags::DataFlags;
use csp::header::{CommonHeader, MessageType};
use csp::id::Id;
use csp::io::SliceReader;
use csp::registrar::{Handler, Registrar};
use csp::server::Server;

struct Echo;
impl Handler for Echo {
    fn handle_data(&self, input: &[u8], out: &mut Vec<u8>) -> csp::error::CspResult<()> {
        out.extend_from_slice(input);
        Ok(())
    }
}

#[test]
fn unsupported_protocol_version_handshake_reports_supported_list() {
    // Concrete scenario 5: client sends protocol_version=0xFF; server
    // returns a Status body listing its supported versions.
    let server = Server::new(PartySettingsBuilder::new().build());
    let mut request = Vec::new();
    CommonHeader {
        protocol_version: csp::id::PROTOCOL_VERSION_UNDEFINED,
        message_type: MessageType::GetSettings,
        common_flags: csp::flags::CommonFlags::empty(),
    }
    .write(&mut request)
    .unwrap();

    let mut reply = Vec::new();
    server.handle_message(&request, &mut reply).unwrap();

    let mut r = SliceReader::new(&reply);
    let header = CommonHeader::read(&mut r).unwrap();
    assert_eq!(header.message_type, MessageType::Status);
    let code = csp::header::read_status_code(&mut r, false).unwrap();
    assert_eq!(
        csp::error::Status::from_i32(code),
        Some(csp::error::Status::ErrorNotSupportedProtocolVersion)
    );
    let body = csp::header::NotSupportedProtocolVersionBody::read(&mut r).unwrap();
    assert_eq!(body.supported_versions, csp::id::SUPPORTED_PROTOCOL_VERSIONS);
}

#[test]
fn duplicate_non_multicast_registration_is_rejected() {
    // Concrete scenario 6.
    let registrar = Registrar::new();
    let id = Id::new(42, 0);
    registrar.register(id, false, 1, Arc::new(Echo)).unwrap();
    let err = registrar.register(id, false, 2, Arc::new(Echo)).unwrap_err();
    assert!(matches!(err, CspError::AlreadyInited));
}

#[test]
fn settings_intersection_is_empty_when_interfaces_disjoint() {
    let a = PartySettingsBuilder::new()
        .interface(Id::new(1, 0), 1, DataFlags::empty(), DataFlags::empty())
        .build();
    let b = PartySettingsBuilder::new()
        .interface(Id::new(2, 0), 1, DataFlags::empty(), DataFlags::empty())
        .build();
    assert!(a.intersect(&b).is_empty_intersection());
}

#[test]
fn settings_intersection_picks_highest_common_protocol_version() {
    let client = PartySettingsBuilder::new()
        .protocol_version(3)
        .protocol_version(2)
        .build();
    let server = PartySettingsBuilder::new()
        .protocol_version(2)
        .protocol_version(1)
        .build();
    assert_eq!(
        client.highest_common_protocol_version(&server.protocol_versions),
        Some(2)
    );
}
