//! CSP - Common Serialization Protocol
//!
//! CSP is a versioned, endianness-aware binary wire format plus an RPC
//! messaging envelope. It gives a serialization layer the seams needed to
//! evolve wire types across interface versions, negotiate endianness and
//! integer-width differences between hosts, and dispatch inbound requests
//! to one or more registered handlers on a server.
//!
//! # Architecture
//!
//! 1. **Byte I/O primitives** ([`io`]): reversible primitive read/write,
//!    bulk raw read/write, endianness swap.
//! 2. **Context objects** ([`context`]): session state — buffer handle,
//!    protocol version, flags, interface version, pointer map, temp arena.
//! 3. **Body processor** ([`body`]): generic serialize/deserialize with
//!    fast-path (memcpy) / slow-path (field-by-field) selection.
//! 4. **Header & status codec** ([`header`]): common header, data header,
//!    status frames.
//! 5. **Version bridge** ([`version`]): walks a chain of historical private
//!    versions to reach the current shape.
//! 6. **Top-level serializable trait** ([`serializable`]): the `Serializable`
//!    contract tying the above together per user type.
//! 7. **Server dispatch registrar** ([`registrar`]): concurrent `Id ->
//!    handler` multimap with graceful unregister.
//! 8. **Client/Server envelopes** ([`client`], [`server`]): settings
//!    negotiation, `handleData`, `handleMessage`.
//!
//! # Quick Start
//!
//! ```rust
//! use csp::id::Id;
//! use csp::serializable::Serializable;
//! use csp::context::{DeserializeContext, SerializeContext};
//! use csp::io::{read_primitive, write_primitive, ByteReader, ByteWriter};
//! use csp::error::CspResult;
//!
//! struct Ping(u32);
//!
//! impl Serializable for Ping {
//!     const TYPE_ID: Id = Id::new(1, 0);
//!     const LATEST_VERSION: u32 = 1;
//!     const ORIGIN_VERSION: u32 = 1;
//!
//!     fn serialize_body(&self, w: &mut dyn ByteWriter, ctx: &mut SerializeContext) -> CspResult<()> {
//!         write_primitive(w, self.0, ctx.common.endian_mismatch())
//!     }
//!
//!     fn deserialize_body(r: &mut dyn ByteReader, ctx: &mut DeserializeContext) -> CspResult<Self> {
//!         Ok(Ping(read_primitive(r, ctx.data.common.endian_mismatch())?))
//!     }
//! }
//!
//! let bytes = Ping(7).serialize(1).unwrap();
//! let decoded = Ping::deserialize(&bytes).unwrap();
//! assert_eq!(decoded.0, 7);
//! ```

pub mod body;
pub mod classify;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod flags;
pub mod header;
pub mod id;
pub mod io;
pub mod registrar;
pub mod serializable;
pub mod server;
pub mod version;

pub use client::{Client, Communicator};
pub use config::{PartySettings, PartySettingsBuilder};
pub use error::{CspError, CspResult, Status};
pub use flags::{CommonFlags, DataFlags};
pub use id::{Id, InterfaceDescriptor, InterfaceVersion, ProtocolVersion};
pub use serializable::Serializable;
pub use server::Server;

#[cfg(feature = "derive")]
pub use csp_macro::Serializable as DeriveSerializable;
