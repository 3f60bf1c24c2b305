//! Unified error handling for the Common Serialization Protocol.
//!
//! Mirrors the status taxonomy of the wire protocol (`Status`) while giving
//! Rust callers a richer, `thiserror`-derived error type to match against.

use thiserror::Error;

/// Wire-level status code. Negative values are errors; `NoError` (0) is the
/// only success value. `NoFurtherProcessingRequired` is an in-band success
/// signal from the fast path and never appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    NoError = 0,
    ErrorNoMemory = -1,
    ErrorOverflow = -2,
    ErrorInvalidArgument = -3,
    ErrorInvalidType = -4,
    ErrorInvalidHash = -5,
    ErrorNotSupportedProtocolVersion = -6,
    ErrorNotSupportedInterfaceVersion = -7,
    ErrorMismatchOfProtocolVersions = -8,
    ErrorMismatchOfInterfaceVersions = -9,
    ErrorMismatchOfTypeId = -10,
    ErrorNoSuchHandler = -11,
    ErrorMoreEntries = -12,
    ErrorNotAvailable = -13,
    ErrorNotInited = -14,
    ErrorAlreadyInited = -15,
    ErrorNotCompatibleCommonFlagsSettings = -16,
    ErrorNotCompatibleDataFlagsSettings = -17,
    ErrorNoSupportedInterfaces = -18,
    ErrorNotSupportedSerializationSettingsForStruct = -19,
    ErrorTypeSizeIsTooBig = -20,
    ErrorDataCorrupted = -21,
    ErrorInternal = -22,
}

impl Status {
    pub fn is_success(self) -> bool {
        matches!(self, Status::NoError)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    /// Recovers a `Status` from its wire-level `i32` representation.
    pub fn from_i32(code: i32) -> Option<Status> {
        Some(match code {
            0 => Status::NoError,
            -1 => Status::ErrorNoMemory,
            -2 => Status::ErrorOverflow,
            -3 => Status::ErrorInvalidArgument,
            -4 => Status::ErrorInvalidType,
            -5 => Status::ErrorInvalidHash,
            -6 => Status::ErrorNotSupportedProtocolVersion,
            -7 => Status::ErrorNotSupportedInterfaceVersion,
            -8 => Status::ErrorMismatchOfProtocolVersions,
            -9 => Status::ErrorMismatchOfInterfaceVersions,
            -10 => Status::ErrorMismatchOfTypeId,
            -11 => Status::ErrorNoSuchHandler,
            -12 => Status::ErrorMoreEntries,
            -13 => Status::ErrorNotAvailable,
            -14 => Status::ErrorNotInited,
            -15 => Status::ErrorAlreadyInited,
            -16 => Status::ErrorNotCompatibleCommonFlagsSettings,
            -17 => Status::ErrorNotCompatibleDataFlagsSettings,
            -18 => Status::ErrorNoSupportedInterfaces,
            -19 => Status::ErrorNotSupportedSerializationSettingsForStruct,
            -20 => Status::ErrorTypeSizeIsTooBig,
            -21 => Status::ErrorDataCorrupted,
            -22 => Status::ErrorInternal,
            _ => return None,
        })
    }
}

/// Main error type for all CSP operations.
#[derive(Error, Debug)]
pub enum CspError {
    #[error("buffer overflow: expected {expected} bytes, had {available}")]
    Overflow { expected: usize, available: usize },

    #[error("allocation failed for {resource}")]
    NoMemory { resource: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid type classification for {type_name}: {reason}")]
    InvalidType { type_name: String, reason: String },

    #[error("struct hash mismatch: expected {expected:#x}, got {actual:#x}")]
    InvalidHash { expected: u64, actual: u64 },

    #[error("protocol version {requested} not supported (have {supported:?})")]
    NotSupportedProtocolVersion { requested: u8, supported: Vec<u8> },

    #[error("interface version {requested} not supported (range [{minimum}, {latest}])")]
    NotSupportedInterfaceVersion {
        requested: u32,
        minimum: u32,
        latest: u32,
    },

    #[error("local and remote protocol versions mismatch after handshake")]
    MismatchOfProtocolVersions,

    #[error("local and remote interface versions mismatch after handshake")]
    MismatchOfInterfaceVersions,

    #[error("wire type id does not match expected type id")]
    MismatchOfTypeId,

    #[error("no handler registered for id")]
    NoSuchHandler,

    #[error("more than one handler registered for id, expected exactly one")]
    MoreEntries,

    #[error("handler(s) unavailable (draining for unregister)")]
    NotAvailable,

    #[error("context/component not initialized")]
    NotInited,

    #[error("context/component already initialized")]
    AlreadyInited,

    #[error(
        "common flags are not compatible: mandatory {mandatory:#x} forbidden {forbidden:#x} got {actual:#x}"
    )]
    NotCompatibleCommonFlagsSettings {
        mandatory: u32,
        forbidden: u32,
        actual: u32,
    },

    #[error(
        "data flags are not compatible: mandatory {mandatory:#x} forbidden {forbidden:#x} got {actual:#x}"
    )]
    NotCompatibleDataFlagsSettings {
        mandatory: u32,
        forbidden: u32,
        actual: u32,
    },

    #[error("no supported interfaces in common with remote party")]
    NoSupportedInterfaces,

    #[error("serialization settings not supported for struct: {reason}")]
    NotSupportedSerializationSettingsForStruct { reason: String },

    #[error("type size {size} exceeds maximum permitted width of 8 bytes")]
    TypeSizeIsTooBig { size: usize },

    #[error("data corrupted: {reason}")]
    DataCorrupted { reason: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("unsupported message type {0}")]
    UnsupportedMessageType(u32),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote party returned status {0:?}")]
    Remote(Status),
}

pub type CspResult<T> = Result<T, CspError>;

impl CspError {
    /// Map this error onto its wire-level status code (§6/§7 of the spec).
    pub fn as_status(&self) -> Status {
        match self {
            CspError::Overflow { .. } => Status::ErrorOverflow,
            CspError::NoMemory { .. } => Status::ErrorNoMemory,
            CspError::InvalidArgument(_) => Status::ErrorInvalidArgument,
            CspError::InvalidType { .. } => Status::ErrorInvalidType,
            CspError::InvalidHash { .. } => Status::ErrorInvalidHash,
            CspError::NotSupportedProtocolVersion { .. } => {
                Status::ErrorNotSupportedProtocolVersion
            }
            CspError::NotSupportedInterfaceVersion { .. } => {
                Status::ErrorNotSupportedInterfaceVersion
            }
            CspError::MismatchOfProtocolVersions => Status::ErrorMismatchOfProtocolVersions,
            CspError::MismatchOfInterfaceVersions => Status::ErrorMismatchOfInterfaceVersions,
            CspError::MismatchOfTypeId => Status::ErrorMismatchOfTypeId,
            CspError::NoSuchHandler => Status::ErrorNoSuchHandler,
            CspError::MoreEntries => Status::ErrorMoreEntries,
            CspError::NotAvailable => Status::ErrorNotAvailable,
            CspError::NotInited => Status::ErrorNotInited,
            CspError::AlreadyInited => Status::ErrorAlreadyInited,
            CspError::NotCompatibleCommonFlagsSettings { .. } => {
                Status::ErrorNotCompatibleCommonFlagsSettings
            }
            CspError::NotCompatibleDataFlagsSettings { .. } => {
                Status::ErrorNotCompatibleDataFlagsSettings
            }
            CspError::NoSupportedInterfaces => Status::ErrorNoSupportedInterfaces,
            CspError::NotSupportedSerializationSettingsForStruct { .. } => {
                Status::ErrorNotSupportedSerializationSettingsForStruct
            }
            CspError::TypeSizeIsTooBig { .. } => Status::ErrorTypeSizeIsTooBig,
            CspError::DataCorrupted { .. } => Status::ErrorDataCorrupted,
            CspError::Internal(_)
            | CspError::UnsupportedMessageType(_)
            | CspError::Transport(_) => Status::ErrorInternal,
            CspError::Remote(status) => *status,
        }
    }
}
