//! Session context objects (spec §3 "Session context", §4.2), grounded in
//! `examples/original_source/cslib/include/common_serialization/CSP/ContextCommon.h`
//! (`Common<Container>`) and `.../CSP/ContextData.h` (`Data<...>`,
//! `InterfaceVersionsProcessing`, pointer-map processing mixins).

use std::any::Any;
use std::collections::HashMap;

use crate::flags::{CommonFlags, DataFlags};
use crate::header::MessageType;
use crate::id::{InterfaceVersion, ProtocolVersion, INTERFACE_VERSION_UNDEFINED};

/// Serialize-side pointer map: an already-emitted object's address (as a
/// stable `usize` surrogate, e.g. `Box::as_ptr` cast) to the byte offset
/// where its body begins. Grounded in `CspConcepts.h`'s
/// `ISerializationPointersMap`.
#[derive(Debug, Default)]
pub struct SerializePointerMap {
    seen: HashMap<usize, u64>,
}

impl SerializePointerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the offset the object was already emitted at, if any.
    pub fn lookup(&self, addr: usize) -> Option<u64> {
        self.seen.get(&addr).copied()
    }

    pub fn record(&mut self, addr: usize, offset: u64) {
        self.seen.insert(addr, offset);
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Deserialize-side pointer map: a byte offset to the index of the
/// reconstructed object in the owning [`TempArena`]. Grounded in
/// `CspConcepts.h`'s `IDeserializationPointersMap`.
#[derive(Debug, Default)]
pub struct DeserializePointerMap {
    seen: HashMap<u64, usize>,
}

impl DeserializePointerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, offset: u64) -> Option<usize> {
        self.seen.get(&offset).copied()
    }

    pub fn record(&mut self, offset: u64, arena_index: usize) {
        self.seen.insert(offset, arena_index);
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Owns every heap object constructed during deserialization of an
/// unmanaged pointer. On context teardown the caller may take ownership of
/// the boxes (draining the arena) or simply drop the context, running their
/// destructors.
///
/// Holds `Box<dyn Any>` rather than `Box<dyn Any + Send>`: recursive-pointer
/// dedup (`crate::body::deserialize_pointer`) stores `Rc<T>` clones here so a
/// second reference to the same object resolves to the same allocation, and
/// `Rc` is never `Send`. A `DeserializeContext` is built and consumed within
/// a single `deserialize` call and never crosses a thread boundary.
#[derive(Default)]
pub struct TempArena {
    boxes: Vec<Box<dyn Any>>,
}

impl TempArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Box<dyn Any>) -> usize {
        self.boxes.push(value);
        self.boxes.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&dyn Any> {
        self.boxes.get(index).map(|b| b.as_ref())
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Releases ownership of every allocated object without running their
    /// destructors early, handing the caller the raw collection.
    pub fn take_all(&mut self) -> Vec<Box<dyn Any>> {
        std::mem::take(&mut self.boxes)
    }
}

impl std::fmt::Debug for TempArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempArena")
            .field("len", &self.boxes.len())
            .finish()
    }
}

/// Session state shared by serialize and deserialize contexts (`Common<Container>`
/// in the source). Frozen once body serialization begins.
#[derive(Debug)]
pub struct CommonContext {
    protocol_version: ProtocolVersion,
    message_type: MessageType,
    common_flags: CommonFlags,
}

impl CommonContext {
    pub fn new(
        protocol_version: ProtocolVersion,
        message_type: MessageType,
        common_flags: CommonFlags,
    ) -> Self {
        CommonContext {
            protocol_version,
            message_type,
            common_flags,
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn common_flags(&self) -> CommonFlags {
        self.common_flags
    }

    pub fn endian_mismatch(&self) -> bool {
        self.common_flags.endian_mismatch()
    }

    /// Rewinds session state but does not touch the underlying buffer
    /// contents (`resetToDefaultsExceptDataContents` in the source).
    pub fn reset_to_defaults_except_contents(&mut self) {
        self.protocol_version = 0;
        self.message_type = MessageType::Status;
        self.common_flags = CommonFlags::empty();
    }
}

/// Data-message session state (`Data<...>` in the source). Adds data
/// flags, interface version bookkeeping, and the pointer map.
#[derive(Debug)]
pub struct DataContext<PM> {
    pub common: CommonContext,
    data_flags: DataFlags,
    interface_version: InterfaceVersion,
    interface_version_not_match: bool,
    aux_uses_heap_allocation: bool,
    pointer_map: Option<PM>,
}

impl<PM> DataContext<PM> {
    pub fn new(common: CommonContext, data_flags: DataFlags) -> Self {
        DataContext {
            common,
            data_flags,
            interface_version: INTERFACE_VERSION_UNDEFINED,
            interface_version_not_match: false,
            aux_uses_heap_allocation: true,
            pointer_map: None,
        }
    }

    pub fn data_flags(&self) -> DataFlags {
        self.data_flags
    }

    pub fn interface_version(&self) -> InterfaceVersion {
        self.interface_version
    }

    pub fn set_interface_version(&mut self, version: InterfaceVersion) {
        self.interface_version = version;
    }

    pub fn interface_version_not_match(&self) -> bool {
        self.interface_version_not_match
    }

    pub fn set_interface_version_not_match(&mut self, value: bool) {
        self.interface_version_not_match = value;
    }

    pub fn aux_uses_heap_allocation(&self) -> bool {
        self.aux_uses_heap_allocation
    }

    pub fn set_aux_uses_heap_allocation(&mut self, value: bool) {
        self.aux_uses_heap_allocation = value;
    }

    pub fn pointer_map(&self) -> Option<&PM> {
        self.pointer_map.as_ref()
    }

    pub fn pointer_map_mut(&mut self) -> Option<&mut PM> {
        self.pointer_map.as_mut()
    }

    pub fn install_pointer_map(&mut self, map: PM) {
        self.pointer_map = Some(map);
    }
}

/// Serialize-direction data context.
pub type SerializeContext = DataContext<SerializePointerMap>;

/// Deserialize-direction data context. Additionally owns the temp arena by
/// value (the source owns it "by pointer"; in Rust the context is the
/// natural sole owner since it is single-use and not shared across threads).
pub struct DeserializeContext {
    pub data: DataContext<DeserializePointerMap>,
    pub temp_arena: TempArena,
}

impl DeserializeContext {
    pub fn new(common: CommonContext, data_flags: DataFlags) -> Self {
        DeserializeContext {
            data: DataContext::new(common, data_flags),
            temp_arena: TempArena::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_context_reports_endian_mismatch() {
        let ctx = CommonContext::new(
            1,
            MessageType::Data,
            CommonFlags::for_host_endian() ^ CommonFlags::BIG_ENDIAN_FORMAT,
        );
        assert!(ctx.endian_mismatch());
    }

    #[test]
    fn pointer_map_round_trips_offsets() {
        let mut map = SerializePointerMap::new();
        map.record(0x1000, 42);
        assert_eq!(map.lookup(0x1000), Some(42));
        assert_eq!(map.lookup(0x2000), None);
    }

    #[test]
    fn temp_arena_stores_and_retrieves() {
        let mut arena = TempArena::new();
        let idx = arena.push(Box::new(7u32));
        assert_eq!(arena.get(idx).unwrap().downcast_ref::<u32>(), Some(&7));
    }
}
