//! Version bridge (spec §4.5), grounded in
//! `examples/original_source/cslib/include/common_serialization/csp/processing/DataVersionConverters.h`-style
//! "recursive converter chain" semantics. Rust has no variadic template
//! packs, so the chain `[T_current, T_prev, ..., T_origin]` is expressed as
//! a recursive walk over `Box<dyn VersionNode>` rather than a compile-time
//! parameter pack.

use crate::error::{CspError, CspResult};
use crate::id::InterfaceVersion;

/// One historical private version of a type, able to convert itself to/from
/// the next version up the chain. `T` is the current (latest) Rust type;
/// each node knows how to produce the current shape from its own wire
/// shape and vice versa.
pub trait VersionNode<T> {
    /// The interface version this node's wire shape corresponds to.
    fn version(&self) -> InterfaceVersion;

    /// Builds the current shape from this node's deserialized contents.
    fn upgrade(self: Box<Self>) -> CspResult<T>;

    /// Builds this node's shape from the current one, for downgrading on
    /// serialize.
    fn downgrade_from(current: &T) -> CspResult<Box<dyn VersionNode<T>>>
    where
        Self: Sized;
}

/// A chain of version nodes for a type, descending from latest to origin.
/// `nodes` is ordered newest-first; `nodes.last()` is the origin private
/// version.
pub struct VersionChain<T> {
    /// Version numbers in the chain, newest-first, paired with a
    /// downgrade constructor. Kept as function pointers rather than trait
    /// objects directly, since each entry needs to be able to construct its
    /// own concrete `VersionNode` impl from `&T`.
    entries: Vec<ChainEntry<T>>,
}

pub type DowngradeFn<T> =
    fn(&T) -> CspResult<Box<dyn FnMut(&mut dyn crate::io::ByteWriter) -> CspResult<()>>>;

struct ChainEntry<T> {
    version: InterfaceVersion,
    downgrade: DowngradeFn<T>,
}

impl<T> VersionChain<T> {
    pub fn new() -> Self {
        VersionChain { entries: Vec::new() }
    }

    pub fn register(mut self, version: InterfaceVersion, downgrade: DowngradeFn<T>) -> Self {
        self.entries.push(ChainEntry { version, downgrade });
        self
    }

    /// The origin private version: the last (oldest) entry in the chain,
    /// or `latest` if no historical versions were registered.
    pub fn origin_version(&self, latest: InterfaceVersion) -> InterfaceVersion {
        self.entries.last().map(|e| e.version).unwrap_or(latest)
    }

    /// Finds the serializer for `target_version`, walking from current
    /// toward the target: at each node, if the node's version is greater
    /// than the requested target, delegate deeper; otherwise emit that
    /// node's representation.
    pub fn serializer_for(&self, target_version: InterfaceVersion) -> CspResult<DowngradeFn<T>> {
        for entry in &self.entries {
            if entry.version <= target_version {
                return Ok(entry.downgrade);
            }
        }
        Err(CspError::Internal(format!(
            "no version node found for target version {target_version}"
        )))
    }
}

impl<T> Default for VersionChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocation policy for intermediate nodes walked during version bridging
/// (spec §4.5 "Allocation policy for intermediates"). On heap, intermediates
/// are boxed and dropped at scope exit; on stack they are plain locals —
/// both are expressed identically in Rust via ordinary ownership, since
/// Rust's `Box<T>` and stack `T` both destroy deterministically at scope
/// exit. This type exists so `aux_uses_heap_allocation` remains an explicit,
/// observable choice rather than being silently erased by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    Heap,
    Stack,
}

impl AllocationPolicy {
    pub fn from_aux_uses_heap_allocation(flag: bool) -> Self {
        if flag {
            AllocationPolicy::Heap
        } else {
            AllocationPolicy::Stack
        }
    }
}
