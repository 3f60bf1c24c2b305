//! Generic body processor (spec §4.3) — the core serialize/deserialize
//! dispatch, fast-path (memcpy) vs slow-path (field-by-field) selection.
//!
//! Grounded in `examples/original_source/cslib/include/common_serialization/CSP/CspConcepts.h`
//! for the eligibility concepts and
//! `.../csp/processing/DataProcessor.h`-style dispatch (the per-kind rules
//! are spelled out in spec.md §4.3 directly; there is no single original
//! header this maps onto one-to-one since the source dispatches through
//! C++ template specialization).

use std::any::Any;
use std::rc::Rc;

use crate::classify::EmptyType;
use crate::context::{DeserializeContext, SerializeContext};
use crate::error::{CspError, CspResult};
use crate::flags::DataFlags;
use crate::io::{read_primitive, write_primitive, write_raw, ByteReader, ByteWriter, Primitive};

/// Marker for a type whose in-memory layout is exactly its wire layout: no
/// padding, no pointers, no `Drop`. Safe to treat as a raw byte span for
/// the fast path. This is the idiomatic-Rust stand-in for the source's
/// reliance on C++ aggregate layout guarantees under `#pragma pack`; unlike
/// C++, Rust never promises this for an arbitrary `#[derive(Clone, Copy)]`
/// struct, so implementing this trait is an explicit, unsafe assertion by
/// the type's author (normally emitted by the `Serializable` derive for
/// `#[repr(C)]` structs).
///
/// # Safety
/// The implementor must guarantee the type has no padding bytes, is valid
/// for any bit pattern on read, and requires no destructor.
pub unsafe trait RawLayout: Copy {}

unsafe impl RawLayout for u8 {}
unsafe impl RawLayout for i8 {}
unsafe impl RawLayout for u16 {}
unsafe impl RawLayout for i16 {}
unsafe impl RawLayout for u32 {}
unsafe impl RawLayout for i32 {}
unsafe impl RawLayout for u64 {}
unsafe impl RawLayout for i64 {}
unsafe impl RawLayout for f32 {}
unsafe impl RawLayout for f64 {}

/// Whether the fast (memcpy) path is eligible for a `T` satisfying the
/// given classification bounds, per the matrix in spec.md §4.3.
pub fn fast_path_eligible_for_simply_assignable(
    data_flags: DataFlags,
    is_always_simply_assignable: bool,
    is_fixed_size: bool,
    is_aligned_to_one: bool,
    is_simply_assignable: bool,
) -> bool {
    if data_flags.contains(DataFlags::SIMPLY_ASSIGNABLE_TAGS_OPTIMIZATIONS_ARE_TURNED_OFF) {
        return false;
    }
    is_always_simply_assignable
        || (is_fixed_size && !data_flags.contains(DataFlags::ALIGNMENT_MAY_BE_NOT_EQUAL))
        || (is_aligned_to_one
            && !data_flags.contains(DataFlags::SIZE_OF_INTEGERS_MAY_BE_NOT_EQUAL))
        || (is_simply_assignable
            && !data_flags.contains(DataFlags::ALIGNMENT_MAY_BE_NOT_EQUAL)
            && !data_flags.contains(DataFlags::SIZE_OF_INTEGERS_MAY_BE_NOT_EQUAL))
}

/// Dispatch rule 1: `EmptyType` — no-op, success.
pub fn serialize_empty<T: EmptyType>(_value: &T) -> CspResult<()> {
    Ok(())
}

pub fn deserialize_empty<T: EmptyType + Default>() -> CspResult<T> {
    Ok(T::default())
}

/// Dispatch rule 2: arithmetic or enum. Emits a `u8` size marker first when
/// `sizeOfIntegersMayBeNotEqual` is set (placed once per scalar or once per
/// contiguous array, never per element — callers of the array variant must
/// call [`write_arithmetic_size_marker`] themselves exactly once).
pub fn serialize_arithmetic<T: Primitive>(
    w: &mut impl ByteWriter,
    value: T,
    ctx: &SerializeContext,
) -> CspResult<()> {
    write_primitive(w, value, ctx.common.endian_mismatch())
}

pub fn deserialize_arithmetic<T: Primitive>(
    r: &mut impl ByteReader,
    ctx: &DeserializeContext,
) -> CspResult<T> {
    read_primitive(r, ctx.data.common.endian_mismatch())
}

/// Emits the `u8 sizeof(T)` marker used when `sizeOfIntegersMayBeNotEqual`
/// is set, once per scalar or once per contiguous array (§4.3 "Arithmetic-width
/// marker placement").
pub fn write_arithmetic_size_marker<T: Primitive>(
    w: &mut impl ByteWriter,
    ctx: &SerializeContext,
) -> CspResult<()> {
    if ctx
        .data_flags()
        .contains(DataFlags::SIZE_OF_INTEGERS_MAY_BE_NOT_EQUAL)
    {
        write_primitive(w, T::SIZE as u8, false)?;
    }
    Ok(())
}

pub fn read_arithmetic_size_marker(
    r: &mut impl ByteReader,
    ctx: &DeserializeContext,
) -> CspResult<Option<u8>> {
    if ctx
        .data
        .data_flags()
        .contains(DataFlags::SIZE_OF_INTEGERS_MAY_BE_NOT_EQUAL)
    {
        Ok(Some(read_primitive(r, false)?))
    } else {
        Ok(None)
    }
}

/// Dispatch rule 3: pointer (`Option<Rc<T>>`). Requires
/// `allowUnmanagedPointers`, else `ErrorNotSupportedSerializationSettingsForStruct`.
/// Shared ownership (`Rc` rather than `Box`) is what lets the deserialize
/// side hand back a second reference to an already-reconstructed object on
/// a recursive-pointer back-reference, instead of losing it.
pub fn serialize_pointer<T, F>(
    w: &mut impl ByteWriter,
    value: &Option<Rc<T>>,
    ctx: &mut SerializeContext,
    serialize_pointee: F,
) -> CspResult<()>
where
    F: FnOnce(&mut dyn ByteWriter, &T, &mut SerializeContext) -> CspResult<()>,
{
    if !ctx.data_flags().contains(DataFlags::ALLOW_UNMANAGED_POINTERS) {
        return Err(CspError::NotSupportedSerializationSettingsForStruct {
            reason: "pointer field requires allowUnmanagedPointers".to_string(),
        });
    }

    let check_recursive = ctx
        .data_flags()
        .contains(DataFlags::CHECK_RECURSIVE_POINTERS);

    match value {
        None => {
            write_primitive(w, 0u64, ctx.common.endian_mismatch())?;
        }
        Some(rc) => {
            if check_recursive {
                let addr = Rc::as_ptr(rc) as *const () as usize;
                let existing = ctx.pointer_map().and_then(|map| map.lookup(addr));
                match existing {
                    Some(offset) => {
                        write_primitive(w, offset, ctx.common.endian_mismatch())?;
                        return Ok(());
                    }
                    None => {
                        write_primitive(w, 1u64, ctx.common.endian_mismatch())?;
                        let offset = w.len() as u64;
                        if let Some(map) = ctx.pointer_map_mut() {
                            map.record(addr, offset);
                        }
                        serialize_pointee(w, rc.as_ref(), ctx)?;
                    }
                }
            } else {
                write_primitive(w, 1u8 as u64, ctx.common.endian_mismatch())?;
                serialize_pointee(w, rc.as_ref(), ctx)?;
            }
        }
    }
    Ok(())
}

/// Dispatch rule 3, deserialize direction. `allocate_default` constructs a
/// default pointee that `deserialize_pointee` then fills in; the resulting
/// `Rc` is registered in the context's temp arena so a later back-reference
/// to the same offset can clone the same `Rc` rather than losing the
/// reference or reallocating, matching the source's "default-constructed
/// pointee obtained from the temp arena" rule while keeping a single shared
/// owner for the object's lifetime.
pub fn deserialize_pointer<T, FAlloc, FDeser>(
    r: &mut impl ByteReader,
    ctx: &mut DeserializeContext,
    allocate_default: FAlloc,
    deserialize_pointee: FDeser,
) -> CspResult<Option<Rc<T>>>
where
    T: 'static,
    FAlloc: FnOnce() -> T,
    FDeser: FnOnce(&mut dyn ByteReader, &mut T, &mut DeserializeContext) -> CspResult<()>,
{
    if !ctx
        .data
        .data_flags()
        .contains(DataFlags::ALLOW_UNMANAGED_POINTERS)
    {
        return Err(CspError::NotSupportedSerializationSettingsForStruct {
            reason: "pointer field requires allowUnmanagedPointers".to_string(),
        });
    }

    let endian_mismatch = ctx.data.common.endian_mismatch();
    let key: u64 = read_primitive(r, endian_mismatch)?;

    if key == 0 {
        return Ok(None);
    }

    let check_recursive = ctx
        .data
        .data_flags()
        .contains(DataFlags::CHECK_RECURSIVE_POINTERS);

    if check_recursive && key != 1 {
        // Back-reference: the arena already holds the reconstructed object
        // at the index recorded for this offset. Clone the `Rc` so both
        // fields end up pointing at the same allocation, matching the
        // source's "two resulting pointers are equal" contract.
        let idx = ctx
            .data
            .pointer_map()
            .and_then(|m| m.lookup(key))
            .ok_or_else(|| CspError::DataCorrupted {
                reason: "pointer back-reference to unknown offset".to_string(),
            })?;
        let rc = ctx
            .temp_arena
            .get(idx)
            .and_then(|any| any.downcast_ref::<Rc<T>>())
            .ok_or_else(|| CspError::DataCorrupted {
                reason: "pointer back-reference type mismatch".to_string(),
            })?;
        return Ok(Some(rc.clone()));
    }

    let mut pointee = allocate_default();
    let offset_before = r.tell() as u64;
    deserialize_pointee(r, &mut pointee, ctx)?;

    let rc = Rc::new(pointee);
    if check_recursive {
        let idx = ctx.temp_arena.push(Box::new(rc.clone()));
        if let Some(map) = ctx.data.pointer_map_mut() {
            map.record(offset_before, idx);
        }
    }

    Ok(Some(rc))
}

/// Dispatch rule 4/5 fast path: a contiguous span of `T: RawLayout` is
/// copied as one raw byte block when eligible (matches host endianness, or
/// `T` is `EndiannessTolerant`); size in bytes is `values.len() * size_of::<T>()`.
///
/// # Safety
/// Caller must have already established fast-path eligibility via
/// [`fast_path_eligible_for_simply_assignable`] and endianness tolerance.
pub unsafe fn serialize_raw_span<T: RawLayout>(w: &mut impl ByteWriter, values: &[T]) {
    let byte_len = std::mem::size_of_val(values);
    let ptr = values.as_ptr() as *const u8;
    let bytes = std::slice::from_raw_parts(ptr, byte_len);
    write_raw(w, bytes);
}

/// # Safety
/// See [`serialize_raw_span`]; additionally `out` must have length `count`.
pub unsafe fn deserialize_raw_span<T: RawLayout>(
    r: &mut impl ByteReader,
    out: &mut [T],
) -> CspResult<()> {
    let byte_len = std::mem::size_of_val(out);
    let bytes = r.read_bytes(byte_len)?;
    let ptr = out.as_mut_ptr() as *mut u8;
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, byte_len);
    Ok(())
}

/// Serializes a `Vec<T>` as `serialize_size(len)` followed by the elements,
/// choosing the fast raw-span path when eligible and falling back to
/// per-element `serialize_element` otherwise.
pub fn serialize_vec<T, F>(
    w: &mut impl ByteWriter,
    values: &[T],
    ctx: &mut SerializeContext,
    mut serialize_element: F,
) -> CspResult<()>
where
    F: FnMut(&mut dyn ByteWriter, &T, &mut SerializeContext) -> CspResult<()>,
{
    crate::io::write_to_another_size(
        w,
        size_width(ctx),
        values.len() as u64,
        ctx.common.endian_mismatch(),
    )?;
    for v in values {
        serialize_element(w, v, ctx)?;
    }
    Ok(())
}

pub fn deserialize_vec<T, F>(
    r: &mut impl ByteReader,
    ctx: &mut DeserializeContext,
    mut deserialize_element: F,
) -> CspResult<Vec<T>>
where
    F: FnMut(&mut dyn ByteReader, &mut DeserializeContext) -> CspResult<T>,
{
    let width = size_width_deser(ctx);
    let len = crate::io::read_from_another_size(r, width, ctx.data.common.endian_mismatch())?;
    let mut out = Vec::with_capacity(len as usize);
    for _ in 0..len {
        out.push(deserialize_element(r, ctx)?);
    }
    Ok(out)
}

fn size_width(ctx: &SerializeContext) -> usize {
    if ctx.common.common_flags().contains(crate::flags::CommonFlags::BITNESS_32) {
        4
    } else {
        8
    }
}

fn size_width_deser(ctx: &DeserializeContext) -> usize {
    if ctx
        .data
        .common
        .common_flags()
        .contains(crate::flags::CommonFlags::BITNESS_32)
    {
        4
    } else {
        8
    }
}

/// Type-erased temp-arena allocation helper used by [`deserialize_pointer`]
/// implementations that want to record ownership explicitly rather than
/// relying on the returned `Box` alone (e.g. when a handler needs the
/// arena to outlive the immediate call).
pub fn register_in_arena<T: 'static>(ctx: &mut DeserializeContext, value: T) -> usize {
    ctx.temp_arena.push(Box::new(value) as Box<dyn Any>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        CommonContext, DataContext, DeserializePointerMap, SerializePointerMap,
    };
    use crate::flags::CommonFlags;
    use crate::header::MessageType;
    use crate::io::SliceReader;

    fn serialize_ctx(data_flags: DataFlags) -> SerializeContext {
        DataContext::new(
            CommonContext::new(1, MessageType::Data, CommonFlags::empty()),
            data_flags,
        )
    }

    fn deserialize_ctx(data_flags: DataFlags) -> DeserializeContext {
        DeserializeContext::new(
            CommonContext::new(1, MessageType::Data, CommonFlags::empty()),
            data_flags,
        )
    }

    #[test]
    fn arithmetic_round_trips() {
        let mut ctx = serialize_ctx(DataFlags::empty());
        let mut buf = Vec::new();
        serialize_arithmetic(&mut buf, 42u32, &ctx).unwrap();
        let mut dctx = deserialize_ctx(DataFlags::empty());
        let mut r = SliceReader::new(&buf);
        let v: u32 = deserialize_arithmetic(&mut r, &dctx).unwrap();
        assert_eq!(v, 42);
        ctx.set_interface_version(1);
        dctx.data.set_interface_version(1);
    }

    #[test]
    fn null_pointer_round_trips() {
        let mut ctx = serialize_ctx(DataFlags::ALLOW_UNMANAGED_POINTERS);
        let mut buf = Vec::new();
        let value: Option<Rc<u32>> = None;
        serialize_pointer(&mut buf, &value, &mut ctx, |w, v: &u32, _| {
            write_primitive(w, *v, false)
        })
        .unwrap();

        let mut dctx = deserialize_ctx(DataFlags::ALLOW_UNMANAGED_POINTERS);
        let mut r = SliceReader::new(&buf);
        let decoded: Option<Rc<u32>> = deserialize_pointer(
            &mut r,
            &mut dctx,
            || 0u32,
            |r, v, _| {
                *v = read_primitive(r, false)?;
                Ok(())
            },
        )
        .unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn pointer_without_flag_errors() {
        let mut ctx = serialize_ctx(DataFlags::empty());
        let value: Option<Rc<u32>> = None;
        let err = serialize_pointer(&mut Vec::new(), &value, &mut ctx, |w, v: &u32, _| {
            write_primitive(w, *v, false)
        })
        .unwrap_err();
        assert!(matches!(
            err,
            CspError::NotSupportedSerializationSettingsForStruct { .. }
        ));
    }

    #[test]
    fn recursive_pointer_dedup_round_trips_to_same_object() {
        let mut ctx = serialize_ctx(
            DataFlags::ALLOW_UNMANAGED_POINTERS | DataFlags::CHECK_RECURSIVE_POINTERS,
        );
        ctx.install_pointer_map(SerializePointerMap::new());
        let mut buf = Vec::new();

        // Two fields sharing the same underlying allocation, as if a struct
        // held two pointer fields aliasing one object.
        let shared = Rc::new(99u32);
        let first = Some(Rc::clone(&shared));
        let second = Some(Rc::clone(&shared));

        serialize_pointer(&mut buf, &first, &mut ctx, |w, v: &u32, _| {
            write_primitive(w, *v, false)
        })
        .unwrap();
        serialize_pointer(&mut buf, &second, &mut ctx, |w, v: &u32, _| {
            write_primitive(w, *v, false)
        })
        .unwrap();

        let mut dctx = deserialize_ctx(
            DataFlags::ALLOW_UNMANAGED_POINTERS | DataFlags::CHECK_RECURSIVE_POINTERS,
        );
        dctx.data.install_pointer_map(DeserializePointerMap::new());
        let mut r = SliceReader::new(&buf);

        let decode_one = |r: &mut SliceReader, dctx: &mut DeserializeContext| {
            deserialize_pointer(r, dctx, || 0u32, |r, v, _| {
                *v = read_primitive(r, false)?;
                Ok(())
            })
            .unwrap()
        };

        let decoded_first = decode_one(&mut r, &mut dctx).unwrap();
        let decoded_second = decode_one(&mut r, &mut dctx).unwrap();

        assert_eq!(*decoded_first, 99);
        assert!(Rc::ptr_eq(&decoded_first, &decoded_second));
    }

    #[test]
    fn empty_vec_emits_only_size_prefix() {
        let mut ctx = serialize_ctx(DataFlags::empty());
        let mut buf = Vec::new();
        let values: Vec<u8> = Vec::new();
        serialize_vec(&mut buf, &values, &mut ctx, |w, v: &u8, _| {
            write_primitive(w, *v, false)
        })
        .unwrap();
        assert_eq!(buf.len(), 8);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn raw_span_round_trips() {
        let values: [u32; 3] = [1, 2, 3];
        let mut buf = Vec::new();
        unsafe { serialize_raw_span(&mut buf, &values) };
        let mut out = [0u32; 3];
        let mut r = SliceReader::new(&buf);
        unsafe { deserialize_raw_span(&mut r, &mut out).unwrap() };
        assert_eq!(out, values);
    }

    #[test]
    fn fast_path_matrix_respects_tags_off_flag() {
        assert!(!fast_path_eligible_for_simply_assignable(
            DataFlags::SIMPLY_ASSIGNABLE_TAGS_OPTIMIZATIONS_ARE_TURNED_OFF,
            true,
            true,
            true,
            true,
        ));
        assert!(fast_path_eligible_for_simply_assignable(
            DataFlags::empty(),
            true,
            false,
            false,
            false,
        ));
    }
}
