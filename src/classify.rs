//! Type classification marker traits (spec §3 "Type classification"),
//! grounded in
//! `examples/original_source/cslib/include/common_serialization/CSP/CspConcepts.h`
//! (`SimpleAssignableType`/`SimpleAssignableAlignedToOneType`/`EmptyType`
//! concepts, expressed there via marker member-type tags).
//!
//! Every user type declares zero or more of these. [`crate::body`]'s fast
//! path eligibility matrix (§4.3) consults them, along with the session's
//! [`crate::flags::DataFlags`], to decide memcpy vs field-by-field.

/// A type whose representation is always bit-identical across hosts that
/// agree on endianness — no alignment or integer-width padding concerns.
/// Implies [`SimplyAssignableFixedSize`], [`SimplyAssignableAlignedToOne`]
/// and [`SimplyAssignable`].
pub trait AlwaysSimplyAssignable {}

/// A type whose size is fixed regardless of `alignmentMayBeNotEqual`.
pub trait SimplyAssignableFixedSize {}

/// A type with no internal padding (`#[repr(C, packed)]`-equivalent),
/// eligible for the fast path when `sizeOfIntegersMayBeNotEqual` is clear.
pub trait SimplyAssignableAlignedToOne {}

/// A type eligible for the fast path only when both
/// `alignmentMayBeNotEqual` and `sizeOfIntegersMayBeNotEqual` are clear.
pub trait SimplyAssignable {}

/// A type whose wire representation is the same regardless of session
/// endianness (e.g. byte arrays, or structs entirely composed of such).
pub trait EndiannessTolerant {}

/// A zero-sized wire representation; serialize/deserialize are no-ops.
pub trait EmptyType {}

/// A type that implements [`crate::serializable::Serializable`] itself,
/// i.e. it carries its own identity/version/body rather than being a plain
/// aggregate of primitives.
pub trait ISerializableBased {}

impl<T: AlwaysSimplyAssignable> SimplyAssignableFixedSize for T {}
impl<T: AlwaysSimplyAssignable> SimplyAssignableAlignedToOne for T {}
impl<T: AlwaysSimplyAssignable> SimplyAssignable for T {}

macro_rules! impl_always_simply_assignable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AlwaysSimplyAssignable for $ty {}
            impl EndiannessTolerant for $ty {}
        )*
    };
}

// Single-byte arithmetic types have nothing to swap, so they're also
// endianness-tolerant; wider ones need an explicit swap and so are not.
// `bool` is deliberately not in this list: it has no `Primitive` impl in
// `crate::io` and no `RawLayout` impl in `crate::body`, so nothing can
// actually dispatch it through the fast path this marker enables.
impl_always_simply_assignable!(u8, i8);

impl AlwaysSimplyAssignable for u16 {}
impl AlwaysSimplyAssignable for i16 {}
impl AlwaysSimplyAssignable for u32 {}
impl AlwaysSimplyAssignable for i32 {}
impl AlwaysSimplyAssignable for u64 {}
impl AlwaysSimplyAssignable for i64 {}
impl AlwaysSimplyAssignable for f32 {}
impl AlwaysSimplyAssignable for f64 {}

impl EmptyType for () {}

#[cfg(test)]
mod tests {
    use super::*;

    // A type that deliberately does NOT implement `EndiannessTolerant`,
    // exercising the hard-error rule for non-reversible types under
    // endianness mismatch (§4.1's `long double` rule, since Rust has no
    // long double to test directly).
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct NonTolerant(pub u32);

    impl AlwaysSimplyAssignable for NonTolerant {}
    // Intentionally not `EndiannessTolerant`.

    #[test]
    fn always_simply_assignable_implies_the_rest() {
        fn assert_bounds<T: SimplyAssignableFixedSize + SimplyAssignableAlignedToOne + SimplyAssignable>() {}
        assert_bounds::<u32>();
        assert_bounds::<NonTolerant>();
    }
}
