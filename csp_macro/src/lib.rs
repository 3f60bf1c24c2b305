//! Derive macro generating `Serializable` boilerplate for plain-old-data
//! CSP types: the static identity/version constants, plus a per-field
//! `serialize_body`/`deserialize_body` for structs whose fields are all
//! wire primitives (arithmetic/enum types implementing `csp::io::Primitive`).
//!
//! When every field is a recognized fixed-width primitive *and* the struct
//! carries `#[repr(C)]` plus a `Copy` derive, the generated body additionally
//! takes the raw memcpy fast path (`csp::body::serialize_raw_span`) whenever
//! the session has no endianness mismatch, and claims
//! `csp::classify::AlwaysSimplyAssignable`. Structs that don't meet all
//! three conditions (e.g. a field typed `String` or `Vec<T>`, or missing
//! `repr(C)`/`Copy`) fall back to the per-field path only and are never
//! marked `AlwaysSimplyAssignable` — that claim would be false for them.
//!
//! Grounded in the teacher's `commy_macro` proc-macro crate shape
//! (`syn`/`quote`/`proc-macro2`), generalized from that crate's
//! memory-mapped-field-writer generator to CSP's identity/version/body
//! boilerplate.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitInt, LitStr, Type};

/// Optional `#[csp(id = "low,high", version = N, origin = M)]` attribute.
/// Absent fields fall back to a name-derived id and version `1`.
struct CspAttr {
    id_low: Option<u64>,
    id_high: Option<u64>,
    version: Option<u32>,
    origin: Option<u32>,
}

fn parse_csp_attr(input: &DeriveInput) -> CspAttr {
    let mut attr = CspAttr {
        id_low: None,
        id_high: None,
        version: None,
        origin: None,
    };

    for a in &input.attrs {
        if !a.path().is_ident("csp") {
            continue;
        }
        let _ = a.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                let value: LitStr = meta.value()?.parse()?;
                let text = value.value();
                let mut parts = text.split(',');
                if let (Some(low), Some(high)) = (parts.next(), parts.next()) {
                    attr.id_low = low.trim().parse().ok();
                    attr.id_high = high.trim().parse().ok();
                }
            } else if meta.path.is_ident("version") {
                let value: LitInt = meta.value()?.parse()?;
                attr.version = value.base10_parse().ok();
            } else if meta.path.is_ident("origin") {
                let value: LitInt = meta.value()?.parse()?;
                attr.origin = value.base10_parse().ok();
            }
            Ok(())
        });
    }

    attr
}

/// Derives a deterministic 128-bit id from the type's name when no explicit
/// `id` attribute was given. FNV-1a over the UTF-8 name, split into two
/// halves with a fixed salt on the high half so the identity differs from
/// the raw hash itself.
fn name_derived_id(name: &str) -> (u64, u64) {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut low = FNV_OFFSET;
    for byte in name.bytes() {
        low ^= byte as u64;
        low = low.wrapping_mul(FNV_PRIME);
    }

    let mut high = FNV_OFFSET ^ 0x5350_4353; // "CSP" salt
    for byte in name.bytes().rev() {
        high ^= byte as u64;
        high = high.wrapping_mul(FNV_PRIME);
    }

    (low, high)
}

const PRIMITIVE_IDENTS: &[&str] = &[
    "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64",
];

/// Whether `ty` is one of the fixed-width scalar types the fast path and
/// `csp::io::Primitive` cover. Field types outside this list (`bool`,
/// `String`, `Vec<T>`, nested structs, ...) always take the per-field path.
fn is_primitive_scalar(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|seg| PRIMITIVE_IDENTS.contains(&seg.ident.to_string().as_str())),
        _ => false,
    }
}

fn has_nested_ident(attrs: &[Attribute], outer: &str, inner: &str) -> bool {
    attrs.iter().any(|attr| {
        if !attr.path().is_ident(outer) {
            return false;
        }
        let mut found = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(inner) {
                found = true;
            }
            Ok(())
        });
        found
    })
}

#[proc_macro_derive(Serializable, attributes(csp))]
pub fn derive_serializable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    &input.ident,
                    "Serializable can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(
                &input.ident,
                "Serializable can only be derived for structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let attr = parse_csp_attr(&input);
    let (default_low, default_high) = name_derived_id(&name.to_string());
    let id_low = attr.id_low.unwrap_or(default_low);
    let id_high = attr.id_high.unwrap_or(default_high);
    let version = attr.version.unwrap_or(1u32);
    let origin = attr.origin.unwrap_or(version);

    let field_names: Vec<_> = fields.iter().map(|f| f.ident.clone().unwrap()).collect();

    // The fast raw-memcpy path is only sound when every field is a
    // recognized fixed-width scalar (no padding-sensitive mix, no
    // heap-backed field) and the struct's layout is pinned down by
    // `#[repr(C)]` plus `Copy` (`RawLayout` requires `Copy`, and relies on
    // the author asserting there's no hidden padding or destructor).
    let all_fields_primitive = fields.iter().all(|f| is_primitive_scalar(&f.ty));
    let has_repr_c = has_nested_ident(&input.attrs, "repr", "C");
    let has_copy_derive = has_nested_ident(&input.attrs, "derive", "Copy");
    let fast_path_eligible = all_fields_primitive && has_repr_c && has_copy_derive;

    let serialize_fields = field_names.iter().map(|ident| {
        quote! {
            ::csp::io::write_primitive(w, self.#ident, ctx.common.endian_mismatch())?;
        }
    });

    let deserialize_fields = field_names.iter().map(|ident| {
        quote! {
            let #ident = ::csp::io::read_primitive(r, ctx.data.common.endian_mismatch())?;
        }
    });

    let serialize_body_fn = if fast_path_eligible {
        quote! {
            fn serialize_body(
                &self,
                w: &mut dyn ::csp::io::ByteWriter,
                ctx: &mut ::csp::context::SerializeContext,
            ) -> ::csp::error::CspResult<()> {
                if !ctx.common.endian_mismatch() {
                    // SAFETY: every field is a fixed-width primitive, checked
                    // above, and the struct is `#[repr(C)]` + `Copy`, so its
                    // in-memory layout matches its wire layout byte-for-byte
                    // once no endianness swap is required.
                    unsafe {
                        ::csp::body::serialize_raw_span(w, core::slice::from_ref(self));
                    }
                    Ok(())
                } else {
                    #(#serialize_fields)*
                    Ok(())
                }
            }
        }
    } else {
        quote! {
            fn serialize_body(
                &self,
                w: &mut dyn ::csp::io::ByteWriter,
                ctx: &mut ::csp::context::SerializeContext,
            ) -> ::csp::error::CspResult<()> {
                #(#serialize_fields)*
                Ok(())
            }
        }
    };

    let deserialize_body_fn = if fast_path_eligible {
        quote! {
            fn deserialize_body(
                r: &mut dyn ::csp::io::ByteReader,
                ctx: &mut ::csp::context::DeserializeContext,
            ) -> ::csp::error::CspResult<Self> {
                if !ctx.data.common.endian_mismatch() {
                    // SAFETY: all-zero bits are a valid value for every field
                    // (fixed-width primitives only, checked above), and the
                    // whole struct is overwritten by `deserialize_raw_span`
                    // before it's returned.
                    let mut value: Self = unsafe { core::mem::zeroed() };
                    unsafe {
                        ::csp::body::deserialize_raw_span(r, core::slice::from_mut(&mut value))?;
                    }
                    Ok(value)
                } else {
                    #(#deserialize_fields)*
                    Ok(#name { #(#field_names),* })
                }
            }
        }
    } else {
        quote! {
            fn deserialize_body(
                r: &mut dyn ::csp::io::ByteReader,
                ctx: &mut ::csp::context::DeserializeContext,
            ) -> ::csp::error::CspResult<Self> {
                #(#deserialize_fields)*
                Ok(#name { #(#field_names),* })
            }
        }
    };

    let marker_impls = if fast_path_eligible {
        quote! {
            unsafe impl ::csp::body::RawLayout for #name {}
            impl ::csp::classify::AlwaysSimplyAssignable for #name {}
        }
    } else {
        quote! {}
    };

    let expanded = quote! {
        impl ::csp::serializable::Serializable for #name {
            const TYPE_ID: ::csp::id::Id = ::csp::id::Id::new(#id_low, #id_high);
            const LATEST_VERSION: ::csp::id::InterfaceVersion = #version;
            const ORIGIN_VERSION: ::csp::id::InterfaceVersion = #origin;

            #serialize_body_fn
            #deserialize_body_fn
        }

        #marker_impls
    };

    expanded.into()
}
