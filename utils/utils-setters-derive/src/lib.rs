//! # Setter Derive
//!
//! Generates chained setters for plain record structs such as on-disk headers
//! and option sets.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Type, parse_macro_input, spanned::Spanned};

/// Derive to generate `.set_<field>(&mut self, value: Ty) -> &mut Self` and
/// `.with_<field>(mut self, value: Ty) -> Self` for each **named** field.
///
/// Field attributes:
/// - `#[setters(skip)]`: generate nothing for this field.
/// - `#[setters(bytes)]`: the field must be a `[u8; N]` array. The setters take
///   a `&[u8]` instead, copy at most `N` bytes and zero-fill the remainder, so
///   fixed-width, possibly unterminated name buffers can be filled from any
///   slice.
///
/// Plain setters are `const`; byte setters are not.
///
/// # Example
///
/// ```
/// use utils_setters_derive::Setters;
///
/// #[derive(Setters, Default)]
/// struct Record {
///     kind: u8,
///     #[setters(bytes)]
///     label: [u8; 4],
///     #[setters(skip)]
///     _reserved: u32,
/// }
///
/// let r = Record::default().with_kind(4).with_label(b"abcdef");
/// assert_eq!(r.kind, 4);
/// assert_eq!(&r.label, b"abcd");
///
/// let mut r = r;
/// r.set_label(b"x");
/// assert_eq!(&r.label, b"x\0\0\0");
/// ```
#[proc_macro_derive(Setters, attributes(setters))]
pub fn derive_setters(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            Fields::Unnamed(u) => {
                return syn::Error::new(u.span(), "Setters only supports named fields")
                    .to_compile_error()
                    .into();
            }
            Fields::Unit => {
                return syn::Error::new(ident.span(), "Setters does not apply to unit structs")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "Setters can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut methods = Vec::new();

    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let mode = match field_mode(&field.attrs) {
            Ok(mode) => mode,
            Err(e) => return e.to_compile_error().into(),
        };

        let set_name = format_ident!("set_{}", fname);
        let with_name = format_ident!("with_{}", fname);

        match mode {
            Mode::Skip => {}
            Mode::Plain => {
                let ty = &field.ty;
                methods.push(quote! {
                    #[inline]
                    pub fn #set_name(&mut self, value: #ty) -> &mut Self {
                        self.#fname = value;
                        self
                    }

                    #[inline]
                    #[must_use]
                    pub const fn #with_name(mut self, value: #ty) -> Self {
                        self.#fname = value;
                        self
                    }
                });
            }
            Mode::Bytes => {
                if !is_byte_array(&field.ty) {
                    return syn::Error::new(
                        field.ty.span(),
                        "#[setters(bytes)] requires a `[u8; N]` field",
                    )
                    .to_compile_error()
                    .into();
                }

                methods.push(quote! {
                    #[inline]
                    pub fn #set_name(&mut self, value: &[u8]) -> &mut Self {
                        let n = value.len().min(self.#fname.len());
                        self.#fname.fill(0);
                        self.#fname[..n].copy_from_slice(&value[..n]);
                        self
                    }

                    #[inline]
                    #[must_use]
                    pub fn #with_name(mut self, value: &[u8]) -> Self {
                        self.#set_name(value);
                        self
                    }
                });
            }
        }
    }

    let expanded = quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    };

    TokenStream::from(expanded)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    Skip,
    Bytes,
}

fn field_mode(attrs: &[syn::Attribute]) -> syn::Result<Mode> {
    let mut mode = Mode::Plain;
    for attr in attrs {
        if !attr.path().is_ident("setters") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                mode = Mode::Skip;
                Ok(())
            } else if meta.path.is_ident("bytes") {
                if mode != Mode::Skip {
                    mode = Mode::Bytes;
                }
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `bytes`"))
            }
        })?;
    }
    Ok(mode)
}

fn is_byte_array(ty: &Type) -> bool {
    let Type::Array(array) = ty else {
        return false;
    };
    let Type::Path(elem) = array.elem.as_ref() else {
        return false;
    };
    elem.path.is_ident("u8")
}
