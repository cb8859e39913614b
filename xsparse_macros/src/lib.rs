use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Error, Fields, Index, Result, Type, parse_macro_input, spanned::Spanned};

/// The field marked `#[key]` and how to reach it from `self`.
struct KeyField {
    access: TokenStream,
    ty: Type,
}

impl KeyField {
    fn find(input: &DeriveInput) -> Result<Self> {
        let fields = match &input.data {
            Data::Struct(data) => &data.fields,
            _ => {
                return Err(Error::new(
                    input.ident.span(),
                    "Keyed can only be derived for structs",
                ));
            }
        };

        let mut found: Option<KeyField> = None;

        let iter: Box<dyn Iterator<Item = _>> = match fields {
            Fields::Named(named) => Box::new(named.named.iter()),
            Fields::Unnamed(unnamed) => Box::new(unnamed.unnamed.iter()),
            Fields::Unit => Box::new(std::iter::empty()),
        };

        for (i, field) in iter.enumerate() {
            let Some(attr) = field.attrs.iter().find(|attr| attr.path().is_ident("key")) else {
                continue;
            };

            if found.is_some() {
                return Err(Error::new(attr.span(), "only one field can be marked #[key]"));
            }

            let access = match &field.ident {
                Some(ident) => ident.to_token_stream(),
                None => Index::from(i).to_token_stream(),
            };

            found = Some(KeyField {
                access,
                ty: field.ty.clone(),
            });
        }

        found.ok_or_else(|| Error::new(input.ident.span(), "Keyed needs one field marked #[key]"))
    }
}

fn expand_keyed(input: DeriveInput) -> Result<TokenStream> {
    let KeyField { access, ty } = KeyField::find(&input)?;

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::xsparse::Keyed for #ident #ty_generics #where_clause {
            type Key = #ty;

            #[inline]
            fn key(&self) -> &Self::Key {
                &self.#access
            }
        }
    })
}

/// Implements `xsparse::Keyed` using the field marked `#[key]`.
#[proc_macro_derive(Keyed, attributes(key))]
pub fn derive_keyed(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_keyed(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}
