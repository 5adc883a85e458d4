use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Path, parse_macro_input};

/// Implements `formtree::form::Composite` for a struct whose fields are state
/// nodes.
///
/// `#[composite(value = Type)]` names the value struct; it must have one field
/// per child with the same name. Children marked `#[composite(ui_only)]` are
/// validated and reset with the rest but are left out of the value.
#[proc_macro_derive(Composite, attributes(composite))]
pub fn derive_composite(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.ident,
            "Composite derive currently supports only non-generic structs",
        ));
    }

    let value_ty = value_type(&input.attrs)?.ok_or_else(|| {
        syn::Error::new_spanned(
            &input.ident,
            "Composite derive requires #[composite(value = Type)]",
        )
    })?;
    let state_ident = input.ident;

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &state_ident,
                    "Composite derive requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &state_ident,
                "Composite derive is only supported on structs",
            ));
        }
    };

    let formtree = formtree_path();
    let mut children = Vec::new();
    let mut value_fields = Vec::new();
    let mut assigns = Vec::new();
    let mut reinits = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_name = field_ident.to_string();
        children.push(quote! {
            (
                #formtree::form::FieldKey::new(#field_name),
                &self.#field_ident as &dyn #formtree::form::Node,
            )
        });
        if is_ui_only(&field.attrs)? {
            continue;
        }
        value_fields.push(quote! {
            #field_ident: #formtree::form::StateNode::value(&self.#field_ident)?
        });
        assigns.push(quote! {
            #formtree::form::StateNode::assign(&self.#field_ident, value.#field_ident)?;
        });
        reinits.push(quote! {
            #formtree::form::StateNode::reinit(&self.#field_ident, value.#field_ident)?;
        });
    }

    Ok(quote! {
        impl #formtree::form::Composite for #state_ident {
            type Value = #value_ty;

            fn children(
                &self,
            ) -> ::std::vec::Vec<(#formtree::form::FieldKey, &dyn #formtree::form::Node)> {
                ::std::vec![#(#children),*]
            }

            fn value(&self) -> #formtree::form::FormResult<Self::Value> {
                ::std::result::Result::Ok(#value_ty {
                    #(#value_fields),*
                })
            }

            fn assign(&self, value: Self::Value) -> #formtree::form::FormResult<()> {
                #(#assigns)*
                ::std::result::Result::Ok(())
            }

            fn reinit(&self, value: Self::Value) -> #formtree::form::FormResult<()> {
                #(#reinits)*
                ::std::result::Result::Ok(())
            }
        }
    })
}

fn value_type(attrs: &[Attribute]) -> syn::Result<Option<Path>> {
    let mut value = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("composite")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("value") {
                value = Some(meta.value()?.parse::<Path>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported composite attribute, expected `value = Type`"))
            }
        })?;
    }
    Ok(value)
}

fn is_ui_only(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut ui_only = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("composite")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("ui_only") {
                ui_only = true;
                Ok(())
            } else {
                Err(meta.error("unsupported composite field attribute, expected `ui_only`"))
            }
        })?;
    }
    Ok(ui_only)
}

fn formtree_path() -> TokenStream2 {
    match crate_name("formtree") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::formtree),
    }
}
