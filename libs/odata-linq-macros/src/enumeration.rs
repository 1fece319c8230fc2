use proc_macro2::TokenStream;
use proc_macro_error2::abort;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr};

pub fn expand_derive_odata_enum(input: &DeriveInput) -> TokenStream {
    let enum_name = &input.ident;

    let Data::Enum(data) = &input.data else {
        abort!(input, "ODataEnum can only be derived for enums");
    };

    if data.variants.is_empty() {
        abort!(input, "ODataEnum requires at least one variant");
    }

    let full_name = full_name(&input.attrs, &enum_name.to_string());

    let mut member_names = Vec::new();
    let mut arms = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            abort!(variant, "ODataEnum variants cannot carry data");
        }
        let ident = &variant.ident;
        let name = variant_name(&variant.attrs).unwrap_or_else(|| ident.to_string());
        arms.push(quote! { Self::#ident => #name });
        member_names.push(name);
    }

    quote! {
        impl ::odata_linq::model::ODataType for #enum_name {
            fn type_ref() -> ::odata_linq::model::TypeRef {
                ::odata_linq::model::TypeRef::Enum(::odata_linq::model::EnumRef(|| {
                    static DESCRIPTOR: ::std::sync::LazyLock<::odata_linq::model::EnumType> =
                        ::std::sync::LazyLock::new(|| {
                            ::odata_linq::model::EnumType::new(#full_name, [#(#member_names),*])
                        });
                    ::std::sync::LazyLock::force(&DESCRIPTOR)
                }))
            }

            fn to_value(&self) -> ::odata_linq::model::Value<'_> {
                let member = match self {
                    #(#arms,)*
                };
                ::odata_linq::model::Value::Scalar(::odata_linq::model::Literal::Enum(
                    ::odata_linq::model::EnumValue::new(#full_name, member),
                ))
            }
        }
    }
}

/// `name = "Ns.Type"` wins over `namespace = "Ns"`; without either the
/// bare enum name is used.
fn full_name(attrs: &[Attribute], enum_name: &str) -> String {
    let mut name = None;
    let mut namespace = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("odata")) {
        let parsed = attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("name") {
                &mut name
            } else if meta.path.is_ident("namespace") {
                &mut namespace
            } else {
                return Err(meta.error("expected `name` or `namespace`"));
            };
            let value: LitStr = meta.value()?.parse()?;
            *slot = Some(value.value());
            Ok(())
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{err}");
        }
    }
    match (name, namespace) {
        (Some(name), _) => name,
        (None, Some(ns)) => format!("{ns}.{enum_name}"),
        (None, None) => enum_name.to_owned(),
    }
}

fn variant_name(attrs: &[Attribute]) -> Option<String> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("odata")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{err}");
        }
    }
    name
}
