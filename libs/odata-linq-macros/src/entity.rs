use heck::ToUpperCamelCase;
use proc_macro2::TokenStream;
use proc_macro_error2::abort;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr};

#[derive(Default)]
struct MemberAttrs {
    member: Option<String>,
    data_member: Option<String>,
    element: Option<String>,
    attribute: Option<String>,
    skip: bool,
}

pub fn expand_derive_odata_entity(input: &DeriveInput) -> TokenStream {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        abort!(input.generics, "ODataEntity does not support generic structs");
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => abort!(input, "ODataEntity only supports structs with named fields"),
        },
        _ => abort!(input, "ODataEntity can only be derived for structs"),
    };

    let entity_name = entity_name(&input.attrs).unwrap_or_else(|| struct_name.to_string());

    let mut members = Vec::new();
    let mut accessors = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            abort!(field, "ODataEntity requires named fields");
        };
        let attrs = member_attrs(&field.attrs);
        if attrs.skip {
            continue;
        }
        let field_type = &field.ty;
        let name = attrs
            .member
            .unwrap_or_else(|| field_ident.to_string().to_upper_camel_case());

        let data_member = attrs.data_member.map(|a| quote! { .data_member(#a) });
        let element = attrs.element.map(|a| quote! { .element(#a) });
        let attribute = attrs.attribute.map(|a| quote! { .attribute(#a) });

        members.push(quote! {
            .member(
                ::odata_linq::model::Member::new(
                    #name,
                    <#field_type as ::odata_linq::model::ODataType>::type_ref(),
                )
                #data_member
                #element
                #attribute
            )
        });
        accessors.push(quote! {
            #name => ::std::option::Option::Some(
                ::odata_linq::model::ODataType::to_value(&self.#field_ident)
            )
        });
    }

    quote! {
        impl ::odata_linq::model::Entity for #struct_name {
            fn descriptor() -> &'static ::odata_linq::model::EntityType {
                static DESCRIPTOR: ::std::sync::LazyLock<::odata_linq::model::EntityType> =
                    ::std::sync::LazyLock::new(|| {
                        ::odata_linq::model::EntityType::structure(#entity_name)
                            #(#members)*
                    });
                &DESCRIPTOR
            }
        }

        impl ::odata_linq::model::Record for #struct_name {
            fn entity_type(&self) -> &'static ::odata_linq::model::EntityType {
                <Self as ::odata_linq::model::Entity>::descriptor()
            }

            fn field(
                &self,
                member: &::odata_linq::model::MemberRef,
            ) -> ::std::option::Option<::odata_linq::model::Value<'_>> {
                match member.name.as_str() {
                    #(#accessors,)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::odata_linq::model::ODataType for #struct_name {
            fn type_ref() -> ::odata_linq::model::TypeRef {
                ::odata_linq::model::entity_type_ref::<Self>()
            }

            fn to_value(&self) -> ::odata_linq::model::Value<'_> {
                ::odata_linq::model::Value::Record(self)
            }
        }
    }
}

fn entity_name(attrs: &[Attribute]) -> Option<String> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("odata")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("entity") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `entity = \"...\"`"))
            }
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{err}");
        }
    }
    name
}

fn member_attrs(attrs: &[Attribute]) -> MemberAttrs {
    let mut parsed = MemberAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("odata")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                parsed.skip = true;
                return Ok(());
            }
            let slot = if meta.path.is_ident("member") {
                &mut parsed.member
            } else if meta.path.is_ident("data_member") {
                &mut parsed.data_member
            } else if meta.path.is_ident("element") {
                &mut parsed.element
            } else if meta.path.is_ident("attribute") {
                &mut parsed.attribute
            } else {
                return Err(meta.error(
                    "expected one of `member`, `data_member`, `element`, `attribute`, `skip`",
                ));
            };
            let value: LitStr = meta.value()?.parse()?;
            *slot = Some(value.value());
            Ok(())
        });
        if let Err(err) = result {
            abort!(err.span(), "{err}");
        }
    }
    parsed
}
