use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Ident, LitStr, Type};

/// Derive macro for transform plugin config parameter declarations.
///
/// Generates two methods on the annotated struct:
///
/// - `config_params() -> Vec<ConfigParam>`: parameter declarations for FFI export.
/// - `from_config(&ConfigValues) -> Result<Self, TransformError>`: reads typed values.
///
/// The struct must implement `Default` (defaults are used for non-required params).
///
/// # Example
///
/// ```ignore
/// #[derive(ConfigParams, Default)]
/// pub struct MyConfig {
///     #[param(description = "Key of the raw image bytes")]
///     pub bytes_key: String,
///
///     #[param(required, description = "Target channel count")]
///     pub channels: u64,
/// }
/// ```
///
/// Supported field types: `bool`, `i64`, `u64`, `usize`, `f64`, `String`.
#[proc_macro_derive(ConfigParams, attributes(param))]
pub fn derive_config_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Parsed `#[param(...)]` attribute.
struct ParamAttr {
    description: String,
    required: bool,
}

/// How one supported Rust type maps onto the config API.
struct TypeMapping {
    param_type: TokenStream2,
    /// `ConfigValues` getter method.
    getter: TokenStream2,
    /// Wraps `__defaults.<field>` into a `ParamValue`.
    default_value: TokenStream2,
    /// Converts the getter's output into the field type.
    read: TokenStream2,
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "ConfigParams only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "ConfigParams only supports structs",
            ))
        }
    };

    let mut param_tokens = Vec::new();
    let mut read_tokens = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let key = ident.to_string();
        let attr = parse_param_attr(field, ident)?;
        let mapping = type_mapping(&field.ty, ident)?;

        let TypeMapping {
            param_type,
            getter,
            default_value,
            read,
        } = mapping;
        let description = attr.description;
        let required = attr.required;

        let default_tokens = if required {
            quote! { None }
        } else {
            quote! { Some(#default_value) }
        };

        param_tokens.push(quote! {
            batchcast_api::config::ConfigParam {
                name: #key.to_string(),
                param_type: #param_type,
                required: #required,
                default: #default_tokens,
                description: #description.to_string(),
            }
        });

        read_tokens.push(if required {
            quote! {
                let v = __config.#getter(#key).ok_or_else(|| {
                    batchcast_api::error::TransformError::config(
                        format!("missing required parameter '{}'", #key)
                    )
                })?;
                result.#ident = #read;
            }
        } else {
            quote! {
                if let Some(v) = __config.#getter(#key) {
                    result.#ident = #read;
                }
            }
        });
    }

    Ok(quote! {
        impl #name {
            pub fn config_params() -> Vec<batchcast_api::config::ConfigParam> {
                let __defaults = Self::default();
                vec![
                    #(#param_tokens),*
                ]
            }

            pub fn from_config(
                __config: &batchcast_api::config::ConfigValues,
            ) -> Result<Self, batchcast_api::error::TransformError> {
                let mut result = Self::default();
                #(#read_tokens)*
                Ok(result)
            }
        }
    })
}

fn parse_param_attr(field: &Field, ident: &Ident) -> Result<ParamAttr, syn::Error> {
    let mut description: Option<String> = None;
    let mut required = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("param") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("description") {
                let value: LitStr = meta.value()?.parse()?;
                description = Some(value.value());
            } else if meta.path.is_ident("required") {
                required = true;
            } else {
                return Err(meta.error("unknown param attribute (expected description, required)"));
            }
            Ok(())
        })?;
    }

    let description = description.ok_or_else(|| {
        syn::Error::new_spanned(ident, "missing #[param(description = \"...\")]")
    })?;
    Ok(ParamAttr {
        description,
        required,
    })
}

fn type_mapping(ty: &Type, ident: &Ident) -> Result<TypeMapping, syn::Error> {
    let ty_name = type_ident_name(ty)
        .ok_or_else(|| syn::Error::new_spanned(ty, "unsupported type for ConfigParams"))?;

    let mapping = match ty_name.as_str() {
        "bool" => TypeMapping {
            param_type: quote! { batchcast_api::config::ParamType::Bool },
            getter: quote! { get_bool },
            default_value: quote! { batchcast_api::config::ParamValue::Bool(__defaults.#ident) },
            read: quote! { v },
        },
        "i64" => TypeMapping {
            param_type: quote! { batchcast_api::config::ParamType::I64 },
            getter: quote! { get_i64 },
            default_value: quote! { batchcast_api::config::ParamValue::I64(__defaults.#ident) },
            read: quote! { v },
        },
        "u64" => TypeMapping {
            param_type: quote! { batchcast_api::config::ParamType::U64 },
            getter: quote! { get_u64 },
            default_value: quote! { batchcast_api::config::ParamValue::U64(__defaults.#ident) },
            read: quote! { v },
        },
        "usize" => TypeMapping {
            param_type: quote! { batchcast_api::config::ParamType::U64 },
            getter: quote! { get_u64 },
            default_value: quote! {
                batchcast_api::config::ParamValue::U64(__defaults.#ident as u64)
            },
            read: quote! { v as usize },
        },
        "f64" => TypeMapping {
            param_type: quote! { batchcast_api::config::ParamType::F64 },
            getter: quote! { get_f64 },
            default_value: quote! { batchcast_api::config::ParamValue::F64(__defaults.#ident) },
            read: quote! { v },
        },
        "String" => TypeMapping {
            param_type: quote! { batchcast_api::config::ParamType::Str },
            getter: quote! { get_str },
            default_value: quote! {
                batchcast_api::config::ParamValue::Str(__defaults.#ident.clone())
            },
            read: quote! { v.to_string() },
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ty,
                format!("unsupported type '{ty_name}' (expected bool, i64, u64, usize, f64, String)"),
            ))
        }
    };
    Ok(mapping)
}

/// Extract the last path segment ident name from a type (e.g. `u64`, `String`).
fn type_ident_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string()),
        _ => None,
    }
}
