use proc_macro::TokenStream;

use quote::quote;
use syn::{
    Attribute, Expr, ExprArray, ExprLit, ExprPath, Fields, Ident, ItemStruct, Lit, Meta, Token,
    parse::Parser, spanned::Spanned,
};

/// Implements `crate::backend::Variant` for a backend spec struct.
///
/// ```ignore
/// #[Variant(kind = S3, env = ["AWS_ACCESS_KEY_ID=access_key_id_secret_ref"])]
/// pub struct S3Spec { .. }
/// ```
///
/// `kind` names a `BackendKind` variant. Each `env` entry binds a constant in
/// `crate::env` to a `String` field of the struct; the generated `env_vars`
/// inserts them in the listed order, skipping empty fields. The struct must
/// provide an inherent `fn render(&self, globals: &GlobalConfig) -> String`.
#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn Variant(attr: TokenStream, item: TokenStream) -> TokenStream {
    match variant_impl(attr, item) {
        Ok(ts) => ts,
        Err(e) => e.to_compile_error().into(),
    }
}

fn lit_str(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        _ => Err(syn::Error::new(expr.span(), "expected string literal")),
    }
}

fn expr_array_strings(expr: &Expr) -> syn::Result<Vec<String>> {
    let Expr::Array(ExprArray { elems, .. }) = expr else {
        return Err(syn::Error::new(expr.span(), "expected array literal"));
    };
    elems.iter().map(lit_str).collect()
}

fn expr_ident(expr: &Expr) -> syn::Result<Ident> {
    match expr {
        Expr::Path(ExprPath { path, .. }) => path
            .get_ident()
            .cloned()
            .ok_or_else(|| syn::Error::new(expr.span(), "expected a bare BackendKind variant")),
        _ => Err(syn::Error::new(expr.span(), "expected identifier")),
    }
}

fn strip_variant_attr(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs
        .iter()
        .filter(|a| !a.path().is_ident("Variant"))
        .cloned()
        .collect()
}

struct EnvBinding {
    key: Ident,
    field: Ident,
}

fn parse_binding(raw: &str, span: proc_macro2::Span) -> syn::Result<EnvBinding> {
    let (lhs, rhs) = raw
        .split_once('=')
        .ok_or_else(|| syn::Error::new(span, "env entry must be 'CONST=field'"))?;
    let key = syn::parse_str::<Ident>(lhs.trim())
        .map_err(|e| syn::Error::new(span, format!("invalid env const '{}': {e}", lhs.trim())))?;
    let field = syn::parse_str::<Ident>(rhs.trim())
        .map_err(|e| syn::Error::new(span, format!("invalid field name '{}': {e}", rhs.trim())))?;
    Ok(EnvBinding { key, field })
}

fn variant_impl(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let mut st: ItemStruct = syn::parse(item)?;
    st.attrs = strip_variant_attr(&st.attrs);
    let struct_ident = st.ident.clone();

    let Fields::Named(named) = &st.fields else {
        return Err(syn::Error::new(
            struct_ident.span(),
            "Variant: expected a struct with named fields",
        ));
    };
    let field_names: Vec<Ident> = named.named.iter().filter_map(|f| f.ident.clone()).collect();

    let parser = syn::punctuated::Punctuated::<Meta, Token![,]>::parse_terminated;
    let metas = parser.parse(attr)?;

    let mut kind: Option<Ident> = None;
    let mut bindings: Vec<EnvBinding> = Vec::new();

    for m in metas {
        let Meta::NameValue(nv) = m else {
            return Err(syn::Error::new(m.span(), "expected key = value"));
        };
        let Some(key) = nv.path.get_ident().map(|i| i.to_string()) else {
            return Err(syn::Error::new(nv.path.span(), "expected ident key"));
        };
        let v = &nv.value;
        match key.as_str() {
            "kind" => kind = Some(expr_ident(v)?),
            "env" => {
                for raw in expr_array_strings(v)? {
                    let binding = parse_binding(&raw, v.span())?;
                    if !field_names.contains(&binding.field) {
                        return Err(syn::Error::new(
                            v.span(),
                            format!(
                                "Variant: '{}' has no field '{}'",
                                struct_ident, binding.field
                            ),
                        ));
                    }
                    bindings.push(binding);
                }
            }
            other => {
                return Err(syn::Error::new(
                    nv.path.span(),
                    format!("unknown Variant attribute key '{other}'"),
                ));
            }
        }
    }

    let kind = kind.ok_or_else(|| syn::Error::new(struct_ident.span(), "Variant: missing kind"))?;

    let keys: Vec<&Ident> = bindings.iter().map(|b| &b.key).collect();
    let fields: Vec<&Ident> = bindings.iter().map(|b| &b.field).collect();

    let expanded = quote! {
        #st

        impl crate::backend::Variant for #struct_ident {
            const KIND: crate::backend::BackendKind = crate::backend::BackendKind::#kind;
            const ENV_KEYS: &'static [&'static str] = &[#(crate::env::#keys),*];

            #[allow(unused_mut)]
            fn env_vars(&self, mut vars: crate::env::EnvMap) -> crate::env::EnvMap {
                #(crate::env::add_env_var_from_secret(&mut vars, crate::env::#keys, &self.#fields);)*
                vars
            }

            fn repository(&self, globals: &crate::globals::GlobalConfig) -> String {
                Self::render(self, globals)
            }
        }
    };

    Ok(expanded.into())
}
