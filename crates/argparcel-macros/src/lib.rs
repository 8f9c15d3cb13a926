use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, Lit, LitStr, Result, Token,
    UnOp, ext::IdentExt, parenthesized, parse_macro_input, punctuated::Punctuated,
    spanned::Spanned,
};

/// Derive `argparcel::Record` for a struct with named fields.
///
/// Every field becomes a `--<name>` option whose shape follows the field's
/// `FieldType`. Field attributes:
///
/// - `#[parcel(default)]` / `#[parcel(default = expr)]`: make the field optional;
/// - `#[parcel(help = "...")]`: help text (otherwise the doc comment is used);
/// - `#[parcel(choices(1, 2, 3))]` or `#[parcel(choices("a", "b"))]`: restrict
///   the field's scalar to a fixed set of literals.
///
/// On the struct, `#[parcel(name = "...")]` sets the command name and the doc
/// comment becomes the command description.
///
/// ```ignore
/// #[derive(argparcel::Record)]
/// struct Moo {
///     #[parcel(choices(1, 2, 3))]
///     a: i64,
///     /// specify a path
///     #[parcel(default)]
///     c: Option<std::path::PathBuf>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(parcel))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive `argparcel::FieldType` for a fieldless enum, presented as a choice of member names.
///
/// Member names are the kebab-case variant names unless renamed with
/// `#[parcel(rename = "...")]`.
#[proc_macro_derive(Choice, attributes(parcel))]
pub fn derive_choice(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_choice(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct RecordAttrs {
    name: Option<LitStr>,
}

enum DefaultAttr {
    Trait,
    Expr(Expr),
}

enum ChoiceLit {
    Int(i128),
    Str(String),
}

#[derive(Default)]
struct FieldAttrs {
    default: Option<DefaultAttr>,
    help: Option<LitStr>,
    choices: Option<(Span, Vec<ChoiceLit>)>,
}

fn parcel_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("parcel"))
}

fn parse_record_attrs(attrs: &[Attribute]) -> Result<RecordAttrs> {
    let mut out = RecordAttrs::default();
    for attr in parcel_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                out.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported parcel attribute; expected `name`"))
            }
        })?;
    }
    Ok(out)
}

fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in parcel_attrs(attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                out.default = Some(if meta.input.peek(Token![=]) {
                    DefaultAttr::Expr(meta.value()?.parse()?)
                } else {
                    DefaultAttr::Trait
                });
                Ok(())
            } else if meta.path.is_ident("help") {
                out.help = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("choices") {
                let content;
                parenthesized!(content in meta.input);
                let exprs = Punctuated::<Expr, Token![,]>::parse_terminated(&content)?;
                let choices = exprs.iter().map(choice_literal).collect::<Result<Vec<_>>>()?;
                out.choices = Some((meta.path.span(), choices));
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported parcel attribute; expected `default`, `help` or `choices`",
                ))
            }
        })?;
    }
    Ok(out)
}

fn choice_literal(expr: &Expr) -> Result<ChoiceLit> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(lit), ..
        }) => Ok(ChoiceLit::Int(lit.base10_parse()?)),
        Expr::Lit(ExprLit {
            lit: Lit::Str(lit), ..
        }) => Ok(ChoiceLit::Str(lit.value())),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr: inner,
            ..
        }) => match choice_literal(inner)? {
            ChoiceLit::Int(v) => Ok(ChoiceLit::Int(-v)),
            ChoiceLit::Str(_) => Err(syn::Error::new(expr.span(), "cannot negate a string choice")),
        },
        other => Err(syn::Error::new(
            other.span(),
            "choices must be integer or string literals",
        )),
    }
}

/// Collect `///` lines, dropping the single leading space rustdoc keeps.
fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(&line).trim_end().to_string())
        .collect();

    let text = lines.join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `GreatAuk` -> `great-auk`.
fn kebab_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;
    for ch in ident.chars() {
        if ch == '_' {
            out.push('-');
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

fn expand_record(input: DeriveInput) -> Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Record can only be derived for structs with named fields",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(
            data.fields.span(),
            "Record can only be derived for structs with named fields",
        ));
    };

    let record_attrs = parse_record_attrs(&input.attrs)?;
    let record_name = record_attrs.name.unwrap_or_else(|| {
        LitStr::new(&kebab_case(&input.ident.unraw().to_string()), input.ident.span())
    });
    let about = doc_comment(&input.attrs).map(|text| {
        let text = LitStr::new(&text, Span::call_site());
        quote! { .about(#text) }
    });

    let mut decls = Vec::new();
    let mut inits = Vec::new();
    for field in &named.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let ty = &field.ty;
        let name = LitStr::new(&ident.unraw().to_string(), ident.span());
        let attrs = parse_field_attrs(&field.attrs)?;

        let restrict = match attrs.choices {
            Some((span, choices)) => Some(restrict_tokens(span, &choices)?),
            None => None,
        };
        let default = attrs.default.map(|default| {
            let value = match default {
                DefaultAttr::Trait => quote! { <#ty as ::core::default::Default>::default() },
                DefaultAttr::Expr(expr) => quote! { ::core::convert::Into::<#ty>::into(#expr) },
            };
            quote! { .default_value(<#ty as ::argparcel::FieldType>::into_value(#value)) }
        });
        let help = attrs
            .help
            .map(|lit| lit.value())
            .or_else(|| doc_comment(&field.attrs))
            .map(|text| {
                let text = LitStr::new(&text, Span::call_site());
                quote! { .help(#text) }
            });

        let type_expr = quote! { <#ty as ::argparcel::FieldType>::type_expr() #restrict };
        decls.push(quote! {
            .field(
                ::argparcel::FieldDecl::new(#name, #type_expr)
                    #default
                    #help
            )
        });
        inits.push(quote! {
            #ident: values.take::<#ty>(#name)?
        });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::argparcel::Record for #ident #ty_generics #where_clause {
            fn declaration() -> ::argparcel::RecordDecl {
                ::argparcel::RecordDecl::new(#record_name)
                    #about
                    #(#decls)*
            }

            #[allow(unused_mut, unused_variables)]
            fn construct(
                mut values: ::argparcel::FieldValues,
            ) -> ::core::result::Result<Self, ::argparcel::ConstructError> {
                ::core::result::Result::Ok(Self {
                    #(#inits,)*
                })
            }
        }
    })
}

fn restrict_tokens(span: Span, choices: &[ChoiceLit]) -> Result<proc_macro2::TokenStream> {
    if choices.is_empty() {
        return Err(syn::Error::new(span, "choices must not be empty"));
    }
    let ints = choices
        .iter()
        .filter(|c| matches!(c, ChoiceLit::Int(_)))
        .count();
    if ints != 0 && ints != choices.len() {
        return Err(syn::Error::new(
            span,
            "choices must be all integers or all strings",
        ));
    }

    let literals = choices.iter().map(|choice| match choice {
        ChoiceLit::Int(v) => {
            let v = proc_macro2::Literal::i128_unsuffixed(*v);
            quote! { ::argparcel::Literal::Int(#v) }
        }
        ChoiceLit::Str(s) => quote! { ::argparcel::Literal::Str(::std::string::String::from(#s)) },
    });
    Ok(quote! { .restrict_to(::std::vec![#(#literals),*]) })
}

fn expand_choice(input: DeriveInput) -> Result<proc_macro2::TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Choice can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            input.ident.span(),
            "Choice needs at least one variant",
        ));
    }

    let mut variants = Vec::new();
    let mut members = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.fields.span(),
                "Choice variants must not carry data",
            ));
        }

        let mut rename: Option<LitStr> = None;
        for attr in parcel_attrs(&variant.attrs) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    rename = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported parcel attribute; expected `rename`"))
                }
            })?;
        }
        let member = rename.map(|lit| lit.value()).unwrap_or_else(|| {
            kebab_case(&variant.ident.unraw().to_string())
        });
        if members.contains(&member) {
            return Err(syn::Error::new(
                variant.ident.span(),
                format!("duplicate member name '{member}'"),
            ));
        }

        variants.push(&variant.ident);
        members.push(member);
    }

    let ident = &input.ident;
    let enum_name = LitStr::new(&ident.unraw().to_string(), ident.span());
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::argparcel::FieldType for #ident #ty_generics #where_clause {
            fn type_expr() -> ::argparcel::TypeExpr {
                ::argparcel::TypeExpr::enumeration(::argparcel::EnumDecl::new(
                    #enum_name,
                    [#(#members),*],
                ))
            }

            fn from_value(
                value: ::argparcel::Value,
            ) -> ::core::result::Result<Self, ::argparcel::ValueError> {
                match value {
                    ::argparcel::Value::Member(member) => match member.as_str() {
                        #(#members => ::core::result::Result::Ok(Self::#variants),)*
                        _ => ::core::result::Result::Err(::argparcel::ValueError::UnknownMember {
                            member,
                            target: #enum_name,
                        }),
                    },
                    other => ::core::result::Result::Err(::argparcel::ValueError::Mismatch {
                        expected: "enum member",
                        found: ::std::string::ToString::to_string(other.kind()),
                    }),
                }
            }

            fn into_value(self) -> ::argparcel::Value {
                match self {
                    #(Self::#variants => ::argparcel::Value::Member(
                        ::std::string::String::from(#members),
                    ),)*
                }
            }
        }
    })
}
