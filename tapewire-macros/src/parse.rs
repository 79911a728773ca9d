//! Parsing logic for the `#[tapewire::event_interface]` macro and the
//! `Marshallable` derive.
//!
//! This module turns trait and struct definitions into the models that
//! code generation consumes, and rejects shapes the runtime cannot
//! express (non-`&mut self` receivers, generic methods, duplicate event
//! ids) with spanned compile errors.

use proc_macro2::Span;
use syn::{
    Data, DeriveInput, Error, Expr, Fields, FnArg, Ident, ItemTrait, Lit, Pat, Path, Result,
    ReturnType, TraitItem, Type, Visibility,
};

/// How the writer forwards one parameter as an erased argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Owned parameter: pass `&name`.
    Owned,
    /// `&T` reference: pass `name` (the reference itself coerces).
    Reference,
    /// `&str`: pass `&name`, decoded as `String` on the reader side.
    StrRef,
}

/// What a method returns, and therefore how its document is framed.
#[derive(Debug, Clone)]
pub enum ReturnKind {
    /// `()`: one document per call.
    Void,
    /// `&mut Self`: chains into the shared document.
    ChainedSelf,
    /// `#[event(chain = Y)]`: chains and hands back `Y`'s writer.
    SubInterface(Path),
    /// `DocumentContext`: passthrough, the caller owns the scope.
    DocumentContext,
    /// Any other type: the event is written, `Default` is returned.
    Value(Box<Type>),
}

/// Parsed event interface.
pub struct InterfaceDef {
    /// The trait with `#[event]` attributes stripped.
    pub trait_def: ItemTrait,
    /// Trait name.
    pub name: Ident,
    /// Trait visibility, mirrored onto the generated items.
    pub vis: Visibility,
    /// Event methods in declaration order.
    pub methods: Vec<MethodDef>,
}

/// Parsed event method.
pub struct MethodDef {
    /// Method name; also the default event key.
    pub name: Ident,
    /// Parameters excluding the receiver.
    pub params: Vec<ParamDef>,
    /// Return behavior.
    pub ret: ReturnKind,
    /// Numeric event id from `#[event(id = N)]`.
    pub id: Option<i32>,
}

/// Parsed parameter.
pub struct ParamDef {
    /// Parameter name.
    pub name: Ident,
    /// Parameter type as declared.
    pub ty: Type,
    /// Forwarding mode.
    pub pass: PassMode,
}

/// Parses the trait an `#[event_interface]` attribute decorates.
pub fn parse_interface(trait_def: &ItemTrait) -> Result<InterfaceDef> {
    if !trait_def.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &trait_def.generics,
            "event interfaces cannot be generic",
        ));
    }

    let mut cleaned = trait_def.clone();
    let mut methods = Vec::new();
    let mut seen_ids: Vec<(i32, String)> = Vec::new();

    for item in &mut cleaned.items {
        let TraitItem::Fn(method) = item else {
            return Err(Error::new_spanned(
                item,
                "event interfaces may only contain methods",
            ));
        };
        if method.default.is_some() {
            return Err(Error::new_spanned(
                &method.sig,
                "event interface methods cannot have default bodies",
            ));
        }
        if !method.sig.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &method.sig.generics,
                "event interface methods cannot be generic",
            ));
        }

        let (id, chain) = take_event_attributes(&mut method.attrs)?;
        let name = method.sig.ident.clone();

        let mut inputs = method.sig.inputs.iter();
        match inputs.next() {
            Some(FnArg::Receiver(receiver))
                if receiver.mutability.is_some() && receiver.reference.is_some() => {}
            _ => {
                return Err(Error::new(
                    method.sig.ident.span(),
                    "event interface methods take `&mut self`",
                ));
            }
        }

        let mut params = Vec::new();
        for input in inputs {
            let FnArg::Typed(typed) = input else {
                return Err(Error::new_spanned(input, "unexpected receiver"));
            };
            let Pat::Ident(pat) = typed.pat.as_ref() else {
                return Err(Error::new_spanned(
                    &typed.pat,
                    "event interface parameters must be plain identifiers",
                ));
            };
            params.push(ParamDef {
                name: pat.ident.clone(),
                ty: (*typed.ty).clone(),
                pass: pass_mode(&typed.ty),
            });
        }

        let ret = return_kind(&method.sig.output, chain)?;

        if let Some(id) = id {
            if let Some((_, existing)) = seen_ids.iter().find(|(other, _)| *other == id) {
                return Err(Error::new(
                    name.span(),
                    format!("methods `{}` and `{}` share event id {}", existing, name, id),
                ));
            }
            seen_ids.push((id, name.to_string()));
        }

        methods.push(MethodDef {
            name,
            params,
            ret,
            id,
        });
    }

    Ok(InterfaceDef {
        name: trait_def.ident.clone(),
        vis: trait_def.vis.clone(),
        trait_def: cleaned,
        methods,
    })
}

/// Extracts and removes `#[event(...)]` attributes from a method.
fn take_event_attributes(attrs: &mut Vec<syn::Attribute>) -> Result<(Option<i32>, Option<Path>)> {
    let mut id = None;
    let mut chain = None;
    let mut kept = Vec::new();
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("event") {
            kept.push(attr);
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Int(int) = value else {
                    return Err(meta.error("id must be an integer literal"));
                };
                id = Some(int.base10_parse::<i32>()?);
                Ok(())
            } else if meta.path.is_ident("chain") {
                let value: Path = meta.value()?.parse()?;
                chain = Some(value);
                Ok(())
            } else {
                Err(meta.error("unknown attribute; supported: id, chain"))
            }
        })?;
    }
    *attrs = kept;
    Ok((id, chain))
}

fn pass_mode(ty: &Type) -> PassMode {
    match ty {
        Type::Reference(reference) => {
            if let Type::Path(path) = reference.elem.as_ref() {
                if path.path.is_ident("str") {
                    return PassMode::StrRef;
                }
            }
            PassMode::Reference
        }
        _ => PassMode::Owned,
    }
}

fn return_kind(output: &ReturnType, chain: Option<Path>) -> Result<ReturnKind> {
    if let Some(chain) = chain {
        if !matches!(output, ReturnType::Default) {
            return Err(Error::new(
                Span::call_site(),
                "a #[event(chain = ...)] method must return ()",
            ));
        }
        return Ok(ReturnKind::SubInterface(chain));
    }
    match output {
        ReturnType::Default => Ok(ReturnKind::Void),
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Reference(reference) if reference.mutability.is_some() => {
                match reference.elem.as_ref() {
                    Type::Path(path) if path.path.is_ident("Self") => Ok(ReturnKind::ChainedSelf),
                    _ => Err(Error::new_spanned(
                        ty,
                        "only `&mut Self` references can be returned",
                    )),
                }
            }
            Type::Path(path)
                if path
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == "DocumentContext") =>
            {
                Ok(ReturnKind::DocumentContext)
            }
            _ => Ok(ReturnKind::Value(ty.clone())),
        },
    }
}

/// Field handling for the `Marshallable` derive.
pub enum FieldKind {
    /// Serialized through `ToWire`/`FromWire`.
    Plain,
    /// 64-bit nanosecond timestamp.
    NanoTime,
    /// 64-bit value through a `LongConverter` static.
    Converted(Expr),
    /// Not serialized.
    Skip,
}

/// Parsed derive field.
pub struct FieldDef {
    /// Field identifier (also the wire name).
    pub name: Ident,
    /// How the field crosses the wire.
    pub kind: FieldKind,
}

/// Parsed derive input.
pub struct StructDef {
    /// Struct name.
    pub name: Ident,
    /// Wire type name (`#[wire(alias = ...)]` or the ident).
    pub type_name: String,
    /// `#[wire(config)]`: reset before every read.
    pub config: bool,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

/// Parses the struct a `#[derive(Marshallable)]` decorates.
pub fn parse_struct(input: &DeriveInput) -> Result<StructDef> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            input,
            "Marshallable can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            input,
            "Marshallable requires named fields",
        ));
    };

    let mut type_name = input.ident.to_string();
    let mut config = false;
    for attr in &input.attrs {
        if !attr.path().is_ident("wire") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("alias") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(text) = value else {
                    return Err(meta.error("alias must be a string literal"));
                };
                type_name = text.value();
                Ok(())
            } else if meta.path.is_ident("config") {
                config = true;
                Ok(())
            } else {
                Err(meta.error("unknown attribute; supported: alias, config"))
            }
        })?;
    }

    let mut fields = Vec::new();
    for field in &named.named {
        let name = field.ident.clone().expect("named field");
        let mut kind = FieldKind::Plain;
        for attr in &field.attrs {
            if !attr.path().is_ident("wire") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("nano_time") {
                    kind = FieldKind::NanoTime;
                    Ok(())
                } else if meta.path.is_ident("long_conversion") {
                    let value: Expr = meta.value()?.parse()?;
                    kind = FieldKind::Converted(value);
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    kind = FieldKind::Skip;
                    Ok(())
                } else {
                    Err(meta.error(
                        "unknown attribute; supported: nano_time, long_conversion, skip",
                    ))
                }
            })?;
        }
        fields.push(FieldDef { name, kind });
    }

    Ok(StructDef {
        name: input.ident.clone(),
        type_name,
        config,
        fields,
    })
}

/// Converts `PascalCase` trait names to `snake_case` function names.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_parse_basic_interface() {
        let item: ItemTrait = parse_quote! {
            pub trait Says {
                #[event(id = 7)]
                fn say(&mut self, text: &str);
                fn stop(&mut self) -> &mut Self;
            }
        };
        let interface = parse_interface(&item).unwrap();
        assert_eq!(interface.methods.len(), 2);
        assert_eq!(interface.methods[0].id, Some(7));
        assert_eq!(interface.methods[0].params[0].pass, PassMode::StrRef);
        assert!(matches!(interface.methods[1].ret, ReturnKind::ChainedSelf));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let item: ItemTrait = parse_quote! {
            trait Bad {
                #[event(id = 1)]
                fn a(&mut self);
                #[event(id = 1)]
                fn b(&mut self);
            }
        };
        let err = match parse_interface(&item) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("share event id 1"));
    }

    #[test]
    fn test_receiver_must_be_mut_ref() {
        let item: ItemTrait = parse_quote! {
            trait Bad {
                fn a(&self);
            }
        };
        assert!(parse_interface(&item).is_err());
    }

    #[test]
    fn test_event_attributes_are_stripped() {
        let item: ItemTrait = parse_quote! {
            trait Says {
                #[event(id = 7)]
                fn say(&mut self, text: &str);
            }
        };
        let interface = parse_interface(&item).unwrap();
        let TraitItem::Fn(method) = &interface.trait_def.items[0] else {
            panic!("expected method");
        };
        assert!(method.attrs.is_empty());
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("TradeEvents"), "trade_events");
        assert_eq!(snake_case("Says"), "says");
        assert_eq!(snake_case("OutRouterV2"), "out_router_v2");
    }

    #[test]
    fn test_parse_struct_attributes() {
        let input: DeriveInput = parse_quote! {
            #[wire(alias = "dto.Boat", config)]
            struct Boat {
                engine: Engine,
                #[wire(nano_time)]
                launched: i64,
                #[wire(skip)]
                cached: usize,
            }
        };
        let def = parse_struct(&input).unwrap();
        assert_eq!(def.type_name, "dto.Boat");
        assert!(def.config);
        assert!(matches!(def.fields[1].kind, FieldKind::NanoTime));
        assert!(matches!(def.fields[2].kind, FieldKind::Skip));
    }
}
