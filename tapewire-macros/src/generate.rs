//! Code generation for the `#[tapewire::event_interface]` macro and the
//! `Marshallable` derive.
//!
//! This module generates:
//! - Writer structs translating typed calls into framed events
//! - Chain guards keeping fluent call sequences in one document
//! - Reader registration functions routing parsed events to a receiver
//! - `Marshallable`/`ToWire`/`FromWire` implementations for structs
//!
//! Generated code refers to the runtime exclusively through
//! `::tapewire::__generated` re-exports and fully-qualified trait calls,
//! so it expands cleanly regardless of what the call site has in scope.

use crate::parse::{
    snake_case, FieldKind, InterfaceDef, MethodDef, ParamDef, PassMode, ReturnKind, StructDef,
};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::Path;

fn sink_bound() -> TokenStream {
    quote!(::tapewire::__generated::WireSink)
}

/// `&name` or `name`, depending on how the parameter erases to
/// `&dyn ToWire`.
fn arg_expr(param: &ParamDef) -> TokenStream {
    let name = &param.name;
    match param.pass {
        PassMode::Owned | PassMode::StrRef => quote!(&#name),
        PassMode::Reference => quote!(#name),
    }
}

/// The last argument handed to the update interceptor.
fn last_arg_expr(method: &MethodDef) -> TokenStream {
    match method.params.last() {
        Some(param) => arg_expr(param),
        None => quote!(&()),
    }
}

fn id_tokens(method: &MethodDef) -> TokenStream {
    match method.id {
        Some(id) => quote!(::core::option::Option::Some(#id)),
        None => quote!(::core::option::Option::None),
    }
}

fn param_list(method: &MethodDef) -> Vec<TokenStream> {
    method
        .params
        .iter()
        .map(|param| {
            let name = &param.name;
            let ty = &param.ty;
            quote!(#name: #ty)
        })
        .collect()
}

/// Replaces the last segment of `path` with `<segment>Chain`.
fn chain_path(path: &Path) -> Path {
    let mut chained = path.clone();
    if let Some(segment) = chained.segments.last_mut() {
        segment.ident = format_ident!("{}Chain", segment.ident);
    }
    chained
}

/// Generates the `<Trait>Writer<S>` struct.
pub fn generate_writer(interface: &InterfaceDef) -> TokenStream {
    let trait_name = &interface.name;
    let writer_name = format_ident!("{}Writer", trait_name);
    let chain_name = format_ident!("{}Chain", trait_name);
    let vis = &interface.vis;
    let sink = sink_bound();

    let method_entries: Vec<TokenStream> = interface
        .methods
        .iter()
        .filter(|method| !matches!(method.ret, ReturnKind::DocumentContext))
        .map(|method| {
            let name = method.name.to_string();
            let id = id_tokens(method);
            quote!((#name, #id))
        })
        .collect();

    let mut methods = Vec::new();
    let mut passthroughs = Vec::new();
    for method in &interface.methods {
        let name = &method.name;
        let name_str = name.to_string();
        let params = param_list(method);
        let args: Vec<TokenStream> = method.params.iter().map(arg_expr).collect();
        let last = last_arg_expr(method);
        let id = id_tokens(method);

        match &method.ret {
            ReturnKind::Void => methods.push(quote! {
                #[doc = concat!("Writes one `", #name_str, "` event as its own document.")]
                pub fn #name(&mut self, #(#params),*) -> ::tapewire::WireResult<()> {
                    if !self.core.intercept(#name_str, #last) {
                        return ::core::result::Result::Ok(());
                    }
                    self.core.write_event(#name_str, #id, &[#(#args),*], false)
                }
            }),
            ReturnKind::ChainedSelf => methods.push(quote! {
                #[doc = concat!("Writes a `", #name_str, "` event and keeps the document open for chaining.")]
                pub fn #name(&mut self, #(#params),*) -> ::tapewire::WireResult<#chain_name<'_, S>> {
                    if self.core.intercept(#name_str, #last) {
                        self.core.write_event(#name_str, #id, &[#(#args),*], true)?;
                    }
                    ::core::result::Result::Ok(#chain_name::new(&mut self.core))
                }
            }),
            ReturnKind::SubInterface(sub) => {
                let sub_chain = chain_path(sub);
                methods.push(quote! {
                    #[doc = concat!("Writes a `", #name_str, "` event and chains into the sub-interface writer.")]
                    pub fn #name(&mut self, #(#params),*) -> ::tapewire::WireResult<#sub_chain<'_, S>> {
                        if self.core.intercept(#name_str, #last) {
                            self.core.write_event(#name_str, #id, &[#(#args),*], true)?;
                        }
                        ::core::result::Result::Ok(#sub_chain::new(&mut self.core))
                    }
                });
            }
            ReturnKind::Value(ty) => methods.push(quote! {
                #[doc = concat!("Writes one `", #name_str, "` event; events carry no response, so the declared default returns.")]
                pub fn #name(&mut self, #(#params),*) -> ::tapewire::WireResult<#ty> {
                    if !self.core.intercept(#name_str, #last) {
                        return ::core::result::Result::Ok(::core::default::Default::default());
                    }
                    self.core.write_event(#name_str, #id, &[#(#args),*], false)?;
                    ::core::result::Result::Ok(::core::default::Default::default())
                }
            }),
            ReturnKind::DocumentContext => passthroughs.push(quote! {
                #[doc = "Opens a writing document for the caller to fill and close."]
                pub fn #name(&mut self) -> ::tapewire::WireResult<::tapewire::__generated::WritingDocument<'_>> {
                    self.core.acquire_document()
                }
            }),
        }
    }

    let passthrough_impl = if passthroughs.is_empty() {
        quote!()
    } else {
        quote! {
            impl<W: ::tapewire::__generated::Wire> #writer_name<::tapewire::__generated::WireHolder<W>> {
                #(#passthroughs)*
            }
        }
    };

    quote! {
        #[doc = concat!("Method writer for [`", stringify!(#trait_name), "`]: each call becomes an event record on the wire.")]
        #vis struct #writer_name<S: #sink> {
            core: ::tapewire::__generated::MethodWriterCore<S>,
        }

        impl<S: #sink> #writer_name<S> {
            /// Method descriptors of this interface: name and optional id.
            pub const METHODS: &'static [(&'static str, ::core::option::Option<i32>)] =
                &[#(#method_entries),*];

            /// Builds the writer, registering this interface's method
            /// descriptors.
            ///
            /// Fails when an event id collides with one already declared
            /// on the shared core.
            pub fn new(
                builder: ::tapewire::__generated::MethodWriterBuilder<S>,
            ) -> ::tapewire::WireResult<Self> {
                let mut core = builder.build();
                core.declare_methods(Self::METHODS)?;
                ::core::result::Result::Ok(Self { core })
            }

            /// The runtime core, for configuration probes and teardown.
            pub fn core_mut(&mut self) -> &mut ::tapewire::__generated::MethodWriterCore<S> {
                &mut self.core
            }

            #(#methods)*
        }

        impl<W: ::tapewire::__generated::Wire> #writer_name<::tapewire::__generated::WireHolder<W>> {
            /// Builds a writer that owns `wire` outright.
            pub fn wrap(wire: W) -> ::tapewire::WireResult<Self> {
                Self::new(::tapewire::__generated::MethodWriterBuilder::new(
                    ::tapewire::__generated::WireHolder::new(wire),
                ))
            }
        }

        #passthrough_impl
    }
}

/// Generates the `<Trait>Chain` guard.
///
/// A chain holds the shared document open; terminal calls (and the
/// guard's drop at the end of the outermost expression) commit it.
pub fn generate_chain(interface: &InterfaceDef) -> TokenStream {
    let trait_name = &interface.name;
    let chain_name = format_ident!("{}Chain", trait_name);
    let vis = &interface.vis;
    let sink = sink_bound();

    let mut methods = Vec::new();
    for method in &interface.methods {
        let name = &method.name;
        let name_str = name.to_string();
        let params = param_list(method);
        let args: Vec<TokenStream> = method.params.iter().map(arg_expr).collect();
        let last = last_arg_expr(method);
        let id = id_tokens(method);

        match &method.ret {
            ReturnKind::Void => methods.push(quote! {
                #[doc = concat!("Writes a `", #name_str, "` event into the chained document and commits it.")]
                pub fn #name(mut self, #(#params),*) -> ::tapewire::WireResult<()> {
                    let core = self.core.take().expect("chain already finished");
                    if core.intercept(#name_str, #last) {
                        core.write_event(#name_str, #id, &[#(#args),*], true)?;
                    }
                    core.flush()
                }
            }),
            ReturnKind::ChainedSelf => methods.push(quote! {
                #[doc = concat!("Writes a `", #name_str, "` event into the chained document.")]
                pub fn #name(mut self, #(#params),*) -> ::tapewire::WireResult<#chain_name<'a, S>> {
                    let core = self.core.take().expect("chain already finished");
                    if core.intercept(#name_str, #last) {
                        core.write_event(#name_str, #id, &[#(#args),*], true)?;
                    }
                    ::core::result::Result::Ok(#chain_name::new(core))
                }
            }),
            ReturnKind::SubInterface(sub) => {
                let sub_chain = chain_path(sub);
                methods.push(quote! {
                    #[doc = concat!("Writes a `", #name_str, "` event and continues the chain in the sub-interface.")]
                    pub fn #name(mut self, #(#params),*) -> ::tapewire::WireResult<#sub_chain<'a, S>> {
                        let core = self.core.take().expect("chain already finished");
                        if core.intercept(#name_str, #last) {
                            core.write_event(#name_str, #id, &[#(#args),*], true)?;
                        }
                        ::core::result::Result::Ok(#sub_chain::new(core))
                    }
                });
            }
            ReturnKind::Value(ty) => methods.push(quote! {
                #[doc = concat!("Writes a `", #name_str, "` event, commits the chained document, and returns the declared default.")]
                pub fn #name(mut self, #(#params),*) -> ::tapewire::WireResult<#ty> {
                    let core = self.core.take().expect("chain already finished");
                    if core.intercept(#name_str, #last) {
                        core.write_event(#name_str, #id, &[#(#args),*], true)?;
                    }
                    core.flush()?;
                    ::core::result::Result::Ok(::core::default::Default::default())
                }
            }),
            ReturnKind::DocumentContext => {}
        }
    }

    quote! {
        #[doc = concat!("Open chained document over [`", stringify!(#trait_name), "`] events; commits when the outermost scope drops.")]
        #vis struct #chain_name<'a, S: #sink> {
            core: ::core::option::Option<&'a mut ::tapewire::__generated::MethodWriterCore<S>>,
        }

        impl<'a, S: #sink> #chain_name<'a, S> {
            #[doc(hidden)]
            pub fn new(core: &'a mut ::tapewire::__generated::MethodWriterCore<S>) -> Self {
                Self {
                    core: ::core::option::Option::Some(core),
                }
            }

            #(#methods)*
        }

        impl<S: #sink> ::core::ops::Drop for #chain_name<'_, S> {
            fn drop(&mut self) {
                if let ::core::option::Option::Some(core) = self.core.take() {
                    // Errors cannot surface from drop; terminal calls
                    // are the checked commit path.
                    let _ = core.flush();
                }
            }
        }
    }
}

/// Generates the `register_<trait>` reader hook.
pub fn generate_reader(interface: &InterfaceDef) -> TokenStream {
    let trait_name = &interface.name;
    let fn_name = format_ident!("register_{}", snake_case(&trait_name.to_string()));
    let vis = &interface.vis;

    let mut registrations = Vec::new();
    for method in &interface.methods {
        if matches!(method.ret, ReturnKind::DocumentContext) {
            continue;
        }
        let name = &method.name;
        let name_str = name.to_string();

        let mut decode = Vec::new();
        let mut call_args = Vec::new();
        if method.params.is_empty() {
            decode.push(quote!(input.skip_value()?;));
        } else {
            if method.params.len() > 1 {
                decode.push(quote!(let _ = input.begin_sequence()?;));
            }
            for param in &method.params {
                let pname = &param.name;
                let (decoded_ty, call_arg) = decoded_param(param);
                decode.push(quote! {
                    let #pname: #decoded_ty =
                        ::tapewire::__generated::FromWire::from_wire(input)?;
                });
                call_args.push(call_arg);
            }
        }

        registrations.push(quote! {
            {
                let target = ::std::rc::Rc::clone(&target);
                parser.register(
                    #name_str,
                    ::std::boxed::Box::new(move |_name, input| {
                        #(#decode)*
                        target.borrow_mut().#name(#(#call_args),*);
                        ::core::result::Result::Ok(())
                    }),
                );
            }
        });
        if let Some(id) = method.id {
            registrations.push(quote! {
                parser.register_id(#id as i64, #name_str);
            });
        }
    }

    quote! {
        #[doc = concat!("Routes parsed events to an [`", stringify!(#trait_name), "`] receiver.")]
        #vis fn #fn_name<T>(
            parser: &mut ::tapewire::__generated::WireParser,
            target: ::std::rc::Rc<::std::cell::RefCell<T>>,
        ) where
            T: #trait_name + 'static,
        {
            #(#registrations)*
        }
    }
}

/// The type a parameter decodes to and the expression passed on.
fn decoded_param(param: &ParamDef) -> (TokenStream, TokenStream) {
    let name = &param.name;
    match param.pass {
        PassMode::Owned => {
            let ty = &param.ty;
            (quote!(#ty), quote!(#name))
        }
        PassMode::StrRef => (quote!(::std::string::String), quote!(&#name)),
        PassMode::Reference => {
            let inner = match &param.ty {
                syn::Type::Reference(reference) => reference.elem.as_ref(),
                other => other,
            };
            (quote!(#inner), quote!(&#name))
        }
    }
}

/// Generates the `Marshallable` + `ToWire` + `FromWire` impls for a
/// struct.
pub fn generate_marshallable(def: &StructDef) -> TokenStream {
    let name = &def.name;
    let type_name = &def.type_name;
    let config = def.config;

    let mut writes = Vec::new();
    let mut read_arms = Vec::new();
    for field in &def.fields {
        let fname = &field.name;
        let fname_str = fname.to_string();
        match &field.kind {
            FieldKind::Plain => {
                writes.push(quote! {
                    ::tapewire::__generated::ToWire::to_wire(
                        &self.#fname,
                        ::tapewire::__generated::MappingOut::field(out, #fname_str)?,
                        false,
                    )?;
                });
                read_arms.push(quote! {
                    #fname_str => {
                        self.#fname = ::tapewire::__generated::FromWire::from_wire(input)?;
                    }
                });
            }
            FieldKind::NanoTime => {
                writes.push(quote! {
                    ::tapewire::__generated::ValueOut::write_timestamp_nanos(
                        ::tapewire::__generated::MappingOut::field(out, #fname_str)?,
                        self.#fname,
                    )?;
                });
                read_arms.push(quote! {
                    #fname_str => {
                        self.#fname = input.read_timestamp_nanos()?;
                    }
                });
            }
            FieldKind::Converted(converter) => {
                writes.push(quote! {
                    ::tapewire::__generated::ValueOut::write_converted(
                        ::tapewire::__generated::MappingOut::field(out, #fname_str)?,
                        self.#fname,
                        &#converter,
                    )?;
                });
                read_arms.push(quote! {
                    #fname_str => {
                        self.#fname = input.read_converted(&#converter)?;
                    }
                });
            }
            FieldKind::Skip => {}
        }
    }

    quote! {
        impl ::tapewire::__generated::Marshallable for #name {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn write_fields(
                &self,
                out: &mut dyn ::tapewire::__generated::MappingOut,
            ) -> ::tapewire::WireResult<()> {
                #(#writes)*
                ::core::result::Result::Ok(())
            }

            fn read_field(
                &mut self,
                name: &str,
                input: &mut ::tapewire::__generated::ValueIn,
            ) -> ::tapewire::WireResult<bool> {
                match name {
                    #(#read_arms)*
                    _ => return ::core::result::Result::Ok(false),
                }
                ::core::result::Result::Ok(true)
            }

            fn reset_to_default(&mut self) {
                *self = <Self as ::core::default::Default>::default();
            }

            fn reset_on_read(&self) -> bool {
                #config
            }
        }

        impl ::tapewire::__generated::ToWire for #name {
            fn to_wire(
                &self,
                out: &mut dyn ::tapewire::__generated::ValueOut,
                verbose: bool,
            ) -> ::tapewire::WireResult<()> {
                ::tapewire::__generated::ValueOut::write_object(out, self, verbose)
            }
        }

        impl ::tapewire::__generated::FromWire for #name {
            fn from_wire(
                input: &mut ::tapewire::__generated::ValueIn,
            ) -> ::tapewire::WireResult<Self> {
                let mut value = <Self as ::core::default::Default>::default();
                input.read_marshallable(&mut value)?;
                ::core::result::Result::Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_interface;
    use syn::parse_quote;

    #[test]
    fn test_writer_contains_method_table() {
        let item: syn::ItemTrait = parse_quote! {
            pub trait Says {
                #[event(id = 7)]
                fn say(&mut self, text: &str);
            }
        };
        let interface = parse_interface(&item).unwrap();
        let code = generate_writer(&interface).to_string();
        assert!(code.contains("SaysWriter"));
        assert!(code.contains("METHODS"));
        assert!(code.contains("7i32"));
    }

    #[test]
    fn test_reader_snake_cases_trait_name() {
        let item: syn::ItemTrait = parse_quote! {
            pub trait TradeEvents {
                fn price(&mut self, value: i64);
            }
        };
        let interface = parse_interface(&item).unwrap();
        let code = generate_reader(&interface).to_string();
        assert!(code.contains("register_trade_events"));
    }

    #[test]
    fn test_chain_path_rewrites_last_segment() {
        let path: Path = parse_quote!(events::OutRouter);
        let chained = chain_path(&path);
        assert_eq!(
            quote!(#chained).to_string().replace(' ', ""),
            "events::OutRouterChain"
        );
    }
}
