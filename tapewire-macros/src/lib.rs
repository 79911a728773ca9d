//! Procedural macros for the tapewire codec framework.
//!
//! This crate provides the `#[tapewire::event_interface]` attribute
//! macro that generates typed method-writers and method-readers from
//! trait definitions, and `#[derive(Marshallable)]` which maps a struct
//! onto the wire as an ordered field mapping.
//!
//! # Example
//!
//! ```ignore
//! use tapewire::event_interface;
//!
//! #[event_interface]
//! trait TradeEvents {
//!     #[event(id = 42)]
//!     fn price(&mut self, p: Price);
//!     fn say(&mut self, text: &str) -> &mut Self;
//! }
//! ```
//!
//! This will generate:
//! - A `TradeEventsWriter<S>` struct emitting each call as a framed event
//! - A `TradeEventsChain<'_, S>` guard keeping chained calls in one document
//! - A `register_trade_events` function routing parsed events to any
//!   `impl TradeEvents`
//!
//! Method attributes:
//!
//! - `#[event(id = N)]`: numeric method id, preferred over the name on
//!   binary wires when the writer enables method ids.
//! - `#[event(chain = OtherTrait)]`: the call opens (or continues) a
//!   chained document and returns the writer for `OtherTrait`, which
//!   must itself be an `#[event_interface]`.
//!
//! Return types map onto writer behavior: `()` frames one document per
//! call, `&mut Self` chains into the shared document, `DocumentContext`
//! returns the open document scope without writing an event, and any
//! other type returns its `Default` value after the event is written.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, ItemTrait};

mod generate;
mod parse;

/// The `#[tapewire::event_interface]` attribute macro.
///
/// Transforms a trait definition into a complete event interface with a
/// typed writer, a chain guard for fluent call sequences, and a reader
/// registration hook. The trait itself is kept (with the `#[event]`
/// attributes stripped) so components implement it directly.
#[proc_macro_attribute]
pub fn event_interface(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);

    let interface = match parse::parse_interface(&input) {
        Ok(interface) => interface,
        Err(err) => return err.to_compile_error().into(),
    };

    let trait_def = &interface.trait_def;
    let writer = generate::generate_writer(&interface);
    let chain = generate::generate_chain(&interface);
    let reader = generate::generate_reader(&interface);

    let expanded = quote! {
        #trait_def

        #writer

        #chain

        #reader
    };

    TokenStream::from(expanded)
}

/// Derives `tapewire::marshal::Marshallable` (plus the `ToWire` and
/// `FromWire` argument codecs) for a struct with named fields.
///
/// The struct must also implement `Default`, which supplies the
/// post-construction state `reset_to_default` restores.
///
/// Container attributes: `#[wire(alias = "Name")]` overrides the type
/// name, `#[wire(config)]` marks a configuration type that is reset
/// before every read. Field attributes: `#[wire(nano_time)]`,
/// `#[wire(long_conversion = PATH)]`, `#[wire(skip)]`.
#[proc_macro_derive(Marshallable, attributes(wire))]
pub fn derive_marshallable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match parse::parse_struct(&input).map(|def| generate::generate_marshallable(&def)) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}
