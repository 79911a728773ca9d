//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The method-writer runtime.
//!
//! Generated writers (see `#[tapewire::event_interface]`) translate
//! typed method calls into framed events through one shared runtime,
//! [`MethodWriterCore`]: it consults the update interceptor, acquires
//! the writing document (reusing the open one inside a chained call
//! sequence), stamps history, picks the event key (name, generic-event
//! first argument, or numeric id on binary wires), serializes the
//! arguments by count, and rolls the document back when anything fails.
//!
//! Chained calls, methods returning the writer itself or a
//! sub-interface writer, share one document. The generated chain guard
//! holds the document open and commits it when the outermost guard
//! drops, so `a()?.b()?.c()?;` frames exactly one document holding three
//! events.

use crate::document::{commit_document, open_document, rollback_document, WritingDocument};
use crate::error::{WireError, WireResult};
use crate::marshal::{Marshallable, ToWire};
use crate::method::history::{MessageHistory, HISTORY_EVENT};
use crate::wire::Wire;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Where a method writer sends its documents.
///
/// A sink hands the runtime exclusive access to a wire for the duration
/// of one framing step. Wires are not thread-safe, so a sink is the
/// per-thread owner of its wire.
pub trait WireSink {
    /// Runs `f` with exclusive access to the wire.
    fn with_wire(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Wire) -> WireResult<()>,
    ) -> WireResult<()>;
}

/// A sink that owns its wire outright.
pub struct WireHolder<W: Wire> {
    wire: W,
}

impl<W: Wire> WireHolder<W> {
    /// Takes ownership of `wire`.
    pub fn new(wire: W) -> Self {
        Self { wire }
    }

    /// Direct access to the owned wire.
    pub fn wire_mut(&mut self) -> &mut W {
        &mut self.wire
    }

    /// Releases the wire.
    pub fn into_inner(self) -> W {
        self.wire
    }
}

impl<W: Wire> WireSink for WireHolder<W> {
    fn with_wire(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Wire) -> WireResult<()>,
    ) -> WireResult<()> {
        f(&mut self.wire)
    }
}

/// A sink sharing one wire within a thread.
///
/// Used where the wire must outlive the component holding the writer,
/// e.g. the YAML harness keeps a clone to read the capture buffer after
/// the component is done. Not `Send`: sharing stays within the owning
/// thread.
pub struct SharedWire<W: Wire> {
    wire: Rc<RefCell<W>>,
}

impl<W: Wire> SharedWire<W> {
    /// Wraps `wire` for single-threaded sharing.
    pub fn new(wire: W) -> Self {
        Self {
            wire: Rc::new(RefCell::new(wire)),
        }
    }

    /// Runs `f` against the shared wire.
    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.wire.borrow_mut())
    }
}

impl<W: Wire> Clone for SharedWire<W> {
    fn clone(&self) -> Self {
        Self {
            wire: Rc::clone(&self.wire),
        }
    }
}

impl<W: Wire> WireSink for SharedWire<W> {
    fn with_wire(
        &mut self,
        f: &mut dyn FnMut(&mut dyn Wire) -> WireResult<()>,
    ) -> WireResult<()> {
        f(&mut *self.wire.borrow_mut())
    }
}

/// Veto hook consulted before each event is written.
///
/// Receives the method name and the last argument; returning `false`
/// suppresses the write and the call returns its declared default.
pub type UpdateInterceptor = Box<dyn Fn(&str, &dyn ToWire) -> bool>;

/// Builder for the method-writer runtime (one per generated writer).
///
/// # Examples
///
/// ```rust
/// use tapewire::method::{MethodWriterBuilder, WireHolder};
/// use tapewire::wire::BinaryWire;
///
/// let core = MethodWriterBuilder::new(WireHolder::new(BinaryWire::default()))
///     .use_method_ids(true)
///     .record_history(false)
///     .build();
/// # let _ = core;
/// ```
pub struct MethodWriterBuilder<S: WireSink> {
    sink: S,
    meta_data: bool,
    use_method_ids: bool,
    record_history: bool,
    verbose_types: bool,
    generic_event: Option<String>,
    interceptor: Option<UpdateInterceptor>,
}

impl<S: WireSink> MethodWriterBuilder<S> {
    /// A builder with every option off.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            meta_data: false,
            use_method_ids: false,
            record_history: false,
            verbose_types: false,
            generic_event: None,
            interceptor: None,
        }
    }

    /// Frames events as meta documents instead of data documents.
    #[must_use]
    pub fn meta_data(mut self, on: bool) -> Self {
        self.meta_data = on;
        self
    }

    /// Prefers numeric method ids over names on binary wires.
    #[must_use]
    pub fn use_method_ids(mut self, on: bool) -> Self {
        self.use_method_ids = on;
        self
    }

    /// Prepends a `history` entry before every event.
    #[must_use]
    pub fn record_history(mut self, on: bool) -> Self {
        self.record_history = on;
        self
    }

    /// Emits type tags even when the reader could infer them.
    #[must_use]
    pub fn verbose_types(mut self, on: bool) -> Self {
        self.verbose_types = on;
        self
    }

    /// Names the method whose first argument becomes the event key.
    #[must_use]
    pub fn generic_event(mut self, name: impl Into<String>) -> Self {
        self.generic_event = Some(name.into());
        self
    }

    /// Installs the update-interceptor veto.
    #[must_use]
    pub fn update_interceptor(mut self, interceptor: UpdateInterceptor) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Finishes the runtime core.
    pub fn build(self) -> MethodWriterCore<S> {
        MethodWriterCore {
            sink: self.sink,
            meta_data: self.meta_data,
            use_method_ids: self.use_method_ids,
            record_history: self.record_history,
            verbose_types: self.verbose_types,
            generic_event: self.generic_event,
            interceptor: self.interceptor,
            ids: HashMap::new(),
        }
    }
}

/// Shared runtime behind every generated method writer.
pub struct MethodWriterCore<S: WireSink> {
    sink: S,
    meta_data: bool,
    use_method_ids: bool,
    record_history: bool,
    verbose_types: bool,
    generic_event: Option<String>,
    interceptor: Option<UpdateInterceptor>,
    ids: HashMap<i32, String>,
}

impl<S: WireSink> MethodWriterCore<S> {
    /// Registers an interface's method descriptors.
    ///
    /// Fails with [`WireError::WriterValidation`] when two methods in
    /// the writer's interface set share an event id.
    pub fn declare_methods(&mut self, methods: &[(&str, Option<i32>)]) -> WireResult<()> {
        for (name, id) in methods {
            let Some(id) = id else { continue };
            match self.ids.get(id) {
                Some(existing) if existing == name => {}
                Some(existing) => {
                    return Err(WireError::writer_validation(format!(
                        "methods {:?} and {:?} share event id {}",
                        existing, name, id
                    )));
                }
                None => {
                    self.ids.insert(*id, (*name).to_owned());
                }
            }
        }
        Ok(())
    }

    /// Consults the interceptor; `false` means the call is vetoed.
    pub fn intercept(&self, method: &str, last_arg: &dyn ToWire) -> bool {
        match &self.interceptor {
            Some(interceptor) => interceptor(method, last_arg),
            None => true,
        }
    }

    /// `true` when `method` is the configured generic event.
    #[must_use]
    pub fn is_generic_event(&self, method: &str) -> bool {
        self.generic_event.as_deref() == Some(method)
    }

    /// Writes one event.
    ///
    /// With `chained` the document is left open for the rest of the call
    /// chain; otherwise a document opened by this call commits before
    /// returning. Errors roll the whole open document back and
    /// propagate.
    pub fn write_event(
        &mut self,
        method: &str,
        id: Option<i32>,
        args: &[&dyn ToWire],
        chained: bool,
    ) -> WireResult<()> {
        let record_history = self.record_history;
        let use_method_ids = self.use_method_ids;
        let verbose = self.verbose_types;
        let meta = self.meta_data;
        let generic = self.generic_event.clone();
        self.sink.with_wire(&mut |wire| {
            if !wire.framer_ref().is_writing() {
                open_document(wire, meta)?;
            }
            let result = write_event_in(
                wire,
                method,
                id,
                args,
                record_history,
                use_method_ids,
                verbose,
                generic.as_deref(),
            );
            match result {
                Ok(()) => {
                    if chained {
                        Ok(())
                    } else {
                        commit_document(wire)
                    }
                }
                Err(e) => {
                    rollback_document(wire);
                    Err(e)
                }
            }
        })
    }

    /// Commits the document a chain left open, if any.
    pub fn flush(&mut self) -> WireResult<()> {
        self.sink.with_wire(&mut |wire| {
            if wire.framer_ref().is_writing() {
                commit_document(wire)?;
            }
            Ok(())
        })
    }

    /// Discards the document a chain left open, if any.
    pub fn abandon(&mut self) {
        let _ = self.sink.with_wire(&mut |wire| {
            rollback_document(wire);
            Ok(())
        });
    }

    /// The sink, for tests and teardown.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<W: Wire> MethodWriterCore<WireHolder<W>> {
    /// Opens a passthrough document on the owned wire.
    ///
    /// This is the `DocumentContext`-returning path: no event is
    /// written, the caller fills and closes the scope itself, and
    /// chained-call reuse does not apply.
    pub fn acquire_document(&mut self) -> WireResult<WritingDocument<'_>> {
        let meta = self.meta_data;
        WritingDocument::acquire(self.sink.wire_mut(), meta)
    }
}

#[allow(clippy::too_many_arguments)]
fn write_event_in(
    wire: &mut dyn Wire,
    method: &str,
    id: Option<i32>,
    args: &[&dyn ToWire],
    record_history: bool,
    use_method_ids: bool,
    verbose: bool,
    generic_event: Option<&str>,
) -> WireResult<()> {
    if record_history {
        let mut history = MessageHistory::get();
        history.stamp();
        wire.write_event_name(HISTORY_EVENT)?
            .write_marshallable(&history)?;
        MessageHistory::set(history);
    }

    // The generic event takes its key from the first argument.
    let (key_owned, args) = if generic_event == Some(method) && !args.is_empty() {
        (Some(first_arg_as_key(args[0])?), &args[1..])
    } else {
        (None, args)
    };
    let key = key_owned.as_deref().unwrap_or(method);

    let use_id = use_method_ids && wire.is_binary() && id.is_some() && key_owned.is_none();
    let out = if use_id {
        wire.write_event_id(i64::from(id.unwrap_or_default()), key)?
    } else {
        wire.write_event_name(key)?
    };

    match args.len() {
        0 => out.write_text(""),
        1 => args[0].to_wire(out, verbose),
        _ => {
            let verbose_in_seq = verbose;
            out.write_sequence(&mut |seq| {
                for arg in args {
                    arg.to_wire(seq, verbose_in_seq)?;
                }
                Ok(())
            })
        }
    }
}

/// The generic event's first argument must be text.
fn first_arg_as_key(arg: &dyn ToWire) -> WireResult<String> {
    let mut probe = KeyProbe::default();
    arg.to_wire(&mut probe, false)?;
    probe.key.ok_or_else(|| {
        WireError::writer_validation(
            "the generic event's first argument must be a string event name",
        )
    })
}

/// A throwaway [`crate::wire::ValueOut`] that accepts exactly one text
/// write and rejects everything else.
#[derive(Default)]
struct KeyProbe {
    key: Option<String>,
}

impl crate::wire::ValueOut for KeyProbe {
    fn write_null(&mut self) -> WireResult<()> {
        Ok(())
    }
    fn write_bool(&mut self, _value: bool) -> WireResult<()> {
        Ok(())
    }
    fn write_i8(&mut self, _value: i8) -> WireResult<()> {
        Ok(())
    }
    fn write_i16(&mut self, _value: i16) -> WireResult<()> {
        Ok(())
    }
    fn write_i32(&mut self, _value: i32) -> WireResult<()> {
        Ok(())
    }
    fn write_i64(&mut self, _value: i64) -> WireResult<()> {
        Ok(())
    }
    fn write_f32(&mut self, _value: f32) -> WireResult<()> {
        Ok(())
    }
    fn write_f64(&mut self, _value: f64) -> WireResult<()> {
        Ok(())
    }
    fn write_text(&mut self, text: &str) -> WireResult<()> {
        self.key = Some(text.to_owned());
        Ok(())
    }
    fn write_raw_text(&mut self, text: &str) -> WireResult<()> {
        self.key = Some(text.to_owned());
        Ok(())
    }
    fn write_bytes_blob(&mut self, _bytes: &[u8]) -> WireResult<()> {
        Ok(())
    }
    fn write_timestamp_nanos(&mut self, _nanos: i64) -> WireResult<()> {
        Ok(())
    }
    fn write_type_prefix(&mut self, _alias: &str) -> WireResult<()> {
        Ok(())
    }
    fn write_marshallable(&mut self, _value: &dyn Marshallable) -> WireResult<()> {
        Ok(())
    }
    fn write_object(&mut self, _value: &dyn Marshallable, _verbose: bool) -> WireResult<()> {
        Ok(())
    }
    fn write_converted(
        &mut self,
        _value: i64,
        _converter: &dyn crate::marshal::LongConverter,
    ) -> WireResult<()> {
        Ok(())
    }
    fn write_sequence(
        &mut self,
        _items: &mut dyn FnMut(&mut dyn crate::wire::ValueOut) -> WireResult<()>,
    ) -> WireResult<()> {
        Ok(())
    }
    fn write_value(&mut self, value: &crate::value::WireValue) -> WireResult<()> {
        if let Some(text) = value.as_str() {
            self.key = Some(text.to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ReadingDocument;
    use crate::wire::{BinaryWire, EventKey, TextWire, Wire};

    fn core_over_text() -> MethodWriterCore<WireHolder<TextWire>> {
        MethodWriterBuilder::new(WireHolder::new(TextWire::default())).build()
    }

    #[test]
    fn test_single_event_per_document() {
        let mut core = core_over_text();
        core.write_event("say", None, &[&"hello"], false).unwrap();
        core.write_event("say", None, &[&"bye"], false).unwrap();

        let wire = core.sink_mut().wire_mut();
        wire.reset_read();
        for expected in ["hello", "bye"] {
            let mut doc = ReadingDocument::next(wire).unwrap();
            assert!(doc.is_present());
            assert_eq!(doc.wire().read_event(), Some(EventKey::Name("say".into())));
            assert_eq!(doc.wire().value_in().read_text().unwrap(), expected);
        }
    }

    #[test]
    fn test_zero_args_write_empty_text() {
        let mut core = core_over_text();
        core.write_event("ping", None, &[], false).unwrap();

        let wire = core.sink_mut().wire_mut();
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        doc.wire().read_event();
        assert_eq!(doc.wire().value_in().read_text().unwrap(), "");
    }

    #[test]
    fn test_multiple_args_become_sequence() {
        let mut core = core_over_text();
        core.write_event("move", None, &[&3i32, &4i32], false).unwrap();

        let wire = core.sink_mut().wire_mut();
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        doc.wire().read_event();
        let input = doc.wire().value_in();
        assert_eq!(input.begin_sequence().unwrap(), 2);
        assert_eq!(input.read_i32().unwrap(), 3);
        assert_eq!(input.read_i32().unwrap(), 4);
    }

    #[test]
    fn test_chained_events_share_one_document() {
        let mut core = core_over_text();
        core.write_event("a", None, &[&1i32], true).unwrap();
        core.write_event("b", None, &[&2i32], true).unwrap();
        core.write_event("c", None, &[&3i32], true).unwrap();
        core.flush().unwrap();

        let wire = core.sink_mut().wire_mut();
        assert_eq!(wire.framer_ref().write_index(), 1);
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        let mut names = Vec::new();
        while let Some(EventKey::Name(name)) = doc.wire().read_event() {
            names.push(name);
            doc.wire().value_in().skip_value().unwrap();
        }
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_method_id_only_on_binary() {
        let mut binary = MethodWriterBuilder::new(WireHolder::new(BinaryWire::default()))
            .use_method_ids(true)
            .build();
        binary.write_event("m", Some(42), &[&1i32], false).unwrap();
        let wire = binary.sink_mut().wire_mut();
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        assert_eq!(doc.wire().read_event(), Some(EventKey::Id(42)));
        drop(doc);

        let mut text = MethodWriterBuilder::new(WireHolder::new(TextWire::default()))
            .use_method_ids(true)
            .build();
        text.write_event("m", Some(42), &[&1i32], false).unwrap();
        let wire = text.sink_mut().wire_mut();
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        assert_eq!(doc.wire().read_event(), Some(EventKey::Name("m".into())));
    }

    #[test]
    fn test_generic_event_uses_first_argument() {
        let mut core = MethodWriterBuilder::new(WireHolder::new(BinaryWire::default()))
            .generic_event("event")
            .build();
        core.write_event("event", None, &[&"price", &17i32], false)
            .unwrap();

        let wire = core.sink_mut().wire_mut();
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        assert_eq!(doc.wire().read_event(), Some(EventKey::Name("price".into())));
        assert_eq!(doc.wire().value_in().read_i32().unwrap(), 17);
    }

    #[test]
    fn test_duplicate_id_fails_construction() {
        let mut core = core_over_text();
        let err = core
            .declare_methods(&[("a", Some(7)), ("b", Some(7))])
            .unwrap_err();
        assert!(matches!(err, WireError::WriterValidation { .. }));

        // The same method declared twice is fine.
        core.declare_methods(&[("a", Some(8))]).unwrap();
        core.declare_methods(&[("a", Some(8))]).unwrap();
    }

    #[test]
    fn test_interceptor_vetoes_silently() {
        let mut core = MethodWriterBuilder::new(WireHolder::new(TextWire::default()))
            .update_interceptor(Box::new(|method, _arg| method != "m"))
            .build();

        if core.intercept("m", &0i32) {
            core.write_event("m", None, &[&0i32], false).unwrap();
        }
        assert_eq!(core.sink_mut().wire_mut().bytes_ref().write_position(), 0);

        if core.intercept("other", &0i32) {
            core.write_event("other", None, &[&0i32], false).unwrap();
        }
        assert_eq!(core.sink_mut().wire_mut().framer_ref().write_index(), 1);
    }

    #[test]
    fn test_history_entry_precedes_event() {
        crate::clock::install(std::sync::Arc::new(crate::clock::SettableClock::new(
            1_000_000,
        )));
        MessageHistory::set(MessageHistory::new(9, 2));

        let mut core = MethodWriterBuilder::new(WireHolder::new(TextWire::default()))
            .record_history(true)
            .build();
        core.write_event("say", None, &[&"hi"], false).unwrap();

        let wire = core.sink_mut().wire_mut();
        wire.reset_read();
        let mut doc = ReadingDocument::next(wire).unwrap();
        assert_eq!(
            doc.wire().read_event(),
            Some(EventKey::Name(HISTORY_EVENT.into()))
        );
        let mut history = MessageHistory::default();
        doc.wire().value_in().read_marshallable(&mut history).unwrap();
        assert_eq!(history.source_id(), 9);
        assert_eq!(history.timings().len(), 1);
        assert_eq!(doc.wire().read_event(), Some(EventKey::Name("say".into())));

        MessageHistory::set(MessageHistory::default());
        crate::clock::reset();
    }

    #[test]
    fn test_rollback_on_argument_failure() {
        struct Poison;
        impl ToWire for Poison {
            fn to_wire(
                &self,
                _out: &mut dyn crate::wire::ValueOut,
                _verbose: bool,
            ) -> WireResult<()> {
                Err(WireError::invalid_marshallable("poisoned argument"))
            }
        }

        let mut core = core_over_text();
        let err = core.write_event("bad", None, &[&Poison], false).unwrap_err();
        assert!(matches!(err, WireError::InvalidMarshallable { .. }));

        let wire = core.sink_mut().wire_mut();
        assert_eq!(wire.bytes_ref().write_position(), 0);
        assert!(!wire.framer_ref().is_writing());

        // The wire is reusable after the rollback.
        core.write_event("good", None, &[&1i32], false).unwrap();
        assert_eq!(core.sink_mut().wire_mut().framer_ref().write_index(), 1);
    }

    #[test]
    fn test_passthrough_document() {
        let mut core = core_over_text();
        {
            let mut doc = core.acquire_document().unwrap();
            doc.wire().write_event_name("manual").unwrap().write_i32(5).unwrap();
            doc.close().unwrap();
        }
        assert_eq!(core.sink_mut().wire_mut().framer_ref().write_index(), 1);
    }

    #[test]
    fn test_shared_wire_capture() {
        let shared = SharedWire::new(TextWire::default());
        let mut core = MethodWriterBuilder::new(shared.clone()).build();
        core.write_event("say", None, &[&"hi"], false).unwrap();

        let captured = shared.with(|wire| wire.bytes_ref().write_position());
        assert!(captured > 0);
    }
}
