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

//! Routing parsed events to handlers.
//!
//! A [`WireParser`] holds an ordered name→parselet mapping, an id table
//! for integer-keyed binary events, a default parselet for unmatched
//! names, and a field-number fallback that skips the rest of the
//! document when an unknown id arrives. Lookup is case-sensitive exact
//! match.

use crate::error::{ProtocolError, WireResult};
use crate::method::history::{MessageHistory, HISTORY_EVENT};
use crate::wire::{EventKey, ValueIn, Wire};
use std::collections::HashMap;

/// Handler for one named event: `(event name, staged argument value)`.
pub type Parselet = Box<dyn FnMut(&str, &mut ValueIn) -> WireResult<()>>;

/// Fallback for integer-keyed events with no registered name.
pub type FieldNumberParselet = Box<dyn FnMut(i64, &mut ValueIn) -> WireResult<()>>;

/// Routes each event of a document to its registered handler.
///
/// # Examples
///
/// ```rust
/// use tapewire::document::WritingDocument;
/// use tapewire::method::WireParser;
/// use tapewire::wire::{TextWire, Wire};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// # fn example() -> tapewire::WireResult<()> {
/// let mut wire = TextWire::default();
/// let mut doc = WritingDocument::acquire(&mut wire, false)?;
/// doc.wire().write_event_name("say")?.write_text("hello")?;
/// doc.close()?;
///
/// let heard = Rc::new(RefCell::new(String::new()));
/// let sink = Rc::clone(&heard);
/// let mut parser = WireParser::new();
/// parser.register(
///     "say",
///     Box::new(move |_name, input| {
///         *sink.borrow_mut() = input.read_text()?;
///         Ok(())
///     }),
/// );
///
/// wire.reset_read();
/// let mut doc = tapewire::document::ReadingDocument::next(&mut wire)?;
/// parser.accept(doc.wire())?;
/// assert_eq!(*heard.borrow(), "hello");
/// # Ok(())
/// # }
/// ```
pub struct WireParser {
    names: Vec<String>,
    index: HashMap<String, usize>,
    parselets: Vec<Parselet>,
    ids: HashMap<i64, String>,
    default_parselet: Parselet,
    field_number: FieldNumberParselet,
}

impl WireParser {
    /// A parser whose default handler skips unmatched events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default(Box::new(|_name, input| {
            input.skip_value()
        }))
    }

    /// A parser with an explicit default handler.
    #[must_use]
    pub fn with_default(default_parselet: Parselet) -> Self {
        Self {
            names: Vec::new(),
            index: HashMap::new(),
            parselets: Vec::new(),
            ids: HashMap::new(),
            default_parselet,
            field_number: Box::new(Self::skip_readable),
        }
    }

    /// The stock field-number fallback: skip everything left in the
    /// document.
    pub fn skip_readable(_id: i64, input: &mut ValueIn) -> WireResult<()> {
        input.drain();
        Ok(())
    }

    /// Replaces the field-number fallback.
    pub fn field_number_parselet(&mut self, parselet: FieldNumberParselet) {
        self.field_number = parselet;
    }

    /// Registers a handler, replacing any existing registration.
    pub fn register(&mut self, name: &str, parselet: Parselet) {
        if let Some(&slot) = self.index.get(name) {
            self.parselets[slot] = parselet;
        } else {
            self.index.insert(name.to_owned(), self.names.len());
            self.names.push(name.to_owned());
            self.parselets.push(parselet);
        }
    }

    /// Registers a handler unless the name is already taken, in which
    /// case the duplicate is reported and ignored.
    pub fn register_once(&mut self, name: &str, parselet: Parselet) {
        if self.index.contains_key(name) {
            #[cfg(feature = "observability")]
            tracing::warn!(name, "unable to register multiple handlers, ignoring one");
            let _ = parselet;
            return;
        }
        self.register(name, parselet);
    }

    /// Maps an integer event id onto a registered name.
    pub fn register_id(&mut self, id: i64, name: &str) {
        self.ids.insert(id, name.to_owned());
    }

    /// Registers the stock handler that repopulates the thread's
    /// [`MessageHistory`] from a leading `history` entry.
    pub fn register_history(&mut self) {
        self.register(
            HISTORY_EVENT,
            Box::new(|_name, input| {
                let mut history = MessageHistory::default();
                input.read_marshallable(&mut history)?;
                MessageHistory::set(history);
                Ok(())
            }),
        );
    }

    /// `true` if a handler is registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Reads and dispatches one event.
    ///
    /// Returns `Ok(false)` at end of document. Any argument value the
    /// handler leaves unconsumed is discarded so the next event starts
    /// clean. If the cursor fails to advance the parser reports it and
    /// stops rather than spin.
    pub fn parse_one(&mut self, wire: &mut dyn Wire) -> WireResult<bool> {
        let before = wire.value_in().events_consumed();
        let key = match wire.read_event() {
            Some(key) => key,
            None => return Ok(false),
        };
        let result = match key {
            EventKey::Name(name) => self.dispatch(&name, wire.value_in()),
            EventKey::Id(id) => match self.ids.get(&id).cloned() {
                Some(name) => self.dispatch(&name, wire.value_in()),
                None => (self.field_number)(id, wire.value_in()),
            },
        };
        // Drop anything the handler left staged.
        while wire.value_in().has_value() {
            wire.value_in().skip_value()?;
        }
        result?;
        if wire.value_in().events_consumed() == before {
            #[cfg(feature = "observability")]
            tracing::warn!(
                remaining = wire.value_in().remaining_events(),
                "failed to progress reading events"
            );
            return Err(ProtocolError::FailedToProgress {
                remaining: wire.value_in().remaining_events() as u64,
            }
            .into());
        }
        Ok(true)
    }

    fn dispatch(&mut self, name: &str, input: &mut ValueIn) -> WireResult<()> {
        match self.index.get(name) {
            Some(&slot) => (self.parselets[slot])(name, input),
            None => (self.default_parselet)(name, input),
        }
    }

    /// Dispatches every remaining event in the open document.
    pub fn accept(&mut self, wire: &mut dyn Wire) -> WireResult<()> {
        while self.parse_one(wire)? {}
        Ok(())
    }
}

impl Default for WireParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ReadingDocument, WritingDocument};
    use crate::wire::{BinaryWire, TextWire};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn seen_parser(seen: &Rc<RefCell<Vec<String>>>, names: &[&str]) -> WireParser {
        let mut parser = WireParser::with_default({
            let seen = Rc::clone(seen);
            Box::new(move |name, input| {
                seen.borrow_mut().push(format!("?{}", name));
                input.skip_value()
            })
        });
        for name in names {
            let seen = Rc::clone(seen);
            let registered = name.to_string();
            parser.register(
                name,
                Box::new(move |_name, input| {
                    let text = input.read_text()?;
                    seen.borrow_mut().push(format!("{}={}", registered, text));
                    Ok(())
                }),
            );
        }
        parser
    }

    #[test]
    fn test_events_dispatch_in_order() {
        let mut wire = TextWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_event_name("one").unwrap().write_text("a").unwrap();
        doc.wire().write_event_name("two").unwrap().write_text("b").unwrap();
        doc.close().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut parser = seen_parser(&seen, &["one", "two"]);

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        parser.accept(doc.wire()).unwrap();
        assert_eq!(*seen.borrow(), vec!["one=a", "two=b"]);
    }

    #[test]
    fn test_unmatched_goes_to_default() {
        let mut wire = TextWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_event_name("stray").unwrap().write_i32(9).unwrap();
        doc.close().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut parser = seen_parser(&seen, &[]);

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        parser.accept(doc.wire()).unwrap();
        assert_eq!(*seen.borrow(), vec!["?stray"]);
    }

    #[test]
    fn test_register_once_keeps_first() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut parser = seen_parser(&seen, &["say"]);
        parser.register_once(
            "say",
            Box::new(|_, input| {
                panic!("duplicate registration used: {:?}", input.has_value())
            }),
        );

        let mut wire = TextWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_event_name("say").unwrap().write_text("x").unwrap();
        doc.close().unwrap();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        parser.accept(doc.wire()).unwrap();
        assert_eq!(*seen.borrow(), vec!["say=x"]);
    }

    #[test]
    fn test_id_resolution_and_fallback() {
        let mut wire = BinaryWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire().write_event_id(7, "known").unwrap().write_text("k").unwrap();
        doc.wire().write_event_id(99, "unknown").unwrap().write_text("u").unwrap();
        doc.wire().write_event_name("after").unwrap().write_text("a").unwrap();
        doc.close().unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut parser = seen_parser(&seen, &["known", "after"]);
        parser.register_id(7, "known");

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        parser.accept(doc.wire()).unwrap();
        // The unknown id drained the document, so "after" never ran.
        assert_eq!(*seen.borrow(), vec!["known=k"]);
    }

    #[test]
    fn test_history_parselet_restores_thread_history() {
        let mut wire = TextWire::default();
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        let history = MessageHistory::new(5, 11);
        doc.wire()
            .write_event_name(HISTORY_EVENT)
            .unwrap()
            .write_marshallable(&history)
            .unwrap();
        doc.close().unwrap();

        let mut parser = WireParser::new();
        parser.register_history();

        wire.reset_read();
        let mut doc = ReadingDocument::next(&mut wire).unwrap();
        parser.accept(doc.wire()).unwrap();
        assert_eq!(MessageHistory::get().source_id(), 5);
        assert_eq!(MessageHistory::get().source_index(), 11);
        MessageHistory::set(MessageHistory::default());
    }
}
