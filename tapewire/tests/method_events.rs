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

//! Typed writer/reader pairs generated from event interfaces.

use std::cell::RefCell;
use std::rc::Rc;
use tapewire::document::ReadingDocument;
use tapewire::marshal::RawText;
use tapewire::method::{MessageHistory, MethodWriterBuilder, WireHolder, WireParser};
use tapewire::wire::{BinaryWire, EventKey, TextWire, Wire};
use tapewire::Marshallable;

#[derive(Debug, Default, Clone, PartialEq, Marshallable)]
struct Price {
    symbol: String,
    amount: f64,
}

#[tapewire::event_interface]
trait TradeEvents {
    #[event(id = 10)]
    fn price(&mut self, price: Price);
    #[event(id = 11)]
    fn say(&mut self, text: &str);
    fn halt(&mut self);
}

#[tapewire::event_interface]
trait RouteEvents {
    fn begin(&mut self, label: &str) -> &mut Self;
    fn step(&mut self, number: i32) -> &mut Self;
    fn finish(&mut self);
}

#[derive(Default)]
struct Recorder {
    prices: Vec<Price>,
    said: Vec<String>,
    halts: usize,
}

impl TradeEvents for Recorder {
    fn price(&mut self, price: Price) {
        self.prices.push(price);
    }
    fn say(&mut self, text: &str) {
        self.said.push(text.to_owned());
    }
    fn halt(&mut self) {
        self.halts += 1;
    }
}

fn drain<W: Wire>(wire: &mut W, parser: &mut WireParser) {
    wire.reset_read();
    loop {
        let mut doc = ReadingDocument::next(wire).unwrap();
        if !doc.is_present() {
            return;
        }
        parser.accept(doc.wire()).unwrap();
    }
}

#[test]
fn writer_and_reader_roundtrip() {
    let mut writer = TradeEventsWriter::wrap(BinaryWire::default()).unwrap();
    let quote = Price {
        symbol: "TAPE".into(),
        amount: 12.5,
    };
    writer.price(quote.clone()).unwrap();
    writer.say("filled").unwrap();
    writer.halt().unwrap();

    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut parser = WireParser::new();
    register_trade_events(&mut parser, Rc::clone(&recorder));

    drain(writer.core_mut().sink_mut().wire_mut(), &mut parser);

    let recorder = recorder.borrow();
    assert_eq!(recorder.prices, vec![quote]);
    assert_eq!(recorder.said, vec!["filled"]);
    assert_eq!(recorder.halts, 1);
}

#[test]
fn roundtrip_by_method_id() {
    let mut writer = TradeEventsWriter::new(
        MethodWriterBuilder::new(WireHolder::new(BinaryWire::default())).use_method_ids(true),
    )
    .unwrap();
    writer.say("keyed by id").unwrap();

    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut parser = WireParser::new();
    register_trade_events(&mut parser, Rc::clone(&recorder));

    drain(writer.core_mut().sink_mut().wire_mut(), &mut parser);
    assert_eq!(recorder.borrow().said, vec!["keyed by id"]);
}

/// The chain invariant: three chained calls land as three events inside
/// one frame, committed when the outermost scope ends.
#[test]
fn chained_calls_share_one_frame() {
    let mut writer = RouteEventsWriter::wrap(TextWire::default()).unwrap();
    writer
        .begin("fast")
        .unwrap()
        .step(1)
        .unwrap()
        .step(2)
        .unwrap()
        .finish()
        .unwrap();

    let wire = writer.core_mut().sink_mut().wire_mut();
    assert_eq!(wire.framer_ref().write_index(), 1);

    wire.reset_read();
    let mut doc = ReadingDocument::next(wire).unwrap();
    let mut names = Vec::new();
    while let Some(EventKey::Name(name)) = doc.wire().read_event() {
        names.push(name);
        doc.wire().value_in().skip_value().unwrap();
    }
    assert_eq!(names, vec!["begin", "step", "step", "finish"]);
}

/// Dropping an unfinished chain commits what was written.
#[test]
fn dangling_chain_commits_on_drop() {
    let mut writer = RouteEventsWriter::wrap(TextWire::default()).unwrap();
    {
        let _chain = writer.begin("partial").unwrap();
    }
    let wire = writer.core_mut().sink_mut().wire_mut();
    assert_eq!(wire.framer_ref().write_index(), 1);
    assert!(!wire.framer_ref().is_writing());
}

#[test]
fn duplicate_ids_across_interfaces_fail_construction() {
    let mut writer = TradeEventsWriter::wrap(TextWire::default()).unwrap();
    // A second interface declaring id 10 for a different method cannot
    // join this writer's core.
    let err = writer
        .core_mut()
        .declare_methods(&[("cancel", Some(10))])
        .unwrap_err();
    assert!(matches!(
        err,
        tapewire::WireError::WriterValidation { .. }
    ));
}

#[test]
fn raw_text_passes_through_verbatim_in_text() {
    let mut writer = TradeEventsWriter::wrap(TextWire::default()).unwrap();
    writer
        .core_mut()
        .write_event("say", None, &[&RawText::new("already: {quoted}")], false)
        .unwrap();

    let wire = writer.core_mut().sink_mut().wire_mut();
    let payload = String::from_utf8_lossy(&wire.bytes_ref().as_slice()[4..]).into_owned();
    assert!(payload.starts_with("say: already: {quoted}\n"), "{:?}", payload);
}

#[test]
fn history_roundtrips_through_reader() {
    tapewire::clock::install(std::sync::Arc::new(
        tapewire::clock::SettableClock::new(7_000),
    ));
    MessageHistory::set(MessageHistory::new(3, 21));

    let mut writer = TradeEventsWriter::new(
        MethodWriterBuilder::new(WireHolder::new(TextWire::default())).record_history(true),
    )
    .unwrap();
    writer.say("stamped").unwrap();

    MessageHistory::set(MessageHistory::default());
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut parser = WireParser::new();
    parser.register_history();
    register_trade_events(&mut parser, Rc::clone(&recorder));

    drain(writer.core_mut().sink_mut().wire_mut(), &mut parser);

    assert_eq!(recorder.borrow().said, vec!["stamped"]);
    let restored = MessageHistory::get();
    assert_eq!(restored.source_id(), 3);
    assert_eq!(restored.source_index(), 21);
    assert_eq!(restored.timings().len(), 1);

    MessageHistory::set(MessageHistory::default());
    tapewire::clock::reset();
}

#[test]
fn zero_argument_events_carry_empty_text() {
    let mut writer = TradeEventsWriter::wrap(TextWire::default()).unwrap();
    writer.halt().unwrap();

    let wire = writer.core_mut().sink_mut().wire_mut();
    let payload = String::from_utf8_lossy(&wire.bytes_ref().as_slice()[4..]).into_owned();
    assert!(payload.starts_with("halt: \"\"\n"), "{:?}", payload);
}
