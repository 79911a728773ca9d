//! End-to-end expansion tests: the generated writers, chains, readers,
//! and marshallable impls compile and behave against the runtime crate.

use std::cell::RefCell;
use std::rc::Rc;
use tapewire::document::ReadingDocument;
use tapewire::method::{MethodWriterBuilder, WireHolder, WireParser};
use tapewire::wire::{BinaryWire, EventKey, TextWire, Wire};
use tapewire::{event_interface, Marshallable};

#[derive(Debug, Default, Clone, PartialEq, Marshallable)]
struct Note {
    text: String,
    priority: i32,
}

#[event_interface]
trait Pad {
    #[event(id = 1)]
    fn note(&mut self, note: Note);
    fn clear(&mut self);
    fn append(&mut self, text: &str) -> &mut Self;
}

#[test]
fn writer_emits_and_reader_dispatches() {
    let mut writer = PadWriter::wrap(BinaryWire::default()).unwrap();
    writer
        .note(Note {
            text: "remember".into(),
            priority: 2,
        })
        .unwrap();
    writer.clear().unwrap();

    #[derive(Default)]
    struct Memo {
        notes: Vec<Note>,
        cleared: bool,
    }
    impl Pad for Memo {
        fn note(&mut self, note: Note) {
            self.notes.push(note);
        }
        fn clear(&mut self) {
            self.cleared = true;
        }
        fn append(&mut self, _text: &str) -> &mut Self {
            self
        }
    }

    let memo = Rc::new(RefCell::new(Memo::default()));
    let mut parser = WireParser::new();
    register_pad(&mut parser, Rc::clone(&memo));

    let wire = writer.core_mut().sink_mut().wire_mut();
    wire.reset_read();
    loop {
        let mut doc = ReadingDocument::next(wire).unwrap();
        if !doc.is_present() {
            break;
        }
        parser.accept(doc.wire()).unwrap();
    }

    let memo = memo.borrow();
    assert_eq!(memo.notes.len(), 1);
    assert_eq!(memo.notes[0].text, "remember");
    assert!(memo.cleared);
}

#[test]
fn method_table_is_declared() {
    assert_eq!(
        PadWriter::<WireHolder<TextWire>>::METHODS,
        &[("note", Some(1)), ("clear", None), ("append", None)]
    );
}

#[test]
fn chained_writes_stay_in_one_document() {
    let mut writer = PadWriter::wrap(TextWire::default()).unwrap();
    writer
        .append("a")
        .unwrap()
        .append("b")
        .unwrap()
        .clear()
        .unwrap();

    let wire = writer.core_mut().sink_mut().wire_mut();
    assert_eq!(wire.framer_ref().write_index(), 1);
}

#[test]
fn ids_route_on_binary_wires() {
    let mut writer = PadWriter::new(
        MethodWriterBuilder::new(WireHolder::new(BinaryWire::default())).use_method_ids(true),
    )
    .unwrap();
    writer
        .note(Note {
            text: "keyed".into(),
            priority: 1,
        })
        .unwrap();

    let wire = writer.core_mut().sink_mut().wire_mut();
    wire.reset_read();
    let mut doc = ReadingDocument::next(wire).unwrap();
    assert_eq!(doc.wire().read_event(), Some(EventKey::Id(1)));
}

#[test]
fn derive_maps_declared_fields_in_order() {
    use tapewire::document::WritingDocument;

    let mut wire = TextWire::default();
    {
        let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
        doc.wire()
            .write_event_name("note")
            .unwrap()
            .write_marshallable(&Note {
                text: "hi".into(),
                priority: 3,
            })
            .unwrap();
        doc.close().unwrap();
    }
    let payload = String::from_utf8_lossy(&wire.bytes_ref().as_slice()[4..]).into_owned();
    let text_at = payload.find("text:").unwrap();
    let priority_at = payload.find("priority:").unwrap();
    assert!(text_at < priority_at, "{:?}", payload);
}
