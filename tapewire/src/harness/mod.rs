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

//! Deterministic replay of `in.yaml`/`out.yaml` corpora.
//!
//! A corpus directory holds `in.yaml` (the events driven into the
//! component), `out.yaml` (the expected capture of everything the
//! component emits), and optionally `_setup.yaml` (events applied first
//! to initialize state) plus `out-<name>.yaml` expectations for agitated
//! variants.
//!
//! The component under test receives its output writer over a
//! [`SharedWire`] so the harness can read the capture buffer afterward;
//! events are delivered through a [`WireParser`] the caller wires to the
//! component. Comparison is on normalized text (trailing whitespace
//! collapsed, line endings unified).
//!
//! Environment flags:
//!
//! - `regress.tests`: overwrite `out.yaml` with the capture instead of
//!   comparing, for bulk regeneration reviewed by diff.
//! - `base.tests`: run only base corpora, skipping agitated variants.
//!
//! Deterministic time comes from installing a
//! [`SettableClock`](crate::clock::SettableClock) before the run.

mod agitator;

pub use agitator::{FieldBlanking, MessageOmission, YamlAgitator};

use crate::document::{ReadingDocument, WritingDocument, HEADER_SIZE, LENGTH_MASK, READY_BIT};
use crate::error::{WireError, WireResult};
use crate::method::{SharedWire, WireParser};
use crate::wire::{TextWire, Wire};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// `true` when `out.yaml` should be regenerated instead of asserted.
#[must_use]
pub fn regress_tests() -> bool {
    flag("regress.tests")
}

/// `true` when agitated/generated cases should be skipped.
#[must_use]
pub fn base_tests() -> bool {
    flag("base.tests")
}

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v != "false" && !v.is_empty()).unwrap_or(false)
}

/// The outcome of one corpus replay.
pub struct YamlTester {
    expected: String,
    actual: String,
}

impl YamlTester {
    /// Replays the corpus at `path` against a component.
    ///
    /// `build` constructs the component around its output sink (a
    /// [`SharedWire`] text wire the harness captures); `register` wires
    /// the parser's handlers to the component. `_setup.yaml` events are
    /// applied before `in.yaml` events.
    ///
    /// Under the `regress.tests` flag the capture is written back to
    /// `out.yaml` and the tester always matches.
    pub fn run<C, B, R>(path: impl AsRef<Path>, build: B, register: R) -> WireResult<Self>
    where
        B: FnOnce(SharedWire<TextWire>) -> C,
        R: FnOnce(&mut WireParser, Rc<RefCell<C>>),
    {
        Self::run_transformed(path, |text| text.to_owned(), build, register)
    }

    /// Like [`run`](YamlTester::run), with the expectation passed
    /// through `transform` before normalization (e.g. to mask volatile
    /// fields).
    pub fn run_transformed<C, B, R>(
        path: impl AsRef<Path>,
        transform: impl Fn(&str) -> String,
        build: B,
        register: R,
    ) -> WireResult<Self>
    where
        B: FnOnce(SharedWire<TextWire>) -> C,
        R: FnOnce(&mut WireParser, Rc<RefCell<C>>),
    {
        let path = path.as_ref();
        let input = read_text(&path.join("in.yaml"))?;
        let setup = maybe_read_text(&path.join("_setup.yaml"))?;
        let out_path = path.join("out.yaml");

        let actual = Self::replay(&input, setup.as_deref(), build, register)?;
        let expected = if regress_tests() {
            std::fs::write(&out_path, &actual)?;
            actual.clone()
        } else {
            normalize(&transform(&read_text(&out_path)?))
        };
        Ok(Self { expected, actual })
    }

    /// Replays one input (no files) and returns the normalized capture.
    ///
    /// This is the path agitated variants run through; `run` is this
    /// plus the corpus file handling.
    pub fn replay<C, B, R>(
        input: &str,
        setup: Option<&str>,
        build: B,
        register: R,
    ) -> WireResult<String>
    where
        B: FnOnce(SharedWire<TextWire>) -> C,
        R: FnOnce(&mut WireParser, Rc<RefCell<C>>),
    {
        let capture = SharedWire::new(TextWire::default());
        let component = Rc::new(RefCell::new(build(capture.clone())));

        let mut parser = WireParser::new();
        parser.register_history();
        register(&mut parser, Rc::clone(&component));

        if let Some(setup) = setup {
            deliver(setup, &mut parser)?;
        }
        deliver(input, &mut parser)?;

        Ok(capture.with(|wire| normalize(&render_documents(wire))))
    }

    /// The normalized expectation.
    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// The normalized capture.
    #[must_use]
    pub fn actual(&self) -> &str {
        &self.actual
    }

    /// `true` when the capture matches the expectation.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

/// Derives agitated `(name, input, expected-path)` cases for a corpus.
///
/// Variants whose `out-<name>.yaml` expectation is missing are skipped:
/// an agitation only becomes a test once its expectation is recorded.
/// Under the `base.tests` flag nothing is generated.
pub fn agitated_cases(
    path: impl AsRef<Path>,
    agitator: &dyn YamlAgitator,
) -> WireResult<Vec<(String, String, PathBuf)>> {
    if base_tests() {
        return Ok(Vec::new());
    }
    let path = path.as_ref();
    let input = read_text(&path.join("in.yaml"))?;
    Ok(agitator
        .agitate(&input)
        .into_iter()
        .filter_map(|(name, variant)| {
            let expected = path.join(format!("out-{}.yaml", name));
            expected.exists().then_some((name, variant, expected))
        })
        .collect())
}

/// Frames raw `---`-separated YAML text into documents and runs the
/// parser over each.
fn deliver(input: &str, parser: &mut WireParser) -> WireResult<()> {
    let mut wire = TextWire::default();
    for document in agitator::split_documents(input) {
        let mut doc = WritingDocument::acquire(&mut wire, false)?;
        doc.wire().bytes().append(&document);
        doc.close()?;
    }
    wire.reset_read();
    loop {
        let mut doc = ReadingDocument::next(&mut wire)?;
        if !doc.is_present() {
            return Ok(());
        }
        parser.accept(doc.wire())?;
    }
}

/// Renders a capture buffer as `---`-separated text documents.
fn render_documents(wire: &TextWire) -> String {
    let data = wire.bytes_ref().as_slice();
    let end = wire.bytes_ref().write_position();
    let mut parts = Vec::new();
    let mut pos = 0u64;
    while pos + HEADER_SIZE <= end {
        let header = u32::from_le_bytes(
            data[pos as usize..(pos + HEADER_SIZE) as usize]
                .try_into()
                .expect("header slice"),
        );
        let length = u64::from(header & LENGTH_MASK);
        if header & READY_BIT == 0 || pos + HEADER_SIZE + length > end {
            break;
        }
        let payload = &data[(pos + HEADER_SIZE) as usize..(pos + HEADER_SIZE + length) as usize];
        parts.push(String::from_utf8_lossy(payload).trim_end().to_owned());
        pos += HEADER_SIZE + length;
    }
    let mut out = parts.join("\n---\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Collapses trailing whitespace and unifies line endings.
fn normalize(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn read_text(path: &Path) -> WireResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        WireError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

fn maybe_read_text(path: &Path) -> WireResult<Option<String>> {
    if path.exists() {
        read_text(path).map(Some)
    } else {
        Ok(None)
    }
}
