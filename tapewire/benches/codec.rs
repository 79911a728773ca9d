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

//! Encode/decode throughput of the three dialects.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tapewire::document::{ReadingDocument, WritingDocument};
use tapewire::value::{MapKey, WireValue};
use tapewire::wire::{BinaryWire, JsonWire, TextWire, Wire};

fn sample() -> WireValue {
    WireValue::Mapping(vec![
        (MapKey::from("symbol"), WireValue::text("TAPE")),
        (MapKey::from("bid"), WireValue::F64(101.25)),
        (MapKey::from("ask"), WireValue::F64(101.75)),
        (MapKey::from("volume"), WireValue::int(1_500_000)),
        (
            MapKey::from("depth"),
            WireValue::Sequence(vec![
                WireValue::int(5),
                WireValue::int(12),
                WireValue::int(40),
            ]),
        ),
    ])
}

fn bench_encode(c: &mut Criterion) {
    let value = sample();
    let mut group = c.benchmark_group("encode");
    group.bench_function("text", |b| {
        let mut wire = TextWire::default();
        b.iter(|| {
            wire.reset();
            let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
            doc.wire().write_value(black_box(&value)).unwrap();
            doc.close().unwrap();
        });
    });
    group.bench_function("json", |b| {
        let mut wire = JsonWire::default();
        b.iter(|| {
            wire.reset();
            let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
            doc.wire().write_value(black_box(&value)).unwrap();
            doc.close().unwrap();
        });
    });
    group.bench_function("binary", |b| {
        let mut wire = BinaryWire::default();
        b.iter(|| {
            wire.reset();
            let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
            doc.wire().write_value(black_box(&value)).unwrap();
            doc.close().unwrap();
        });
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let value = sample();
    let mut group = c.benchmark_group("decode");

    macro_rules! decode_bench {
        ($name:literal, $wire:expr) => {
            group.bench_function($name, |b| {
                let mut wire = $wire;
                {
                    let mut doc = WritingDocument::acquire(&mut wire, false).unwrap();
                    doc.wire().write_value(&value).unwrap();
                    doc.close().unwrap();
                }
                b.iter(|| {
                    wire.reset_read();
                    let mut doc = ReadingDocument::next(&mut wire).unwrap();
                    while let Some(key) = doc.wire().read_event() {
                        black_box(key);
                        black_box(doc.wire().value_in().read_value().unwrap());
                    }
                    if doc.wire().value_in().has_value() {
                        black_box(doc.wire().value_in().read_value().unwrap());
                    }
                });
            });
        };
    }

    decode_bench!("text", TextWire::default());
    decode_bench!("json", JsonWire::default());
    decode_bench!("binary", BinaryWire::default());
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
