//! Extraction and Replacement Benchmarks
//!
//! - layout extraction of a text-heavy page
//! - a full replacement run (extract, patch, save)
//!
//! Run with: `cargo bench --bench replacement`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use redate_server::patch::{replace_in_document, FontResolver, ReplacementMap};
use redate_server::pdf::extract_structured_text;

/// One A4 page with `lines` lines of text, every fourth carrying a date
fn create_form_pdf(lines: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut operations = Vec::new();
    for i in 0..lines {
        let text = if i % 4 == 0 {
            format!("Date of birth: 12/03/2007 (record {})", i)
        } else {
            format!("Field {}: lorem ipsum dolor sit amet", i)
        };
        let y = 800.0 - (i % 70) as f32 * 11.0;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Real(9.0)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Real(40.0 + (i / 70) as f32 * 280.0), Object::Real(y)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Benchmark layout extraction
fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_extraction");
    group.measurement_time(Duration::from_secs(10));

    for lines in [20usize, 140] {
        let doc = create_form_pdf(lines);
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &doc, |b, doc| {
            b.iter(|| extract_structured_text(black_box(doc), 0).unwrap())
        });
    }

    group.finish();
}

/// Benchmark a full replacement run
fn bench_replacement(c: &mut Criterion) {
    let mut group = c.benchmark_group("replacement_run");
    group.measurement_time(Duration::from_secs(10));

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let fonts = FontResolver::new(Vec::new());
    let mut replacements = ReplacementMap::new();
    replacements.insert("2007".to_string(), "2003".to_string());
    replacements.insert("2008".to_string(), "2003".to_string());

    for lines in [20usize, 140] {
        let doc = create_form_pdf(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &doc, |b, doc| {
            b.iter_batched(
                || doc.clone(),
                |mut doc| replace_in_document(&mut doc, &output, &replacements, &fonts).unwrap(),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_replacement);
criterion_main!(benches);
