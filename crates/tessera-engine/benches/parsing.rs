use criterion::{Criterion, criterion_group, criterion_main};
use pulldown_cmark::Parser;
use std::hint::black_box;
use tessera_engine::parsing::{HtmlParser, MarkdownParser, ParseOptions};
use tessera_engine::schema::Surface;
use tessera_engine::serialize::{to_html, to_markdown};
mod common;

fn bench_pulldown_cmark_baseline(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    group.sample_size(10);

    let content = common::generate_markdown_content(100);
    group.bench_function("pulldown_cmark", |b| {
        b.iter(|| {
            let parser = Parser::new(black_box(&content));
            let events: Vec<_> = parser.collect();
            black_box(events);
        });
    });

    group.finish();
}

fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import");
    group.sample_size(10);

    let schema = Surface::Note.schema().unwrap();
    let markdown = common::generate_markdown_content(100);
    let html = common::generate_html_content(100);

    group.bench_function("markdown", |b| {
        let parser = MarkdownParser::new(&schema, ParseOptions::default());
        b.iter(|| black_box(parser.try_parse(black_box(&markdown)).unwrap()));
    });

    group.bench_function("html", |b| {
        let parser = HtmlParser::new(&schema);
        b.iter(|| black_box(parser.parse(black_box(&html)).unwrap()));
    });

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    group.sample_size(10);

    let schema = Surface::Note.schema().unwrap();
    let doc = MarkdownParser::new(&schema, ParseOptions::default())
        .try_parse(&common::generate_markdown_content(100))
        .unwrap();

    group.bench_function("markdown", |b| {
        b.iter(|| black_box(to_markdown(&schema, black_box(&doc))));
    });

    group.bench_function("html", |b| {
        b.iter(|| black_box(to_html(&schema, black_box(&doc))));
    });

    group.finish();
}

criterion_group!(benches, bench_pulldown_cmark_baseline, bench_import, bench_export);
criterion_main!(benches);
