//! Criterion benchmarks for tracing and full synthesis (made by FontLab https://www.fontlab.com/)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use typr_core::extract::Bitmap;
use typr_core::pipeline::{synthesize, PipelineOptions};
use typr_core::request::{
    CharacterMapping, FontMetadata, FontRequest, OutputFormat, Rect, TracingSettings,
};
use typr_core::source::SourceImage;
use typr_core::trace::trace_bitmap;

/// Filled ring: a disc of radius `r` with a hole of radius `r / 2`.
fn ring(size: usize) -> Bitmap {
    let mut bm = Bitmap::new(size, size);
    let c = size as f64 / 2.0;
    let outer = c * 0.9;
    let inner = outer / 2.0;
    for y in 0..size {
        for x in 0..size {
            let d = ((x as f64 + 0.5 - c).powi(2) + (y as f64 + 0.5 - c).powi(2)).sqrt();
            bm.set(x, y, d <= outer && d >= inner);
        }
    }
    bm
}

fn sheet(cells: u32, cell: u32) -> SourceImage {
    let w = cells * cell;
    let mut pixels = vec![255u8; (w * cell) as usize];
    for i in 0..cells {
        let pad = cell / 5;
        for y in pad..cell - pad {
            for x in i * cell + pad..(i + 1) * cell - pad {
                pixels[(y * w + x) as usize] = 0;
            }
        }
    }
    SourceImage::new(w, cell, 1, pixels).expect("sheet")
}

fn bench_trace(c: &mut Criterion) {
    let settings = TracingSettings::default();
    let small = ring(64);
    let large = ring(256);

    c.bench_function("trace ring 64px", |b| {
        b.iter(|| trace_bitmap(black_box(&small), &settings).unwrap())
    });

    c.bench_function("trace ring 256px", |b| {
        b.iter(|| trace_bitmap(black_box(&large), &settings).unwrap())
    });
}

fn bench_synthesize(c: &mut Criterion) {
    let letters: Vec<char> = ('A'..='Z').collect();
    let cell = 120;
    let mut request = FontRequest::new(FontMetadata::new("Bench"), OutputFormat::Ttf)
        .with_image("sheet", sheet(letters.len() as u32, cell));
    for (i, ch) in letters.iter().enumerate() {
        let x = i as i64 * i64::from(cell);
        request = request.with_mapping(CharacterMapping::new(
            *ch,
            "sheet",
            Rect::new(x, 0, x + i64::from(cell), i64::from(cell)),
        ));
    }
    let options = PipelineOptions::default();

    c.bench_function("synthesize 26 glyphs", |b| {
        b.iter(|| synthesize(black_box(&request), &options).unwrap())
    });
}

criterion_group!(benches, bench_trace, bench_synthesize);
criterion_main!(benches);
