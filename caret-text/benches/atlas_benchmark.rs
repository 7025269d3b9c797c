use criterion::{black_box, criterion_group, criterion_main, Criterion};

use caret_text::{detect_char_width, FixedRasterizer, GlyphAtlas, GlyphStyle};

fn bench_atlas_insert(c: &mut Criterion) {
    c.bench_function("atlas_insert_16px", |b| {
        let mut atlas = GlyphAtlas::new(2048, 8);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut i: u32 = 0;
        b.iter(|| {
            // Distinct color per iteration forces a fresh cache entry.
            i = i.wrapping_add(1);
            let style = GlyphStyle::default().with_color([
                (i & 0xff) as u8,
                ((i >> 8) & 0xff) as u8,
                ((i >> 16) & 0xff) as u8,
                255,
            ]);
            black_box(atlas.get_glyph('g', &style, &mut raster).ok());
        });
    });
}

fn bench_atlas_hit(c: &mut Criterion) {
    let mut atlas = GlyphAtlas::new(1024, 4);
    let mut raster = FixedRasterizer::monospace(10.0);
    let style = GlyphStyle::default();
    for ch in "abcdefghijklmnopqrstuvwxyz".chars() {
        atlas.get_glyph(ch, &style, &mut raster).unwrap();
    }

    c.bench_function("atlas_cached_lookup", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = (i + 1) % 26;
            let ch = (b'a' + i as u8) as char;
            black_box(atlas.get_glyph(black_box(ch), &style, &mut raster).ok());
        });
    });
}

fn bench_monospace_detection(c: &mut Criterion) {
    let style = GlyphStyle::default();
    c.bench_function("detect_char_width", |b| {
        let mut raster = FixedRasterizer::monospace(8.0);
        b.iter(|| black_box(detect_char_width(&mut raster, black_box(&style))));
    });
}

criterion_group!(
    benches,
    bench_atlas_insert,
    bench_atlas_hit,
    bench_monospace_detection
);
criterion_main!(benches);
