//! Benchmarks for segment planning and probe output parsing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use segforge_av::parse_ffprobe_json;
use segforge_core::plan;
use std::num::NonZeroU32;
use std::path::Path;

/// ffprobe output for a two-hour file with one audio track
const FFPROBE_FEATURE: &str = r#"{
    "format": {
        "filename": "/uploads/feature.mp4",
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "duration": "7200.000000",
        "size": "4500000000"
    },
    "streams": [
        {"index": 0, "codec_type": "video", "codec_name": "h264", "duration": "7199.958333"},
        {"index": 1, "codec_type": "audio", "codec_name": "aac", "duration": "7200.000000"}
    ]
}"#;

/// Matroska-style output where only the container carries a duration
const FFPROBE_MKV: &str = r#"{
    "format": {"filename": "/uploads/clip.mkv", "format_name": "matroska,webm", "duration": "95.500000"},
    "streams": [
        {"index": 0, "codec_type": "video", "codec_name": "hevc"},
        {"index": 1, "codec_type": "audio", "codec_name": "opus"},
        {"index": 2, "codec_type": "subtitle", "codec_name": "ass"}
    ]
}"#;

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    for (total, part) in [(25.0, 10), (7200.0, 10), (7200.0, 1), (86_400.0, 1)] {
        let part = NonZeroU32::new(part).unwrap();
        group.bench_with_input(
            BenchmarkId::new(format!("{total}s"), part.get()),
            &(total, part),
            |b, &(total, part)| b.iter(|| plan(black_box(total), black_box(part))),
        );
    }
    group.finish();
}

fn bench_probe_parsing(c: &mut Criterion) {
    let path = Path::new("/uploads/clip.mp4");
    c.bench_function("ffprobe_parse_feature", |b| {
        b.iter(|| parse_ffprobe_json(path, black_box(FFPROBE_FEATURE)).unwrap())
    });
    c.bench_function("ffprobe_parse_mkv_fallback", |b| {
        b.iter(|| parse_ffprobe_json(path, black_box(FFPROBE_MKV)).unwrap())
    });
}

criterion_group!(benches, bench_plan, bench_probe_parsing);
criterion_main!(benches);
