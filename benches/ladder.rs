//! Benchmarks for ladder resolution and command synthesis
//!
//! Covers the pure stages of an encode: crushing the quality ladder,
//! building the encoder and muxer argument lists, and injecting subtitle
//! tracks into a manifest.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use df_av::{build_encoder_command, build_muxer_command};
use df_core::{crush_qualities, DashRequest, MediaMetadata, MediaStream, QualityTier, ResolvedEncode};
use df_mpd::{with_subtitles, Element, Mpd, SubtitleEntry};

const TIERS: [(&str, QualityTier); 4] = [
    ("low", QualityTier::Low),
    ("medium", QualityTier::Medium),
    ("high", QualityTier::High),
    ("ultra", QualityTier::Ultra),
];

fn create_metadata(audio: usize, subtitles: usize) -> MediaMetadata {
    let mut meta = MediaMetadata::new("/media/movies/movie.mkv");
    meta.bitrate_kbps = 6500;
    meta.framerate = 24000.0 / 1001.0;
    meta.duration_secs = 7200.0;
    meta.video_streams.push(MediaStream {
        codec_name: "h264".into(),
        pixel_format: Some("yuv420p".into()),
        width: Some(1920),
        height: Some(1080),
        ..MediaStream::default()
    });
    let languages = ["eng", "fre", "ger", "spa", "ita", "jpn"];
    for i in 0..audio {
        meta.audio_streams.push(MediaStream {
            index: (1 + i) as u32,
            codec_name: "ac3".into(),
            language: Some(languages[i % languages.len()].into()),
            ..MediaStream::default()
        });
    }
    for i in 0..subtitles {
        meta.subtitle_streams.push(MediaStream {
            index: (1 + audio + i) as u32,
            codec_name: "subrip".into(),
            language: Some(languages[i % languages.len()].into()),
            ..MediaStream::default()
        });
    }
    meta
}

fn create_manifest(representations: usize) -> Mpd {
    let period = (0..representations).fold(Element::new("Period"), |period, i| {
        period.with_child(
            Element::new("AdaptationSet").with_child(
                Element::new("Representation")
                    .with_attr("id", (i + 1).to_string())
                    .with_attr("bandwidth", "1000000")
                    .with_child(Element::new("BaseURL").with_text(format!("movie_{i}_dashinit.mp4"))),
            ),
        )
    });
    Mpd::new(Element::new("MPD").with_child(period))
}

fn bench_crush(c: &mut Criterion) {
    let mut group = c.benchmark_group("crush_qualities");

    for (name, tier) in TIERS {
        let ladder = tier.ladder("medium");
        group.bench_with_input(BenchmarkId::new("tier", name), &ladder, |b, ladder| {
            b.iter(|| crush_qualities(black_box(ladder), black_box(6500), 0.9));
        });
    }

    group.finish();
}

fn bench_build_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_commands");

    for (audio, subtitles) in [(1, 0), (2, 4), (6, 12)] {
        let meta = create_metadata(audio, subtitles);
        let request = DashRequest::new(
            "/media/movies/movie.mkv",
            "/media/dash",
            "movie",
            QualityTier::Ultra.ladder("medium"),
        );
        let resolved = ResolvedEncode::resolve(&request, &meta, |_, _| false);
        let id = format!("{audio}a_{subtitles}s");

        group.bench_with_input(BenchmarkId::new("encoder", &id), &meta, |b, meta| {
            b.iter(|| build_encoder_command(black_box(&resolved), black_box(meta)));
        });

        let encoder = build_encoder_command(&resolved, &meta);
        group.bench_with_input(BenchmarkId::new("muxer", &id), &encoder, |b, encoder| {
            b.iter(|| build_muxer_command(black_box(&resolved), black_box(encoder)));
        });
    }

    group.finish();
}

fn bench_with_subtitles(c: &mut Criterion) {
    let mut group = c.benchmark_group("with_subtitles");

    let subtitles: Vec<SubtitleEntry> = (0..8)
        .map(|i| SubtitleEntry::new("eng", format!("movie_subtitle_eng_{i}.vtt")))
        .collect();

    for size in [4, 16, 64] {
        let mpd = create_manifest(size);
        group.bench_with_input(BenchmarkId::new("representations", size), &mpd, |b, mpd| {
            b.iter(|| with_subtitles(black_box(mpd), black_box(&subtitles)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_crush, bench_build_commands, bench_with_subtitles);
criterion_main!(benches);
