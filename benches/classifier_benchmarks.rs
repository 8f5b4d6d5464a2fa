//! Performance benchmarks for WaaV Live inbound handling
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use waav_live::core::realtime::{
    Blob, LiveIncomingMessage, LiveOutgoingMessage, Part, classify, classify_message,
};

fn audio_frame(pcm_bytes: usize) -> String {
    let blob = Blob::from_bytes("audio/pcm;rate=24000", &vec![0x7f; pcm_bytes]);
    format!(
        r#"{{"serverContent":{{"modelTurn":{{"parts":[{{"inlineData":{{"mimeType":"{}","data":"{}"}}}},{{"text":"Sure, here is the answer."}}]}}}}}}"#,
        blob.mime_type, blob.data
    )
}

/// Benchmark frame decoding plus classification, as done per inbound frame
fn bench_frame_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_classification");
    group.measurement_time(Duration::from_secs(5));

    let turn_complete = r#"{"serverContent":{"turnComplete":true}}"#.to_string();
    let tool_call = r#"{"toolCall":{"functionCalls":[{"id":"call-1","name":"lookup","args":{"city":"Paris"}}]}}"#.to_string();

    // 40 ms and 1 s of 24 kHz 16-bit mono audio
    let small_audio = audio_frame(1_920);
    let large_audio = audio_frame(48_000);

    for (name, frame) in [
        ("turn_complete", &turn_complete),
        ("tool_call", &tool_call),
        ("audio_40ms", &small_audio),
        ("audio_1s", &large_audio),
    ] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, frame.len()), frame, |b, frame| {
            b.iter(|| {
                let message = LiveIncomingMessage::decode(black_box(frame.as_bytes()))
                    .expect("benchmark frame decodes");
                classify_message(message)
            });
        });
    }

    group.finish();
}

/// Benchmark the transcription heuristic on typical reply shapes
fn bench_text_heuristic(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_heuristic");

    let short = "Good morning, how can I help you today?".to_string();
    let markdown = "Here's the transcription:\n\n**Speaker 1:** hello".to_string();
    let long_prose = "This is a sentence in a longer reply. ".repeat(40);
    let paragraphs = ["A paragraph of ordinary prose without markup."; 6]
        .join("\n\n")
        .repeat(2);

    for (name, text) in [
        ("short", &short),
        ("markdown", &markdown),
        ("long_prose", &long_prose),
        ("paragraphs", &paragraphs),
    ] {
        group.bench_with_input(BenchmarkId::new(name, text.len()), text, |b, text| {
            b.iter(|| classify(black_box(text)));
        });
    }

    group.finish();
}

/// Benchmark outbound frame serialization
fn bench_outbound_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbound_serialization");

    // 100 ms of 16 kHz 16-bit mono input
    let chunk = Blob::from_bytes("audio/pcm;rate=16000", &vec![0u8; 3_200]);
    let realtime_input = LiveOutgoingMessage::realtime_input(vec![chunk]);
    let user_turn = LiveOutgoingMessage::user_turn(vec![Part::text("What's the weather?")], true);

    group.bench_function("realtime_input_100ms", |b| {
        b.iter(|| black_box(&realtime_input).to_json())
    });
    group.bench_function("user_turn", |b| b.iter(|| black_box(&user_turn).to_json()));

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_classification,
    bench_text_heuristic,
    bench_outbound_serialization,
);
criterion_main!(benches);
