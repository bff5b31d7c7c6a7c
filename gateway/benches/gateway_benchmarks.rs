//! Performance benchmarks for the voice relay hot path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use tokio::sync::mpsc;
use voice_relay_gateway::core::call::{CallState, CallType, GoodbyeDetector};
use voice_relay_gateway::core::media::messages::OutboundMedia;
use voice_relay_gateway::core::media::{MediaEvent, MediaTransport, OutboundMessage};
use voice_relay_gateway::core::session::plan_truncation;

/// Benchmark inbound media frame parsing
fn bench_media_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("media_parsing");
    group.measurement_time(Duration::from_secs(5));

    // 20ms of 8kHz u-law is 160 bytes, 216 base64 chars
    let media = format!(
        r#"{{"event":"media","sequenceNumber":"42","media":{{"track":"inbound","chunk":"41","timestamp":"820","payload":"{}"}},"streamSid":"MZ0123456789"}}"#,
        "/".repeat(216)
    );
    let start = r#"{"event":"start","sequenceNumber":"1","start":{"streamSid":"MZ0123456789","callSid":"CA0123456789","customParameters":{"fromNumber":"+15550001","toNumber":"+15550002","callContext":"Book a table for two at 7pm"}},"streamSid":"MZ0123456789"}"#;
    let mark = r#"{"event":"mark","sequenceNumber":"43","streamSid":"MZ0123456789","mark":{"name":"responsePart"}}"#;

    for (name, frame) in [("media", media.as_str()), ("start", start), ("mark", mark)] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, frame.len()), &frame, |b, frame| {
            b.iter(|| {
                let _ = MediaEvent::parse(black_box(frame));
            });
        });
    }

    group.finish();
}

/// Benchmark outbound frame serialization
fn bench_outbound_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbound_serialization");

    let media = OutboundMessage::Media {
        stream_sid: "MZ0123456789".to_string(),
        media: OutboundMedia {
            payload: "/".repeat(4096),
        },
    };
    let clear = OutboundMessage::Clear {
        stream_sid: "MZ0123456789".to_string(),
    };

    group.bench_function("media_4k", |b| {
        b.iter(|| black_box(&media).to_json());
    });
    group.bench_function("clear", |b| {
        b.iter(|| black_box(&clear).to_json());
    });

    group.finish();
}

/// Benchmark goodbye detection on caller transcripts
fn bench_goodbye_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("goodbye_detection");
    let detector = GoodbyeDetector::default();

    let short_miss = "Yes, seven works for us.";
    let long_miss = "Could you also check whether the patio is open tonight? ".repeat(8);
    let hit = "Great, thank you so much. Have a nice day!";

    group.bench_function("short_miss", |b| {
        b.iter(|| detector.is_goodbye(black_box(short_miss)));
    });
    group.bench_function("long_miss", |b| {
        b.iter(|| detector.is_goodbye(black_box(&long_miss)));
    });
    group.bench_function("hit", |b| {
        b.iter(|| detector.is_goodbye(black_box(hit)));
    });

    group.finish();
}

/// Benchmark barge-in truncation planning
fn bench_truncation_planning(c: &mut Criterion) {
    let mut state = CallState::new(CallType::Outbound);
    state.latest_media_timestamp = 12_480;
    state.response_start_timestamp = Some(9_020);
    state.last_assistant_item_id = Some("item_0123456789".to_string());
    for _ in 0..32 {
        state.mark_queue.push_back("responsePart".to_string());
    }

    c.bench_function("plan_truncation", |b| {
        b.iter(|| plan_truncation(black_box(&state)));
    });
}

/// Benchmark forwarding one AI audio chunk to the media channel
fn bench_transport_send(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (tx, mut rx) = mpsc::channel(1024);
    let mut transport = MediaTransport::new(tx);
    transport.set_stream_sid("MZ0123456789");
    let payload = "/".repeat(216);

    c.bench_function("transport_send_audio", |b| {
        b.iter(|| {
            rt.block_on(async {
                transport.send_audio(black_box(&payload)).await;
                let _ = rx.recv().await;
            });
        });
    });
}

criterion_group!(
    benches,
    bench_media_parsing,
    bench_outbound_serialization,
    bench_goodbye_detection,
    bench_truncation_planning,
    bench_transport_send,
);
criterion_main!(benches);
