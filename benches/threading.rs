//! Benchmarks for thread ordering and rendering.
//!
//! Run with: `cargo bench`
//! Run specific group: `cargo bench --bench threading -- order`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use space_archive::config::{ArchiveConfig, SortOrder};
use space_archive::core::attachment::{AttachmentRecord, AttachmentSource};
use space_archive::core::{AvatarMap, ConversationMeta, NameCache, Renderer, ThreadOrder};
use space_archive::message::Message;
use space_archive::Result;

use chrono::{Duration, TimeZone, Utc};

// =============================================================================
// Test Data Generators
// =============================================================================

/// Every fifth message replies to the most recent top-level message.
fn generate_conversation(count: usize) -> Vec<Message> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let mut last_top = String::new();
    let mut messages: Vec<Message> = (0..count)
        .map(|i| {
            let id = format!("M{}", i);
            let sender = if i % 3 == 0 { "alice@corp.com" } else { "bob@partner.org" };
            let msg = Message::new(
                id.clone(),
                sender,
                base + Duration::minutes(i as i64 * 7),
                format!("Message number {} with a link https://example.com/{}", i, i),
            );
            if i % 5 == 4 && !last_top.is_empty() {
                msg.with_parent(last_top.clone())
            } else {
                last_top = id;
                msg
            }
        })
        .collect();
    messages.reverse();
    messages
}

/// One thread with `count` replies.
fn generate_fan_out(count: usize) -> Vec<Message> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let mut messages = vec![Message::new("ROOT", "a@x.com", base, "root")];
    messages.extend((0..count).map(|i| {
        Message::new(format!("R{}", i), "a@x.com", base + Duration::seconds(i as i64 + 1), "re")
            .with_parent("ROOT")
    }));
    messages
}

struct NoAttachments;

impl AttachmentSource for NoAttachments {
    fn resolve(&mut self, _urls: &[String]) -> Result<Vec<AttachmentRecord>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("order");

    for size in [1_000, 10_000, 100_000] {
        let messages = generate_conversation(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("resolve", size), &messages, |b, messages| {
            b.iter(|| ThreadOrder::resolve(black_box(messages)));
        });
    }

    for size in [100, 1_000, 5_000] {
        let messages = generate_fan_out(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fan_out", size), &messages, |b, messages| {
            b.iter(|| ThreadOrder::resolve(black_box(messages)));
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let config = ArchiveConfig::new();
    let names = NameCache::new();
    let avatars = AvatarMap::new();
    let renderer = Renderer::new(&config, &names, &avatars).with_own_domain(Some("corp.com"));
    let meta = ConversationMeta {
        title: "Bench".into(),
        owner: "Bench".into(),
        generated_at: Utc::now(),
        member_count: 2,
        truncated: false,
    };

    for size in [1_000, 10_000] {
        let messages = generate_conversation(size);
        let order = ThreadOrder::resolve(&messages);
        let arranged = order.arrange(&messages, SortOrder::OldestFirst);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("document", size), &arranged, |b, arranged| {
            b.iter(|| renderer.render(&meta, black_box(arranged), &mut NoAttachments));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_order, bench_render);
criterion_main!(benches);
