use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use torrent_aggregator::client::normalize::parse_size;
use torrent_aggregator::client::torznab::parse_feed;
use torrent_aggregator::client::{Category, SourceDescriptor};

fn feed(items: usize) -> String {
    let body: String = (0..items)
        .map(|i| {
            format!(
                r#"<item><title>Item {i}</title><comments>https://tracker.example/{i}</comments>
<pubDate>Fri, 05 Jan 2024 12:00:00 +0000</pubDate><size>{size}</size>
<torznab:attr name="category" value="2000"/><torznab:attr name="seeders" value="{i}"/>
<torznab:attr name="peers" value="{i}"/><torznab:attr name="infohash" value="{hash:040x}"/></item>"#,
                size = 1_048_576 * (i + 1),
                hash = i + 1,
            )
        })
        .collect();
    format!(
        r#"<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed"><channel>{body}</channel></rss>"#
    )
}

fn benchmark_feed_parsing(c: &mut Criterion) {
    let descriptor =
        SourceDescriptor::protocol_client("bench", "Bench", "http://localhost", Category::All);
    let mut group = c.benchmark_group("torznab_feed");
    for items in [10, 100, 1000] {
        let body = feed(items);
        group.bench_with_input(BenchmarkId::from_parameter(items), &body, |b, body| {
            b.iter(|| parse_feed(black_box(body), &descriptor));
        });
    }
    group.finish();
}

fn benchmark_size_parsing(c: &mut Criterion) {
    c.bench_function("parse_size", |b| {
        b.iter(|| {
            for raw in ["1.37 GiB", "700 MB", "1,234 KiB", "12345"] {
                black_box(parse_size(black_box(raw)));
            }
        });
    });
}

criterion_group!(benches, benchmark_feed_parsing, benchmark_size_parsing);
criterion_main!(benches);
