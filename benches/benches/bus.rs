use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trellis_host::{Message, MessageBus};

const BINDING: &str = "type=UiToggle key=visible toUi=controlPanel; type=MouseShow; \
                       type=SetVar key=Orbit_speed delta=0.25 label='orbit speed'";

fn dispatch_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("dispatch_1000_mixed", |b| {
        let mut bus: MessageBus<u64> = MessageBus::new();
        bus.register("SetVar", |msg: &mut Message, hits: &mut u64| {
            *hits += 1;
            msg.consume();
        });
        bus.set_default(|_: &mut Message, hits: &mut u64| *hits += 1);
        let sender = bus.sender();
        let mut hits = 0u64;

        b.iter(|| {
            for idx in 0..1000 {
                let tag = if idx % 3 == 0 { "SetVar" } else { "UiSet" };
                sender.send(Message::new(tag).with("key", "Orbit_speed").with("val", idx));
            }
            bus.dispatch(&mut hits, 0.0);
        });
        black_box(hits);
    });

    group.bench_function("parse_key_binding", |b| {
        b.iter(|| Message::parse_batch(black_box(BINDING)).map(|batch| batch.len()));
    });

    group.finish();
}

criterion_group!(benches, dispatch_frame);
criterion_main!(benches);
